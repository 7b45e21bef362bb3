// Unslop shared type definitions
// Each submodule defines types used across the relay, storage and host.

pub mod config;
pub mod errors;
pub mod messages;
pub mod persona;
pub mod settings;
