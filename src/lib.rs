//! Unslop: streaming relay core for the Unslop rewriting extension.
//!
//! This library crate exposes all modules for use by the host binary and integration tests.

pub mod app;
pub mod channel;
pub mod cli;
pub mod database;
pub mod host;
pub mod logging;
pub mod platform;
pub mod providers;
pub mod rpc_handler;
pub mod services;
pub mod types;
