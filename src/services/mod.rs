pub mod config_engine;
pub mod prompt_builder;
pub mod storage;
