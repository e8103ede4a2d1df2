pub mod common;
pub mod config;
pub mod kv;
pub mod log;
pub mod shortcut;
pub mod sync;
pub mod todo;
