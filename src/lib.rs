// Core modules
pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod session;
pub mod strategy;

// Re-export commonly used types
pub use error::{BotError, Result};
pub use models::*;
