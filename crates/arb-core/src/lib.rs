pub mod config;
pub mod constants;
pub mod contracts;
pub mod error;
pub mod events;
pub mod types;

pub use config::{BotConfig, TelegramConfig};
pub use error::{BotError, Result};
