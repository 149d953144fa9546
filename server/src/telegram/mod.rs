pub mod client;
pub mod commands;
pub mod service;
pub mod types;

use thiserror::Error;

use crate::database::DatabaseError;
use crate::tenant::TenantError;

pub use client::{TelegramApi, TelegramClient};
pub use service::TelegramService;

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Telegram API error: {0}")]
    Api(String),
    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Tenant(#[from] TenantError),
}
