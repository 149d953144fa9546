pub mod sqlite;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub use sqlite::Database;

pub const DEFAULT_MENU_TITLE: &str = "Menu of the day";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),
    #[error("Short code already taken: {0}")]
    DuplicateShortCode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub short_code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    pub tenant_id: String,
    pub layout: String,
    pub refresh_seconds: i64,
    pub swap_seconds: i64,
    pub menu_mode: String,
    pub show_youtube: bool,
    pub youtube_url: Option<String>,
    pub show_weather: bool,
    pub weather_lang: String,
    pub weather_lat: Option<f64>,
    pub weather_lon: Option<f64>,
    pub theme: String,
    pub board_header_text: String,
    pub stops: Vec<String>,
    pub line_arrive_default: Option<String>,
    pub timezone: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMenu {
    pub id: String,
    pub tenant_id: String,
    pub valid_for_date: String,
    pub title: String,
    pub sections: Option<serde_json::Value>,
    pub text_raw: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MenuImage {
    pub id: String,
    pub tenant_id: String,
    pub url: String,
    pub caption: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TelegramBinding {
    pub id: String,
    pub tenant_id: String,
    pub telegram_chat_id: i64,
    pub linked_at: DateTime<Utc>,
    pub linked_by_username: Option<String>,
    pub is_active: bool,
}

/// Fields written by a menu text update. Publication state is left as is.
#[derive(Debug, Clone)]
pub struct MenuUpsert {
    pub title: String,
    pub text_raw: String,
    pub sections: Option<serde_json::Value>,
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn get_by_code(&self, code: &str) -> Result<Option<Tenant>, DatabaseError>;
    async fn get_by_id(&self, tenant_id: &str) -> Result<Option<Tenant>, DatabaseError>;
    /// Fails with [`DatabaseError::DuplicateShortCode`] when the code exists.
    async fn create_tenant(&self, name: &str, code: &str) -> Result<Tenant, DatabaseError>;
    async fn get_config(&self, tenant_id: &str) -> Result<Option<TenantConfig>, DatabaseError>;
    /// Inserts or replaces the config row for `config.tenant_id`.
    async fn save_config(&self, config: &TenantConfig) -> Result<TenantConfig, DatabaseError>;
}

#[async_trait]
pub trait MenuRepository: Send + Sync {
    async fn get_menu_for_date(
        &self,
        tenant_id: &str,
        date: &str,
    ) -> Result<Option<DailyMenu>, DatabaseError>;
    async fn upsert_menu(
        &self,
        tenant_id: &str,
        date: &str,
        menu: MenuUpsert,
    ) -> Result<DailyMenu, DatabaseError>;
    async fn publish_menu(&self, tenant_id: &str, date: &str) -> Result<DailyMenu, DatabaseError>;
    async fn get_active_image(&self, tenant_id: &str) -> Result<Option<MenuImage>, DatabaseError>;
    /// Deactivates every other image of the tenant.
    async fn upsert_image(
        &self,
        tenant_id: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<MenuImage, DatabaseError>;
}

#[async_trait]
pub trait BindingRepository: Send + Sync {
    async fn get_by_chat_id(&self, chat_id: i64) -> Result<Option<TelegramBinding>, DatabaseError>;
    async fn upsert_binding(
        &self,
        tenant_id: &str,
        chat_id: i64,
        username: Option<&str>,
    ) -> Result<TelegramBinding, DatabaseError>;
}
