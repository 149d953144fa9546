use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{
    BindingRepository, DailyMenu, DatabaseError, MenuImage, MenuRepository, MenuUpsert,
    TelegramBinding, Tenant, TenantConfig, TenantRepository, DEFAULT_MENU_TITLE,
};

#[derive(sqlx::FromRow)]
struct TenantConfigRow {
    tenant_id: String,
    layout: String,
    refresh_seconds: i64,
    swap_seconds: i64,
    menu_mode: String,
    show_youtube: bool,
    youtube_url: Option<String>,
    show_weather: bool,
    weather_lang: String,
    weather_lat: Option<f64>,
    weather_lon: Option<f64>,
    theme: String,
    board_header_text: String,
    stops: Json<Vec<String>>,
    line_arrive_default: Option<String>,
    timezone: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<TenantConfigRow> for TenantConfig {
    fn from(row: TenantConfigRow) -> Self {
        Self {
            tenant_id: row.tenant_id,
            layout: row.layout,
            refresh_seconds: row.refresh_seconds,
            swap_seconds: row.swap_seconds,
            menu_mode: row.menu_mode,
            show_youtube: row.show_youtube,
            youtube_url: row.youtube_url,
            show_weather: row.show_weather,
            weather_lang: row.weather_lang,
            weather_lat: row.weather_lat,
            weather_lon: row.weather_lon,
            theme: row.theme,
            board_header_text: row.board_header_text,
            stops: row.stops.0,
            line_arrive_default: row.line_arrive_default,
            timezone: row.timezone,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DailyMenuRow {
    id: String,
    tenant_id: String,
    valid_for_date: String,
    title: Option<String>,
    sections: Option<Json<serde_json::Value>>,
    text_raw: Option<String>,
    published_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<DailyMenuRow> for DailyMenu {
    fn from(row: DailyMenuRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            valid_for_date: row.valid_for_date,
            title: row.title.unwrap_or_else(|| DEFAULT_MENU_TITLE.to_string()),
            sections: row.sections.map(|s| s.0),
            text_raw: row.text_raw,
            published_at: row.published_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_tables(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                short_code TEXT NOT NULL UNIQUE,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tenant_configs (
                tenant_id TEXT PRIMARY KEY REFERENCES tenants(id),
                layout TEXT NOT NULL,
                refresh_seconds INTEGER NOT NULL,
                swap_seconds INTEGER NOT NULL,
                menu_mode TEXT NOT NULL,
                show_youtube INTEGER NOT NULL DEFAULT 0,
                youtube_url TEXT,
                show_weather INTEGER NOT NULL DEFAULT 0,
                weather_lang TEXT NOT NULL DEFAULT 'es',
                weather_lat REAL,
                weather_lon REAL,
                theme TEXT NOT NULL,
                board_header_text TEXT NOT NULL,
                stops TEXT NOT NULL DEFAULT '[]',
                line_arrive_default TEXT,
                timezone TEXT,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_menus (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL REFERENCES tenants(id),
                valid_for_date TEXT NOT NULL,
                title TEXT,
                sections TEXT,
                text_raw TEXT,
                published_at TEXT,
                updated_at TEXT NOT NULL,
                UNIQUE (tenant_id, valid_for_date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS menu_images (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL REFERENCES tenants(id),
                url TEXT NOT NULL,
                caption TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS telegram_bindings (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL REFERENCES tenants(id),
                telegram_chat_id INTEGER NOT NULL UNIQUE,
                linked_at TEXT NOT NULL,
                linked_by_username TEXT,
                is_active INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_menu_images_tenant ON menu_images(tenant_id, is_active)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_bindings_tenant ON telegram_bindings(tenant_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl TenantRepository for Database {
    async fn get_by_code(&self, code: &str) -> Result<Option<Tenant>, DatabaseError> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE short_code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn get_by_id(&self, tenant_id: &str) -> Result<Option<Tenant>, DatabaseError> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn create_tenant(&self, name: &str, code: &str) -> Result<Tenant, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let result = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (id, name, short_code, is_active, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(code)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(tenant) => Ok(tenant),
            Err(e) if is_unique_violation(&e) => Err(DatabaseError::DuplicateShortCode(code.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_config(&self, tenant_id: &str) -> Result<Option<TenantConfig>, DatabaseError> {
        let row = sqlx::query_as::<_, TenantConfigRow>(
            "SELECT * FROM tenant_configs WHERE tenant_id = ?",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(TenantConfig::from))
    }

    async fn save_config(&self, config: &TenantConfig) -> Result<TenantConfig, DatabaseError> {
        let row = sqlx::query_as::<_, TenantConfigRow>(
            r#"
            INSERT INTO tenant_configs (
                tenant_id, layout, refresh_seconds, swap_seconds, menu_mode,
                show_youtube, youtube_url, show_weather, weather_lang, weather_lat,
                weather_lon, theme, board_header_text, stops, line_arrive_default,
                timezone, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (tenant_id) DO UPDATE SET
                layout = excluded.layout,
                refresh_seconds = excluded.refresh_seconds,
                swap_seconds = excluded.swap_seconds,
                menu_mode = excluded.menu_mode,
                show_youtube = excluded.show_youtube,
                youtube_url = excluded.youtube_url,
                show_weather = excluded.show_weather,
                weather_lang = excluded.weather_lang,
                weather_lat = excluded.weather_lat,
                weather_lon = excluded.weather_lon,
                theme = excluded.theme,
                board_header_text = excluded.board_header_text,
                stops = excluded.stops,
                line_arrive_default = excluded.line_arrive_default,
                timezone = excluded.timezone,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(&config.tenant_id)
        .bind(&config.layout)
        .bind(config.refresh_seconds)
        .bind(config.swap_seconds)
        .bind(&config.menu_mode)
        .bind(config.show_youtube)
        .bind(&config.youtube_url)
        .bind(config.show_weather)
        .bind(&config.weather_lang)
        .bind(config.weather_lat)
        .bind(config.weather_lon)
        .bind(&config.theme)
        .bind(&config.board_header_text)
        .bind(Json(&config.stops))
        .bind(&config.line_arrive_default)
        .bind(&config.timezone)
        .bind(config.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}

#[async_trait]
impl MenuRepository for Database {
    async fn get_menu_for_date(
        &self,
        tenant_id: &str,
        date: &str,
    ) -> Result<Option<DailyMenu>, DatabaseError> {
        let row = sqlx::query_as::<_, DailyMenuRow>(
            "SELECT * FROM daily_menus WHERE tenant_id = ? AND valid_for_date = ?",
        )
        .bind(tenant_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(DailyMenu::from))
    }

    async fn upsert_menu(
        &self,
        tenant_id: &str,
        date: &str,
        menu: MenuUpsert,
    ) -> Result<DailyMenu, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let row = sqlx::query_as::<_, DailyMenuRow>(
            r#"
            INSERT INTO daily_menus (id, tenant_id, valid_for_date, title, sections, text_raw, published_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, NULL, ?)
            ON CONFLICT (tenant_id, valid_for_date) DO UPDATE SET
                title = excluded.title,
                sections = excluded.sections,
                text_raw = excluded.text_raw,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(date)
        .bind(&menu.title)
        .bind(menu.sections.map(Json))
        .bind(&menu.text_raw)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn publish_menu(&self, tenant_id: &str, date: &str) -> Result<DailyMenu, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let row = sqlx::query_as::<_, DailyMenuRow>(
            r#"
            INSERT INTO daily_menus (id, tenant_id, valid_for_date, published_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (tenant_id, valid_for_date) DO UPDATE SET
                published_at = excluded.published_at,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(date)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get_active_image(&self, tenant_id: &str) -> Result<Option<MenuImage>, DatabaseError> {
        let image = sqlx::query_as::<_, MenuImage>(
            r#"
            SELECT * FROM menu_images
            WHERE tenant_id = ? AND is_active = 1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(image)
    }

    async fn upsert_image(
        &self,
        tenant_id: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<MenuImage, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE menu_images SET is_active = 0 WHERE tenant_id = ? AND is_active = 1")
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        let image = sqlx::query_as::<_, MenuImage>(
            r#"
            INSERT INTO menu_images (id, tenant_id, url, caption, is_active, created_at)
            VALUES (?, ?, ?, ?, 1, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(url)
        .bind(caption)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(image)
    }
}

#[async_trait]
impl BindingRepository for Database {
    async fn get_by_chat_id(&self, chat_id: i64) -> Result<Option<TelegramBinding>, DatabaseError> {
        let binding = sqlx::query_as::<_, TelegramBinding>(
            "SELECT * FROM telegram_bindings WHERE telegram_chat_id = ?",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(binding)
    }

    async fn upsert_binding(
        &self,
        tenant_id: &str,
        chat_id: i64,
        username: Option<&str>,
    ) -> Result<TelegramBinding, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let binding = sqlx::query_as::<_, TelegramBinding>(
            r#"
            INSERT INTO telegram_bindings (id, tenant_id, telegram_chat_id, linked_at, linked_by_username, is_active)
            VALUES (?, ?, ?, ?, ?, 1)
            ON CONFLICT (telegram_chat_id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                linked_at = excluded.linked_at,
                linked_by_username = excluded.linked_by_username,
                is_active = 1
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(chat_id)
        .bind(now)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(binding)
    }
}
