use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::Config;
use crate::database::{DatabaseError, Tenant, TenantConfig, TenantRepository};
use crate::error::ConfigurationError;
use crate::weather::WeatherConfig;

/// Unambiguous characters only: no `0/O`, `1/I`.
pub const SHORT_CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
pub const SHORT_CODE_LENGTH: usize = 6;
const MAX_CODE_ATTEMPTS: usize = 10;

pub const MENU_MODE_MENU_AND_IMAGE: &str = "menuAndImage";
pub const MENU_MODE_MENU_ONLY: &str = "menuOnly";

#[derive(Error, Debug)]
pub enum TenantError {
    #[error("Tenant not found")]
    NotFound,
    #[error(transparent)]
    InvalidConfig(#[from] ConfigurationError),
    #[error("Could not generate a unique short code")]
    CodeSpaceExhausted,
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Process-wide defaults for newly created tenant configs.
#[derive(Debug, Clone)]
pub struct ConfigDefaults {
    pub layout: String,
    pub refresh_seconds: i64,
    pub swap_seconds: i64,
    pub theme: String,
    pub board_header_text: String,
}

impl From<&Config> for ConfigDefaults {
    fn from(config: &Config) -> Self {
        Self {
            layout: config.default_layout.clone(),
            refresh_seconds: config.default_refresh_seconds,
            swap_seconds: config.default_swap_seconds,
            theme: config.default_theme.clone(),
            board_header_text: config.default_board_header_text.clone(),
        }
    }
}

/// Partial update sent by the admin API. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTenantConfig {
    pub layout: Option<String>,
    pub refresh_seconds: Option<i64>,
    pub swap_seconds: Option<i64>,
    pub menu_mode: Option<String>,
    pub show_youtube: Option<bool>,
    pub youtube_url: Option<String>,
    pub show_weather: Option<bool>,
    pub weather_lang: Option<String>,
    pub weather_lat: Option<f64>,
    pub weather_lon: Option<f64>,
    pub theme: Option<String>,
    pub board_header_text: Option<String>,
    pub stops: Option<Vec<String>>,
    pub line_arrive_default: Option<String>,
    pub timezone: Option<String>,
}

impl UpdateTenantConfig {
    fn apply(self, config: &mut TenantConfig) {
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if let Some(refresh_seconds) = self.refresh_seconds {
            config.refresh_seconds = refresh_seconds;
        }
        if let Some(swap_seconds) = self.swap_seconds {
            config.swap_seconds = swap_seconds;
        }
        if let Some(menu_mode) = self.menu_mode {
            config.menu_mode = menu_mode;
        }
        if let Some(show_youtube) = self.show_youtube {
            config.show_youtube = show_youtube;
        }
        if let Some(show_weather) = self.show_weather {
            config.show_weather = show_weather;
        }
        if let Some(weather_lang) = self.weather_lang {
            config.weather_lang = weather_lang;
        }
        if let Some(theme) = self.theme {
            config.theme = theme;
        }
        if let Some(board_header_text) = self.board_header_text {
            config.board_header_text = board_header_text;
        }
        if let Some(stops) = self.stops {
            config.stops = stops;
        }
        config.youtube_url = self.youtube_url.or(config.youtube_url.take());
        config.weather_lat = self.weather_lat.or(config.weather_lat);
        config.weather_lon = self.weather_lon.or(config.weather_lon);
        config.line_arrive_default = self.line_arrive_default.or(config.line_arrive_default.take());
        config.timezone = self.timezone.or(config.timezone.take());
    }
}

impl TenantConfig {
    /// Checks the cross-field rules a stored config must satisfy.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.show_youtube && self.youtube_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(ConfigurationError::MissingYoutubeUrl);
        }
        WeatherConfig::from_tenant_config(self)?;
        if let Some(tz) = &self.timezone {
            tz.parse::<chrono_tz::Tz>()
                .map_err(|_| ConfigurationError::InvalidTimezone(tz.clone()))?;
        }
        Ok(())
    }
}

/// The video replaces the image slot, so an embedded YouTube player forces
/// the menu-only layout.
pub fn normalize_menu_mode(config: &TenantConfig) -> &str {
    if config.show_youtube {
        MENU_MODE_MENU_ONLY
    } else {
        &config.menu_mode
    }
}

pub fn generate_short_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SHORT_CODE_LENGTH)
        .map(|_| SHORT_CODE_ALPHABET[rng.gen_range(0..SHORT_CODE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Clone)]
pub struct TenantService {
    repo: Arc<dyn TenantRepository>,
    defaults: ConfigDefaults,
}

impl TenantService {
    pub fn new(repo: Arc<dyn TenantRepository>, defaults: ConfigDefaults) -> Self {
        Self { repo, defaults }
    }

    pub fn default_config(&self, tenant_id: &str) -> TenantConfig {
        TenantConfig {
            tenant_id: tenant_id.to_string(),
            layout: self.defaults.layout.clone(),
            refresh_seconds: self.defaults.refresh_seconds,
            swap_seconds: self.defaults.swap_seconds,
            menu_mode: MENU_MODE_MENU_AND_IMAGE.to_string(),
            show_youtube: false,
            youtube_url: None,
            show_weather: false,
            weather_lang: "es".to_string(),
            weather_lat: None,
            weather_lon: None,
            theme: self.defaults.theme.clone(),
            board_header_text: self.defaults.board_header_text.clone(),
            stops: Vec::new(),
            line_arrive_default: None,
            timezone: None,
            updated_at: Utc::now(),
        }
    }

    /// Active tenant by short code with its config. A tenant without a
    /// config gets the default one persisted on first access.
    pub async fn get_tenant_and_config(
        &self,
        code: &str,
    ) -> Result<Option<(Tenant, TenantConfig)>, TenantError> {
        let tenant = match self.repo.get_by_code(code).await? {
            Some(tenant) if tenant.is_active => tenant,
            _ => return Ok(None),
        };

        let config = match self.repo.get_config(&tenant.id).await? {
            Some(config) => config,
            None => {
                tracing::info!(tenant_id = %tenant.id, "creating default tenant config");
                self.repo.save_config(&self.default_config(&tenant.id)).await?
            }
        };

        Ok(Some((tenant, config)))
    }

    pub async fn get_tenant_by_id(&self, tenant_id: &str) -> Result<Option<Tenant>, TenantError> {
        Ok(self.repo.get_by_id(tenant_id).await?)
    }

    pub async fn get_config_for_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Option<TenantConfig>, TenantError> {
        Ok(self.repo.get_config(tenant_id).await?)
    }

    pub async fn create_tenant(&self, name: &str) -> Result<Tenant, TenantError> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = generate_short_code();
            match self.repo.create_tenant(name, &code).await {
                Ok(tenant) => {
                    self.repo.save_config(&self.default_config(&tenant.id)).await?;
                    tracing::info!(tenant_id = %tenant.id, code = %tenant.short_code, "tenant created");
                    return Ok(tenant);
                }
                Err(DatabaseError::DuplicateShortCode(code)) => {
                    tracing::debug!(%code, attempt, "short code collision, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(TenantError::CodeSpaceExhausted)
    }

    pub async fn update_config(
        &self,
        code: &str,
        patch: UpdateTenantConfig,
    ) -> Result<TenantConfig, TenantError> {
        let (_, mut config) = self
            .get_tenant_and_config(code)
            .await?
            .ok_or(TenantError::NotFound)?;

        patch.apply(&mut config);
        config.validate()?;
        config.updated_at = Utc::now();

        Ok(self.repo.save_config(&config).await?)
    }
}
