use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::{
    config::Config,
    database::{
        BindingRepository, MenuRepository, Tenant, TenantConfig, TenantRepository,
        DEFAULT_MENU_TITLE,
    },
    error::{AppError, ConfigurationError},
    menu::MenuService,
    telegram::{types::Update, TelegramClient, TelegramService},
    tenant::{normalize_menu_mode, ConfigDefaults, TenantService, UpdateTenantConfig},
    transit::{emt::EmtClient, ArrivalItem, ArrivalsResponse, ArrivalsService},
    utils::ErrorResponse,
    weather::{DisplayWeather, WeatherConfig, WeatherService, WeatherUpstream},
    youtube::build_youtube_embed_url,
};

const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tenants: TenantService,
    pub menus: MenuService,
    pub arrivals: ArrivalsService,
    pub weather: WeatherService,
    pub telegram: Option<Arc<TelegramService>>,
}

impl AppState {
    /// Wires every service over one store. The Telegram bot is only built
    /// when a bot token is configured.
    pub fn build<D>(
        config: Config,
        store: Arc<D>,
        weather_upstream: Arc<dyn WeatherUpstream>,
    ) -> Result<Self, reqwest::Error>
    where
        D: TenantRepository + MenuRepository + BindingRepository + 'static,
    {
        let tenants = TenantService::new(store.clone(), ConfigDefaults::from(&config));
        let menus = MenuService::new(store.clone());
        let arrivals = ArrivalsService::new(Arc::new(EmtClient::new(&config)?));
        let weather = WeatherService::new(weather_upstream, config.weather_refresh_interval());

        let telegram = match config.telegram_bot_token.as_deref() {
            Some(token) => {
                let api = Arc::new(TelegramClient::new(&config.telegram_api_base_url, token)?);
                Some(Arc::new(TelegramService::new(
                    api,
                    tenants.clone(),
                    menus.clone(),
                    store,
                    &config,
                )))
            }
            None => None,
        };

        Ok(Self {
            config: Arc::new(config),
            tenants,
            menus,
            arrivals,
            weather,
            telegram,
        })
    }

    async fn find_tenant(&self, code: &str) -> Result<(Tenant, TenantConfig), AppError> {
        self.tenants
            .get_tenant_and_config(code)
            .await?
            .ok_or_else(|| AppError::NotFound("Tenant not found".to_string()))
    }

    fn require_admin(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let provided = headers
            .get(ADMIN_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided == Some(self.config.admin_secret.as_str()) {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// Everything the display page needs to lay itself out.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfigResponse {
    pub tenant_name: String,
    pub layout: String,
    pub refresh_seconds: i64,
    pub swap_seconds: i64,
    pub menu_mode: String,
    pub show_youtube: bool,
    pub youtube_url: Option<String>,
    pub youtube_embed_url: Option<String>,
    pub show_weather: bool,
    pub weather_lang: String,
    pub weather_lat: Option<f64>,
    pub weather_lon: Option<f64>,
    pub weather_refresh_seconds: u64,
    pub theme: String,
    pub board_header_text: String,
    pub stops: Vec<String>,
    /// Absent when weather is off or no reading is available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<DisplayWeather>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MenuResponse {
    pub title: String,
    #[schema(value_type = Option<Object>)]
    pub sections: Option<serde_json::Value>,
    pub text_raw: String,
    pub featured_image_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTenantRequest {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantResponse {
    pub code: String,
    pub tenant_id: String,
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub ok: bool,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        get_tenant_config,
        get_tenant_weather,
        get_arrivals,
        get_menu,
        create_tenant,
        update_tenant_config,
        telegram_webhook,
    ),
    components(schemas(
        HealthResponse,
        TenantConfigResponse,
        DisplayWeather,
        ArrivalsResponse,
        ArrivalItem,
        MenuResponse,
        CreateTenantRequest,
        CreateTenantResponse,
        UpdateTenantConfig,
        TenantConfig,
        WebhookAck,
        ErrorResponse,
    )),
    tags(
        (name = "display", description = "Content served to signage screens"),
        (name = "admin", description = "Tenant administration"),
        (name = "telegram", description = "Telegram bot webhook"),
    )
)]
pub struct ApiDoc;

// Route handlers
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/api/tenants/{code}/config",
    tag = "display",
    params(("code" = String, Path, description = "Tenant short code")),
    responses(
        (status = 200, description = "Display configuration", body = TenantConfigResponse),
        (status = 400, description = "Stored configuration is unusable", body = ErrorResponse),
        (status = 404, description = "Unknown tenant", body = ErrorResponse)
    )
)]
pub async fn get_tenant_config(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<TenantConfigResponse>, AppError> {
    let (tenant, config) = state.find_tenant(&code).await?;

    let youtube_url = config.youtube_url.as_deref().map(str::trim).filter(|u| !u.is_empty());
    if config.show_youtube && youtube_url.is_none() {
        return Err(ConfigurationError::MissingYoutubeUrl.into());
    }
    let youtube_embed_url = if config.show_youtube {
        let embed = build_youtube_embed_url(youtube_url);
        if embed.is_none() {
            tracing::warn!(tenant_id = %tenant.id, url = ?youtube_url, "invalid YouTube URL");
        }
        embed
    } else {
        None
    };

    let weather = match WeatherConfig::from_tenant_config(&config) {
        Ok(weather_config) => match state.weather.get_weather(&tenant.id, &weather_config).await {
            Ok(weather) => weather,
            Err(e) => {
                tracing::warn!(tenant_id = %tenant.id, error = %e, "weather widget omitted");
                None
            }
        },
        Err(e) => {
            tracing::warn!(tenant_id = %tenant.id, error = %e, "invalid weather settings");
            None
        }
    };

    Ok(Json(TenantConfigResponse {
        tenant_name: tenant.name,
        menu_mode: normalize_menu_mode(&config).to_string(),
        layout: config.layout,
        refresh_seconds: config.refresh_seconds,
        swap_seconds: config.swap_seconds,
        show_youtube: config.show_youtube,
        youtube_url: config.youtube_url,
        youtube_embed_url,
        show_weather: config.show_weather,
        weather_lang: config.weather_lang,
        weather_lat: config.weather_lat,
        weather_lon: config.weather_lon,
        weather_refresh_seconds: state.config.weather_refresh_seconds,
        theme: config.theme,
        board_header_text: config.board_header_text,
        stops: config.stops,
        weather,
    }))
}

#[utoipa::path(
    get,
    path = "/api/tenants/{code}/weather",
    tag = "display",
    params(("code" = String, Path, description = "Tenant short code")),
    responses(
        (status = 200, description = "Current or stale weather", body = DisplayWeather),
        (status = 204, description = "Weather disabled for this tenant"),
        (status = 400, description = "Weather enabled without usable settings", body = ErrorResponse),
        (status = 404, description = "Unknown tenant", body = ErrorResponse),
        (status = 503, description = "Provider down and nothing cached", body = ErrorResponse)
    )
)]
pub async fn get_tenant_weather(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let (tenant, config) = state.find_tenant(&code).await?;
    let weather_config = WeatherConfig::from_tenant_config(&config)?;

    match state.weather.get_weather(&tenant.id, &weather_config).await? {
        Some(weather) => Ok(Json(weather).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/tenants/{code}/arrivals",
    tag = "display",
    params(("code" = String, Path, description = "Tenant short code")),
    responses(
        (status = 200, description = "Upcoming buses at the tenant's stops", body = ArrivalsResponse),
        (status = 404, description = "Unknown tenant", body = ErrorResponse)
    )
)]
pub async fn get_arrivals(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ArrivalsResponse>, AppError> {
    let (_, config) = state.find_tenant(&code).await?;
    Ok(Json(state.arrivals.get_arrivals(&config).await))
}

#[utoipa::path(
    get,
    path = "/api/tenants/{code}/menu",
    tag = "display",
    params(("code" = String, Path, description = "Tenant short code")),
    responses(
        (status = 200, description = "Today's menu and featured image", body = MenuResponse),
        (status = 404, description = "Unknown tenant", body = ErrorResponse)
    )
)]
pub async fn get_menu(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<MenuResponse>, AppError> {
    let (tenant, config) = state.find_tenant(&code).await?;
    let (menu, image) = state
        .menus
        .get_menu_with_image(&tenant.id, config.timezone.as_deref())
        .await?;

    let response = match menu {
        Some(menu) => MenuResponse {
            title: menu.title,
            sections: menu.sections,
            text_raw: menu.text_raw.unwrap_or_default(),
            featured_image_url: image.map(|i| i.url),
            updated_at: menu.updated_at,
        },
        None => MenuResponse {
            title: DEFAULT_MENU_TITLE.to_string(),
            sections: None,
            text_raw: String::new(),
            featured_image_url: image.map(|i| i.url),
            updated_at: Utc::now(),
        },
    };
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/admin/tenants",
    tag = "admin",
    request_body = CreateTenantRequest,
    params(("X-Admin-Secret" = String, Header, description = "Admin secret")),
    responses(
        (status = 200, description = "Tenant created", body = CreateTenantResponse),
        (status = 400, description = "Empty name", body = ErrorResponse),
        (status = 401, description = "Bad admin secret", body = ErrorResponse)
    )
)]
pub async fn create_tenant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateTenantRequest>,
) -> Result<Json<CreateTenantResponse>, AppError> {
    state.require_admin(&headers)?;

    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }

    let tenant = state.tenants.create_tenant(name).await?;
    Ok(Json(CreateTenantResponse {
        url: format!("/t/{}", tenant.short_code),
        code: tenant.short_code,
        tenant_id: tenant.id,
    }))
}

#[utoipa::path(
    put,
    path = "/api/admin/tenants/{code}/config",
    tag = "admin",
    request_body = UpdateTenantConfig,
    params(
        ("code" = String, Path, description = "Tenant short code"),
        ("X-Admin-Secret" = String, Header, description = "Admin secret")
    ),
    responses(
        (status = 200, description = "Updated configuration", body = TenantConfig),
        (status = 400, description = "Configuration rejected", body = ErrorResponse),
        (status = 401, description = "Bad admin secret", body = ErrorResponse),
        (status = 404, description = "Unknown tenant", body = ErrorResponse)
    )
)]
pub async fn update_tenant_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(code): Path<String>,
    Json(patch): Json<UpdateTenantConfig>,
) -> Result<Json<TenantConfig>, AppError> {
    state.require_admin(&headers)?;
    let config = state.tenants.update_config(&code, patch).await?;
    tracing::info!(%code, "tenant config updated");
    Ok(Json(config))
}

#[utoipa::path(
    post,
    path = "/api/telegram/webhook/{secret}",
    tag = "telegram",
    params(("secret" = String, Path, description = "Webhook secret")),
    responses(
        (status = 200, description = "Update accepted", body = WebhookAck),
        (status = 401, description = "Bad webhook secret", body = ErrorResponse),
        (status = 503, description = "Bot not configured", body = ErrorResponse)
    )
)]
pub async fn telegram_webhook(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    match state.config.telegram_webhook_secret.as_deref() {
        Some(expected) if expected == secret => {}
        _ => return Err(AppError::Unauthorized),
    }
    let telegram = state
        .telegram
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Telegram bot is not configured".to_string()))?;

    let update: Update = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid update: {e}")))?;
    if let Some(message) = update.message.as_ref().or(update.edited_message.as_ref()) {
        tracing::info!(
            update_id = update.update_id,
            message_id = message.message_id,
            chat_id = message.chat.id,
            "telegram update"
        );
    }

    telegram.handle_update(update, true).await?;
    Ok(Json(WebhookAck { ok: true }))
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/tenants/:code/config", get(get_tenant_config))
        .route("/api/tenants/:code/weather", get(get_tenant_weather))
        .route("/api/tenants/:code/arrivals", get(get_arrivals))
        .route("/api/tenants/:code/menu", get(get_menu))
        .route("/api/admin/tenants", post(create_tenant))
        .route("/api/admin/tenants/:code/config", put(update_tenant_config))
        .route("/api/telegram/webhook/:secret", post(telegram_webhook))
        .route("/api-docs/openapi.json", get(openapi_json))
        .with_state(state)
}
