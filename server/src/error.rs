use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

use crate::database::DatabaseError;
use crate::telegram::TelegramError;
use crate::tenant::TenantError;
use crate::utils::ErrorResponse;
use crate::weather::UpstreamUnavailable;

/// A tenant configuration that cannot be served as stored.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("weatherLat and weatherLon are required when showWeather is true")]
    MissingCoordinates,
    #[error("weatherLang is required when showWeather is true")]
    MissingLanguage,
    #[error("{0}")]
    InvalidCoordinates(String),
    #[error("youtubeUrl is required when showYoutube is true")]
    MissingYoutubeUrl,
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Upstream(#[from] UpstreamUnavailable),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Tenant(#[from] TenantError),
    #[error(transparent)]
    Telegram(#[from] TelegramError),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Configuration(_) => (StatusCode::BAD_REQUEST, "INVALID_CONFIGURATION"),
            AppError::Upstream(_) => (StatusCode::SERVICE_UNAVAILABLE, "UPSTREAM_UNAVAILABLE"),
            AppError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            AppError::Tenant(TenantError::NotFound) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Tenant(TenantError::InvalidConfig(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_CONFIGURATION")
            }
            AppError::Database(_) | AppError::Tenant(_) | AppError::Telegram(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorResponse::new(&self.to_string(), code))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::NotFound("Tenant not found".into()).status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(ConfigurationError::MissingCoordinates).status_and_code(),
            (StatusCode::BAD_REQUEST, "INVALID_CONFIGURATION")
        );
        assert_eq!(
            AppError::from(UpstreamUnavailable::new("timeout")).status_and_code().0,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(TenantError::CodeSpaceExhausted).status_and_code().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_configuration_messages() {
        assert_eq!(
            ConfigurationError::MissingYoutubeUrl.to_string(),
            "youtubeUrl is required when showYoutube is true"
        );
    }
}
