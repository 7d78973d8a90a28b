use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Main application error type
///
/// Expected gateway outcomes (declines, cancellations, duplicates) are not
/// errors; they travel as `ProcessorDecision` / `CallbackOutcome` values.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Validation errors for business rules
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payment gateway errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Outbound gateway call exceeded its time budget
    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Gateway reference could not be mapped back to a basket
    #[error("Invalid basket reference: {0}")]
    InvalidBasket(String),

    /// Status change outside the declared pipeline
    #[error("Illegal {entity} status transition from [{from}] to [{to}]")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Processor cannot issue credits or refunds
    #[error("Processor [{0}] can not issue credits or refunds")]
    CreditNotSupported(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(serde_json::json!({
            "error": {
                "message": error_message,
                "code": status_code.as_u16(),
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidBasket(_) => StatusCode::BAD_REQUEST,
            AppError::IllegalTransition { .. } => StatusCode::CONFLICT,
            AppError::CreditNotSupported(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Helper functions for common error scenarios
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        AppError::Gateway(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn invalid_basket(reference: impl Into<String>) -> Self {
        AppError::InvalidBasket(reference.into())
    }

    /// Maps a reqwest failure on an outbound gateway call, keeping timeouts distinct
    pub fn from_gateway_call(gateway: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::GatewayTimeout(format!("{} did not answer in time: {}", gateway, e))
        } else if e.is_connect() {
            AppError::gateway(format!("{} gateway unavailable: {}", gateway, e))
        } else {
            AppError::gateway(format!("{} request failed: {}", gateway, e))
        }
    }
}
