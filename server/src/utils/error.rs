use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::backend::BackendError;
use crate::detail::ActionError;
use crate::forms::{BannerError, DrawerError, FormErrors};
use crate::list::ListViewError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Form submission blocked by field errors; the fields go out as `details`.
    #[error("Validation error: {message}")]
    FormError { message: String, fields: FormErrors },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::FormError { .. } => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) | AppError::FormError { .. } => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ExternalServiceError(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::FormError { message: msg, .. }
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => {
                tracing::debug!(code = self.code(), message = %msg, "Request rejected");
            }
            AppError::ExternalServiceError(msg) | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::FormError { fields, .. } => serde_json::to_value(fields).ok(),
            _ => None,
        }
    }
}

impl From<BackendError> for AppError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Auth(msg) => AppError::AuthError(msg),
            BackendError::NotFound(msg) => AppError::NotFound(msg),
            BackendError::Conflict(msg) => AppError::Conflict(msg),
            BackendError::Database(e) => AppError::DatabaseError(e),
            other => AppError::ExternalServiceError(other.to_string()),
        }
    }
}

impl From<DrawerError> for AppError {
    fn from(e: DrawerError) -> Self {
        match e {
            DrawerError::Invalid(fields) => AppError::FormError {
                message: "Please fix the highlighted fields".to_string(),
                fields,
            },
            DrawerError::Ended => AppError::Conflict(DrawerError::Ended.to_string()),
            DrawerError::Missing => AppError::NotFound(DrawerError::Missing.to_string()),
            DrawerError::Backend(e) => AppError::from(e),
        }
    }
}

impl From<ActionError> for AppError {
    fn from(e: ActionError) -> Self {
        match e {
            ActionError::NothingPending => AppError::ValidationError(e.to_string()),
            ActionError::Unavailable(_) => AppError::Conflict(e.to_string()),
            ActionError::Missing => AppError::NotFound(e.to_string()),
            ActionError::Backend(e) => AppError::from(e),
        }
    }
}

impl From<ListViewError> for AppError {
    fn from(e: ListViewError) -> Self {
        match e {
            ListViewError::UnknownSort(_) | ListViewError::PageOutOfRange(_) => {
                AppError::ValidationError(e.to_string())
            }
            ListViewError::Failed(message) => AppError::ExternalServiceError(message),
            ListViewError::Loading => AppError::InternalServerError(e.to_string()),
        }
    }
}

impl From<BannerError> for AppError {
    fn from(e: BannerError) -> Self {
        let message = e.to_string();
        match e {
            BannerError::UnsupportedType(_) | BannerError::TooLarge(_) => AppError::FormError {
                message: message.clone(),
                fields: FormErrors {
                    banner_image: Some(message),
                    ..FormErrors::default()
                },
            },
            BannerError::UploadFailed | BannerError::RemoveFailed => {
                AppError::ExternalServiceError(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::FormError { message: msg, .. }
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::ExternalServiceError(msg) => msg.clone(),
            AppError::InternalServerError(_) => "An internal error occurred".to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
        };

        error_response(code, public_message, self.details(), status)
    }
}
