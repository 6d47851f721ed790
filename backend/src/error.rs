//! Error handling for the Warehouse Inventory Tracker
//!
//! Every failure a movement can hit maps to one of four categories:
//! validation, insufficient stock, reference resolution, or persistence.
//! The remaining variants cover the HTTP edge (auth, configuration).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{MovementRejection, ProductId};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business rule errors
    #[error("Insufficient stock for {}. Available: {available}", stock_label(.product_id, .sku))]
    InsufficientStock {
        product_id: ProductId,
        sku: Option<String>,
        available: i64,
        requested: i64,
    },

    #[error("{0}")]
    ReferenceResolution(String),

    // Storage errors
    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

fn stock_label(product_id: &ProductId, sku: &Option<String>) -> String {
    match sku {
        Some(sku) => format!("SKU '{}'", sku),
        None => format!("Product ID {}", product_id),
    }
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Underlying storage failed; nothing from the unit was committed
    pub fn is_persistence(&self) -> bool {
        matches!(self, AppError::Persistence(_) | AppError::Storage(_))
    }

    pub fn is_insufficient_stock(&self) -> bool {
        matches!(self, AppError::InsufficientStock { .. })
    }

    /// Attach the product's SKU to an insufficient-stock error
    pub fn with_sku(self, resolve: impl FnOnce(ProductId) -> Option<String>) -> Self {
        match self {
            AppError::InsufficientStock {
                product_id,
                sku: None,
                available,
                requested,
            } => AppError::InsufficientStock {
                product_id,
                sku: resolve(product_id),
                available,
                requested,
            },
            other => other,
        }
    }
}

impl From<MovementRejection> for AppError {
    fn from(rejection: MovementRejection) -> Self {
        match rejection {
            MovementRejection::InsufficientStock {
                product_id,
                available,
                requested,
            } => AppError::InsufficientStock {
                product_id,
                sku: None,
                available,
                requested,
            },
            other => AppError::Validation {
                field: other.field().to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Validation {
            field: "file".to_string(),
            message: format!("Malformed CSV: {}", err),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
            field: None,
        }
    }
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", msg.clone()),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", "Invalid token".to_string()),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action".to_string(),
                ),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: message.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::InsufficientStock { .. } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("INSUFFICIENT_STOCK", self.to_string()),
            ),
            AppError::ReferenceResolution(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("REFERENCE_NOT_FOUND", msg.clone()),
            ),
            AppError::Persistence(_) | AppError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("PERSISTENCE_ERROR", "A storage error occurred".to_string()),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred".to_string()),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
