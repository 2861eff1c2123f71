use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Structured error body returned by every handler.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Conflict")
    pub error: String,
    /// Human-readable description
    pub message: String,
    /// Machine-readable payload for actionable errors (shortage hints,
    /// attempted vs. current status)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Stock held at an alternative warehouse, returned as a remediation
/// hint on insufficient-stock failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseStock {
    pub warehouse_id: i64,
    pub warehouse_name: String,
    pub quantity: i32,
}

/// Payload of an `InsufficientStock` rejection. No mutation has
/// happened when this is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsufficientStockDetails {
    pub inventory_item_id: i64,
    pub warehouse_id: i64,
    pub requested: i32,
    pub available: i32,
    pub shortage: i32,
    pub alternatives: Vec<WarehouseStock>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient stock: requested {requested}, available {available}", requested = .0.requested, available = .0.available)]
    InsufficientStock(InsufficientStockDetails),

    #[error("Invalid state transition: cannot {attempted} a {entity} in status '{current}'")]
    InvalidStateTransition {
        entity: &'static str,
        attempted: &'static str,
        current: String,
    },

    #[error("Already processed: {0}")]
    AlreadyProcessed(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientStock(_)
            | Self::InvalidStateTransition { .. }
            | Self::AlreadyProcessed(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_) | Self::EventError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message suitable for HTTP responses. Internal errors return a
    /// generic message instead of leaking implementation detail.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::InsufficientStock(details) => serde_json::to_value(details).ok(),
            Self::InvalidStateTransition {
                entity,
                attempted,
                current,
            } => Some(serde_json::json!({
                "entity": entity,
                "attempted": attempted,
                "current_status": current,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.details(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_errors_map_to_409() {
        let err = ServiceError::InvalidStateTransition {
            entity: "transfer",
            attempted: "ship",
            current: "pending".into(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ServiceError::AlreadyProcessed("approval 7".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn insufficient_stock_carries_alternatives() {
        let err = ServiceError::InsufficientStock(InsufficientStockDetails {
            inventory_item_id: 1,
            warehouse_id: 2,
            requested: 10,
            available: 4,
            shortage: 6,
            alternatives: vec![WarehouseStock {
                warehouse_id: 3,
                warehouse_name: "Annex".into(),
                quantity: 12,
            }],
        });
        let details = err.details().expect("details");
        assert_eq!(details["shortage"], 6);
        assert_eq!(details["alternatives"][0]["warehouse_id"], 3);
    }

    #[test]
    fn database_errors_hide_internals() {
        let err = ServiceError::DatabaseError(sea_orm::DbErr::Custom("secret dsn".into()));
        assert_eq!(err.response_message(), "Database error");
    }
}
