//! Domain errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn tariff_not_found(id: i32) -> Self {
        DomainError::NotFound {
            entity: "Tariff",
            field: "id",
            value: id.to_string(),
        }
    }

    pub fn blog_not_found(id: i32) -> Self {
        DomainError::NotFound {
            entity: "Blog",
            field: "id",
            value: id.to_string(),
        }
    }

    pub fn batch_not_found(id: i32) -> Self {
        DomainError::NotFound {
            entity: "TariffBatch",
            field: "id",
            value: id.to_string(),
        }
    }
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Storage(e.to_string())
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
