//! Response envelope, pagination and error mapping shared by all handlers

pub mod validated_json;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::DomainError;

pub use validated_json::ValidatedJson;

/// Standard API envelope
///
/// Success: `{"success": true, "data": {...}}`,
/// failure: `{"success": false, "data": null, "error": "..."}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    /// Payload, `null` on error
    pub data: Option<T>,
    /// Error description, omitted on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::error(message)))
}

/// Any JSON body rejection (syntax, types, content type) is a 400.
pub fn invalid_json(rejection: JsonRejection) -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        format!("Invalid JSON: {}", rejection.body_text()),
    )
}

/// Map a domain error to its HTTP status. Storage details are logged,
/// not returned.
pub fn domain_error(err: DomainError) -> ApiError {
    let status = match &err {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "Request failed");
        return api_error(status, "Internal storage error");
    }
    api_error(status, err.to_string())
}

/// Query parameters of paginated lists
#[derive(Debug, Clone, Deserialize, Validate, ToSchema, utoipa::IntoParams)]
pub struct PaginationParams {
    /// Page number, starting at 1. Default: 1
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: u64,
    /// Items per page (10 to 100). Default: 10
    #[serde(default = "default_page_size")]
    #[validate(range(min = 10, max = 100, message = "page_size must be between 10 and 100"))]
    pub page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    10
}

impl PaginationParams {
    pub fn checked(self) -> Result<Self, ApiError> {
        self.validate()
            .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, validation_message(&e)))?;
        Ok(self)
    }
}

/// One page of items with totals
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    /// Number of items across all pages
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, page_size: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

/// Flatten `validator` errors into `field: message; field: message`.
pub fn validation_message(errors: &validator::ValidationErrors) -> String {
    let mut field_errors: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let msg = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, msg)
            })
        })
        .collect();
    field_errors.sort();

    if field_errors.is_empty() {
        "Validation failed".to_string()
    } else {
        field_errors.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            domain_error(DomainError::tariff_not_found(3)).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            domain_error(DomainError::Validation("bad".into())).0,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            domain_error(DomainError::Conflict("alice".into())).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            domain_error(DomainError::Forbidden("not the author".into())).0,
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let (status, Json(body)) = domain_error(DomainError::Storage("disk I/O error".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.as_deref(), Some("Internal storage error"));
    }

    #[test]
    fn page_size_bounds() {
        let ok = PaginationParams {
            page: 1,
            page_size: 10,
        };
        assert!(ok.checked().is_ok());

        let small = PaginationParams {
            page: 1,
            page_size: 5,
        };
        assert_eq!(small.checked().unwrap_err().0, StatusCode::UNPROCESSABLE_ENTITY);

        let zero_page = PaginationParams {
            page: 0,
            page_size: 10,
        };
        assert!(zero_page.checked().is_err());
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = PaginatedResponse::new(vec![1, 2], 21, 1, 10);
        assert_eq!(page.total_pages, 3);
        assert_eq!(PaginatedResponse::<u8>::new(vec![], 0, 1, 10).total_pages, 0);
    }
}
