//! Response envelope
//!
//! Every REST result, success or failure, is rendered as
//! `{success, message, data?, errors?, pagination?}`.

use axum::{http::StatusCode, Json};
use parentline_store::{FieldErrors, Page};
use serde::Serialize;

use super::error::ApiError;

/// JSON envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// Pagination block of list responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub count: i64,
    pub page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> From<&Page<T>> for Pagination {
    fn from(page: &Page<T>) -> Self {
        Self {
            count: page.total,
            page: page.page,
            total_pages: page.total_pages(),
            page_size: page.page_size,
            has_next: page.has_next(),
            has_previous: page.has_previous(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: None,
            pagination: None,
        }
    }

    /// Success without a payload
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            errors: None,
            pagination: None,
        }
    }

    pub fn failure(message: impl Into<String>, errors: Option<FieldErrors>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors,
            pagination: None,
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    /// One page of a list
    pub fn paged(message: impl Into<String>, page: Page<T>) -> Self {
        let pagination = Pagination::from(&page);
        Self {
            success: true,
            message: message.into(),
            data: Some(page.items),
            errors: None,
            pagination: Some(pagination),
        }
    }
}

/// Handler result rendered with status 200
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Handler result rendered with status 201
pub type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub fn ok<T>(message: &str, data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(message, data)))
}

pub fn created<T>(message: &str, data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(message, data))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parentline_store::PageRequest;

    #[test]
    fn test_absent_fields_are_omitted() {
        let body = serde_json::to_value(ApiResponse::success("ok", 1)).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "message": "ok", "data": 1}));

        let body = serde_json::to_value(ApiResponse::<()>::done("Deleted")).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "message": "Deleted"}));
    }

    #[test]
    fn test_paged_response_carries_pagination() {
        let page = PageRequest::new(Some(2), Some(2)).slice(vec![1, 2, 3, 4, 5]);
        let body = serde_json::to_value(ApiResponse::paged("Listed", page)).unwrap();

        assert_eq!(body["data"], serde_json::json!([3, 4]));
        assert_eq!(
            body["pagination"],
            serde_json::json!({
                "count": 5,
                "page": 2,
                "total_pages": 3,
                "page_size": 2,
                "has_next": true,
                "has_previous": true
            })
        );
    }
}
