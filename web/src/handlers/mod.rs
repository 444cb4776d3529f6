//! HTTP request handlers, organized by resource.
//!
//! Every successful JSON response is wrapped as `{"success": true, "data": ...}`.

use axum::Json;
use serde::Serialize;

pub mod dynamic_fields;
pub mod generic_agent;
pub mod groups;
pub mod health;
pub mod permissions;
pub mod postmaster;
pub mod ticket_number;
pub mod tickets;
pub mod tokens;

pub use health::{health_check, readiness_check};

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true`; failures go through [`crate::AppError`].
    pub success: bool,
    /// Payload.
    pub data: T,
}

/// Wrap `data` in the success envelope.
pub const fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}
