//! Ticket number debug endpoint.

use super::{ApiResponse, ok};
use crate::extractors::AdminUser;
use crate::state::AppState;
use axum::{Json, extract::State};
use helpdesk_core::ticket_number::generator_info;
use serde::Serialize;

/// Active generator as seen by the running process.
#[derive(Debug, Serialize)]
pub struct GeneratorInfo {
    /// Generator name, e.g. `DateChecksum`.
    pub generator: &'static str,
    /// Whether the counter restarts every day.
    pub date_based: bool,
}

/// `GET /admin/debug/ticket-number`
#[allow(clippy::unused_async)]
pub async fn ticket_number_info(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Json<ApiResponse<GeneratorInfo>> {
    let (generator, date_based) = generator_info(state.ticket_service.generator());
    ok(GeneratorInfo {
        generator,
        date_based,
    })
}
