//! HTTP layer of the helpdesk: axum handlers, extractors and the router.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         HTTP shell (this crate)         │  ← routing, auth, JSON envelopes
//! │  - Bearer token extraction              │  ← correlation IDs, tracing
//! │  - Error → status mapping               │
//! ├─────────────────────────────────────────┤
//! │         helpdesk-core                   │
//! │  - Ticket numbers, filters, permissions │  ← pure logic, testable without I/O
//! │  - Store traits                         │  ← Postgres or in-memory behind Arc<dyn>
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! 1. The correlation-id layer opens an `http_request` span
//! 2. [`extractors::AuthenticatedUser`] verifies the bearer token (admin routes
//!    additionally go through [`extractors::AdminUser`])
//! 3. The handler calls a core service or store trait
//! 4. Results are wrapped as `{"success": true, "data": ...}`; errors become
//!    `{"code": ..., "message": ...}` through [`AppError`]
//!
//! # Example
//!
//! ```ignore
//! let state = AppState { /* stores */ };
//! let app = helpdesk_web::router(state);
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{AdminUser, AuthenticatedUser, ClientIp, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use router::router;
pub use state::{AppState, HealthProbe};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
