//! # Helpdesk Core
//!
//! Domain types, pure logic and store traits for the helpdesk admin and API layer.
//!
//! Every request path in the HTTP layer has the same shape: authenticate, run a
//! parameterized query (or a short transaction), marshal JSON. This crate holds the
//! parts of that shape that are not glue:
//!
//! - [`ticket_number`]: ticket number strategies over an atomic, optionally
//!   date-scoped counter store
//! - [`dynamic_field`]: dynamic field definitions, `df_*` filter to SQL translation,
//!   and the Znuny-compatible YAML import/export
//! - [`permission`]: group permission matrices for agents, customer users and
//!   customer companies
//! - [`postmaster`]: inbound mail filter rules and their evaluation
//! - [`generic_agent`]: denormalized generic agent job configuration and scheduling
//! - [`api_token`]: personal access tokens, scopes and verification
//! - [`group`] and [`ticket`]: the plain records the rest of the system hangs off
//!
//! ## Architecture Principles
//!
//! - Pure logic lives in free functions and plain types, testable without a database
//! - All I/O is behind `Send + Sync` store traits returning boxed futures, so the web
//!   layer can hold them as `Arc<dyn Trait>`
//! - `PostgreSQL` implementations live in `helpdesk-postgres`, in-memory ones in
//!   `helpdesk-testing`
//! - Time is injected through [`environment::Clock`]
//!
//! ## Example
//!
//! ```ignore
//! use helpdesk_core::ticket_number::{TicketNumberConfig, GeneratorKind};
//!
//! let config = TicketNumberConfig { generator: GeneratorKind::DateChecksum, ..Default::default() };
//! let generator = config.build_generator(clock)?;
//! let tn = generator.next(counter_store.as_ref()).await?;
//! ```

use std::future::Future;
use std::pin::Pin;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod api_token;
pub mod dynamic_field;
pub mod error;
pub mod generic_agent;
pub mod group;
pub mod permission;
pub mod postmaster;
pub mod ticket;
pub mod ticket_number;

pub use error::StoreError;

/// Boxed future returned by every store trait method.
///
/// Store traits use explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so they stay dyn-compatible (`Arc<dyn GroupRepository>` in application state).
pub type StoreFuture<'a, T, E = StoreError> =
    Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Environment module - injected dependencies that are not stores.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use helpdesk_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
