//! # Helpdesk Testing
//!
//! Testing utilities for the helpdesk crates.
//!
//! This crate provides:
//! - [`mocks::FixedClock`] and [`mocks::SettableClock`] for deterministic time
//! - In-memory implementations of every store trait in `helpdesk-core`, so services
//!   and HTTP handlers can be exercised without a database
//!
//! ## Example
//!
//! ```ignore
//! use helpdesk_testing::{test_clock, InMemoryCounterStore};
//! use helpdesk_core::ticket_number::TicketNumberConfig;
//! use std::sync::Arc;
//!
//! #[tokio::test]
//! async fn numbers_are_sequential() {
//!     let generator = TicketNumberConfig::default()
//!         .build_generator(Arc::new(test_clock()))
//!         .unwrap();
//!     let counters = InMemoryCounterStore::new();
//!     assert_eq!(generator.next(&counters).await.unwrap(), "202501011000001");
//! }
//! ```

#![allow(clippy::unwrap_used)] // Test infrastructure unwraps poisoned locks
#![allow(clippy::missing_panics_doc)]

use chrono::{DateTime, Utc};
use helpdesk_core::environment::Clock;

mod api_tokens;
mod counter;
mod dynamic_fields;
mod generic_agent;
mod groups;
mod permissions;
mod postmaster;
mod tickets;

pub use api_tokens::InMemoryApiTokenStore;
pub use counter::InMemoryCounterStore;
pub use dynamic_fields::InMemoryDynamicFieldStore;
pub use generic_agent::InMemoryGenericAgentStore;
pub use groups::InMemoryGroupStore;
pub use permissions::InMemoryPermissionStore;
pub use postmaster::InMemoryPostmasterFilterStore;
pub use tickets::InMemoryTicketStore;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use helpdesk_testing::mocks::FixedClock;
    /// use helpdesk_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock whose time can be moved by the test, shared across clones.
    ///
    /// Use it to cross midnight between ticket numbers or to expire tokens.
    #[derive(Debug, Clone)]
    pub struct SettableClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl SettableClock {
        /// Start at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Jump to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.write().unwrap() = time;
        }

        /// Move forward by `by`.
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.write().unwrap();
            *time += by;
        }
    }

    impl Clock for SettableClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, SettableClock, test_clock};

/// Timestamp written by in-memory stores.
fn store_time() -> DateTime<Utc> {
    test_clock().now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_settable_clock_shared() {
        let clock = SettableClock::new(test_clock().now());
        let other = clock.clone();
        clock.advance(chrono::Duration::hours(25));
        assert_eq!(other.now().to_rfc3339(), "2025-01-02T01:00:00+00:00");
    }
}
