//! Ticket number generation with date-scoped counters.
//!
//! A [`TicketNumberGenerator`] turns the next value of a persistent counter into a
//! formatted ticket number. Counters live in a [`CounterStore`], keyed by a
//! [`CounterScope`]: either one global sequence or one sequence per calendar day.
//!
//! # Strategies
//!
//! | Generator       | Scope  | Format                                          |
//! |-----------------|--------|-------------------------------------------------|
//! | `AutoIncrement` | global | `prefix + system_id + counter`                  |
//! | `Date`          | day    | `YYYYMMDD + system_id + counter`                |
//! | `DateChecksum`  | day    | `YYYYMMDD + system_id + counter + check digit`  |
//! | `Random`        | none   | `YYYYMMDD + system_id + 10 random digits`       |
//!
//! The counter is zero-padded to `min_counter_size` digits and grows past it
//! when the sequence outruns the padding.

use crate::environment::Clock;
use crate::StoreFuture;
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Counter key used by the global (non date-scoped) sequence.
pub const GLOBAL_COUNTER_UID: &str = "auto_increment";

/// Number of random digits appended by the `Random` generator.
const RANDOM_DIGITS: usize = 10;

/// Errors from ticket number generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketNumberError {
    /// The counter store failed to read or update a counter.
    #[error("Counter update failed: {0}")]
    Counter(String),

    /// The generator configuration is unusable.
    #[error("Invalid generator configuration: {0}")]
    InvalidConfiguration(String),

    /// No generator has been configured.
    #[error("Ticket number generator not configured")]
    NotConfigured,
}

/// Which counter a generator draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterScope {
    /// One sequence for the lifetime of the system.
    Global,
    /// One sequence per calendar day (UTC).
    Day(NaiveDate),
}

impl CounterScope {
    /// Row key in the `ticket_number_counter` table.
    #[must_use]
    pub fn counter_uid(&self) -> String {
        match self {
            Self::Global => GLOBAL_COUNTER_UID.to_string(),
            Self::Day(date) => date.format("%Y%m%d").to_string(),
        }
    }
}

impl fmt::Display for CounterScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.counter_uid())
    }
}

/// Persistent counters backing ticket numbers.
///
/// Implementations must make [`CounterStore::add`] atomic: two concurrent calls on
/// the same scope never return the same value.
pub trait CounterStore: Send + Sync {
    /// Add `offset` to the scope's counter and return the new value.
    ///
    /// A counter that does not exist yet starts at 0.
    fn add(&self, scope: CounterScope, offset: i64) -> StoreFuture<'_, i64, TicketNumberError>;

    /// Set the scope's counter to `value`, creating it if needed.
    fn reset(&self, scope: CounterScope, value: i64) -> StoreFuture<'_, (), TicketNumberError>;
}

/// A ticket numbering strategy.
pub trait TicketNumberGenerator: Send + Sync {
    /// Strategy name as configured (`Date`, `AutoIncrement`, ...).
    fn name(&self) -> &'static str;

    /// Whether numbers start with the creation date.
    fn is_date_based(&self) -> bool;

    /// Produce the next ticket number.
    fn next<'a>(&'a self, store: &'a dyn CounterStore) -> StoreFuture<'a, String, TicketNumberError>;

    /// Reset the counter this strategy draws from.
    fn reset<'a>(&'a self, store: &'a dyn CounterStore) -> StoreFuture<'a, (), TicketNumberError>;
}

/// Configured strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeneratorKind {
    /// Sequential numbers, never reset.
    AutoIncrement,
    /// Date prefix plus a per-day counter.
    #[default]
    Date,
    /// Like `Date`, with a trailing check digit.
    DateChecksum,
    /// Date prefix plus random digits.
    Random,
}

impl GeneratorKind {
    /// Configuration name of the strategy.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AutoIncrement => "AutoIncrement",
            Self::Date => "Date",
            Self::DateChecksum => "DateChecksum",
            Self::Random => "Random",
        }
    }
}

impl FromStr for GeneratorKind {
    type Err = TicketNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept the OTRS module path as well as the bare name.
        let name = s.trim().rsplit("::").next().unwrap_or_default();
        match name.to_ascii_lowercase().as_str() {
            "autoincrement" | "auto_increment" => Ok(Self::AutoIncrement),
            "date" => Ok(Self::Date),
            "datechecksum" | "date_checksum" => Ok(Self::DateChecksum),
            "random" => Ok(Self::Random),
            other => Err(TicketNumberError::InvalidConfiguration(format!(
                "unknown generator: {other}"
            ))),
        }
    }
}

/// Ticket number settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketNumberConfig {
    /// Strategy to use.
    pub generator: GeneratorKind,
    /// Installation identifier embedded in every number (digits only).
    pub system_id: String,
    /// Minimum number of counter digits (zero padded).
    pub min_counter_size: usize,
    /// Leading text for `AutoIncrement` numbers.
    pub prefix: String,
    /// First number handed out by `AutoIncrement`.
    pub start_from: i64,
}

impl Default for TicketNumberConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorKind::Date,
            system_id: "10".to_string(),
            min_counter_size: 5,
            prefix: String::new(),
            start_from: 1,
        }
    }
}

impl TicketNumberConfig {
    /// Check the settings without building a generator.
    ///
    /// # Errors
    ///
    /// Returns [`TicketNumberError::InvalidConfiguration`] for a non-numeric system id,
    /// a zero or oversized counter width, or a start value below 1.
    pub fn validate(&self) -> Result<(), TicketNumberError> {
        if self.system_id.len() > 10 || !self.system_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(TicketNumberError::InvalidConfiguration(format!(
                "system id must be up to 10 digits, got {:?}",
                self.system_id
            )));
        }
        if self.min_counter_size == 0 || self.min_counter_size > 18 {
            return Err(TicketNumberError::InvalidConfiguration(
                "min counter size must be between 1 and 18".to_string(),
            ));
        }
        if self.start_from < 1 {
            return Err(TicketNumberError::InvalidConfiguration(
                "start value must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the configured generator.
    ///
    /// # Errors
    ///
    /// Returns [`TicketNumberError::InvalidConfiguration`] if [`Self::validate`] fails.
    pub fn build_generator(
        &self,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<dyn TicketNumberGenerator>, TicketNumberError> {
        self.validate()?;
        let generator: Arc<dyn TicketNumberGenerator> = match self.generator {
            GeneratorKind::AutoIncrement => Arc::new(AutoIncrementGenerator {
                prefix: self.prefix.clone(),
                system_id: self.system_id.clone(),
                min_counter_size: self.min_counter_size,
                start_from: self.start_from,
            }),
            GeneratorKind::Date => Arc::new(DateGenerator {
                clock,
                system_id: self.system_id.clone(),
                min_counter_size: self.min_counter_size,
                checksum: false,
            }),
            GeneratorKind::DateChecksum => Arc::new(DateGenerator {
                clock,
                system_id: self.system_id.clone(),
                min_counter_size: self.min_counter_size,
                checksum: true,
            }),
            GeneratorKind::Random => Arc::new(RandomGenerator {
                clock,
                system_id: self.system_id.clone(),
            }),
        };
        Ok(generator)
    }
}

/// Sequential numbers: `prefix + system_id + counter`.
#[derive(Debug, Clone)]
pub struct AutoIncrementGenerator {
    prefix: String,
    system_id: String,
    min_counter_size: usize,
    start_from: i64,
}

impl TicketNumberGenerator for AutoIncrementGenerator {
    fn name(&self) -> &'static str {
        GeneratorKind::AutoIncrement.as_str()
    }

    fn is_date_based(&self) -> bool {
        false
    }

    fn next<'a>(&'a self, store: &'a dyn CounterStore) -> StoreFuture<'a, String, TicketNumberError> {
        Box::pin(async move {
            let counter = store.add(CounterScope::Global, 1).await?;
            // The stored counter is a plain 1-based sequence; start_from shifts it.
            let value = counter + self.start_from - 1;
            let tn = format!(
                "{}{}{}",
                self.prefix,
                self.system_id,
                pad_counter(value, self.min_counter_size)
            );
            record_generated(self.name(), &tn);
            Ok(tn)
        })
    }

    fn reset<'a>(&'a self, store: &'a dyn CounterStore) -> StoreFuture<'a, (), TicketNumberError> {
        Box::pin(async move { store.reset(CounterScope::Global, 0).await })
    }
}

/// Date-prefixed numbers with a per-day counter, optionally check-digited.
#[derive(Clone)]
pub struct DateGenerator {
    clock: Arc<dyn Clock>,
    system_id: String,
    min_counter_size: usize,
    checksum: bool,
}

impl fmt::Debug for DateGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DateGenerator")
            .field("system_id", &self.system_id)
            .field("min_counter_size", &self.min_counter_size)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

impl TicketNumberGenerator for DateGenerator {
    fn name(&self) -> &'static str {
        if self.checksum {
            GeneratorKind::DateChecksum.as_str()
        } else {
            GeneratorKind::Date.as_str()
        }
    }

    fn is_date_based(&self) -> bool {
        true
    }

    fn next<'a>(&'a self, store: &'a dyn CounterStore) -> StoreFuture<'a, String, TicketNumberError> {
        Box::pin(async move {
            // Read the clock once so the printed date and the counter scope agree.
            let today = self.clock.now().date_naive();
            let counter = store.add(CounterScope::Day(today), 1).await?;
            let mut tn = format!(
                "{}{}{}",
                today.format("%Y%m%d"),
                self.system_id,
                pad_counter(counter, self.min_counter_size)
            );
            if self.checksum {
                let digit = checksum_digit(&tn);
                tn.push(char::from(b'0' + digit));
            }
            record_generated(self.name(), &tn);
            Ok(tn)
        })
    }

    fn reset<'a>(&'a self, store: &'a dyn CounterStore) -> StoreFuture<'a, (), TicketNumberError> {
        Box::pin(async move {
            let today = self.clock.now().date_naive();
            store.reset(CounterScope::Day(today), 0).await
        })
    }
}

/// Date-prefixed numbers with random digits; never touches the counter store.
#[derive(Clone)]
pub struct RandomGenerator {
    clock: Arc<dyn Clock>,
    system_id: String,
}

impl fmt::Debug for RandomGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomGenerator")
            .field("system_id", &self.system_id)
            .finish_non_exhaustive()
    }
}

impl TicketNumberGenerator for RandomGenerator {
    fn name(&self) -> &'static str {
        GeneratorKind::Random.as_str()
    }

    fn is_date_based(&self) -> bool {
        true
    }

    fn next<'a>(&'a self, _store: &'a dyn CounterStore) -> StoreFuture<'a, String, TicketNumberError> {
        let today = self.clock.now().date_naive();
        let mut rng = rand::thread_rng();
        let digits: String = (0..RANDOM_DIGITS)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        let tn = format!("{}{}{digits}", today.format("%Y%m%d"), self.system_id);
        record_generated(self.name(), &tn);
        Box::pin(async move { Ok(tn) })
    }

    fn reset<'a>(&'a self, _store: &'a dyn CounterStore) -> StoreFuture<'a, (), TicketNumberError> {
        Box::pin(async { Ok(()) })
    }
}

/// Name and date-based flag of a generator, as reported by the debug endpoint.
#[must_use]
pub fn generator_info(generator: &dyn TicketNumberGenerator) -> (&'static str, bool) {
    (generator.name(), generator.is_date_based())
}

/// OTRS `DateChecksum` check digit.
///
/// Digits are weighted 1, 2, 1, 2, ... from the left; the check digit is
/// `10 - sum % 10`, with 10 folded to 1. Non-digit characters are ignored.
#[must_use]
pub fn checksum_digit(number: &str) -> u8 {
    let sum: u32 = number
        .chars()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d } else { d * 2 })
        .sum();
    // sum % 10 < 10, so the subtraction is in 1..=10
    #[allow(clippy::cast_possible_truncation)]
    let check = (10 - sum % 10) as u8;
    if check == 10 { 1 } else { check }
}

fn pad_counter(value: i64, width: usize) -> String {
    format!("{value:0width$}")
}

fn record_generated(generator: &'static str, tn: &str) {
    tracing::debug!(generator, tn, "Ticket number generated");
    metrics::counter!("ticket_number.generated", "generator" => generator).increment(1);
}
