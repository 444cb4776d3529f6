//! Postmaster filters: match rules over inbound mail and the annotations they set.
//!
//! A filter is stored denormalized, one `postmaster_filter` row per rule:
//!
//! | `f_name` | `f_stop` | `f_type` | `f_key` | `f_value` | `f_not` |
//! |----------|----------|----------|---------|-----------|---------|
//! | spam | 1 | Match | Subject | `^\[SPAM\]` | 0 |
//! | spam | 1 | Set | X-Helpdesk-Ignore | yes | 0 |
//!
//! Evaluation runs filters in order. A filter matches when every `Match` rule
//! matches; its `Set` rules then become [`FilterAnnotations`]. A matched filter with
//! `stop` set ends processing.

use crate::{StoreError, StoreFuture};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header key that matches against the message body instead of a header.
pub const BODY_KEY: &str = "Body";

/// Bytes of body considered by `Body` rules.
pub const MAX_BODY_MATCH_BYTES: usize = 64 * 1024;

/// `f_type` of a match row.
pub const ROW_TYPE_MATCH: &str = "Match";
/// `f_type` of a set row.
pub const ROW_TYPE_SET: &str = "Set";

/// A condition on one header (or the body).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterMatch {
    /// Header name, or `Body`.
    pub key: String,
    /// Regular expression.
    pub value: String,
    /// Negate the result.
    #[serde(default)]
    pub not: bool,
}

/// A header assignment applied when the filter matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    /// `X-Helpdesk-*` (or `X-OTRS-*`) header name.
    pub key: String,
    /// Value to set.
    pub value: String,
}

/// A named postmaster filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostmasterFilter {
    /// Unique name.
    pub name: String,
    /// Stop evaluating further filters after this one matches.
    #[serde(default)]
    pub stop: bool,
    /// Conditions, all of which must hold.
    #[serde(default)]
    pub matches: Vec<FilterMatch>,
    /// Assignments.
    #[serde(default)]
    pub sets: Vec<FilterSet>,
}

/// One `postmaster_filter` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRow {
    /// `f_name`.
    pub name: String,
    /// `f_stop`.
    pub stop: bool,
    /// `f_type`: `Match` or `Set`.
    pub row_type: String,
    /// `f_key`.
    pub key: String,
    /// `f_value`.
    pub value: String,
    /// `f_not`.
    pub not: bool,
}

impl PostmasterFilter {
    /// Check the filter before storing it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for an empty name, a match rule with an
    /// empty key or an invalid regex, or a filter without set rules.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Validation("filter name is required".into()));
        }
        for rule in &self.matches {
            if rule.key.trim().is_empty() {
                return Err(StoreError::Validation("match rule key is required".into()));
            }
            Regex::new(&rule.value).map_err(|e| {
                StoreError::Validation(format!("invalid regex for {}: {e}", rule.key))
            })?;
        }
        if self.sets.is_empty() {
            return Err(StoreError::Validation(
                "at least one set rule is required".into(),
            ));
        }
        Ok(())
    }

    /// Flatten into table rows, match rows first.
    #[must_use]
    pub fn to_rows(&self) -> Vec<FilterRow> {
        let matches = self.matches.iter().map(|m| FilterRow {
            name: self.name.clone(),
            stop: self.stop,
            row_type: ROW_TYPE_MATCH.to_string(),
            key: m.key.clone(),
            value: m.value.clone(),
            not: m.not,
        });
        let sets = self.sets.iter().map(|s| FilterRow {
            name: self.name.clone(),
            stop: self.stop,
            row_type: ROW_TYPE_SET.to_string(),
            key: s.key.clone(),
            value: s.value.clone(),
            not: false,
        });
        matches.chain(sets).collect()
    }

    /// Group table rows into filters, preserving first-seen order of names.
    ///
    /// Rows with an unknown `f_type` are ignored.
    #[must_use]
    pub fn from_rows(rows: impl IntoIterator<Item = FilterRow>) -> Vec<Self> {
        let mut filters: Vec<Self> = Vec::new();
        for row in rows {
            let idx = if let Some(idx) = filters.iter().position(|f| f.name == row.name) {
                idx
            } else {
                filters.push(Self {
                    name: row.name.clone(),
                    stop: row.stop,
                    matches: Vec::new(),
                    sets: Vec::new(),
                });
                filters.len() - 1
            };
            let filter = &mut filters[idx];
            filter.stop |= row.stop;
            match row.row_type.as_str() {
                ROW_TYPE_MATCH => filter.matches.push(FilterMatch {
                    key: row.key,
                    value: row.value,
                    not: row.not,
                }),
                ROW_TYPE_SET => filter.sets.push(FilterSet {
                    key: row.key,
                    value: row.value,
                }),
                other => tracing::warn!(filter = %row.name, row_type = other, "unknown postmaster row type"),
            }
        }
        filters
    }
}

/// Postmaster filter storage.
pub trait PostmasterFilterRepository: Send + Sync {
    /// All filters, sorted by name.
    fn list(&self) -> StoreFuture<'_, Vec<PostmasterFilter>>;

    /// One filter by name.
    fn get<'a>(&'a self, name: &'a str) -> StoreFuture<'a, PostmasterFilter>;

    /// Insert a new filter.
    fn create<'a>(&'a self, filter: &'a PostmasterFilter) -> StoreFuture<'a, ()>;

    /// Replace the filter called `name`. An empty `filter.name` keeps the old name.
    fn update<'a>(&'a self, name: &'a str, filter: &'a PostmasterFilter) -> StoreFuture<'a, ()>;

    /// Delete all rows of a filter.
    fn delete<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()>;
}

/// A parsed RFC 5322 message: unfolded headers and the raw body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    headers: Vec<(String, String)>,
    body: String,
}

impl InboundMessage {
    /// Parse a raw message. Parsing never fails; lines without a colon in the
    /// header block are skipped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut rest = raw;

        loop {
            let (line, remaining) = match rest.find('\n') {
                Some(pos) => (&rest[..pos], &rest[pos + 1..]),
                None => (rest, ""),
            };
            let line = line.strip_suffix('\r').unwrap_or(line);
            rest = remaining;

            if line.is_empty() {
                break;
            }
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.last_mut() {
                    let folded = line.trim();
                    if !folded.is_empty() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(folded);
                    }
                }
            } else if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
            if rest.is_empty() {
                break;
            }
        }

        Self {
            headers,
            body: rest.to_string(),
        }
    }

    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The message body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Value a match rule on `key` is tested against; empty when the header is absent.
    fn match_value(&self, key: &str) -> &str {
        let key = key.trim();
        if key.eq_ignore_ascii_case(BODY_KEY) {
            truncate_at_boundary(&self.body, MAX_BODY_MATCH_BYTES)
        } else {
            self.header(key).unwrap_or("")
        }
    }
}

fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Routing overrides collected from matched filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterAnnotations {
    /// Target queue by name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_name: Option<String>,
    /// Target queue by id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<i64>,
    /// Priority by name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_name: Option<String>,
    /// Priority by id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<i64>,
    /// Ticket title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Customer company id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Customer user login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_user: Option<String>,
    /// Drop the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<bool>,
    /// Ticket state name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Ticket type name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<String>,
    /// Any other set header, keyed by lowercase name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_headers: BTreeMap<String, String>,
}

impl FilterAnnotations {
    /// Apply one set rule. Blank keys or values are ignored.
    pub fn apply(&mut self, set: &FilterSet) {
        let key = set.key.trim();
        let value = set.value.trim();
        if key.is_empty() || value.is_empty() {
            return;
        }

        let lower = key.to_ascii_lowercase();
        let suffix = lower
            .strip_prefix("x-helpdesk-")
            .or_else(|| lower.strip_prefix("x-otrs-"));

        match suffix {
            Some("queue" | "queuename") => self.queue_name = Some(value.to_string()),
            Some("queueid") => {
                if let Some(id) = positive_id(value) {
                    self.queue_id = Some(id);
                }
            }
            Some("priority") => self.priority_name = Some(value.to_string()),
            Some("priorityid") => {
                if let Some(id) = positive_id(value) {
                    self.priority_id = Some(id);
                }
            }
            Some("title") => self.title = Some(value.to_string()),
            Some("customerid") => self.customer_id = Some(value.to_string()),
            Some("customeruser" | "customeruserid") => {
                self.customer_user = Some(value.to_string());
            }
            Some("ignore") => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "y" => self.ignore = Some(true),
                "0" | "false" | "no" | "n" => self.ignore = Some(false),
                _ => {}
            },
            Some("state") => self.state = Some(value.to_string()),
            Some("type") => self.ticket_type = Some(value.to_string()),
            _ => {
                self.extra_headers.insert(lower, value.to_string());
            }
        }
    }
}

fn positive_id(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().filter(|id| *id > 0)
}

/// Result of running filters over a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOutcome {
    /// Names of matched filters, in evaluation order.
    pub matched: Vec<String>,
    /// Whether a matched filter stopped processing.
    pub stopped: bool,
    /// Collected overrides.
    pub annotations: FilterAnnotations,
}

fn filter_matches(filter: &PostmasterFilter, message: &InboundMessage) -> bool {
    for rule in &filter.matches {
        let re = match Regex::new(&rule.value) {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!(filter = %filter.name, key = %rule.key, error = %e, "invalid postmaster regex");
                return false;
            }
        };
        let hit = re.is_match(message.match_value(&rule.key));
        if hit == rule.not {
            return false;
        }
    }
    true
}

/// Run `filters` in order against `message`.
#[must_use]
pub fn apply_filters(filters: &[PostmasterFilter], message: &InboundMessage) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();
    for filter in filters {
        if !filter_matches(filter, message) {
            continue;
        }
        tracing::debug!(filter = %filter.name, "postmaster filter matched");
        metrics::counter!("postmaster.filter.matched").increment(1);
        outcome.matched.push(filter.name.clone());
        for set in &filter.sets {
            outcome.annotations.apply(set);
        }
        if filter.stop {
            outcome.stopped = true;
            break;
        }
    }
    outcome
}
