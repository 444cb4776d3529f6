//! Generic agent jobs.
//!
//! A job is a named bag of `(job_key, job_value)` rows in `generic_agent_jobs`.
//! List-valued settings appear either as OTRS array keys (`StateIDs[0]`,
//! `StateIDs[1]`, ...) or as one comma-separated value; array keys win.

use crate::{StoreError, StoreFuture};
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Row holding the job's validity (`"1"` = valid).
pub const VALID_KEY: &str = "Valid";
/// Row holding the last run time (RFC 3339).
pub const LAST_RUN_KEY: &str = "ScheduleLastRun";
/// Prefix of dynamic field assignments.
pub const DYNAMIC_FIELD_PREFIX: &str = "DynamicField_";

/// A generic agent job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericAgentJob {
    /// Unique job name.
    pub name: String,
    /// Whether the scheduler may run the job.
    pub valid: bool,
    /// Every row except `Valid`.
    pub config: BTreeMap<String, String>,
    /// Last run, when known outside `config`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}

fn int_list(config: &BTreeMap<String, String>, key: &str) -> Vec<i64> {
    let prefix = format!("{key}[");
    let mut indexed: Vec<(usize, i64)> = config
        .range(prefix.clone()..)
        .take_while(|(k, _)| k.starts_with(&prefix))
        .filter_map(|(k, v)| {
            let idx = k.strip_prefix(&prefix)?.strip_suffix(']')?.parse().ok()?;
            Some((idx, v.trim().parse().ok()?))
        })
        .collect();
    if !indexed.is_empty() {
        indexed.sort_by_key(|(idx, _)| *idx);
        return indexed.into_iter().map(|(_, v)| v).collect();
    }

    config
        .get(key)
        .map(|v| {
            v.split(',')
                .filter_map(|p| p.trim().parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

fn int_value(config: &BTreeMap<String, String>, key: &str) -> Option<i64> {
    config.get(key).and_then(|v| v.trim().parse().ok())
}

fn text_value(config: &BTreeMap<String, String>, key: &str) -> Option<String> {
    config
        .get(key)
        .filter(|v| !v.is_empty())
        .cloned()
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|t| t.and_utc())
        })
}

impl GenericAgentJob {
    /// Assemble a job from its table rows.
    ///
    /// A missing `Valid` row counts as valid.
    #[must_use]
    pub fn from_rows(name: &str, rows: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut config: BTreeMap<String, String> = rows.into_iter().collect();
        let valid = config.remove(VALID_KEY).is_none_or(|v| v.trim() == "1");
        let last_run_at = config
            .get(LAST_RUN_KEY)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|t| t.with_timezone(&Utc));
        Self {
            name: name.to_string(),
            valid,
            config,
            last_run_at,
        }
    }

    /// Weekdays to run on, 0 = Sunday.
    #[must_use]
    pub fn schedule_days(&self) -> Vec<i64> {
        int_list(&self.config, "ScheduleDays")
    }

    /// Hours to run in (0-23).
    #[must_use]
    pub fn schedule_hours(&self) -> Vec<i64> {
        int_list(&self.config, "ScheduleHours")
    }

    /// Minutes to run at (0-59).
    #[must_use]
    pub fn schedule_minutes(&self) -> Vec<i64> {
        int_list(&self.config, "ScheduleMinutes")
    }

    /// Last run time: `last_run_at` if set, else the `ScheduleLastRun` row.
    #[must_use]
    pub fn schedule_last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run_at.or_else(|| {
            self.config
                .get(LAST_RUN_KEY)
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|t| t.with_timezone(&Utc))
        })
    }

    /// Ticket selection.
    #[must_use]
    pub fn match_criteria(&self) -> MatchCriteria {
        let c = &self.config;
        MatchCriteria {
            state_ids: int_list(c, "StateIDs"),
            queue_ids: int_list(c, "QueueIDs"),
            priority_ids: int_list(c, "PriorityIDs"),
            type_ids: int_list(c, "TypeIDs"),
            lock_ids: int_list(c, "LockIDs"),
            owner_ids: int_list(c, "OwnerIDs"),
            service_ids: int_list(c, "ServiceIDs"),
            sla_ids: int_list(c, "SLAIDs"),
            customer_id: text_value(c, "CustomerID"),
            customer_user_login: text_value(c, "CustomerUserLogin"),
            title: text_value(c, "Title"),
            create_time_older_minutes: int_value(c, "TicketCreateTimeOlderMinutes").unwrap_or(0),
            create_time_newer_minutes: int_value(c, "TicketCreateTimeNewerMinutes").unwrap_or(0),
            change_time_older_minutes: int_value(c, "TicketChangeTimeOlderMinutes").unwrap_or(0),
            change_time_newer_minutes: int_value(c, "TicketChangeTimeNewerMinutes").unwrap_or(0),
            pending_time_older_minutes: int_value(c, "TicketPendingTimeOlderMinutes").unwrap_or(0),
            pending_time_newer_minutes: int_value(c, "TicketPendingTimeNewerMinutes").unwrap_or(0),
            escalation_time_older_minutes: int_value(c, "TicketEscalationTimeOlderMinutes")
                .unwrap_or(0),
            escalation_time_newer_minutes: int_value(c, "TicketEscalationTimeNewerMinutes")
                .unwrap_or(0),
        }
    }

    /// Changes applied to selected tickets.
    #[must_use]
    pub fn actions(&self) -> JobActions {
        let c = &self.config;
        let dynamic_field_values = c
            .iter()
            .filter_map(|(k, v)| {
                let name = k.strip_prefix(DYNAMIC_FIELD_PREFIX)?;
                (!name.is_empty()).then(|| (name.to_string(), v.clone()))
            })
            .collect();
        JobActions {
            new_state_id: int_value(c, "NewStateID"),
            new_queue_id: int_value(c, "NewQueueID"),
            new_priority_id: int_value(c, "NewPriorityID"),
            new_owner_id: int_value(c, "NewOwnerID"),
            new_responsible_id: int_value(c, "NewResponsibleID"),
            new_lock_id: int_value(c, "NewLockID"),
            new_type_id: int_value(c, "NewTypeID"),
            new_service_id: int_value(c, "NewServiceID"),
            new_sla_id: int_value(c, "NewSLAID"),
            new_customer_id: text_value(c, "NewCustomerID"),
            new_customer_user_login: text_value(c, "NewCustomerUserLogin"),
            new_title: text_value(c, "NewTitle"),
            note_body: text_value(c, "NewNoteBody"),
            note_subject: text_value(c, "NewNoteSubject"),
            new_pending_time: c.get("NewPendingTime").and_then(|v| parse_time(v)),
            new_pending_time_diff: int_value(c, "NewPendingTimeDiff").unwrap_or(0),
            delete: c.get("NewDelete").is_some_and(|v| v == "1"),
            dynamic_field_values,
        }
    }
}

/// Ticket selection of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchCriteria {
    /// Ticket states.
    pub state_ids: Vec<i64>,
    /// Queues.
    pub queue_ids: Vec<i64>,
    /// Priorities.
    pub priority_ids: Vec<i64>,
    /// Ticket types.
    pub type_ids: Vec<i64>,
    /// Lock states.
    pub lock_ids: Vec<i64>,
    /// Owners.
    pub owner_ids: Vec<i64>,
    /// Services.
    pub service_ids: Vec<i64>,
    /// SLAs.
    pub sla_ids: Vec<i64>,
    /// Customer company pattern.
    pub customer_id: Option<String>,
    /// Customer user login.
    pub customer_user_login: Option<String>,
    /// Title pattern.
    pub title: Option<String>,
    /// Created at least this many minutes ago.
    pub create_time_older_minutes: i64,
    /// Created at most this many minutes ago.
    pub create_time_newer_minutes: i64,
    /// Changed at least this many minutes ago.
    pub change_time_older_minutes: i64,
    /// Changed at most this many minutes ago.
    pub change_time_newer_minutes: i64,
    /// Pending time reached at least this many minutes ago.
    pub pending_time_older_minutes: i64,
    /// Pending time reached at most this many minutes ago.
    pub pending_time_newer_minutes: i64,
    /// Escalated at least this many minutes ago.
    pub escalation_time_older_minutes: i64,
    /// Escalated at most this many minutes ago.
    pub escalation_time_newer_minutes: i64,
}

impl MatchCriteria {
    /// Whether any criterion is set. A job without criteria would select every ticket.
    #[must_use]
    pub fn has_criteria(&self) -> bool {
        let lists = [
            &self.state_ids,
            &self.queue_ids,
            &self.priority_ids,
            &self.type_ids,
            &self.lock_ids,
            &self.owner_ids,
            &self.service_ids,
            &self.sla_ids,
        ];
        let minutes = [
            self.create_time_older_minutes,
            self.create_time_newer_minutes,
            self.change_time_older_minutes,
            self.change_time_newer_minutes,
            self.pending_time_older_minutes,
            self.pending_time_newer_minutes,
            self.escalation_time_older_minutes,
            self.escalation_time_newer_minutes,
        ];
        lists.iter().any(|l| !l.is_empty())
            || self.customer_id.is_some()
            || self.customer_user_login.is_some()
            || self.title.is_some()
            || minutes.iter().any(|m| *m > 0)
    }
}

/// Changes a job applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobActions {
    /// New state.
    pub new_state_id: Option<i64>,
    /// New queue.
    pub new_queue_id: Option<i64>,
    /// New priority.
    pub new_priority_id: Option<i64>,
    /// New owner.
    pub new_owner_id: Option<i64>,
    /// New responsible agent.
    pub new_responsible_id: Option<i64>,
    /// New lock state.
    pub new_lock_id: Option<i64>,
    /// New ticket type.
    pub new_type_id: Option<i64>,
    /// New service.
    pub new_service_id: Option<i64>,
    /// New SLA.
    pub new_sla_id: Option<i64>,
    /// New customer company.
    pub new_customer_id: Option<String>,
    /// New customer user.
    pub new_customer_user_login: Option<String>,
    /// New title.
    pub new_title: Option<String>,
    /// Body of a note to add.
    pub note_body: Option<String>,
    /// Subject of the note.
    pub note_subject: Option<String>,
    /// Absolute pending time.
    pub new_pending_time: Option<DateTime<Utc>>,
    /// Pending time relative to the run, in minutes.
    pub new_pending_time_diff: i64,
    /// Delete selected tickets.
    pub delete: bool,
    /// Dynamic field name (without prefix) → value.
    pub dynamic_field_values: BTreeMap<String, String>,
}

impl JobActions {
    /// Whether the job changes anything. A note subject alone does not count.
    #[must_use]
    pub fn has_actions(&self) -> bool {
        self.new_state_id.is_some()
            || self.new_queue_id.is_some()
            || self.new_priority_id.is_some()
            || self.new_owner_id.is_some()
            || self.new_responsible_id.is_some()
            || self.new_lock_id.is_some()
            || self.new_type_id.is_some()
            || self.new_service_id.is_some()
            || self.new_sla_id.is_some()
            || self.new_customer_id.is_some()
            || self.new_customer_user_login.is_some()
            || self.new_title.is_some()
            || self.note_body.is_some()
            || self.new_pending_time.is_some()
            || self.new_pending_time_diff != 0
            || self.delete
    }
}

/// Whether `job` is due at `now`.
///
/// A job runs when it is valid, its hour and minute lists are non-empty and contain
/// the current hour and minute, its day list is empty or contains the current
/// weekday, and it has not already run within the same minute.
#[must_use]
pub fn should_run(job: &GenericAgentJob, now: DateTime<Utc>) -> bool {
    if !job.valid {
        return false;
    }
    let hours = job.schedule_hours();
    let minutes = job.schedule_minutes();
    if hours.is_empty() || minutes.is_empty() {
        return false;
    }

    let days = job.schedule_days();
    let weekday = i64::from(now.weekday().num_days_from_sunday());
    if !days.is_empty() && !days.contains(&weekday) {
        return false;
    }
    if !hours.contains(&i64::from(now.hour())) || !minutes.contains(&i64::from(now.minute())) {
        return false;
    }

    if let Some(last) = job.schedule_last_run() {
        let same_minute = last.date_naive() == now.date_naive()
            && last.hour() == now.hour()
            && last.minute() == now.minute();
        if same_minute {
            return false;
        }
    }
    true
}

/// Changes for [`GenericAgentRepository::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobUpdate {
    /// Rename the job.
    #[serde(default)]
    pub new_name: Option<String>,
    /// Change validity.
    #[serde(default)]
    pub valid: Option<bool>,
    /// Keys to upsert.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

/// Reject blank job names.
///
/// # Errors
///
/// Returns [`StoreError::Validation`] for a blank name.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::Validation("job name is required".into()));
    }
    Ok(())
}

/// Generic agent job storage.
pub trait GenericAgentRepository: Send + Sync {
    /// Distinct job names, sorted.
    fn list_names(&self) -> StoreFuture<'_, Vec<String>>;

    /// One job by name.
    fn get<'a>(&'a self, name: &'a str) -> StoreFuture<'a, GenericAgentJob>;

    /// Insert a job with its `Valid` row and config rows.
    fn create<'a>(&'a self, job: &'a GenericAgentJob) -> StoreFuture<'a, ()>;

    /// Rename, revalidate and upsert keys in one transaction.
    fn update<'a>(&'a self, name: &'a str, update: &'a JobUpdate) -> StoreFuture<'a, ()>;

    /// Delete all rows of a job.
    fn delete<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()>;

    /// Upsert `ScheduleLastRun`.
    fn record_run<'a>(&'a self, name: &'a str, at: DateTime<Utc>) -> StoreFuture<'a, ()>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn job(rows: &[(&str, &str)]) -> GenericAgentJob {
        GenericAgentJob::from_rows(
            "job",
            rows.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())),
        )
    }

    // Wednesday
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_from_rows_validity() {
        assert!(job(&[]).valid);
        assert!(job(&[("Valid", "1")]).valid);
        assert!(!job(&[("Valid", "0")]).valid);
        assert!(!job(&[("Valid", "1")]).config.contains_key("Valid"));
    }

    #[test]
    fn test_int_list_array_form_wins() {
        let j = job(&[
            ("StateIDs", "9,9"),
            ("StateIDs[1]", "4"),
            ("StateIDs[0]", "2"),
            ("StateIDs[10]", "7"),
        ]);
        assert_eq!(j.match_criteria().state_ids, vec![2, 4, 7]);
    }

    #[test]
    fn test_int_list_comma_form() {
        let j = job(&[("ScheduleHours", "1, 2,x,3")]);
        assert_eq!(j.schedule_hours(), vec![1, 2, 3]);
        assert!(j.schedule_minutes().is_empty());
    }

    #[test]
    fn test_should_run_matching_schedule() {
        let j = job(&[
            ("ScheduleDays", "3"),
            ("ScheduleHours", "10"),
            ("ScheduleMinutes", "30"),
        ]);
        assert!(should_run(&j, now()));
    }

    #[test]
    fn test_should_run_same_minute_already_ran() {
        let mut j = job(&[
            ("ScheduleDays", "3"),
            ("ScheduleHours", "10"),
            ("ScheduleMinutes", "30"),
        ]);
        j.last_run_at = Some(now());
        assert!(!should_run(&j, now()));

        j.last_run_at = Some(now() - chrono::Duration::minutes(1));
        assert!(should_run(&j, now()));
    }

    #[test]
    fn test_should_run_last_run_row() {
        let j = job(&[
            ("ScheduleHours", "10"),
            ("ScheduleMinutes", "30"),
            ("ScheduleLastRun", "2025-01-15T10:30:20Z"),
        ]);
        assert!(!should_run(&j, now()));
    }

    #[test]
    fn test_should_run_rejections() {
        let base = [
            ("ScheduleHours", "10"),
            ("ScheduleMinutes", "30"),
        ];
        assert!(should_run(&job(&base), now()), "empty days means any day");

        let mut invalid = job(&base);
        invalid.valid = false;
        assert!(!should_run(&invalid, now()));

        assert!(!should_run(&job(&[("ScheduleHours", "10")]), now()));
        assert!(!should_run(
            &job(&[("ScheduleDays", "1"), ("ScheduleHours", "10"), ("ScheduleMinutes", "30")]),
            now()
        ));
        assert!(!should_run(
            &job(&[("ScheduleHours", "11"), ("ScheduleMinutes", "30")]),
            now()
        ));
    }

    #[test]
    fn test_criteria_and_actions() {
        let j = job(&[
            ("QueueIDs[0]", "3"),
            ("Title", ""),
            ("TicketCreateTimeOlderMinutes", "60"),
            ("NewStateID", "2"),
            ("NewPendingTime", "2025-02-01 08:00:00"),
            ("NewDelete", "0"),
            ("DynamicField_Severity", "high"),
            ("DynamicField_", "ignored"),
        ]);
        let criteria = j.match_criteria();
        assert_eq!(criteria.queue_ids, vec![3]);
        assert_eq!(criteria.title, None);
        assert_eq!(criteria.create_time_older_minutes, 60);
        assert!(criteria.has_criteria());

        let actions = j.actions();
        assert_eq!(actions.new_state_id, Some(2));
        assert_eq!(
            actions.new_pending_time,
            Some(Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap())
        );
        assert!(!actions.delete);
        assert_eq!(actions.dynamic_field_values.len(), 1);
        assert_eq!(actions.dynamic_field_values["Severity"], "high");
        assert!(actions.has_actions());
    }

    #[test]
    fn test_empty_job_has_nothing() {
        let j = job(&[("NewNoteSubject", "only a subject")]);
        assert!(!j.match_criteria().has_criteria());
        assert!(!j.actions().has_actions());
    }

    #[test]
    fn test_pending_time_rfc3339() {
        let j = job(&[("NewPendingTime", "2025-02-01T08:00:00+01:00"), ("NewDelete", "1")]);
        let actions = j.actions();
        assert_eq!(
            actions.new_pending_time,
            Some(Utc.with_ymd_and_hms(2025, 2, 1, 7, 0, 0).unwrap())
        );
        assert!(actions.delete);
    }
}
