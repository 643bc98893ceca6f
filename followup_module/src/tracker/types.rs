use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::utils::parse_deadline;

/// Lifecycle states a task moves through. The canonical wire labels use
/// dashes (`in-progress`, `on-hold`); parsing accepts spaces and underscores
/// as well so values pasted from the dashboard or typed in replies round-trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Delayed,
    OnHold,
    Blocked,
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace([' ', '_'], "-");
        match normalized.as_str() {
            "pending" => Some(Self::Pending),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "delayed" => Some(Self::Delayed),
            "on-hold" => Some(Self::OnHold),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Delayed => "delayed",
            Self::OnHold => "on-hold",
            Self::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority. Unknown or missing input parses as `Medium`, which is also
/// the cadence used for unrecognized values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            "urgent" => Self::Urgent,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escalation tiers, ordered. A task only ever escalates upward; the highest
/// tier already notified is persisted on the task so re-running the engine
/// within the same window stays silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EscalationLevel {
    L1,
    L2,
    Boss,
}

impl EscalationLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "escalated_L1" => Some(Self::L1),
            "escalated_L2" => Some(Self::L2),
            "escalated_boss" => Some(Self::Boss),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::L1 => "escalated_L1",
            Self::L2 => "escalated_L2",
            Self::Boss => "escalated_boss",
        }
    }
}

impl std::fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Append-only audit row written each time an escalation notification fires.
#[derive(Debug, Clone)]
pub struct EscalationRecord {
    pub task_id: i64,
    pub level: EscalationLevel,
    pub created_at: DateTime<Utc>,
    pub note: String,
}

/// Per-task recipient configuration for digests and alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientSettings {
    pub notify_assignee: bool,
    pub cc_owner: bool,
    pub additional: Vec<String>,
}

impl Default for RecipientSettings {
    fn default() -> Self {
        Self {
            notify_assignee: true,
            cc_owner: true,
            additional: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: i64,
    pub meeting_id: Option<String>,
    pub title: String,
    pub details: String,
    pub department: String,
    pub assigned_to: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    /// Raw deadline text as entered. Parsed lazily via [`Task::deadline_date`]
    /// so an unparseable value degrades to "no deadline" instead of failing
    /// the batch.
    pub deadline: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub category: String,
    pub last_update_at: Option<DateTime<Utc>>,
    pub last_update_by: Option<String>,
    pub last_followup_at: Option<NaiveDate>,
    pub highest_escalation: Option<EscalationLevel>,
    pub recipients: RecipientSettings,
}

impl Task {
    pub fn deadline_date(&self) -> Option<NaiveDate> {
        self.deadline.as_deref().and_then(parse_deadline)
    }
}

/// Fields supplied at task creation; the store assigns the id and the audit
/// columns start empty.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub meeting_id: Option<String>,
    pub title: String,
    pub details: String,
    pub department: String,
    pub assigned_to: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub deadline: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub category: String,
    pub recipients: RecipientSettings,
}

impl NewTask {
    pub fn new(
        title: &str,
        assigned_to: &str,
        created_by: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            meeting_id: None,
            title: title.to_string(),
            details: String::new(),
            department: String::new(),
            assigned_to: assigned_to.to_string(),
            created_by: created_by.to_string(),
            created_at,
            deadline: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            category: String::new(),
            recipients: RecipientSettings::default(),
        }
    }
}

/// When each periodic digest last went out. A single persisted row, read and
/// written once per scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackingState {
    pub last_alternate_digest: Option<DateTime<Utc>>,
    pub last_weekly_summary: Option<DateTime<Utc>>,
}

/// Outcome counters returned by every job entry point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl JobSummary {
    pub fn merge(&mut self, other: JobSummary) {
        self.processed += other.processed;
        self.sent += other.sent;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

impl std::fmt::Display for JobSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "processed={} sent={} failed={} skipped={}",
            self.processed, self.sent, self.failed, self.skipped
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("datetime parse error: {0}")]
    DateTimeParse(#[from] chrono::ParseError),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Thresholds and addresses for every engine, constructed once at startup and
/// passed into the tracker. Defaults mirror the shipped configuration; the
/// service layer overrides them from the environment.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Fallback recipient when an identity cannot be resolved, and the CC
    /// target for reminder copies.
    pub owner_email: String,
    pub followup_high_days: i64,
    pub followup_medium_days: i64,
    pub followup_low_days: i64,
    pub l1_after_days: i64,
    pub l2_after_days: i64,
    pub boss_after_days: i64,
    /// Department whose first listed contact receives L2 escalations.
    pub ea_department: String,
    /// Task category that routes to the boss tier when overdue long enough.
    pub boss_category: String,
    pub boss_email: String,
    pub digest_interval_days: i64,
    pub weekly_summary_weekday: Weekday,
    pub deadline_alert_lead_days: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            owner_email: String::new(),
            followup_high_days: 2,
            followup_medium_days: 3,
            followup_low_days: 5,
            l1_after_days: 3,
            l2_after_days: 5,
            boss_after_days: 7,
            ea_department: "EA-Director's Office".to_string(),
            boss_category: "Boss Meeting".to_string(),
            boss_email: String::new(),
            digest_interval_days: 2,
            weekly_summary_weekday: Weekday::Mon,
            deadline_alert_lead_days: 4,
        }
    }
}

impl TrackerConfig {
    /// Days between reminders for a given priority. Urgent shares the high
    /// cadence; unrecognized input was already normalized to `Medium` at
    /// parse time.
    pub fn cadence_days(&self, priority: TaskPriority) -> i64 {
        match priority {
            TaskPriority::High | TaskPriority::Urgent => self.followup_high_days,
            TaskPriority::Medium => self.followup_medium_days,
            TaskPriority::Low => self.followup_low_days,
        }
    }
}
