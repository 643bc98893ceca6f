use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use super::types::{
    EscalationLevel, EscalationRecord, NewTask, RecipientSettings, Task, TaskPriority, TaskStatus,
    TrackerError, TrackingState,
};
use super::utils::{
    bool_to_int, format_date, format_datetime, join_recipients, parse_datetime,
    parse_optional_date, parse_optional_datetime, split_recipients,
};

mod migrations;
mod schema;

use migrations::ensure_tasks_columns;
use schema::TRACKER_SCHEMA;

/// Narrow persistence interface the engines run against. The backing storage
/// is the caller's choice; this crate ships the sqlite implementation below.
pub trait TaskStore {
    fn list_tasks(&self) -> Result<Vec<Task>, TrackerError>;
    fn get_task(&self, id: i64) -> Result<Option<Task>, TrackerError>;
    fn insert_task(&self, task: &NewTask) -> Result<i64, TrackerError>;
    /// Apply a status transition plus audit fields in one transaction.
    /// Returns false when the task does not exist.
    fn update_status(
        &self,
        id: i64,
        status: TaskStatus,
        updated_by: &str,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, TrackerError>;
    fn record_followup(&self, id: i64, date: NaiveDate) -> Result<bool, TrackerError>;
    /// Append the audit row and advance the task's highest escalation level
    /// atomically.
    fn record_escalation(&self, record: &EscalationRecord) -> Result<(), TrackerError>;
    fn escalations_for(&self, task_id: i64) -> Result<Vec<EscalationRecord>, TrackerError>;
    fn load_tracking_state(&self) -> Result<TrackingState, TrackerError>;
    fn save_tracking_state(&self, state: &TrackingState) -> Result<(), TrackerError>;
    fn deadline_alert_sent(&self, task_id: i64) -> Result<bool, TrackerError>;
    fn mark_deadline_alert_sent(&self, task_id: i64) -> Result<(), TrackerError>;
    fn reply_processed(&self, message_id: &str) -> Result<bool, TrackerError>;
    fn mark_reply_processed(&self, message_id: &str) -> Result<(), TrackerError>;
}

#[derive(Debug)]
pub struct SqliteTaskStore {
    path: PathBuf,
}

const TASK_COLUMNS: &str = "id, meeting_id, title, details, department, assigned_to, created_by, \
     created_at, deadline, status, priority, category, last_update_at, last_update_by, \
     last_followup_at, highest_escalation, notify_assignee, cc_owner, additional_recipients";

/// Raw column values for one task row, parsed into a [`Task`] after the
/// statement is done so datetime errors surface as [`TrackerError`].
struct TaskRow {
    id: i64,
    meeting_id: Option<String>,
    title: String,
    details: String,
    department: String,
    assigned_to: String,
    created_by: String,
    created_at: String,
    deadline: Option<String>,
    status: String,
    priority: String,
    category: String,
    last_update_at: Option<String>,
    last_update_by: Option<String>,
    last_followup_at: Option<String>,
    highest_escalation: Option<String>,
    notify_assignee: i64,
    cc_owner: i64,
    additional_recipients: String,
}

impl TaskRow {
    fn read(row: &rusqlite::Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            meeting_id: row.get(1)?,
            title: row.get(2)?,
            details: row.get(3)?,
            department: row.get(4)?,
            assigned_to: row.get(5)?,
            created_by: row.get(6)?,
            created_at: row.get(7)?,
            deadline: row.get(8)?,
            status: row.get(9)?,
            priority: row.get(10)?,
            category: row.get(11)?,
            last_update_at: row.get(12)?,
            last_update_by: row.get(13)?,
            last_followup_at: row.get(14)?,
            highest_escalation: row.get(15)?,
            notify_assignee: row.get(16)?,
            cc_owner: row.get(17)?,
            additional_recipients: row.get(18)?,
        })
    }

    fn into_task(self) -> Result<Task, TrackerError> {
        Ok(Task {
            id: self.id,
            meeting_id: self.meeting_id,
            title: self.title,
            details: self.details,
            department: self.department,
            assigned_to: self.assigned_to,
            created_by: self.created_by,
            created_at: parse_datetime(&self.created_at)?,
            deadline: self.deadline,
            status: TaskStatus::parse(&self.status).unwrap_or_default(),
            priority: TaskPriority::parse(&self.priority),
            category: self.category,
            last_update_at: parse_optional_datetime(self.last_update_at.as_deref())?,
            last_update_by: self.last_update_by,
            last_followup_at: parse_optional_date(self.last_followup_at.as_deref())?,
            highest_escalation: self
                .highest_escalation
                .as_deref()
                .and_then(EscalationLevel::parse),
            recipients: RecipientSettings {
                notify_assignee: self.notify_assignee != 0,
                cc_owner: self.cc_owner != 0,
                additional: split_recipients(&self.additional_recipients),
            },
        })
    }
}

impl SqliteTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, TrackerError> {
        let store = Self { path: path.into() };
        let _ = store.open()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection, TrackerError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(TRACKER_SCHEMA)?;
        ensure_tasks_columns(&conn)?;
        Ok(conn)
    }

    /// Run a write, retrying once when another writer holds the database.
    fn with_write_retry<T>(
        &self,
        op: impl Fn(&mut Connection) -> Result<T, TrackerError>,
    ) -> Result<T, TrackerError> {
        let mut conn = self.open()?;
        match op(&mut conn) {
            Err(err) if is_busy(&err) => {
                warn!("store busy, retrying write once: {}", err);
                op(&mut conn)
            }
            other => other,
        }
    }
}

fn is_busy(err: &TrackerError) -> bool {
    matches!(
        err,
        TrackerError::Sqlite(rusqlite::Error::SqliteFailure(code, _))
            if matches!(code.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

impl TaskStore for SqliteTaskStore {
    fn list_tasks(&self) -> Result<Vec<Task>, TrackerError> {
        let conn = self.open()?;
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], TaskRow::read)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }
        Ok(tasks)
    }

    fn get_task(&self, id: i64) -> Result<Option<Task>, TrackerError> {
        let conn = self.open()?;
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        let row = conn.query_row(&sql, params![id], TaskRow::read).optional()?;
        row.map(TaskRow::into_task).transpose()
    }

    fn insert_task(&self, task: &NewTask) -> Result<i64, TrackerError> {
        self.with_write_retry(|conn| {
            conn.execute(
                "INSERT INTO tasks (meeting_id, title, details, department, assigned_to, \
                 created_by, created_at, deadline, status, priority, category, \
                 notify_assignee, cc_owner, additional_recipients)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    task.meeting_id.as_deref(),
                    task.title,
                    task.details,
                    task.department,
                    task.assigned_to,
                    task.created_by,
                    format_datetime(task.created_at),
                    task.deadline.as_deref(),
                    task.status.as_str(),
                    task.priority.as_str(),
                    task.category,
                    bool_to_int(task.recipients.notify_assignee),
                    bool_to_int(task.recipients.cc_owner),
                    join_recipients(&task.recipients.additional),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn update_status(
        &self,
        id: i64,
        status: TaskStatus,
        updated_by: &str,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, TrackerError> {
        self.with_write_retry(|conn| {
            let tx = conn.transaction()?;
            let details: Option<String> = tx
                .query_row(
                    "SELECT details FROM tasks WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(details) = details else {
                return Ok(false);
            };
            let details = match note {
                Some(note) if !note.trim().is_empty() => {
                    if details.trim().is_empty() {
                        note.trim().to_string()
                    } else {
                        format!("{}\n{}", details.trim_end(), note.trim())
                    }
                }
                _ => details,
            };
            tx.execute(
                "UPDATE tasks
                 SET status = ?1, details = ?2, last_update_at = ?3, last_update_by = ?4
                 WHERE id = ?5",
                params![
                    status.as_str(),
                    details,
                    format_datetime(now),
                    updated_by,
                    id
                ],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    fn record_followup(&self, id: i64, date: NaiveDate) -> Result<bool, TrackerError> {
        self.with_write_retry(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET last_followup_at = ?1 WHERE id = ?2",
                params![format_date(date), id],
            )?;
            Ok(changed > 0)
        })
    }

    fn record_escalation(&self, record: &EscalationRecord) -> Result<(), TrackerError> {
        self.with_write_retry(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO escalations (task_id, level, created_at, note)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.task_id,
                    record.level.label(),
                    format_datetime(record.created_at),
                    record.note
                ],
            )?;
            tx.execute(
                "UPDATE tasks SET highest_escalation = ?1 WHERE id = ?2",
                params![record.level.label(), record.task_id],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn escalations_for(&self, task_id: i64) -> Result<Vec<EscalationRecord>, TrackerError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT task_id, level, created_at, note FROM escalations
             WHERE task_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![task_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut records = Vec::new();
        for row in rows {
            let (task_id, level_raw, created_at_raw, note) = row?;
            let level = EscalationLevel::parse(&level_raw).ok_or_else(|| {
                TrackerError::Storage(format!("unknown escalation level {level_raw}"))
            })?;
            records.push(EscalationRecord {
                task_id,
                level,
                created_at: parse_datetime(&created_at_raw)?,
                note,
            });
        }
        Ok(records)
    }

    fn load_tracking_state(&self) -> Result<TrackingState, TrackerError> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                "SELECT last_alternate_digest, last_weekly_summary FROM tracking_state WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((alternate_raw, weekly_raw)) => Ok(TrackingState {
                last_alternate_digest: parse_optional_datetime(alternate_raw.as_deref())?,
                last_weekly_summary: parse_optional_datetime(weekly_raw.as_deref())?,
            }),
            None => Ok(TrackingState::default()),
        }
    }

    fn save_tracking_state(&self, state: &TrackingState) -> Result<(), TrackerError> {
        self.with_write_retry(|conn| {
            conn.execute(
                "INSERT INTO tracking_state (id, last_alternate_digest, last_weekly_summary)
                 VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET
                     last_alternate_digest = excluded.last_alternate_digest,
                     last_weekly_summary = excluded.last_weekly_summary",
                params![
                    state.last_alternate_digest.map(format_datetime),
                    state.last_weekly_summary.map(format_datetime),
                ],
            )?;
            Ok(())
        })
    }

    fn deadline_alert_sent(&self, task_id: i64) -> Result<bool, TrackerError> {
        let conn = self.open()?;
        let row: Option<i64> = conn
            .query_row(
                "SELECT task_id FROM deadline_alerts WHERE task_id = ?1",
                params![task_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    }

    fn mark_deadline_alert_sent(&self, task_id: i64) -> Result<(), TrackerError> {
        self.with_write_retry(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO deadline_alerts (task_id, sent_at) VALUES (?1, ?2)",
                params![task_id, format_datetime(Utc::now())],
            )?;
            Ok(())
        })
    }

    fn reply_processed(&self, message_id: &str) -> Result<bool, TrackerError> {
        let conn = self.open()?;
        let row: Option<String> = conn
            .query_row(
                "SELECT message_id FROM processed_replies WHERE message_id = ?1",
                params![message_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    }

    fn mark_reply_processed(&self, message_id: &str) -> Result<(), TrackerError> {
        self.with_write_retry(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO processed_replies (message_id, processed_at)
                 VALUES (?1, ?2)",
                params![message_id, format_datetime(Utc::now())],
            )?;
            Ok(())
        })
    }
}
