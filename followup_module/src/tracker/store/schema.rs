pub(super) const TRACKER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    meeting_id TEXT,
    title TEXT NOT NULL,
    details TEXT NOT NULL DEFAULT '',
    department TEXT NOT NULL DEFAULT '',
    assigned_to TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    deadline TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    priority TEXT NOT NULL DEFAULT 'medium',
    category TEXT NOT NULL DEFAULT '',
    last_update_at TEXT,
    last_update_by TEXT,
    last_followup_at TEXT
);

CREATE TABLE IF NOT EXISTS escalations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL REFERENCES tasks(id),
    level TEXT NOT NULL,
    created_at TEXT NOT NULL,
    note TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS tracking_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_alternate_digest TEXT,
    last_weekly_summary TEXT
);

CREATE TABLE IF NOT EXISTS deadline_alerts (
    task_id INTEGER PRIMARY KEY REFERENCES tasks(id),
    sent_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS processed_replies (
    message_id TEXT PRIMARY KEY,
    processed_at TEXT NOT NULL
);
"#;
