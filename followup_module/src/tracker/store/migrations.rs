use std::collections::HashSet;

use rusqlite::Connection;

use super::super::types::TrackerError;

pub(super) fn ensure_tasks_columns(conn: &Connection) -> Result<(), TrackerError> {
    let mut stmt = conn.prepare("PRAGMA table_info(tasks)")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut columns = HashSet::new();
    for row in rows {
        columns.insert(row?);
    }

    if !columns.contains("highest_escalation") {
        conn.execute("ALTER TABLE tasks ADD COLUMN highest_escalation TEXT", [])?;
    }
    if !columns.contains("notify_assignee") {
        conn.execute(
            "ALTER TABLE tasks ADD COLUMN notify_assignee INTEGER NOT NULL DEFAULT 1",
            [],
        )?;
    }
    if !columns.contains("cc_owner") {
        conn.execute(
            "ALTER TABLE tasks ADD COLUMN cc_owner INTEGER NOT NULL DEFAULT 1",
            [],
        )?;
    }
    if !columns.contains("additional_recipients") {
        conn.execute(
            "ALTER TABLE tasks ADD COLUMN additional_recipients TEXT NOT NULL DEFAULT ''",
            [],
        )?;
    }
    Ok(())
}
