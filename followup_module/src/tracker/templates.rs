use chrono::NaiveDate;

use super::digest::WeeklyStats;
use super::types::{EscalationLevel, Task, TaskStatus};

const SIGNATURE: &str = "Regards,\nMomTrack Automation";

fn deadline_text(task: &Task) -> String {
    task.deadline
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("not set")
        .to_string()
}

pub(super) fn followup_reminder(task: &Task) -> (String, String) {
    let subject = format!("[Task-#{}] Follow-Up: {}", task.id, task.title);
    let body = format!(
        "Hello,\n\n\
         This is a reminder for your pending task:\n\n\
         Task: {}\n\
         Department: {}\n\
         Deadline: {}\n\
         Priority: {}\n\n\
         Please reply with a short status update.\n\n\
         {}",
        task.title,
        task.department,
        deadline_text(task),
        task.priority,
        SIGNATURE
    );
    (subject, body)
}

pub(super) fn escalation_notice(
    task: &Task,
    level: EscalationLevel,
    days_overdue: i64,
) -> (String, String) {
    let subject = format!(
        "[Task-#{}] Escalation: {} ({} days overdue)",
        task.id, task.title, days_overdue
    );
    let tier = match level {
        EscalationLevel::L1 => "as the responsible manager",
        EscalationLevel::L2 => "as the owner's office contact",
        EscalationLevel::Boss => "at the top escalation tier",
    };
    let body = format!(
        "Hello,\n\n\
         The following task is {} days past its deadline and is being raised to you {}:\n\n\
         Task: {}\n\
         Assigned to: {}\n\
         Department: {}\n\
         Deadline: {}\n\
         Priority: {}\n\n\
         Please follow up with the assignee.\n\n\
         {}",
        days_overdue,
        tier,
        task.title,
        task.assigned_to,
        task.department,
        deadline_text(task),
        task.priority,
        SIGNATURE
    );
    (subject, body)
}

fn digest_line(task: &Task, today: NaiveDate) -> String {
    let mut line = format!(
        "#{}: {}\n  Priority: {}\n  Deadline: {}",
        task.id,
        task.title,
        task.priority,
        deadline_text(task)
    );
    if let Some(deadline) = task.deadline_date() {
        line.push_str(&format!(" ({} days left)", (deadline - today).num_days()));
    }
    line.push_str(&format!(
        "\n  Responsible: {}\n  Status: {}\n",
        task.assigned_to, task.status
    ));
    line
}

pub(super) fn alternate_digest(tasks: &[&Task], today: NaiveDate) -> (String, String) {
    let subject = format!("Priority Items Digest - {}", today.format("%B %d, %Y"));
    let mut body = format!(
        "PRIORITY ITEMS DIGEST - {}\n{}\n\nTotal priority items: {}\n\n",
        today.format("%B %d, %Y"),
        "=".repeat(50),
        tasks.len()
    );
    for task in tasks {
        body.push_str(&digest_line(task, today));
        body.push('\n');
    }
    body.push_str(SIGNATURE);
    (subject, body)
}

pub(super) fn weekly_summary(
    pending: &[&Task],
    stats: WeeklyStats,
    today: NaiveDate,
) -> (String, String) {
    let subject = format!("Weekly Summary - {} Pending Items", stats.pending);
    let mut body = format!(
        "WEEKLY TASK SUMMARY - {}\n{}\n\n\
         Total: {}\nCompleted: {}\nPending: {}\nCompletion rate: {}%\n\n",
        today.format("%B %d, %Y"),
        "=".repeat(50),
        stats.total,
        stats.completed,
        stats.pending,
        stats.completion_rate
    );
    if pending.is_empty() {
        body.push_str("No pending items. Well done.\n\n");
    } else {
        body.push_str("Pending items:\n\n");
        for task in pending {
            body.push_str(&digest_line(task, today));
            body.push('\n');
        }
    }
    body.push_str(SIGNATURE);
    (subject, body)
}

pub(super) fn deadline_alert(task: &Task, days_left: i64) -> (String, String) {
    let subject = format!(
        "[Task-#{}] Deadline Alert: {} - Due in {} Days",
        task.id, task.title, days_left
    );
    let body = format!(
        "Hello,\n\n\
         The deadline for the following task is {} days away:\n\n\
         Task: {}\n\
         Deadline: {}\n\
         Priority: {}\n\
         Responsible: {}\n\n\
         Please make sure it stays on track, or reply with an update.\n\n\
         {}",
        days_left,
        task.title,
        deadline_text(task),
        task.priority,
        task.assigned_to,
        SIGNATURE
    );
    (subject, body)
}

pub(super) fn acknowledgement(task: &Task, status: TaskStatus) -> (String, String) {
    let subject = format!("[Task-#{}] Status updated: {}", task.id, status);
    let confirmation = match status {
        TaskStatus::Completed => {
            "Great work. The task has been marked as completed and removed from follow-ups."
        }
        TaskStatus::InProgress => {
            "Thanks for the update. The task is now marked as in progress."
        }
        TaskStatus::Delayed => {
            "The task has been marked as delayed. Please share a revised deadline when you can."
        }
        TaskStatus::OnHold => {
            "The task has been placed on hold. Reply again when work resumes."
        }
        TaskStatus::Pending | TaskStatus::Blocked => "The task status has been updated.",
    };
    let body = format!(
        "Hello,\n\n\
         Your reply about the task below was received:\n\n\
         Task: {}\n\
         New status: {}\n\n\
         {}\n\n\
         {}",
        task.title, status, confirmation, SIGNATURE
    );
    (subject, body)
}
