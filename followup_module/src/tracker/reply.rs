use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{info, warn};

use crate::mailbox::{InboundMessage, ReplyMailbox};
use crate::notify::{Notification, Notifier};

use super::core::FollowupTracker;
use super::store::TaskStore;
use super::templates;
use super::types::{JobSummary, Task, TaskStatus, TrackerError};

/// Status transition inferred from a free-text reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIntent {
    InProgress,
    Completed,
    Delayed,
    OnHold,
}

impl StatusIntent {
    pub fn status(self) -> TaskStatus {
        match self {
            Self::InProgress => TaskStatus::InProgress,
            Self::Completed => TaskStatus::Completed,
            Self::Delayed => TaskStatus::Delayed,
            Self::OnHold => TaskStatus::OnHold,
        }
    }
}

/// Keyword taxonomies checked in a fixed order; the first category with a
/// hit wins. Swappable for a real classifier without touching the state
/// machine around it.
const TAXONOMY: &[(StatusIntent, &[&str])] = &[
    (
        StatusIntent::InProgress,
        &[
            "in progress",
            "in-progress",
            "working on",
            "started",
            "underway",
            "making progress",
        ],
    ),
    (
        StatusIntent::Completed,
        &["completed", "done", "finished", "closed", "delivered"],
    ),
    (
        StatusIntent::Delayed,
        &["delayed", "postponed", "running late", "pushed back", "behind schedule"],
    ),
    (
        StatusIntent::OnHold,
        &["on hold", "on-hold", "paused", "parked", "waiting on"],
    ),
];

/// Classify a reply body by case-insensitive substring match against the
/// ordered taxonomies. `None` when nothing matches.
pub fn classify_reply(body: &str) -> Option<StatusIntent> {
    let lowered = body.to_lowercase();
    for (intent, keywords) in TAXONOMY {
        if keywords.iter().any(|keyword| lowered.contains(keyword)) {
            return Some(*intent);
        }
    }
    None
}

/// Explicit task reference like `[Task-#42]` embedded in a subject line.
fn task_tag(subject: &str) -> Option<i64> {
    let re = Regex::new(r"(?i)\[task-#(\d+)\]").ok()?;
    re.captures(subject)?
        .get(1)
        .and_then(|id| id.as_str().parse().ok())
}

fn strip_reply_prefixes(subject: &str) -> &str {
    let mut rest = subject.trim();
    loop {
        let lowered = rest.to_ascii_lowercase();
        let stripped = if lowered.starts_with("re:") {
            &rest[3..]
        } else if lowered.starts_with("fwd:") {
            &rest[4..]
        } else if lowered.starts_with("fw:") {
            &rest[3..]
        } else {
            break;
        };
        rest = stripped.trim_start();
    }
    rest
}

fn normalize_title(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Resolve a message to a task: the explicit tag wins, otherwise the first
/// task whose normalized title contains (or is contained by) the stripped
/// subject.
fn resolve_task<'a>(subject: &str, tasks: &'a [Task]) -> Option<&'a Task> {
    if let Some(id) = task_tag(subject) {
        return tasks.iter().find(|task| task.id == id);
    }
    let needle = normalize_title(strip_reply_prefixes(subject));
    if needle.is_empty() {
        return None;
    }
    tasks.iter().find(|task| {
        let title = normalize_title(&task.title);
        !title.is_empty() && (title.contains(&needle) || needle.contains(&title))
    })
}

fn reply_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    let mut excerpt: String = trimmed.chars().take(300).collect();
    if excerpt.len() < trimmed.len() {
        excerpt.push_str("...");
    }
    excerpt.replace('\n', " ")
}

impl<S: TaskStore, N: Notifier> FollowupTracker<S, N> {
    /// Drain the reply mailbox: classify each unseen message, apply the
    /// inferred status to the matched task, and acknowledge the sender.
    /// Every message is marked processed afterwards, matched or not, so the
    /// next poll never reprocesses it.
    pub fn process_inbound_replies(
        &self,
        mailbox: &ReplyMailbox,
        now: DateTime<Utc>,
    ) -> Result<JobSummary, TrackerError> {
        let messages = mailbox.load_messages()?;
        let tasks = self.store.list_tasks()?;
        let mut summary = JobSummary::default();

        for message in messages {
            match self.store.reply_processed(&message.message_id) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        "processed-check failed for message {}: {}",
                        message.message_id, err
                    );
                    summary.failed += 1;
                    continue;
                }
            }
            summary.processed += 1;

            let handled = self.handle_reply(&message, &tasks, now);
            match handled {
                ReplyDisposition::Applied => summary.sent += 1,
                ReplyDisposition::AppliedAckFailed => summary.failed += 1,
                ReplyDisposition::Skipped => summary.skipped += 1,
                ReplyDisposition::Failed => summary.failed += 1,
            }

            if let Err(err) = self.store.mark_reply_processed(&message.message_id) {
                warn!(
                    "could not mark message {} as processed: {}",
                    message.message_id, err
                );
            }
        }

        Ok(summary)
    }

    fn handle_reply(
        &self,
        message: &InboundMessage,
        tasks: &[Task],
        now: DateTime<Utc>,
    ) -> ReplyDisposition {
        let Some(intent) = classify_reply(&message.text_body) else {
            info!(
                "no status keywords in message {}, skipping",
                message.message_id
            );
            return ReplyDisposition::Skipped;
        };
        let Some(task) = resolve_task(&message.subject, tasks) else {
            info!(
                "no task matches subject '{}' (message {}), skipping",
                message.subject, message.message_id
            );
            return ReplyDisposition::Skipped;
        };
        let sender = message
            .sender_address()
            .unwrap_or_else(|| message.from.trim().to_string());

        let status = intent.status();
        let note = format!(
            "[{}] Reply from {}: {}",
            now.format("%Y-%m-%d %H:%M UTC"),
            sender,
            reply_excerpt(&message.text_body)
        );
        match self.store.update_status(task.id, status, &sender, Some(&note), now) {
            Ok(true) => {}
            Ok(false) => {
                warn!("task {} vanished before reply could be applied", task.id);
                return ReplyDisposition::Failed;
            }
            Err(err) => {
                warn!("reply update failed for task {}: {}", task.id, err);
                return ReplyDisposition::Failed;
            }
        }
        info!(
            "reply applied task_id={} status={} from={}",
            task.id, status, sender
        );

        let (subject, body) = templates::acknowledgement(task, status);
        let outcome = self.notifier.send(&Notification::new(sender.clone(), subject, body));
        if outcome.success {
            ReplyDisposition::Applied
        } else {
            warn!(
                "acknowledgement delivery failed task_id={} to={}: {}",
                task.id,
                sender,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
            ReplyDisposition::AppliedAckFailed
        }
    }
}

enum ReplyDisposition {
    Applied,
    AppliedAckFailed,
    Skipped,
    Failed,
}
