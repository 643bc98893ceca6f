use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use crate::notify::{Notification, Notifier};

use super::core::FollowupTracker;
use super::store::TaskStore;
use super::templates;
use super::types::{JobSummary, TaskPriority, TaskStatus, TrackerError};

impl<S: TaskStore, N: Notifier> FollowupTracker<S, N> {
    /// Whether a reminder is due: never followed up, or the priority cadence
    /// has elapsed since the last one.
    pub fn should_send_followup(
        &self,
        priority: TaskPriority,
        last_followup_at: Option<NaiveDate>,
        today: NaiveDate,
    ) -> bool {
        match last_followup_at {
            None => true,
            Some(last) => (today - last).num_days() >= self.config.cadence_days(priority),
        }
    }

    /// Send due reminders to assignees. `last_followup_at` only advances on
    /// confirmed delivery, so a failing recipient is retried next cycle
    /// instead of being silently marked as followed up.
    pub fn run_followups(&self, now: DateTime<Utc>) -> Result<JobSummary, TrackerError> {
        let today = now.date_naive();
        let mut summary = JobSummary::default();

        for task in self.store.list_tasks()? {
            if task.status == TaskStatus::Completed {
                continue;
            }
            summary.processed += 1;

            if !self.should_send_followup(task.priority, task.last_followup_at, today) {
                summary.skipped += 1;
                continue;
            }

            let to = match self
                .notifier
                .resolve_address(&task.assigned_to)
                .or_else(|| self.owner_fallback())
            {
                Some(address) => address,
                None => {
                    warn!(
                        "no address for assignee '{}' and no owner fallback, skipping task {}",
                        task.assigned_to, task.id
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            let (subject, body) = templates::followup_reminder(&task);
            let mut notification = Notification::new(to, subject, body);
            if task.recipients.cc_owner {
                if let Some(owner) = self
                    .notifier
                    .resolve_address(&task.created_by)
                    .or_else(|| self.owner_fallback())
                {
                    if owner != notification.to {
                        notification.cc.push(owner);
                    }
                }
            }

            let outcome = self.notifier.send(&notification);
            if outcome.success {
                match self.store.record_followup(task.id, today) {
                    Ok(_) => {
                        info!(
                            "followup sent task_id={} to={} priority={}",
                            task.id, notification.to, task.priority
                        );
                        summary.sent += 1;
                    }
                    Err(err) => {
                        warn!(
                            "followup sent but store update failed for task {}: {}",
                            task.id, err
                        );
                        summary.failed += 1;
                    }
                }
            } else {
                warn!(
                    "followup delivery failed task_id={} to={}: {}",
                    task.id,
                    notification.to,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
                summary.failed += 1;
            }
        }

        Ok(summary)
    }
}
