use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, info, warn};

use crate::directory::NotificationKind;
use crate::notify::{Notification, Notifier};

use super::core::FollowupTracker;
use super::store::TaskStore;
use super::templates;
use super::types::{JobSummary, Task, TaskPriority, TaskStatus, TrackerError};

/// Per-recipient counters shown in the weekly summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub completion_rate: i64,
}

impl WeeklyStats {
    pub fn compute(tasks: &[&Task]) -> Self {
        let total = tasks.len();
        let completed = tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Completed)
            .count();
        let completion_rate = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as i64
        };
        Self {
            total,
            completed,
            pending: total - completed,
            completion_rate,
        }
    }
}

impl<S: TaskStore, N: Notifier> FollowupTracker<S, N> {
    /// Run the three periodic mail jobs against one store snapshot. Each job
    /// is individually guarded by the tracking state, so calling this every
    /// minute never double-sends.
    pub fn run_digest_cycle(&self, now: DateTime<Utc>) -> Result<JobSummary, TrackerError> {
        let tasks = self.store.list_tasks()?;
        let mut summary = JobSummary::default();
        summary.merge(self.run_alternate_digest(&tasks, now)?);
        summary.merge(self.run_weekly_summary(&tasks, now)?);
        summary.merge(self.run_deadline_alerts(&tasks, now)?);
        Ok(summary)
    }

    fn run_alternate_digest(
        &self,
        tasks: &[Task],
        now: DateTime<Utc>,
    ) -> Result<JobSummary, TrackerError> {
        let mut summary = JobSummary::default();
        let mut tracking = self.store.load_tracking_state()?;

        let due = match tracking.last_alternate_digest {
            None => true,
            Some(last) => {
                (now.date_naive() - last.date_naive()).num_days() >= self.config.digest_interval_days
            }
        };
        if !due {
            return Ok(summary);
        }

        let eligible: Vec<&Task> = tasks
            .iter()
            .filter(|task| task.status != TaskStatus::Completed)
            .filter(|task| {
                matches!(task.priority, TaskPriority::High | TaskPriority::Urgent)
            })
            .collect();

        let mut per_recipient: BTreeMap<String, Vec<&Task>> = BTreeMap::new();
        for task in &eligible {
            for address in self.resolve_recipients(task, NotificationKind::AlternateDigest) {
                per_recipient.entry(address).or_default().push(task);
            }
        }

        for (address, tasks) in &per_recipient {
            summary.processed += 1;
            let (subject, body) = templates::alternate_digest(tasks, now.date_naive());
            let outcome = self
                .notifier
                .send(&Notification::new(address.clone(), subject, body));
            if outcome.success {
                info!("alternate digest sent to={} items={}", address, tasks.len());
                summary.sent += 1;
            } else {
                warn!(
                    "alternate digest delivery failed to={}: {}",
                    address,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
                summary.failed += 1;
            }
        }

        if summary.sent > 0 {
            tracking.last_alternate_digest = Some(now);
            self.store.save_tracking_state(&tracking)?;
        }
        Ok(summary)
    }

    fn run_weekly_summary(
        &self,
        tasks: &[Task],
        now: DateTime<Utc>,
    ) -> Result<JobSummary, TrackerError> {
        let mut summary = JobSummary::default();
        if now.weekday() != self.config.weekly_summary_weekday {
            return Ok(summary);
        }
        let mut tracking = self.store.load_tracking_state()?;
        let due = match tracking.last_weekly_summary {
            None => true,
            Some(last) => (now.date_naive() - last.date_naive()).num_days() >= 7,
        };
        if !due {
            return Ok(summary);
        }

        // Group every task (completed included) so the stats cover the full
        // workload; only pending ones are listed in the body.
        let mut per_recipient: BTreeMap<String, Vec<&Task>> = BTreeMap::new();
        for task in tasks {
            for address in self.resolve_recipients(task, NotificationKind::WeeklySummary) {
                per_recipient.entry(address).or_default().push(task);
            }
        }

        for (address, tasks) in &per_recipient {
            summary.processed += 1;
            let stats = WeeklyStats::compute(tasks);
            let pending: Vec<&Task> = tasks
                .iter()
                .copied()
                .filter(|task| task.status != TaskStatus::Completed)
                .collect();
            let (subject, body) = templates::weekly_summary(&pending, stats, now.date_naive());
            let outcome = self
                .notifier
                .send(&Notification::new(address.clone(), subject, body));
            if outcome.success {
                info!(
                    "weekly summary sent to={} total={} pending={}",
                    address, stats.total, stats.pending
                );
                summary.sent += 1;
            } else {
                warn!(
                    "weekly summary delivery failed to={}: {}",
                    address,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
                summary.failed += 1;
            }
        }

        if summary.sent > 0 {
            tracking.last_weekly_summary = Some(now);
            self.store.save_tracking_state(&tracking)?;
        }
        Ok(summary)
    }

    /// Single-day deadline warning: fires only when the deadline is exactly
    /// the configured lead time away, and only once per task ever. A later
    /// deadline edit does not re-arm the alert.
    fn run_deadline_alerts(
        &self,
        tasks: &[Task],
        now: DateTime<Utc>,
    ) -> Result<JobSummary, TrackerError> {
        let today = now.date_naive();
        let mut summary = JobSummary::default();

        for task in tasks {
            if task.status == TaskStatus::Completed {
                continue;
            }
            summary.processed += 1;

            let already = match self.store.deadline_alert_sent(task.id) {
                Ok(value) => value,
                Err(err) => {
                    warn!("deadline alert lookup failed for task {}: {}", task.id, err);
                    summary.failed += 1;
                    continue;
                }
            };
            if already {
                summary.skipped += 1;
                continue;
            }

            let Some(deadline) = task.deadline_date() else {
                debug!("task {} has no usable deadline, excluded from alerts", task.id);
                summary.skipped += 1;
                continue;
            };
            let days_left = (deadline - today).num_days();
            if days_left != self.config.deadline_alert_lead_days {
                summary.skipped += 1;
                continue;
            }

            let recipients = self.resolve_recipients(task, NotificationKind::DeadlineAlert);
            if recipients.is_empty() {
                debug!("no enabled recipients for deadline alert on task {}", task.id);
                summary.skipped += 1;
                continue;
            }

            let mut delivered = false;
            for address in recipients {
                let (subject, body) = templates::deadline_alert(task, days_left);
                let outcome = self
                    .notifier
                    .send(&Notification::new(address.clone(), subject, body));
                if outcome.success {
                    delivered = true;
                    summary.sent += 1;
                } else {
                    warn!(
                        "deadline alert delivery failed task_id={} to={}: {}",
                        task.id,
                        address,
                        outcome.error.as_deref().unwrap_or("unknown error")
                    );
                    summary.failed += 1;
                }
            }
            if delivered {
                if let Err(err) = self.store.mark_deadline_alert_sent(task.id) {
                    warn!(
                        "deadline alert sent but could not be recorded for task {}: {}",
                        task.id, err
                    );
                } else {
                    info!("deadline alert sent task_id={} days_left={}", task.id, days_left);
                }
            }
        }

        Ok(summary)
    }
}
