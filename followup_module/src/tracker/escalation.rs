use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::directory::Role;
use crate::notify::{Notification, Notifier};

use super::core::FollowupTracker;
use super::store::TaskStore;
use super::templates;
use super::types::{EscalationLevel, EscalationRecord, JobSummary, Task, TaskStatus, TrackerError};

impl<S: TaskStore, N: Notifier> FollowupTracker<S, N> {
    /// Notify supervisor tiers about overdue tasks. A task moves up at most
    /// one level per cycle, and a level already recorded on the task is never
    /// re-sent, so same-day re-runs are silent.
    pub fn run_escalations(&self, now: DateTime<Utc>) -> Result<JobSummary, TrackerError> {
        let today = now.date_naive();
        let mut summary = JobSummary::default();

        for task in self.store.list_tasks()? {
            if task.status == TaskStatus::Completed {
                continue;
            }
            summary.processed += 1;

            let Some(deadline) = task.deadline_date() else {
                debug!("task {} has no usable deadline, excluded from escalation", task.id);
                summary.skipped += 1;
                continue;
            };
            let days_overdue = (today - deadline).num_days();
            if days_overdue <= 0 {
                summary.skipped += 1;
                continue;
            }

            let Some((level, recipient)) = self.next_escalation(&task, days_overdue) else {
                summary.skipped += 1;
                continue;
            };

            let (subject, body) = templates::escalation_notice(&task, level, days_overdue);
            let notification = Notification::new(recipient.clone(), subject, body);
            let outcome = self.notifier.send(&notification);
            if outcome.success {
                let record = EscalationRecord {
                    task_id: task.id,
                    level,
                    created_at: now,
                    note: format!("{} days overdue, notified {}", days_overdue, recipient),
                };
                match self.store.record_escalation(&record) {
                    Ok(()) => {
                        info!(
                            "escalation sent task_id={} level={} to={} days_overdue={}",
                            task.id, level, recipient, days_overdue
                        );
                        summary.sent += 1;
                    }
                    Err(err) => {
                        warn!(
                            "escalation sent but store update failed for task {}: {}",
                            task.id, err
                        );
                        summary.failed += 1;
                    }
                }
            } else {
                warn!(
                    "escalation delivery failed task_id={} level={} to={}: {}",
                    task.id,
                    level,
                    recipient,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
                summary.failed += 1;
            }
        }

        Ok(summary)
    }

    /// The next escalation to fire for a task, if any: the lowest due level
    /// strictly above whatever was already sent, with its resolved recipient.
    fn next_escalation(&self, task: &Task, days_overdue: i64) -> Option<(EscalationLevel, String)> {
        let assignee = self.directory.find(&task.assigned_to);
        let role = assignee.map(|user| user.role);
        let already = task.highest_escalation;

        let due = |level: EscalationLevel| already.map(|sent| level > sent).unwrap_or(true);

        if due(EscalationLevel::L1)
            && role == Some(Role::Executive)
            && days_overdue >= self.config.l1_after_days
        {
            let department = assignee.map(|user| user.department.as_str()).unwrap_or("");
            match self.directory.manager_in_department(department) {
                Some(manager) => return Some((EscalationLevel::L1, manager.email.clone())),
                None => {
                    warn!(
                        "no manager found in department '{}' for task {}",
                        department, task.id
                    );
                }
            }
        }

        if due(EscalationLevel::L2)
            && role == Some(Role::Manager)
            && days_overdue >= self.config.l2_after_days
        {
            match self.directory.department_contact(&self.config.ea_department) {
                Some(contact) => return Some((EscalationLevel::L2, contact.email.clone())),
                None => {
                    warn!(
                        "no contact found in EA department '{}' for task {}",
                        self.config.ea_department, task.id
                    );
                }
            }
        }

        if due(EscalationLevel::Boss)
            && task.category.eq_ignore_ascii_case(&self.config.boss_category)
            && days_overdue >= self.config.boss_after_days
        {
            let boss = self.config.boss_email.trim();
            let address = if boss.is_empty() {
                self.owner_fallback()
            } else {
                Some(boss.to_ascii_lowercase())
            };
            match address {
                Some(address) => return Some((EscalationLevel::Boss, address)),
                None => {
                    warn!("boss escalation due for task {} but no boss address configured", task.id);
                }
            }
        }

        None
    }
}
