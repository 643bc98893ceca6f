use crate::directory::{NotificationKind, UserDirectory};
use crate::notify::Notifier;

use super::store::TaskStore;
use super::types::{Task, TrackerConfig};

/// The follow-up core: owns the store, the delivery seam, the user directory
/// and the tuning knobs, and exposes one entry point per job. All jobs are
/// synchronous; the driver runs them sequentially so store mutations are
/// naturally serialized.
pub struct FollowupTracker<S: TaskStore, N: Notifier> {
    pub(super) store: S,
    pub(super) notifier: N,
    pub(super) directory: UserDirectory,
    pub(super) config: TrackerConfig,
}

impl<S: TaskStore, N: Notifier> FollowupTracker<S, N> {
    pub fn new(store: S, notifier: N, directory: UserDirectory, config: TrackerConfig) -> Self {
        Self {
            store,
            notifier,
            directory,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Resolve the digest/alert recipient set for a task: assignee (when
    /// enabled), owner (when CC'd), then explicit extras; the owner is the
    /// fallback when nothing else resolves. Preference filtering happens
    /// last so a disabled recipient does not re-trigger the fallback.
    pub(super) fn resolve_recipients(&self, task: &Task, kind: NotificationKind) -> Vec<String> {
        fn push_unique(address: Option<String>, addresses: &mut Vec<String>) {
            if let Some(address) = address {
                if !addresses.contains(&address) {
                    addresses.push(address);
                }
            }
        }

        let mut addresses: Vec<String> = Vec::new();
        if task.recipients.notify_assignee {
            push_unique(
                self.notifier.resolve_address(&task.assigned_to),
                &mut addresses,
            );
        }
        if task.recipients.cc_owner {
            push_unique(
                self.notifier.resolve_address(&task.created_by),
                &mut addresses,
            );
        }
        for extra in &task.recipients.additional {
            push_unique(self.notifier.resolve_address(extra), &mut addresses);
        }
        if addresses.is_empty() {
            push_unique(
                self.notifier
                    .resolve_address(&task.created_by)
                    .or_else(|| self.owner_fallback()),
                &mut addresses,
            );
        }

        addresses
            .into_iter()
            .filter(|address| self.directory.allows(address, kind))
            .collect()
    }

    pub(super) fn owner_fallback(&self) -> Option<String> {
        let owner = self.config.owner_email.trim();
        if owner.is_empty() {
            None
        } else {
            Some(owner.to_ascii_lowercase())
        }
    }
}
