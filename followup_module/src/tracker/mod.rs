mod core;
mod digest;
mod escalation;
mod followup;
mod reply;
mod store;
mod templates;
mod types;
mod utils;

pub use core::FollowupTracker;
pub use digest::WeeklyStats;
pub use reply::{classify_reply, StatusIntent};
pub use store::{SqliteTaskStore, TaskStore};
pub use types::{
    EscalationLevel, EscalationRecord, JobSummary, NewTask, RecipientSettings, Task, TaskPriority,
    TaskStatus, TrackerConfig, TrackerError, TrackingState,
};

#[cfg(test)]
mod tests;
