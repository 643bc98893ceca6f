pub mod directory;
pub mod mailbox;
pub mod notify;
pub mod service;

mod tracker;

pub use tracker::{
    classify_reply, EscalationLevel, EscalationRecord, FollowupTracker, JobSummary, NewTask,
    RecipientSettings, SqliteTaskStore, StatusIntent, Task, TaskPriority, TaskStatus, TaskStore,
    TrackerConfig, TrackerError, TrackingState, WeeklyStats,
};
