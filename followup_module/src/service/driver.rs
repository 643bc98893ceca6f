use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use crate::mailbox::ReplyMailbox;
use crate::notify::Notifier;
use crate::tracker::{FollowupTracker, TaskStore};

/// One full pass over all jobs, in a fixed order so every store mutation is
/// serialized: inbound replies first (they change task state the other jobs
/// read), then reminders, escalations, and the digest cycle. A failing job
/// is logged and the rest of the pass still runs.
pub fn run_cycle<S: TaskStore, N: Notifier>(
    tracker: &FollowupTracker<S, N>,
    mailbox: &ReplyMailbox,
) {
    let now = Utc::now();

    match tracker.process_inbound_replies(mailbox, now) {
        Ok(summary) => info!("inbound replies complete {}", summary),
        Err(err) => error!("inbound reply processing failed: {}", err),
    }
    match tracker.run_followups(now) {
        Ok(summary) => info!("followups complete {}", summary),
        Err(err) => error!("followup run failed: {}", err),
    }
    match tracker.run_escalations(now) {
        Ok(summary) => info!("escalations complete {}", summary),
        Err(err) => error!("escalation run failed: {}", err),
    }
    match tracker.run_digest_cycle(now) {
        Ok(summary) => info!("digest cycle complete {}", summary),
        Err(err) => error!("digest cycle failed: {}", err),
    }
}

/// Wake on a fixed interval and run whichever jobs are due until the stop
/// flag is raised.
pub fn run_loop<S: TaskStore, N: Notifier>(
    tracker: &FollowupTracker<S, N>,
    mailbox: &ReplyMailbox,
    poll_interval: Duration,
    stop_flag: &AtomicBool,
) {
    info!(
        "driver loop started, polling every {}s",
        poll_interval.as_secs()
    );
    while !stop_flag.load(Ordering::Relaxed) {
        run_cycle(tracker, mailbox);
        std::thread::sleep(poll_interval);
    }
    info!("driver loop stopped");
}
