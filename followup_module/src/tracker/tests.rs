use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use crate::directory::{Role, UserDirectory, UserProfile};
use crate::mailbox::ReplyMailbox;
use crate::notify::{Notification, Notifier, SendOutcome};

use super::{
    EscalationLevel, FollowupTracker, NewTask, SqliteTaskStore, TaskPriority, TaskStatus,
    TaskStore, TrackerConfig,
};

/// Captures every notification instead of delivering it; addresses added to
/// `failing` report delivery failure.
struct RecordingNotifier {
    directory: UserDirectory,
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    fn new(directory: UserDirectory) -> Self {
        Self {
            directory,
            sent: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("sent lock").clone()
    }

    fn clear(&self) {
        self.sent.lock().expect("sent lock").clear();
    }

    fn fail_address(&self, address: &str) {
        self.failing
            .lock()
            .expect("failing lock")
            .insert(address.to_string());
    }

    fn restore_address(&self, address: &str) {
        self.failing.lock().expect("failing lock").remove(address);
    }
}

impl Notifier for RecordingNotifier {
    fn resolve_address(&self, identity: &str) -> Option<String> {
        let trimmed = identity.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.contains('@') {
            return Some(trimmed.to_ascii_lowercase());
        }
        self.directory.email_for(trimmed)
    }

    fn send(&self, notification: &Notification) -> SendOutcome {
        if self
            .failing
            .lock()
            .expect("failing lock")
            .contains(&notification.to)
        {
            return SendOutcome::failed("simulated delivery failure");
        }
        self.sent
            .lock()
            .expect("sent lock")
            .push(notification.clone());
        SendOutcome::ok()
    }
}

fn user(name: &str, email: &str, department: &str, role: Role) -> UserProfile {
    UserProfile {
        name: name.to_string(),
        email: email.to_string(),
        department: department.to_string(),
        role,
        email_enabled: true,
        alternate_digest: true,
        weekly_summary: true,
        deadline_alerts: true,
    }
}

fn test_directory() -> UserDirectory {
    let mut neha = user("Neha Joshi", "neha@example.com", "Sales", Role::Executive);
    neha.alternate_digest = false;
    UserDirectory::from_users(vec![
        user(
            "Priya Nair",
            "priya@example.com",
            "EA-Director's Office",
            Role::Owner,
        ),
        user(
            "Amit Kumar",
            "amit@example.com",
            "Accounts/Finance",
            Role::Executive,
        ),
        user(
            "Sunita Rao",
            "sunita@example.com",
            "Accounts/Finance",
            Role::Manager,
        ),
        user("Vikram Shah", "vikram@example.com", "Sales", Role::Manager),
        neha,
    ])
}

fn test_config() -> TrackerConfig {
    TrackerConfig {
        owner_email: "priya@example.com".to_string(),
        boss_email: "boss@example.com".to_string(),
        ..TrackerConfig::default()
    }
}

fn build_tracker(temp: &TempDir) -> FollowupTracker<SqliteTaskStore, RecordingNotifier> {
    let store = SqliteTaskStore::new(temp.path().join("tasks.db")).expect("store");
    let directory = test_directory();
    let notifier = RecordingNotifier::new(directory.clone());
    FollowupTracker::new(store, notifier, directory, test_config())
}

fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn new_task(title: &str, assigned_to: &str) -> NewTask {
    let mut task = NewTask::new(title, assigned_to, "Priya Nair", at(2026, 2, 20, 9));
    // Most engine tests want a single, predictable recipient.
    task.recipients.cc_owner = false;
    task
}

#[test]
fn cadence_matches_priority_rules() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);
    let today = date(2026, 3, 6);

    let expectations = [
        (TaskPriority::High, 2),
        (TaskPriority::Medium, 3),
        (TaskPriority::Low, 5),
        (TaskPriority::Urgent, 2),
    ];
    for (priority, cadence) in expectations {
        for elapsed in 0..7 {
            let last = today - chrono::Duration::days(elapsed);
            assert_eq!(
                tracker.should_send_followup(priority, Some(last), today),
                elapsed >= cadence,
                "priority {priority} elapsed {elapsed}"
            );
        }
        // never followed up
        assert!(tracker.should_send_followup(priority, None, today));
    }
}

#[test]
fn followup_sends_reminder_and_records_date() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);
    let now = at(2026, 3, 6, 8);

    let mut task = new_task("Quarterly report", "Amit Kumar");
    task.recipients.cc_owner = true;
    let id = tracker.store().insert_task(&task).expect("insert");

    let summary = tracker.run_followups(now).expect("run");
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 0);

    let sent = tracker.notifier().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "amit@example.com");
    assert_eq!(sent[0].cc, vec!["priya@example.com".to_string()]);
    assert!(sent[0].subject.contains("Follow-Up"));

    let stored = tracker.store().get_task(id).expect("get").expect("present");
    assert_eq!(stored.last_followup_at, Some(now.date_naive()));

    // same-day rerun is a no-op
    tracker.notifier().clear();
    let summary = tracker.run_followups(now).expect("rerun");
    assert_eq!(summary.sent, 0);
    assert_eq!(summary.skipped, 1);
    assert!(tracker.notifier().sent().is_empty());
}

#[test]
fn followup_failure_leaves_timestamp_unset_for_retry() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);
    let now = at(2026, 3, 6, 8);

    let id = tracker
        .store()
        .insert_task(&new_task("Vendor renewal", "Amit Kumar"))
        .expect("insert");

    tracker.notifier().fail_address("amit@example.com");
    let summary = tracker.run_followups(now).expect("run");
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.sent, 0);
    let stored = tracker.store().get_task(id).expect("get").expect("present");
    assert!(stored.last_followup_at.is_none());

    // delivery recovers, reminder goes out on the next cycle
    tracker.notifier().restore_address("amit@example.com");
    let summary = tracker.run_followups(now).expect("retry");
    assert_eq!(summary.sent, 1);
    let stored = tracker.store().get_task(id).expect("get").expect("present");
    assert_eq!(stored.last_followup_at, Some(now.date_naive()));
}

#[test]
fn unknown_assignee_falls_back_to_owner() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);

    tracker
        .store()
        .insert_task(&new_task("Orphan task", "Somebody New"))
        .expect("insert");

    let summary = tracker.run_followups(at(2026, 3, 6, 8)).expect("run");
    assert_eq!(summary.sent, 1);
    assert_eq!(tracker.notifier().sent()[0].to, "priya@example.com");
}

#[test]
fn completed_tasks_are_excluded_everywhere() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);
    // Friday, so the weekly summary leg is idle as well.
    let now = at(2026, 3, 6, 8);

    let mut task = new_task("Done already", "Amit Kumar");
    task.status = TaskStatus::Completed;
    task.priority = TaskPriority::Urgent;
    task.deadline = Some("2026-03-01".to_string()); // overdue
    tracker.store().insert_task(&task).expect("insert");

    let mut upcoming = new_task("Done and due soon", "Amit Kumar");
    upcoming.status = TaskStatus::Completed;
    upcoming.deadline = Some("2026-03-10".to_string()); // exactly 4 days out
    tracker.store().insert_task(&upcoming).expect("insert");

    assert_eq!(tracker.run_followups(now).expect("followups").sent, 0);
    assert_eq!(tracker.run_escalations(now).expect("escalations").sent, 0);
    assert_eq!(tracker.run_digest_cycle(now).expect("digest").sent, 0);
    assert!(tracker.notifier().sent().is_empty());
}

#[test]
fn executive_escalation_notifies_manager_once() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);
    // deadline 5 days ago, L1 threshold 3
    let now = at(2026, 3, 6, 8);

    let mut task = new_task("Budget variance note", "Amit Kumar");
    task.deadline = Some("2026-03-01".to_string());
    let id = tracker.store().insert_task(&task).expect("insert");

    let summary = tracker.run_escalations(now).expect("run");
    assert_eq!(summary.sent, 1);

    let sent = tracker.notifier().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "sunita@example.com");

    let records = tracker.store().escalations_for(id).expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, EscalationLevel::L1);

    // no second level in the same pass, and a same-day rerun stays silent
    tracker.notifier().clear();
    let summary = tracker.run_escalations(now).expect("rerun");
    assert_eq!(summary.sent, 0);
    assert!(tracker.notifier().sent().is_empty());
    assert_eq!(tracker.store().escalations_for(id).expect("records").len(), 1);
}

#[test]
fn manager_escalation_goes_to_ea_contact() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);
    // deadline 6 days ago, L2 threshold 5
    let now = at(2026, 3, 6, 8);

    let mut task = new_task("Team hiring plan", "Sunita Rao");
    task.deadline = Some("2026-02-28".to_string());
    let id = tracker.store().insert_task(&task).expect("insert");

    let summary = tracker.run_escalations(now).expect("run");
    assert_eq!(summary.sent, 1);
    assert_eq!(tracker.notifier().sent()[0].to, "priya@example.com");
    let records = tracker.store().escalations_for(id).expect("records");
    assert_eq!(records[0].level, EscalationLevel::L2);
}

#[test]
fn boss_category_escalates_to_boss_address() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);
    // assignee without a directory role; only the boss tier applies
    let now = at(2026, 3, 10, 8);

    let mut task = new_task("Board follow-ups", "external@example.com");
    task.category = "Boss Meeting".to_string();
    task.deadline = Some("2026-03-01".to_string()); // 9 days overdue, boss threshold 7
    let id = tracker.store().insert_task(&task).expect("insert");

    let summary = tracker.run_escalations(now).expect("run");
    assert_eq!(summary.sent, 1);
    assert_eq!(tracker.notifier().sent()[0].to, "boss@example.com");
    let records = tracker.store().escalations_for(id).expect("records");
    assert_eq!(records[0].level, EscalationLevel::Boss);
}

#[test]
fn escalation_levels_progress_one_per_cycle() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);
    let now = at(2026, 3, 10, 8);

    // manager-owned boss-meeting task, far overdue: L2 first, boss next cycle
    let mut task = new_task("Boss meeting actions", "Sunita Rao");
    task.category = "Boss Meeting".to_string();
    task.deadline = Some("2026-03-01".to_string());
    let id = tracker.store().insert_task(&task).expect("insert");

    let summary = tracker.run_escalations(now).expect("first");
    assert_eq!(summary.sent, 1);
    assert_eq!(tracker.notifier().sent()[0].to, "priya@example.com");

    tracker.notifier().clear();
    let summary = tracker.run_escalations(now).expect("second");
    assert_eq!(summary.sent, 1);
    assert_eq!(tracker.notifier().sent()[0].to, "boss@example.com");

    let levels: Vec<_> = tracker
        .store()
        .escalations_for(id)
        .expect("records")
        .into_iter()
        .map(|record| record.level)
        .collect();
    assert_eq!(levels, vec![EscalationLevel::L2, EscalationLevel::Boss]);

    // fully escalated now
    tracker.notifier().clear();
    assert_eq!(tracker.run_escalations(now).expect("third").sent, 0);
}

#[test]
fn malformed_deadline_is_excluded_without_error() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);
    let now = at(2026, 3, 6, 8);

    let mut task = new_task("Sometime task", "Amit Kumar");
    task.deadline = Some("not-a-date".to_string());
    tracker.store().insert_task(&task).expect("insert");

    let summary = tracker.run_escalations(now).expect("escalations");
    assert_eq!(summary.sent, 0);
    assert_eq!(summary.skipped, 1);

    let summary = tracker.run_digest_cycle(now).expect("digest");
    assert_eq!(summary.sent, 0);
    assert!(tracker.notifier().sent().is_empty());
}

#[test]
fn deadline_alert_fires_exactly_once_on_lead_day() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);

    let mut task = new_task("Client demo prep", "Amit Kumar");
    task.deadline = Some("2026-03-10".to_string());
    let id = tracker.store().insert_task(&task).expect("insert");

    // 5 days ahead: nothing
    assert_eq!(tracker.run_digest_cycle(at(2026, 3, 5, 8)).expect("d5").sent, 0);
    // 4 days ahead: one alert
    let summary = tracker.run_digest_cycle(at(2026, 3, 6, 8)).expect("d4");
    assert_eq!(summary.sent, 1);
    assert!(tracker.notifier().sent()[0].subject.contains("Deadline Alert"));
    assert!(tracker.store().deadline_alert_sent(id).expect("marked"));
    // later ticks the same day and the following days stay silent
    tracker.notifier().clear();
    assert_eq!(tracker.run_digest_cycle(at(2026, 3, 6, 20)).expect("d4b").sent, 0);
    assert_eq!(tracker.run_digest_cycle(at(2026, 3, 7, 8)).expect("d3").sent, 0);
    assert!(tracker.notifier().sent().is_empty());
}

#[test]
fn alternate_digest_sends_once_per_window_and_honors_prefs() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);
    let now = at(2026, 3, 6, 8);

    let mut high = new_task("Close the books", "Amit Kumar");
    high.priority = TaskPriority::High;
    tracker.store().insert_task(&high).expect("insert");

    let mut medium = new_task("Tidy the wiki", "Amit Kumar");
    medium.priority = TaskPriority::Medium;
    tracker.store().insert_task(&medium).expect("insert");

    // Neha opted out of the alternate digest and is her own owner here.
    let mut muted = NewTask::new("Sales pipeline review", "Neha Joshi", "Neha Joshi", now);
    muted.priority = TaskPriority::Urgent;
    muted.recipients.cc_owner = false;
    tracker.store().insert_task(&muted).expect("insert");

    let summary = tracker.run_digest_cycle(now).expect("first");
    assert_eq!(summary.sent, 1);
    let sent = tracker.notifier().sent();
    assert_eq!(sent[0].to, "amit@example.com");
    assert!(sent[0].body.contains("Close the books"));
    assert!(!sent[0].body.contains("Tidy the wiki"));

    // second run inside the 2-day window: nothing
    tracker.notifier().clear();
    assert_eq!(tracker.run_digest_cycle(at(2026, 3, 6, 20)).expect("again").sent, 0);
    assert_eq!(tracker.run_digest_cycle(at(2026, 3, 7, 8)).expect("next day").sent, 0);

    // window elapsed: digest goes out again
    assert_eq!(tracker.run_digest_cycle(at(2026, 3, 8, 8)).expect("window").sent, 1);
}

#[test]
fn weekly_summary_fires_on_monday_with_stats() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);
    let monday = at(2026, 3, 2, 8);

    let mut done = new_task("Archive minutes", "Amit Kumar");
    done.status = TaskStatus::Completed;
    tracker.store().insert_task(&done).expect("insert");
    tracker
        .store()
        .insert_task(&new_task("Quarterly report", "Amit Kumar"))
        .expect("insert");

    // Sunday: nothing
    assert_eq!(tracker.run_digest_cycle(at(2026, 3, 1, 8)).expect("sunday").sent, 0);

    let summary = tracker.run_digest_cycle(monday).expect("monday");
    assert_eq!(summary.sent, 1);
    let sent = tracker.notifier().sent();
    assert_eq!(sent[0].to, "amit@example.com");
    assert!(sent[0].body.contains("Total: 2"));
    assert!(sent[0].body.contains("Completed: 1"));
    assert!(sent[0].body.contains("Completion rate: 50%"));
    assert!(sent[0].body.contains("Quarterly report"));
    assert!(!sent[0].body.contains("Archive minutes"));

    // second tick the same Monday stays silent
    tracker.notifier().clear();
    assert_eq!(tracker.run_digest_cycle(at(2026, 3, 2, 20)).expect("again").sent, 0);
}

#[test]
fn reply_round_trip_updates_task_and_acknowledges() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);
    let now = at(2026, 3, 6, 10);
    let mailbox = ReplyMailbox::new(temp.path().join("inbound"));
    std::fs::create_dir_all(mailbox.root()).expect("mailbox dir");

    let id = tracker
        .store()
        .insert_task(&new_task("Quarterly report", "Amit Kumar"))
        .expect("insert");

    std::fs::write(
        mailbox.root().join("m1.json"),
        r#"{"MessageID":"m1","From":"Amit Kumar <amit@example.com>","Subject":"Re: Quarterly report","TextBody":"Completed the report"}"#,
    )
    .expect("write");

    let summary = tracker.process_inbound_replies(&mailbox, now).expect("process");
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.sent, 1);

    let task = tracker.store().get_task(id).expect("get").expect("present");
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.last_update_by.as_deref(), Some("amit@example.com"));
    assert!(task.details.contains("Completed the report"));

    let sent = tracker.notifier().sent();
    assert_eq!(sent.len(), 1, "exactly one acknowledgement");
    assert_eq!(sent[0].to, "amit@example.com");
    assert!(sent[0].subject.contains("completed"));
    assert!(sent[0].body.contains("marked as completed"));

    // the same message is never reprocessed
    tracker.notifier().clear();
    let summary = tracker.process_inbound_replies(&mailbox, now).expect("repeat");
    assert_eq!(summary.processed, 0);
    assert!(tracker.notifier().sent().is_empty());

    // a fresh identical reply against the completed task is still handled
    std::fs::write(
        mailbox.root().join("m2.json"),
        r#"{"MessageID":"m2","From":"amit@example.com","Subject":"Re: Quarterly report","TextBody":"Completed the report"}"#,
    )
    .expect("write");
    let summary = tracker.process_inbound_replies(&mailbox, now).expect("second reply");
    assert_eq!(summary.sent, 1);
    assert_eq!(
        tracker.store().get_task(id).expect("get").expect("present").status,
        TaskStatus::Completed
    );
}

#[test]
fn unmatched_replies_are_skipped_but_marked_processed() {
    let temp = TempDir::new().expect("tempdir");
    let tracker = build_tracker(&temp);
    let now = at(2026, 3, 6, 10);
    let mailbox = ReplyMailbox::new(temp.path().join("inbound"));
    std::fs::create_dir_all(mailbox.root()).expect("mailbox dir");

    tracker
        .store()
        .insert_task(&new_task("Quarterly report", "Amit Kumar"))
        .expect("insert");

    // no keyword match
    std::fs::write(
        mailbox.root().join("a.json"),
        r#"{"MessageID":"a","From":"amit@example.com","Subject":"Re: Quarterly report","TextBody":"Thanks for the nudge"}"#,
    )
    .expect("write");
    // no task match
    std::fs::write(
        mailbox.root().join("b.json"),
        r#"{"MessageID":"b","From":"amit@example.com","Subject":"Re: Something else","TextBody":"done"}"#,
    )
    .expect("write");

    let summary = tracker.process_inbound_replies(&mailbox, now).expect("process");
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.skipped, 2);
    assert!(tracker.notifier().sent().is_empty());
    assert!(tracker.store().reply_processed("a").expect("seen"));
    assert!(tracker.store().reply_processed("b").expect("seen"));

    // nothing left on the next poll
    let summary = tracker.process_inbound_replies(&mailbox, now).expect("repeat");
    assert_eq!(summary.processed, 0);
}
