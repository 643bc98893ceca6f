//! Seed a demo database and team directory so the service has something to
//! chew on: a few users across roles plus tasks in various states, including
//! one already overdue and one approaching its deadline.

use chrono::{Duration, Utc};

use followup_module::service::{BoxError, ServiceConfig};
use followup_module::{NewTask, SqliteTaskStore, TaskPriority, TaskStore};

const TEAM_TEMPLATE: &str = r#"[[users]]
name = "Priya Nair"
email = "priya@example.com"
department = "EA-Director's Office"
role = "owner"

[[users]]
name = "Amit Kumar"
email = "amit@example.com"
department = "Accounts/Finance"
role = "executive"

[[users]]
name = "Sunita Rao"
email = "sunita@example.com"
department = "Accounts/Finance"
role = "manager"

[[users]]
name = "Vikram Shah"
email = "vikram@example.com"
department = "Sales"
role = "manager"
"#;

fn main() -> Result<(), BoxError> {
    // The seed tool never sends mail, so a placeholder sender is fine.
    if std::env::var("MAIL_FROM").is_err() && std::env::var("OWNER_EMAIL").is_err() {
        std::env::set_var("MAIL_FROM", "tracker@example.com");
    }
    let config = ServiceConfig::from_env()?;

    if config.team_config_path.exists() {
        println!(
            "team directory already present at {}",
            config.team_config_path.display()
        );
    } else {
        std::fs::write(&config.team_config_path, TEAM_TEMPLATE)?;
        println!("wrote sample team directory to {}", config.team_config_path.display());
    }

    let store = SqliteTaskStore::new(config.tasks_db_path.clone())?;
    let now = Utc::now();
    let today = now.date_naive();

    let mut upcoming = NewTask::new("Prepare monthly MIS report", "Amit Kumar", "Priya Nair", now);
    upcoming.department = "Accounts/Finance".to_string();
    upcoming.priority = TaskPriority::High;
    upcoming.deadline = Some((today + Duration::days(4)).format("%Y-%m-%d").to_string());
    upcoming.category = "Team Meeting".to_string();

    let mut overdue = NewTask::new("Share revised sales targets", "Amit Kumar", "Priya Nair", now);
    overdue.department = "Accounts/Finance".to_string();
    overdue.priority = TaskPriority::Urgent;
    overdue.deadline = Some((today - Duration::days(4)).format("%Y-%m-%d").to_string());
    overdue.category = "Boss Meeting".to_string();

    let mut quiet = NewTask::new("Update the vendor contact list", "Vikram Shah", "Priya Nair", now);
    quiet.department = "Sales".to_string();
    quiet.priority = TaskPriority::Low;

    for task in [upcoming, overdue, quiet] {
        let title = task.title.clone();
        let id = store.insert_task(&task)?;
        println!("seeded task #{id}: {title}");
    }

    println!("database ready at {}", config.tasks_db_path.display());
    Ok(())
}
