use std::env;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Weekday;

use crate::tracker::TrackerConfig;

use super::BoxError;

/// Everything the service binary needs, resolved once at startup from the
/// environment (with `.env` support). No ambient globals; the tracker gets
/// its own copy of the tuning knobs.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub tasks_db_path: PathBuf,
    pub team_config_path: PathBuf,
    pub inbound_dir: PathBuf,
    pub poll_interval: Duration,
    pub mail_from: String,
    pub tracker: TrackerConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, BoxError> {
        dotenvy::dotenv().ok();

        let runtime_root = default_runtime_root()?;
        let tasks_db_path = resolve_path(env::var("TASKS_DB_PATH").unwrap_or_else(|_| {
            runtime_root
                .join("state")
                .join("tasks.db")
                .to_string_lossy()
                .into_owned()
        }))?;
        let team_config_path = resolve_path(
            env::var("TEAM_CONFIG_PATH").unwrap_or_else(|_| "team.toml".to_string()),
        )?;
        let inbound_dir = resolve_path(env::var("INBOUND_MAIL_DIR").unwrap_or_else(|_| {
            runtime_root.join("inbound").to_string_lossy().into_owned()
        }))?;
        let poll_interval = env::var("DRIVER_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        let owner_email = env_var_non_empty("OWNER_EMAIL");
        let mail_from = env_var_non_empty("MAIL_FROM")
            .or_else(|| owner_email.clone())
            .ok_or("MAIL_FROM or OWNER_EMAIL must be set")?;
        let owner_email = owner_email.unwrap_or_else(|| mail_from.clone());

        let defaults = TrackerConfig::default();
        let tracker = TrackerConfig {
            owner_email: owner_email.clone(),
            followup_high_days: env_i64("FOLLOWUP_HIGH_DAYS", defaults.followup_high_days),
            followup_medium_days: env_i64("FOLLOWUP_MEDIUM_DAYS", defaults.followup_medium_days),
            followup_low_days: env_i64("FOLLOWUP_LOW_DAYS", defaults.followup_low_days),
            l1_after_days: env_i64("ESCALATION_L1_DAYS", defaults.l1_after_days),
            l2_after_days: env_i64("ESCALATION_L2_DAYS", defaults.l2_after_days),
            boss_after_days: env_i64("ESCALATION_BOSS_DAYS", defaults.boss_after_days),
            ea_department: env_var_non_empty("EA_DEPARTMENT").unwrap_or(defaults.ea_department),
            boss_category: env_var_non_empty("BOSS_CATEGORY").unwrap_or(defaults.boss_category),
            boss_email: env_var_non_empty("BOSS_EMAIL").unwrap_or(owner_email),
            digest_interval_days: env_i64("DIGEST_INTERVAL_DAYS", defaults.digest_interval_days),
            weekly_summary_weekday: env_weekday(
                "WEEKLY_SUMMARY_WEEKDAY",
                defaults.weekly_summary_weekday,
            ),
            deadline_alert_lead_days: env_i64(
                "DEADLINE_ALERT_LEAD_DAYS",
                defaults.deadline_alert_lead_days,
            ),
        };

        Ok(Self {
            tasks_db_path,
            team_config_path,
            inbound_dir,
            poll_interval,
            mail_from,
            tracker,
        })
    }
}

fn env_var_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value >= 0)
        .unwrap_or(default)
}

fn env_weekday(key: &str, default: Weekday) -> Weekday {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<Weekday>().ok())
        .unwrap_or(default)
}

fn default_runtime_root() -> Result<PathBuf, io::Error> {
    let home =
        env::var("HOME").map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home).join(".momtrack"))
}

fn resolve_path(raw: String) -> Result<PathBuf, io::Error> {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        let cwd = env::current_dir()?;
        Ok(cwd.join(path))
    }
}
