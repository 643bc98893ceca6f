use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Organizational tier used by the escalation engine to pick the next
/// recipient. `owner` doubles as the EA/owner tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Executive,
    Manager,
    #[serde(alias = "ea")]
    Owner,
}

/// One directory entry plus that person's notification preferences.
/// Preference flags default to enabled so a minimal entry keeps receiving
/// everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub department: String,
    pub role: Role,
    #[serde(default = "default_true")]
    pub email_enabled: bool,
    #[serde(default = "default_true")]
    pub alternate_digest: bool,
    #[serde(default = "default_true")]
    pub weekly_summary: bool,
    #[serde(default = "default_true")]
    pub deadline_alerts: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    AlternateDigest,
    WeeklySummary,
    DeadlineAlert,
}

#[derive(Debug, Deserialize)]
struct TeamFile {
    #[serde(default)]
    users: Vec<UserProfile>,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("team config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// In-memory user directory loaded once at startup from a TOML file.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Vec<UserProfile>,
    by_identity: HashMap<String, usize>,
}

impl UserDirectory {
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let raw = std::fs::read_to_string(path)?;
        let file: TeamFile = toml::from_str(&raw)?;
        Ok(Self::from_users(file.users))
    }

    pub fn from_users(users: Vec<UserProfile>) -> Self {
        let mut by_identity = HashMap::new();
        for (index, user) in users.iter().enumerate() {
            by_identity
                .entry(user.name.trim().to_ascii_lowercase())
                .or_insert(index);
            by_identity
                .entry(user.email.trim().to_ascii_lowercase())
                .or_insert(index);
        }
        Self { users, by_identity }
    }

    pub fn users(&self) -> &[UserProfile] {
        &self.users
    }

    /// Look up a person by display name or email address.
    pub fn find(&self, identity: &str) -> Option<&UserProfile> {
        let key = identity.trim().to_ascii_lowercase();
        self.by_identity.get(&key).map(|index| &self.users[*index])
    }

    pub fn email_for(&self, identity: &str) -> Option<String> {
        self.find(identity).map(|user| user.email.clone())
    }

    /// First manager listed in the given department.
    pub fn manager_in_department(&self, department: &str) -> Option<&UserProfile> {
        self.users.iter().find(|user| {
            user.role == Role::Manager && user.department.eq_ignore_ascii_case(department)
        })
    }

    /// First contact listed in the given department, any role. Used for the
    /// EA/owner escalation tier.
    pub fn department_contact(&self, department: &str) -> Option<&UserProfile> {
        self.users
            .iter()
            .find(|user| user.department.eq_ignore_ascii_case(department))
    }

    /// Whether the given address should receive this kind of notification.
    /// Addresses not in the directory default to enabled.
    pub fn allows(&self, email: &str, kind: NotificationKind) -> bool {
        match self.find(email) {
            Some(user) => {
                if !user.email_enabled {
                    return false;
                }
                match kind {
                    NotificationKind::AlternateDigest => user.alternate_digest,
                    NotificationKind::WeeklySummary => user.weekly_summary,
                    NotificationKind::DeadlineAlert => user.deadline_alerts,
                }
            }
            None => true,
        }
    }
}
