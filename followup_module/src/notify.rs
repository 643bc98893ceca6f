use send_emails_module::{send_email, SendEmailParams};

use crate::directory::UserDirectory;

/// One outbound notification, channel-agnostic.
#[derive(Debug, Clone)]
pub struct Notification {
    pub to: String,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            cc: Vec::new(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Delivery result. Failures are data, not errors; callers log and continue.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Delivery seam for the engines. Implementations must not panic on failure;
/// a failed attempt comes back as a [`SendOutcome`] the caller can count.
pub trait Notifier {
    /// Turn a directory identity (name or address) into a deliverable
    /// address. Returns `None` when nothing resolves; callers fall back to
    /// the configured owner.
    fn resolve_address(&self, identity: &str) -> Option<String>;

    fn send(&self, notification: &Notification) -> SendOutcome;
}

/// Production notifier: resolves through the user directory and delivers via
/// the email module.
pub struct EmailNotifier {
    directory: UserDirectory,
    from: String,
}

impl EmailNotifier {
    pub fn new(directory: UserDirectory, from: impl Into<String>) -> Self {
        Self {
            directory,
            from: from.into(),
        }
    }
}

impl Notifier for EmailNotifier {
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
        let params = SendEmailParams {
            from: self.from.clone(),
            to: vec![notification.to.clone()],
            cc: notification.cc.clone(),
            bcc: Vec::new(),
            subject: notification.subject.clone(),
            text_body: notification.body.clone(),
            html_body: None,
            reply_to: None,
        };
        match send_email(&params) {
            Ok(()) => SendOutcome::ok(),
            Err(err) => SendOutcome::failed(err.to_string()),
        }
    }
}
