use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tracker::TrackerError;

/// One inbound reply, as dropped into the mailbox directory by the inbound
/// gateway. Field names follow the Postmark inbound payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "MessageID")]
    pub message_id: String,
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "Subject", default)]
    pub subject: String,
    #[serde(rename = "TextBody", default)]
    pub text_body: String,
}

impl InboundMessage {
    /// Bare sender address, lowercased. Handles `Name <addr>` forms.
    pub fn sender_address(&self) -> Option<String> {
        extract_address(&self.from)
    }
}

/// Directory of `*.json` reply payloads polled each cycle. Files stay in
/// place after processing; the store's processed-ids table is what prevents
/// reprocessing.
#[derive(Debug, Clone)]
pub struct ReplyMailbox {
    root: PathBuf,
}

impl ReplyMailbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Load every parseable message, sorted by file name so processing order
    /// is stable. A missing directory is an empty mailbox; an unparseable
    /// file is logged and skipped.
    pub fn load_messages(&self) -> Result<Vec<InboundMessage>, TrackerError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|ext| ext == "json").unwrap_or(false) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut messages = Vec::new();
        for path in paths {
            let raw = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<InboundMessage>(&raw) {
                Ok(message) => messages.push(message),
                Err(err) => {
                    warn!("skipping unparseable inbound file {}: {}", path.display(), err);
                }
            }
        }
        Ok(messages)
    }
}

/// Extract the first email address from a header-style value, preferring the
/// angle-bracketed form.
pub(crate) fn extract_address(raw: &str) -> Option<String> {
    if let Some(start) = raw.find('<') {
        if let Some(end) = raw[start + 1..].find('>') {
            let inside = &raw[start + 1..start + 1 + end];
            if let Some(address) = normalize_address(inside) {
                return Some(address);
            }
        }
    }
    raw.split(|ch: char| matches!(ch, ',' | ';' | ' ' | '\t' | '\n' | '\r'))
        .find_map(normalize_address)
}

fn normalize_address(token: &str) -> Option<String> {
    let trimmed = token.trim().trim_matches(|ch| matches!(ch, '<' | '>' | '"'));
    if trimmed.contains('@') && !trimmed.starts_with('@') && !trimmed.ends_with('@') {
        Some(trimmed.to_ascii_lowercase())
    } else {
        None
    }
}
