use std::time::Duration;

use serde::Serialize;

const DEFAULT_API_BASE: &str = "https://api.postmarkapp.com";
const SEND_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default)]
pub struct SendEmailParams {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
    pub reply_to: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SendEmailError {
    #[error("POSTMARK_SERVER_TOKEN not set")]
    MissingToken,
    #[error("from address missing")]
    MissingFrom,
    #[error("no recipients")]
    NoRecipients,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("postmark rejected message (code {code}): {message}")]
    Rejected { code: i64, message: String },
}

#[derive(Debug, Serialize)]
struct PostmarkMessage<'a> {
    #[serde(rename = "From")]
    from: &'a str,
    #[serde(rename = "To")]
    to: String,
    #[serde(rename = "Cc", skip_serializing_if = "String::is_empty")]
    cc: String,
    #[serde(rename = "Bcc", skip_serializing_if = "String::is_empty")]
    bcc: String,
    #[serde(rename = "Subject")]
    subject: &'a str,
    #[serde(rename = "TextBody")]
    text_body: &'a str,
    #[serde(rename = "HtmlBody", skip_serializing_if = "Option::is_none")]
    html_body: Option<&'a str>,
    #[serde(rename = "ReplyTo", skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    #[serde(rename = "MessageStream")]
    message_stream: &'a str,
}

/// Send one email through the Postmark HTTP API.
///
/// Reads `POSTMARK_SERVER_TOKEN` (and optionally `POSTMARK_API_BASE`) from the
/// environment. Blocking; each attempt is bounded by a request timeout so a
/// hung send cannot stall the calling batch.
pub fn send_email(params: &SendEmailParams) -> Result<(), SendEmailError> {
    dotenvy::dotenv().ok();

    let token = std::env::var("POSTMARK_SERVER_TOKEN")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(SendEmailError::MissingToken)?;

    let from = params.from.trim();
    if from.is_empty() {
        return Err(SendEmailError::MissingFrom);
    }
    if params.to.iter().all(|value| value.trim().is_empty()) {
        return Err(SendEmailError::NoRecipients);
    }

    let api_base = std::env::var("POSTMARK_API_BASE")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let url = format!("{}/email", api_base.trim_end_matches('/'));

    let message = PostmarkMessage {
        from,
        to: join_addresses(&params.to),
        cc: join_addresses(&params.cc),
        bcc: join_addresses(&params.bcc),
        subject: &params.subject,
        text_body: &params.text_body,
        html_body: params.html_body.as_deref(),
        reply_to: params.reply_to.as_deref(),
        message_stream: "outbound",
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
        .build()?;
    let response = client
        .post(&url)
        .header("Accept", "application/json")
        .header("X-Postmark-Server-Token", token)
        .json(&message)
        .send()?;

    let status = response.status();
    let body: serde_json::Value = response.json().unwrap_or_default();
    let error_code = body
        .get("ErrorCode")
        .and_then(|value| value.as_i64())
        .unwrap_or(0);
    if !status.is_success() || error_code != 0 {
        let message = body
            .get("Message")
            .and_then(|value| value.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(SendEmailError::Rejected {
            code: error_code,
            message,
        });
    }

    Ok(())
}

fn join_addresses(values: &[String]) -> String {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}
