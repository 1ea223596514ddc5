use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DispatchError;
use crate::transport::{Notification, NotificationTransport};

pub const DEFAULT_URL: &str = "https://api.postmarkapp.com/email";

/// Postmark single-message API client.
pub struct PostmarkTransport {
    client: Client,
    url: String,
    token: String,
    from: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Email<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reply {
    error_code: i64,
    #[serde(default)]
    message: String,
}

impl PostmarkTransport {
    pub fn new(url: impl Into<String>, token: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            token: token.into(),
            from: from.into(),
        }
    }
}

impl NotificationTransport for PostmarkTransport {
    async fn send(&self, notification: &Notification) -> Result<u32, DispatchError> {
        let email = Email {
            from: &self.from,
            to: &notification.address,
            subject: &notification.subject,
            text_body: &notification.body,
        };

        let resp = self
            .client
            .post(&self.url)
            .header("Accept", "application/json")
            .header("X-Postmark-Server-Token", &self.token)
            .json(&email)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        debug!(status = status.as_u16(), "Postmark replied");

        interpret(&notification.address, status.is_success(), &body)
    }
}

/// A message counts as delivered only on a 2xx reply whose `ErrorCode` is 0.
fn interpret(address: &str, success: bool, body: &str) -> Result<u32, DispatchError> {
    let reply: Reply = serde_json::from_str(body)
        .map_err(|e| DispatchError::Transport(format!("unreadable Postmark reply: {}", e)))?;

    if success && reply.error_code == 0 {
        return Ok(1);
    }
    Err(DispatchError::Rejected {
        address: address.to_string(),
        code: reply.error_code,
        message: reply.message,
    })
}
