/// HTTP mail relay transport
///
/// Posts each message as JSON to `MAIL_API_URL` with a bearer key:
///
/// ```json
/// { "from": "...", "to": "...", "subject": "...", "html": "...", "text": "..." }
/// ```

use async_trait::async_trait;
use projectcamp_shared::mail::{MailError, MailMessage, Mailer};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Sends mail through an HTTP relay
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        from: impl Into<String>,
    ) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            from: from.into(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let payload = RelayPayload {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html_body,
            text: &message.text_body,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected(format!("{}: {}", status, body)));
        }

        debug!(to = %message.to, subject = %message.subject, "Mail handed to relay");
        Ok(())
    }
}
