/// Outbound mail
///
/// The auth flow only knows the [`Mailer`] trait. Delivery failures are the
/// caller's to log; they never undo the operation that triggered the message.
///
/// # Implementations
///
/// - [`LogMailer`]: writes a line per message to the tracing log
/// - [`MemoryMailer`]: keeps every message for later inspection
///
/// The API crate adds an HTTP relay transport.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Product name used in message bodies
pub const PRODUCT_NAME: &str = "Project Management App";

/// Error type for mail delivery
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// The transport could not hand the message off
    #[error("Mail transport failed: {0}")]
    Transport(String),

    /// The relay answered with a failure
    #[error("Mail relay rejected message: {0}")]
    Rejected(String),
}

/// A rendered message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Mail sender
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Logs messages instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        // Bodies carry one-time tokens; only the envelope is logged
        info!(to = %message.to, subject = %message.subject, "Mail transport not configured, message dropped");
        Ok(())
    }
}

/// Records every message; clones share the same outbox
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<MailMessage>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, oldest first
    pub fn messages(&self) -> Vec<MailMessage> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Most recent message addressed to `to`
    pub fn last_to(&self, to: &str) -> Option<MailMessage> {
        self.messages().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.clone());
        Ok(())
    }
}

/// Call-to-action message: greeting, intro, one button, outro
struct Template<'a> {
    username: &'a str,
    intro: &'a str,
    instructions: &'a str,
    button: &'a str,
    link: &'a str,
}

const OUTRO: &str = "Need help, or have questions? Just reply to this email, we'd love to help.";

impl Template<'_> {
    fn text(&self) -> String {
        format!(
            "Hi {},\n\n{}\n\n{}\n{}: {}\n\n{}\n\n{}",
            self.username, self.intro, self.instructions, self.button, self.link, OUTRO, PRODUCT_NAME
        )
    }

    fn html(&self) -> String {
        format!(
            concat!(
                "<!DOCTYPE html><html><body>",
                "<h2>Hi {username},</h2>",
                "<p>{intro}</p>",
                "<p>{instructions}</p>",
                "<p><a href=\"{link}\" style=\"background:#22BC66;color:#ffffff;",
                "padding:10px 18px;border-radius:4px;text-decoration:none\">{button}</a></p>",
                "<p>{outro}</p>",
                "<p>{product}</p>",
                "</body></html>"
            ),
            username = escape_html(self.username),
            intro = escape_html(self.intro),
            instructions = escape_html(self.instructions),
            link = escape_html(self.link),
            button = escape_html(self.button),
            outro = escape_html(OUTRO),
            product = PRODUCT_NAME,
        )
    }

    fn into_message(self, to: &str, subject: &str) -> MailMessage {
        MailMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            html_body: self.html(),
            text_body: self.text(),
        }
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Email-verification message carrying `url`
pub fn verification_email(to: &str, username: &str, url: &str) -> MailMessage {
    Template {
        username,
        intro: "Welcome to Project Management App! We're very excited to have you on board.",
        instructions: "To verify your email please click on the following button",
        button: "Verify your email",
        link: url,
    }
    .into_message(to, "Please verify your email")
}

/// Password-reset message carrying `url`
pub fn password_reset_email(to: &str, username: &str, url: &str) -> MailMessage {
    Template {
        username,
        intro: "We got a request to reset the password of your account",
        instructions: "To reset your password click on the following button or link",
        button: "Reset Password",
        link: url,
    }
    .into_message(to, "Password reset request")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_email_contents() {
        let msg = verification_email("a@x.com", "alice", "http://localhost/verify/abc");

        assert_eq!(msg.to, "a@x.com");
        assert_eq!(msg.subject, "Please verify your email");
        assert!(msg.text_body.contains("Hi alice"));
        assert!(msg.text_body.contains("http://localhost/verify/abc"));
        assert!(msg.html_body.contains("href=\"http://localhost/verify/abc\""));
        assert!(msg.html_body.contains("Verify your email"));
    }

    #[test]
    fn test_reset_email_contents() {
        let msg = password_reset_email("a@x.com", "alice", "http://app/reset?token=abc");

        assert_eq!(msg.subject, "Password reset request");
        assert!(msg.text_body.contains("Reset Password: http://app/reset?token=abc"));
        // `&` inside attributes must be escaped
        assert!(password_reset_email("a@x.com", "a", "http://x/?a=1&b=2")
            .html_body
            .contains("a=1&amp;b=2"));
    }

    #[test]
    fn test_html_escapes_username() {
        let msg = verification_email("a@x.com", "<b>", "http://x");
        assert!(msg.html_body.contains("&lt;b&gt;"));
        assert!(!msg.html_body.contains("<b>"));
    }

    #[tokio::test]
    async fn test_memory_mailer_records() {
        let mailer = MemoryMailer::new();
        let shared = mailer.clone();

        shared
            .send(&verification_email("a@x.com", "alice", "http://x/1"))
            .await
            .unwrap();
        shared
            .send(&password_reset_email("a@x.com", "alice", "http://x/2"))
            .await
            .unwrap();

        assert_eq!(mailer.messages().len(), 2);
        assert_eq!(
            mailer.last_to("a@x.com").map(|m| m.subject),
            Some("Password reset request".to_string())
        );
        assert!(mailer.last_to("b@x.com").is_none());
    }

    #[tokio::test]
    async fn test_log_mailer_succeeds() {
        let msg = verification_email("a@x.com", "alice", "http://x");
        assert!(LogMailer.send(&msg).await.is_ok());
    }
}
