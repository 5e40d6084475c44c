//! Outbound mail.

use anyhow::Result;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction used for reset notifications.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to fail the request.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the envelope instead of sending real email.
/// The body is never logged since it carries reset links.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            "email send stub"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_accepts_messages() {
        let message = EmailMessage {
            to_email: "a@example.com".to_string(),
            subject: "hi".to_string(),
            body: "body".to_string(),
        };
        assert!(LogEmailSender.send(&message).is_ok());
    }
}
