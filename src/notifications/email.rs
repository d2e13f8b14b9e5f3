//! Outbound email for one-time codes.
//!
//! Delivery failure is soft: the caller is told the send failed, but the
//! code it was carrying stays valid so the user can request redelivery.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

/// Service for sending one-time-code emails
pub struct OtpMailer {
    config: EmailConfig,
}

impl OtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Check if email sending is configured and enabled
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Send a one-time code to the given address
    pub async fn send_otp(&self, to_email: &str, code: &str) -> Result<()> {
        if !self.is_enabled() {
            anyhow::bail!("Email transport is not configured");
        }

        let subject = "Your Jobgate verification code";
        let body = format!(
            "Your verification code is: {code}\n\n\
             It expires in 15 minutes. If you did not request this code you \
             can ignore this email.\n"
        );
        self.send_email(to_email, subject, &body).await
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        // Build the from mailbox with name
        let from_mailbox = format!("{} <{}>", self.config.from_name, from_address);
        let from: Mailbox = from_mailbox.parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::debug!("Sent OTP email to {}", to_email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_config() {
        let mailer = OtpMailer::new(EmailConfig::default());
        assert!(!mailer.is_enabled());
    }

    #[tokio::test]
    async fn test_send_fails_fast_when_unconfigured() {
        let mailer = OtpMailer::new(EmailConfig::default());
        assert!(mailer.send_otp("user@example.com", "123456").await.is_err());
    }
}
