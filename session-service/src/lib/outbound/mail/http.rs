use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::MailConfig;
use crate::domain::session::models::EmailAddress;
use crate::session::errors::MailerError;
use crate::session::ports::Mailer;

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: String,
}

/// Delivers temporary-token links through a JSON mail API.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
    verify_email_url: String,
    reset_password_url: String,
    link_ttl_minutes: i64,
}

impl HttpMailer {
    /// Create a mailer. `link_ttl_minutes` is only quoted in the message body.
    pub fn new(config: &MailConfig, link_ttl_minutes: i64) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        tracing::info!(api_url = %config.api_url, from = %config.from, "Mail client initialized");

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
            verify_email_url: config.verify_email_url.clone(),
            reset_password_url: config.reset_password_url.clone(),
            link_ttl_minutes,
        })
    }

    async fn send(&self, to: &EmailAddress, subject: &str, text: String) -> Result<(), MailerError> {
        let request = SendEmailRequest {
            from: &self.from,
            to: to.as_str(),
            subject,
            text,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MailerError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MailerError::Rejected(response.status().as_u16()));
        }

        tracing::debug!(subject = subject, "Mail accepted by provider");
        Ok(())
    }
}

fn link(base: &str, token: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), token)
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_email_verification(
        &self,
        to: &EmailAddress,
        name: &str,
        token: &str,
    ) -> Result<(), MailerError> {
        let text = format!(
            "Hi {},\n\nConfirm your email address by opening the link below. It expires in {} minutes.\n\n{}\n",
            name,
            self.link_ttl_minutes,
            link(&self.verify_email_url, token)
        );

        self.send(to, "Verify your email address", text).await
    }

    async fn send_password_reset(
        &self,
        to: &EmailAddress,
        name: &str,
        token: &str,
    ) -> Result<(), MailerError> {
        let text = format!(
            "Hi {},\n\nReset your password by opening the link below. It expires in {} minutes.\nIf you did not ask for this, ignore this email.\n\n{}\n",
            name,
            self.link_ttl_minutes,
            link(&self.reset_password_url, token)
        );

        self.send(to, "Reset your password", text).await
    }
}
