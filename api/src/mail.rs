use axum::http::StatusCode;

use crate::{config::MailConfig, error::AppError};

/// Thin client for the transactional email HTTP API. The provider is an
/// opaque collaborator: it takes a recipient, a subject and an HTML body and
/// answers success or failure.
pub struct Mailer {
    http: reqwest::Client,
    config: MailConfig,
}

impl Mailer {
    pub fn new(http: reqwest::Client, config: MailConfig) -> Self {
        Mailer { http, config }
    }

    pub fn contact_recipient(&self) -> &str {
        &self.config.contact_recipient
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), AppError> {
        let res = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "from": self.config.from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(status = %res.status(), "mail API rejected the message");
            return Err((
                format!("Mail API returned {}", res.status()),
                StatusCode::BAD_GATEWAY,
            ))?;
        }

        Ok(())
    }
}
