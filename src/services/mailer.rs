//! Transactional email sender (Resend-style JSON API).
//!
//! Templates live in the `email_templates` table with `{{var}}`
//! placeholders; every send attempt is recorded in `email_logs`. Callers
//! treat delivery as best-effort: a failed confirmation email never rolls
//! back the booking it confirms.

use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::config::{CircuitBreakerConfig, EmailConfig};
use crate::services::circuit::CircuitBreaker;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("email service temporarily unavailable")]
    CircuitOpen,
    #[error("email request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email template '{0}' not found")]
    TemplateMissing(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct Mailer {
    base_url: String,
    api_key: String,
    from_address: String,
    pub admin_address: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    pool: PgPool,
}

/// Substitutes `{{name}}` placeholders. Unknown placeholders are left
/// untouched so a template typo is visible in the delivered mail.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

impl Mailer {
    pub fn from_config(config: &EmailConfig, breaker: &CircuitBreakerConfig, pool: PgPool) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
            admin_address: config.admin_address.clone(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to create HTTP client"),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                breaker.failure_threshold,
                breaker.timeout_seconds,
            )),
            pool,
        }
    }

    /// Sends one email and appends an `email_logs` row either way.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        appointment_id: Option<Uuid>,
    ) -> Result<(), MailerError> {
        let result = self.deliver(to, subject, html).await;

        let (status, error) = match &result {
            Ok(()) => ("sent", None),
            Err(e) => ("failed", Some(e.to_string())),
        };
        if let Err(e) = sqlx::query(
            "INSERT INTO email_logs (recipient, subject, status, error, appointment_id)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(to)
        .bind(subject)
        .bind(status)
        .bind(error)
        .bind(appointment_id)
        .execute(&self.pool)
        .await
        {
            warn!("failed to record email log entry: {:?}", e);
        }

        result
    }

    /// Renders a stored template and sends it.
    pub async fn send_template(
        &self,
        template_name: &str,
        to: &str,
        vars: &[(&str, &str)],
        appointment_id: Option<Uuid>,
    ) -> Result<(), MailerError> {
        let template: Option<(String, String)> =
            sqlx::query_as("SELECT subject, html FROM email_templates WHERE name = $1")
                .bind(template_name)
                .fetch_optional(&self.pool)
                .await?;

        let (subject, html) = template
            .ok_or_else(|| MailerError::TemplateMissing(template_name.to_string()))?;

        self.send(
            to,
            &render_template(&subject, vars),
            &render_template(&html, vars),
            appointment_id,
        )
        .await
    }

    async fn deliver(&self, to: &str, subject: &str, html: &str) -> Result<(), MailerError> {
        if !self.circuit_breaker.can_execute() {
            warn!("circuit breaker is open, refusing email request");
            return Err(MailerError::CircuitOpen);
        }

        let body = json!({
            "from": self.from_address,
            "to": [to],
            "subject": subject,
            "html": html,
        });

        let operation = async {
            self.http_client
                .post(format!("{}/emails", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?
                .error_for_status()
                .map(|_| ())
        };

        match operation.await {
            Ok(()) => {
                self.circuit_breaker.record_success();
                Ok(())
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(MailerError::Transport(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_substituted() {
        let html = "Hi {{name}}, your session on {{date}} is confirmed.";
        let rendered = render_template(html, &[("name", "Ada"), ("date", "2025-07-14")]);
        assert_eq!(rendered, "Hi Ada, your session on 2025-07-14 is confirmed.");
    }

    #[test]
    fn unknown_placeholders_stay_visible() {
        let rendered = render_template("Hello {{name}}", &[("date", "2025-07-14")]);
        assert_eq!(rendered, "Hello {{name}}");
    }
}
