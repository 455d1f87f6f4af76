//! Stripe client: Checkout Session creation and webhook signature
//! verification.
//!
//! Checkout is the only payment surface; we compute the billed total, hand
//! the customer to Stripe's hosted page, and treat the signed
//! `checkout.session.completed` webhook as the authoritative moment an
//! appointment becomes paid.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::{CircuitBreakerConfig, StripeConfig};
use crate::services::circuit::CircuitBreaker;

type HmacSha256 = Hmac<Sha256>;

/// Signed webhooks older than this are refused.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("payment service temporarily unavailable")]
    CircuitOpen,
    #[error("payment request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("payment service returned an unexpected response: {0}")]
    Api(String),
    #[error("webhook signature verification failed")]
    InvalidSignature,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Webhook envelope; `data.object` stays loose because we only read the
/// session id out of it.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

pub struct CheckoutParams {
    /// Cents, as Stripe expects.
    pub amount_cents: i64,
    pub product_name: String,
    pub customer_email: String,
    /// Unix timestamp after which the hosted payment page refuses payment.
    /// Must match the window the pending-appointment sweep uses, or a
    /// customer can pay for a slot the sweep already released.
    pub expires_at_unix: i64,
    /// Forwarded into session metadata, echoed back by the webhook.
    pub metadata: Vec<(String, String)>,
}

#[derive(Clone)]
pub struct StripeClient {
    base_url: String,
    secret_key: String,
    webhook_secret: String,
    success_url: String,
    cancel_url: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl StripeClient {
    pub fn from_config(config: &StripeConfig, breaker: &CircuitBreakerConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to create HTTP client"),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                breaker.failure_threshold,
                breaker.timeout_seconds,
            )),
        }
    }

    /// Creates a hosted Checkout Session; the caller redirects to its URL.
    pub async fn create_checkout_session(
        &self,
        params: CheckoutParams,
    ) -> Result<CheckoutSession, StripeError> {
        if !self.circuit_breaker.can_execute() {
            warn!("circuit breaker is open, refusing checkout request");
            return Err(StripeError::CircuitOpen);
        }

        // The Stripe API is form-encoded with bracketed nested keys.
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), self.success_url.clone()),
            ("cancel_url".into(), self.cancel_url.clone()),
            ("expires_at".into(), params.expires_at_unix.to_string()),
            ("customer_email".into(), params.customer_email),
            ("line_items[0][quantity]".into(), "1".into()),
            (
                "line_items[0][price_data][currency]".into(),
                "usd".into(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                params.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                params.product_name,
            ),
        ];
        for (key, value) in params.metadata {
            form.push((format!("metadata[{key}]"), value));
        }

        let operation = async {
            self.http_client
                .post(format!("{}/v1/checkout/sessions", self.base_url))
                .basic_auth(&self.secret_key, None::<&str>)
                .form(&form)
                .send()
                .await?
                .error_for_status()?
                .json::<CheckoutSession>()
                .await
        };

        match operation.await {
            Ok(session) => {
                self.circuit_breaker.record_success();
                Ok(session)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(StripeError::Transport(e))
            }
        }
    }

    /// Verifies a `Stripe-Signature` header against the raw payload and
    /// parses the event. Scheme: `v1 = HMAC-SHA256(secret, "{t}.{payload}")`
    /// with a bounded timestamp skew.
    pub fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
        now_unix: i64,
    ) -> Result<StripeEvent, StripeError> {
        let (timestamp, signature) = parse_signature_header(signature_header)
            .ok_or(StripeError::InvalidSignature)?;

        if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(StripeError::InvalidSignature);
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| StripeError::InvalidSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        let expected = decode_hex(&signature).ok_or(StripeError::InvalidSignature)?;
        // Constant-time comparison via the Mac trait.
        mac.verify_slice(&expected)
            .map_err(|_| StripeError::InvalidSignature)?;

        serde_json::from_slice(payload)
            .map_err(|e| StripeError::Api(format!("unparseable webhook payload: {e}")))
    }
}

fn parse_signature_header(header: &str) -> Option<(i64, String)> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signature = Some(value.to_string()),
            _ => {}
        }
    }
    Some((timestamp?, signature?))
}

// Byte-wise so a non-ASCII signature value is rejected, never sliced.
fn decode_hex(s: &str) -> Option<Vec<u8>> {
    let bytes = s.as_bytes();
    if bytes.len() % 2 != 0 {
        return None;
    }
    bytes
        .chunks_exact(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "whsec_test_secret";

    fn client(base_url: String) -> StripeClient {
        StripeClient::from_config(
            &StripeConfig {
                base_url,
                secret_key: "sk_test".to_string(),
                webhook_secret: SECRET.to_string(),
                success_url: "https://studio.example/success".to_string(),
                cancel_url: "https://studio.example/cancel".to_string(),
            },
            &CircuitBreakerConfig {
                failure_threshold: 5,
                timeout_seconds: 60,
            },
        )
    }

    fn sign(payload: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        let digest = mac.finalize().into_bytes();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("t={timestamp},v1={hex}")
    }

    const EVENT: &str = r#"{
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_test_123" } }
    }"#;

    #[test]
    fn well_signed_webhook_is_accepted() {
        let client = client("http://unused".to_string());
        let now = 1_750_000_000;
        let event = client
            .verify_webhook(EVENT.as_bytes(), &sign(EVENT, now), now)
            .unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.data.object["id"], "cs_test_123");
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let client = client("http://unused".to_string());
        let now = 1_750_000_000;
        let header = sign(EVENT, now);
        let tampered = EVENT.replace("cs_test_123", "cs_evil_999");
        let err = client
            .verify_webhook(tampered.as_bytes(), &header, now)
            .unwrap_err();
        assert!(matches!(err, StripeError::InvalidSignature));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let client = client("http://unused".to_string());
        let signed_at = 1_750_000_000;
        let err = client
            .verify_webhook(
                EVENT.as_bytes(),
                &sign(EVENT, signed_at),
                signed_at + SIGNATURE_TOLERANCE_SECS + 1,
            )
            .unwrap_err();
        assert!(matches!(err, StripeError::InvalidSignature));
    }

    #[test]
    fn malformed_header_is_rejected() {
        let client = client("http://unused".to_string());
        for header in ["", "t=abc,v1=00", "v1=00", "t=123"] {
            assert!(client
                .verify_webhook(EVENT.as_bytes(), header, 123)
                .is_err());
        }
    }

    #[test]
    fn non_ascii_signature_is_rejected_without_panicking() {
        let client = client("http://unused".to_string());
        for header in ["t=123,v1=éé", "t=123,v1=zz", "t=123,v1=0"] {
            let err = client
                .verify_webhook(EVENT.as_bytes(), header, 123)
                .unwrap_err();
            assert!(matches!(err, StripeError::InvalidSignature));
        }
    }

    #[tokio::test]
    async fn checkout_session_is_created_with_form_encoded_amount() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(body_string_contains("unit_amount"))
            .and(body_string_contains("70000"))
            .and(body_string_contains("expires_at=1750001800"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_test_123",
                "url": "https://checkout.stripe.com/pay/cs_test_123"
            })))
            .mount(&server)
            .await;

        let session = client(server.uri())
            .create_checkout_session(CheckoutParams {
                amount_cents: 70_000,
                product_name: "Studio A session".to_string(),
                customer_email: "ada@example.com".to_string(),
                expires_at_unix: 1_750_001_800,
                metadata: vec![("plan".to_string(), "general".to_string())],
            })
            .await
            .unwrap();
        assert_eq!(session.id, "cs_test_123");
        assert!(session.url.unwrap().contains("checkout.stripe.com"));
    }
}
