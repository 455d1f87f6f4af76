//! Client for the Square scheduling API.
//!
//! Three calls back the booking flow: listing bookable services from the
//! catalog, searching slot availability, and creating the external booking
//! at wizard confirmation. Every network call goes through the circuit
//! breaker so a dead scheduling API fails fast instead of hanging checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{CircuitBreakerConfig, SquareConfig};
use crate::services::circuit::{CircuitBreaker, CircuitState};

#[derive(Debug, Error)]
pub enum SquareError {
    #[error("scheduling service temporarily unavailable")]
    CircuitOpen,
    #[error("scheduling request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("scheduling service returned an unexpected response: {0}")]
    Api(String),
}

/// One bookable service variation, flattened from the Square catalog.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceVariation {
    pub location_id: String,
    pub variation_id: String,
    pub name: String,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ServiceCatalog {
    pub services: Vec<ServiceVariation>,
    pub team_member_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Availability {
    pub start_at: DateTime<Utc>,
}

// --- Catalog response shapes (only the fields we read) ---

#[derive(Debug, Deserialize)]
struct CatalogListResponse {
    #[serde(default)]
    objects: Vec<CatalogObject>,
}

#[derive(Debug, Deserialize)]
struct CatalogObject {
    #[serde(rename = "type")]
    object_type: String,
    item_data: Option<CatalogItemData>,
}

#[derive(Debug, Deserialize)]
struct CatalogItemData {
    name: String,
    #[serde(default)]
    variations: Vec<CatalogVariation>,
}

#[derive(Debug, Deserialize)]
struct CatalogVariation {
    id: String,
    item_variation_data: Option<CatalogVariationData>,
}

#[derive(Debug, Deserialize)]
struct CatalogVariationData {
    /// Milliseconds, per the Square API.
    service_duration: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    availabilities: Vec<Availability>,
}

#[derive(Debug, Deserialize)]
struct BookingResponse {
    booking: Option<BookingObject>,
}

#[derive(Debug, Deserialize)]
struct BookingObject {
    id: String,
}

#[derive(Clone)]
pub struct SquareClient {
    base_url: String,
    access_token: String,
    pub location_id: String,
    pub team_member_id: String,
    pub service_variation_id: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl SquareClient {
    pub fn from_config(config: &SquareConfig, breaker: &CircuitBreakerConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            access_token: config.access_token.clone(),
            location_id: config.location_id.clone(),
            team_member_id: config.team_member_id.clone(),
            service_variation_id: config.service_variation_id.clone(),
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

    /// Runs one gateway operation through the circuit breaker.
    async fn execute<F, T>(&self, operation: F) -> Result<T, SquareError>
    where
        F: std::future::Future<Output = Result<T, reqwest::Error>>,
    {
        if !self.circuit_breaker.can_execute() {
            warn!("circuit breaker is open, refusing scheduling request");
            return Err(SquareError::CircuitOpen);
        }
        match operation.await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(SquareError::Transport(e))
            }
        }
    }

    /// Flattens the booking catalog into the service list the wizard shows.
    pub async fn list_services(&self) -> Result<ServiceCatalog, SquareError> {
        let url = format!("{}/v2/catalog/list?types=ITEM", self.base_url);
        let operation = async {
            self.http_client
                .get(&url)
                .bearer_auth(&self.access_token)
                .send()
                .await?
                .error_for_status()?
                .json::<CatalogListResponse>()
                .await
        };
        let response = self.execute(operation).await?;

        let mut services = Vec::new();
        for object in response.objects {
            if object.object_type != "ITEM" {
                continue;
            }
            let Some(item) = object.item_data else { continue };
            for variation in item.variations {
                services.push(ServiceVariation {
                    location_id: self.location_id.clone(),
                    variation_id: variation.id,
                    name: item.name.clone(),
                    duration_minutes: variation
                        .item_variation_data
                        .and_then(|d| d.service_duration)
                        .map(|ms| ms / 60_000),
                });
            }
        }

        Ok(ServiceCatalog {
            services,
            team_member_id: self.team_member_id.clone(),
        })
    }

    /// Searches bookable start times in `[start_at, end_at)` for a service.
    pub async fn search_availability(
        &self,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        service_variation_id: &str,
    ) -> Result<Vec<Availability>, SquareError> {
        let url = format!("{}/v2/bookings/availability/search", self.base_url);
        let body = json!({
            "query": {
                "filter": {
                    "start_at_range": {
                        "start_at": start_at.to_rfc3339(),
                        "end_at": end_at.to_rfc3339(),
                    },
                    "location_id": self.location_id,
                    "segment_filters": [
                        { "service_variation_id": service_variation_id }
                    ]
                }
            }
        });

        let operation = async {
            self.http_client
                .post(&url)
                .bearer_auth(&self.access_token)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json::<AvailabilityResponse>()
                .await
        };
        let response = self.execute(operation).await?;
        Ok(response.availabilities)
    }

    /// Creates the external booking and returns its Square id.
    ///
    /// There is no idempotency key on this call: a client retry after a
    /// transient failure can create a duplicate external booking. Inherited
    /// behavior, kept as-is; the local slot exclusion still holds.
    pub async fn create_booking(
        &self,
        customer_name: &str,
        customer_email: &str,
        start_at: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<String, SquareError> {
        let url = format!("{}/v2/bookings", self.base_url);
        let body = json!({
            "booking": {
                "start_at": start_at.to_rfc3339(),
                "location_id": self.location_id,
                "customer_note": format!("{} <{}>", customer_name, customer_email),
                "appointment_segments": [{
                    "duration_minutes": duration_minutes,
                    "service_variation_id": self.service_variation_id,
                    "service_variation_version": 1,
                    "team_member_id": self.team_member_id,
                }]
            }
        });

        let operation = async {
            self.http_client
                .post(&url)
                .bearer_auth(&self.access_token)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json::<BookingResponse>()
                .await
        };
        let response = self.execute(operation).await?;

        let booking = response
            .booking
            .ok_or_else(|| SquareError::Api("booking missing from response".to_string()))?;
        info!("created external booking {}", booking.id);
        Ok(booking.id)
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: String, threshold: u32) -> SquareClient {
        SquareClient::from_config(
            &SquareConfig {
                base_url,
                access_token: "test-token".to_string(),
                location_id: "LOC1".to_string(),
                team_member_id: "TM1".to_string(),
                service_variation_id: "VAR1".to_string(),
            },
            &CircuitBreakerConfig {
                failure_threshold: threshold,
                timeout_seconds: 60,
            },
        )
    }

    #[tokio::test]
    async fn availability_search_parses_start_times() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bookings/availability/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "availabilities": [
                    { "start_at": "2025-07-14T10:00:00Z" },
                    { "start_at": "2025-07-14T11:00:00Z" }
                ]
            })))
            .mount(&server)
            .await;

        let client = client(server.uri(), 5);
        let start = "2025-07-14T00:00:00Z".parse().unwrap();
        let end = "2025-07-15T00:00:00Z".parse().unwrap();
        let slots = client.search_availability(start, end, "VAR1").await.unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start_at.to_rfc3339(), "2025-07-14T10:00:00+00:00");
    }

    #[tokio::test]
    async fn catalog_flattens_item_variations() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/catalog/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "objects": [{
                    "type": "ITEM",
                    "item_data": {
                        "name": "Podcast Session",
                        "variations": [{
                            "id": "VAR1",
                            "item_variation_data": { "service_duration": 3600000 }
                        }]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let catalog = client(server.uri(), 5).list_services().await.unwrap();
        assert_eq!(catalog.team_member_id, "TM1");
        assert_eq!(catalog.services.len(), 1);
        assert_eq!(catalog.services[0].name, "Podcast Session");
        assert_eq!(catalog.services[0].duration_minutes, Some(60));
        assert_eq!(catalog.services[0].location_id, "LOC1");
    }

    #[tokio::test]
    async fn repeated_failures_trip_the_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bookings"))
            .respond_with(ResponseTemplate::new(500))
            // The third call must be refused locally.
            .expect(2)
            .mount(&server)
            .await;

        let client = client(server.uri(), 2);
        let start = "2025-07-14T10:00:00Z".parse().unwrap();
        for _ in 0..2 {
            let err = client
                .create_booking("Ada", "ada@example.com", start, 60)
                .await
                .unwrap_err();
            assert!(matches!(err, SquareError::Transport(_)));
        }
        let err = client
            .create_booking("Ada", "ada@example.com", start, 60)
            .await
            .unwrap_err();
        assert!(matches!(err, SquareError::CircuitOpen));
    }
}
