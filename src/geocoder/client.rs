use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{Geocoder, RawLocation};
use crate::config::{GeocoderConfig, RequestConfig};
use crate::error::{GeocodeError, GeocodeResult};

/// Client for the Nominatim `/search` endpoint.
///
/// Calls are rate limited per user agent: two requests carrying the same
/// agent are never issued closer than `min_delay_ms` apart.
pub struct NominatimClient {
    client: Client,
    base_url: String,
    timeout_secs: u64,
    min_delay: Duration,
    request_config: RequestConfig,
    last_call: Mutex<HashMap<String, Instant>>,
}

impl NominatimClient {
    /// Create a new Nominatim client
    pub fn new(config: &GeocoderConfig, request_config: RequestConfig) -> GeocodeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(GeocodeError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
            min_delay: Duration::from_millis(config.min_delay_ms),
            request_config,
            last_call: Mutex::new(HashMap::new()),
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Block until `user_agent` may issue its next request.
    async fn throttle(&self, user_agent: &str) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = last_call.get(user_agent) {
            let ready_at = *previous + self.min_delay;
            let now = Instant::now();
            if ready_at > now {
                debug!(
                    user_agent = %user_agent,
                    wait_ms = (ready_at - now).as_millis(),
                    "Rate limiting geocoder call"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
        last_call.insert(user_agent.to_string(), Instant::now());
    }

    /// Execute a single request (internal)
    async fn execute_request(
        &self,
        query: &str,
        user_agent: &str,
    ) -> GeocodeResult<Option<RawLocation>> {
        let url = format!("{}/search", self.base_url);

        debug!(user_agent = %user_agent, query = %query, "Calling Nominatim");

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, user_agent)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("addressdetails", "1"),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeocodeError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    GeocodeError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GeocodeError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let places: Vec<RawLocation> =
            response
                .json()
                .await
                .map_err(|e| GeocodeError::InvalidResponse {
                    message: format!("Failed to parse search response: {}", e),
                })?;

        Ok(places.into_iter().next())
    }
}

/// Largest doubling applied to the retry delay.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Delay before retry number `retry` (1-based): `base_ms * 2^(retry - 1)`,
/// with the exponent capped and the product saturating.
fn backoff_delay(base_ms: u64, retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    Duration::from_millis(base_ms.saturating_mul(1_u64 << exponent))
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn geocode(&self, query: &str, user_agent: &str) -> GeocodeResult<Option<RawLocation>> {
        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = backoff_delay(self.request_config.retry_delay_ms, retries);
                warn!(
                    user_agent = %user_agent,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying Nominatim request"
                );
                tokio::time::sleep(delay).await;
            }

            self.throttle(user_agent).await;
            let start = Instant::now();

            match self.execute_request(query, user_agent).await {
                Ok(place) => {
                    info!(
                        user_agent = %user_agent,
                        found = place.is_some(),
                        latency_ms = start.elapsed().as_millis(),
                        "Nominatim search completed"
                    );
                    return Ok(place);
                }
                Err(e @ GeocodeError::Timeout { .. }) => {
                    warn!(user_agent = %user_agent, query = %query, "Nominatim search timed out");
                    return Err(e);
                }
                Err(e) => {
                    error!(
                        user_agent = %user_agent,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Nominatim search failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(GeocodeError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_base_url() {
        let config = GeocoderConfig {
            base_url: "https://nominatim.example.org/".to_string(),
            ..GeocoderConfig::default()
        };

        let client = NominatimClient::new(&config, RequestConfig::default()).unwrap();
        assert_eq!(client.base_url(), "https://nominatim.example.org");
    }

    #[test]
    fn test_backoff_delay_doubles_then_caps() {
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(1000, 4), Duration::from_millis(8000));
        assert_eq!(backoff_delay(1000, 100), backoff_delay(1000, 17));
        assert_eq!(backoff_delay(u64::MAX, 3), Duration::from_millis(u64::MAX));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spaces_calls_per_agent() {
        let config = GeocoderConfig {
            min_delay_ms: 1000,
            ..GeocoderConfig::default()
        };
        let client = NominatimClient::new(&config, RequestConfig::default()).unwrap();

        let start = Instant::now();
        client.throttle("agent-a").await;
        client.throttle("agent-b").await;
        assert!(start.elapsed() < Duration::from_millis(1000));

        client.throttle("agent-a").await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
