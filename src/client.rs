//! HTTP client for the CWA open-data datastore API
//!
//! Issues authenticated GET requests against the dataset endpoint the
//! catalog selected, with bounded retry and exponential backoff for
//! transient faults. The client holds no state across calls beyond the
//! connection pool.

use crate::catalog::{EndpointSpec, ResponseShape};
use crate::config::CwaConfig;
use crate::{Error, Result};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Raw structured payload from one upstream call, tagged with the shape
/// the normalizer should interpret it as. Lives only for the duration
/// of a single query.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// Structural family of the payload
    pub shape: ResponseShape,
    /// The `records` subtree of the upstream envelope
    pub records: Value,
}

/// Client for the CWA open-data datastore endpoints
#[derive(Debug, Clone)]
pub struct CwaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    backoff: Duration,
}

impl CwaClient {
    /// Create a new client from configuration.
    ///
    /// The credential is required up front; an absent key fails with
    /// [`Error::AuthError`] before any request is issued.
    pub fn new(config: &CwaConfig) -> Result<Self> {
        let base_url = config.upstream.base_url.trim_end_matches('/').to_string();
        Self::build(config, base_url)
    }

    /// Create a client pointed at a non-default base URL (tests)
    pub fn with_base_url(config: &CwaConfig, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self::build(config, base_url)
    }

    fn build(config: &CwaConfig, base_url: String) -> Result<Self> {
        let api_key = match &config.upstream.api_key {
            Some(key) if !key.is_empty() => key.clone(),
            _ => {
                error!("CWA API key is absent; refusing to construct client");
                return Err(Error::AuthError);
            }
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream.timeout_seconds.into()))
            .user_agent(concat!("cwa-weather/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        info!(
            api_key_prefix = %mask_key(&api_key),
            base_url = %base_url,
            "initialized CWA API client"
        );

        Ok(Self {
            http,
            base_url,
            api_key,
            max_retries: config.upstream.max_retries,
            backoff: Duration::from_millis(config.upstream.retry_backoff_ms),
        })
    }

    /// Fetch one dataset, retrying transient faults.
    ///
    /// Required parameters are checked before any network call. Up to
    /// `max_retries` retries with exponential backoff are applied on
    /// timeouts, connection failures, and 5xx statuses; 4xx statuses
    /// and credential rejections are surfaced immediately since
    /// retrying a caller error cannot succeed.
    pub async fn fetch(
        &self,
        spec: &EndpointSpec,
        params: &BTreeMap<String, String>,
    ) -> Result<UpstreamResponse> {
        for name in spec.required_params {
            if !params.contains_key(*name) {
                return Err(Error::MissingParameter(name));
            }
        }

        let mut query: Vec<(&str, &str)> =
            vec![("Authorization", self.api_key.as_str()), ("format", "JSON")];
        for (name, value) in params {
            if spec.accepts_param(name) {
                query.push((name.as_str(), value.as_str()));
            } else {
                debug!(param = %name, dataset = spec.dataset_code, "skipping unsupported parameter");
            }
        }

        let url = format!("{}/{}", self.base_url, spec.dataset_code);
        debug!(
            url = %url,
            api_key_prefix = %mask_key(&self.api_key),
            params = ?params,
            "issuing upstream request"
        );

        let mut attempt: u32 = 0;
        loop {
            let attempts = attempt + 1;
            let failure = match self.http.get(&url).query(&query).send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!(status = %status, attempt = attempts, "upstream response received");

                    if status.is_success() {
                        return self.decode(response, spec).await;
                    }
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        error!(status = %status, "upstream rejected the API credential");
                        return Err(Error::AuthError);
                    }
                    if status.is_client_error() {
                        warn!(status = %status, dataset = spec.dataset_code, "client error, not retrying");
                        return Err(Error::HttpError {
                            status: status.as_u16(),
                            attempts,
                        });
                    }
                    Error::HttpError {
                        status: status.as_u16(),
                        attempts,
                    }
                }
                Err(e) if e.is_timeout() => Error::Timeout { attempts },
                Err(e) if e.is_connect() => Error::Transport(e.to_string()),
                Err(e) => return Err(Error::Transport(e.to_string())),
            };

            if attempt >= self.max_retries {
                error!(
                    dataset = spec.dataset_code,
                    attempts, error = %failure,
                    "upstream request failed, retries exhausted"
                );
                return Err(failure);
            }

            attempt += 1;
            let backoff = self.backoff * 2u32.pow(attempt - 1);
            warn!(
                dataset = spec.dataset_code,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %failure,
                "transient upstream fault, retrying"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    /// Decode the upstream envelope and extract the `records` subtree
    async fn decode(
        &self,
        response: reqwest::Response,
        spec: &EndpointSpec,
    ) -> Result<UpstreamResponse> {
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("invalid JSON body: {e}")))?;

        // The envelope reports its own status alongside the HTTP one
        if let Some(success) = body.get("success") {
            let failed = matches!(success, Value::Bool(false))
                || matches!(success.as_str(), Some("false"));
            if failed {
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown upstream error");
                error!(dataset = spec.dataset_code, message, "upstream reported failure");
                return Err(Error::MalformedResponse(format!(
                    "upstream reported failure: {message}"
                )));
            }
        }

        let records = body
            .get("records")
            .cloned()
            .ok_or_else(|| Error::MalformedResponse("missing 'records' field".to_string()))?;

        let empty = match &records {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        };
        if empty {
            info!(dataset = spec.dataset_code, "upstream returned an empty record set");
            return Err(Error::EmptyPayload);
        }

        Ok(UpstreamResponse {
            shape: spec.response_shape,
            records,
        })
    }
}

/// Log only a short credential prefix, never the whole key
fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(8).collect();
    format!("{prefix}...")
}
