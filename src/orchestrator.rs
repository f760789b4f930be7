//! Query orchestration: the entry point that turns one validated
//! request into upstream parameters, a fetch, and a normalized result.
//!
//! Each invocation is self-contained. The resolver and catalog are
//! read-only after construction, so a single service instance can serve
//! concurrent queries without synchronization.

use crate::catalog::{self, EndpointSpec, ForecastHorizon, QueryType, ResponseShape};
use crate::client::CwaClient;
use crate::config::CwaConfig;
use crate::locations::{fold_variants, LocationResolver, Resolution};
use crate::normalize::{normalize, NormalizedRecord};
use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Inclusive time window a forecast query should be narrowed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// One logical weather query as received from the tool boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Which of the four dataset families to query
    pub query_type: QueryType,
    /// Forecast product horizon; ignored for non-forecast queries
    #[serde(default)]
    pub forecast_horizon: ForecastHorizon,
    /// Place-name filter; empty means "all locations"
    #[serde(default)]
    pub location: Vec<String>,
    /// Element-name filter; empty means "all elements"
    #[serde(default)]
    pub element: Vec<String>,
    /// Optional validity-window narrowing, honored where the endpoint
    /// supports it
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
}

impl QueryRequest {
    /// A bare query for one dataset family with no filters
    #[must_use]
    pub fn new(query_type: QueryType) -> Self {
        Self {
            query_type,
            forecast_horizon: ForecastHorizon::default(),
            location: Vec::new(),
            element: Vec::new(),
            time_window: None,
        }
    }
}

/// Result of one executed query
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Normalized records in upstream order
    pub records: Vec<NormalizedRecord>,
    /// Place names that resolved to nothing; advisory, the query still
    /// ran against the names that did resolve
    pub unmatched_locations: Vec<String>,
}

/// The weather query service: resolver, catalog and client wired together
#[derive(Debug)]
pub struct WeatherService {
    client: CwaClient,
    resolver: LocationResolver,
}

impl WeatherService {
    /// Build the service from configuration
    pub fn new(config: &CwaConfig) -> Result<Self> {
        Ok(Self {
            client: CwaClient::new(config)?,
            resolver: LocationResolver::new(),
        })
    }

    /// Build the service against a non-default upstream URL (tests)
    pub fn with_base_url(config: &CwaConfig, base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: CwaClient::with_base_url(config, base_url)?,
            resolver: LocationResolver::new(),
        })
    }

    /// Execute one query end to end.
    ///
    /// Location names are resolved before anything touches the network;
    /// a filter where every name misses fails with
    /// [`Error::NoMatchingLocation`] without issuing a request. Names
    /// that miss alongside ones that match are carried on the result as
    /// advisory context instead of failing the query. An upstream
    /// [`Error::EmptyPayload`] is a zero-match result, not a failure.
    pub async fn execute(&self, request: &QueryRequest) -> Result<QueryResult> {
        let spec = match request.query_type {
            QueryType::Forecast => catalog::lookup_forecast(request.forecast_horizon),
            other => catalog::lookup(other),
        };

        let resolution = self.resolver.resolve(&request.location);
        if !request.location.is_empty() && resolution.matched.is_empty() {
            warn!(
                query_type = %request.query_type,
                names = ?request.location,
                "every supplied location failed to resolve"
            );
            return Err(Error::NoMatchingLocation {
                names: request.location.clone(),
            });
        }
        if !resolution.unmatched.is_empty() {
            warn!(
                query_type = %request.query_type,
                unmatched = ?resolution.unmatched,
                "proceeding without unresolved locations"
            );
        }

        let params = build_params(spec, request, &resolution);

        let records = match self.client.fetch(spec, &params).await {
            Ok(raw) => normalize(&raw)?,
            Err(Error::EmptyPayload) => Vec::new(),
            Err(e) => return Err(e),
        };

        // Station datasets cannot be narrowed by county upstream, so
        // the location and element filters apply here instead.
        let records = match spec.response_shape {
            ResponseShape::Observation | ResponseShape::Rainfall => {
                filter_station_records(records, &resolution, &request.element)
            }
            ResponseShape::Forecast | ResponseShape::WeekForecast | ResponseShape::Warning => {
                records
            }
        };

        info!(
            query_type = %request.query_type,
            dataset = spec.dataset_code,
            records = records.len(),
            unmatched = resolution.unmatched.len(),
            "query completed"
        );

        Ok(QueryResult {
            records,
            unmatched_locations: resolution.unmatched,
        })
    }
}

/// Translate the request into the endpoint's own parameter vocabulary.
/// Only parameters the endpoint accepts are emitted.
fn build_params(
    spec: &EndpointSpec,
    request: &QueryRequest,
    resolution: &Resolution,
) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();

    if spec.accepts_param("locationName") && !resolution.matched.is_empty() {
        let names: Vec<&str> = resolution
            .matched
            .iter()
            .map(|r| r.canonical_name)
            .collect();
        params.insert("locationName".to_string(), names.join(","));
    }

    if !request.element.is_empty() {
        let joined = request.element.join(",");
        if spec.accepts_param("elementName") {
            params.insert("elementName".to_string(), joined);
        } else if spec.accepts_param("WeatherElement") {
            params.insert("WeatherElement".to_string(), joined);
        } else if spec.accepts_param("phenomena") {
            // Warnings filter by hazard type under the phenomena key
            params.insert("phenomena".to_string(), joined);
        }
    }

    // Forecast periods come back time-ordered when sort is requested
    if matches!(
        spec.response_shape,
        ResponseShape::Forecast | ResponseShape::WeekForecast
    ) {
        params.insert("sort".to_string(), "time".to_string());
    }

    if let Some(window) = &request.time_window {
        let fmt = |t: &NaiveDateTime| t.format("%Y-%m-%dT%H:%M:%S").to_string();
        if spec.accepts_param("timeFrom") {
            params.insert("timeFrom".to_string(), fmt(&window.start));
            params.insert("timeTo".to_string(), fmt(&window.end));
        } else if spec.accepts_param("startTime") {
            params.insert("startTime".to_string(), fmt(&window.start));
        }
    }

    params
}

/// Post-normalization narrowing for the station-shaped datasets:
/// keep stations inside the resolved counties and, when an element
/// filter was supplied, only the named elements.
fn filter_station_records(
    records: Vec<NormalizedRecord>,
    resolution: &Resolution,
    elements: &[String],
) -> Vec<NormalizedRecord> {
    let counties: HashSet<&str> = resolution
        .matched
        .iter()
        .map(|r| r.canonical_name)
        .collect();
    let wanted: HashSet<String> = elements.iter().map(|e| e.trim().to_string()).collect();

    records
        .into_iter()
        .filter(|record| {
            if counties.is_empty() {
                return true;
            }
            record
                .metadata
                .get("county_name")
                .is_some_and(|county| counties.contains(fold_variants(county).as_str()))
        })
        .filter(|record| wanted.is_empty() || wanted.contains(&record.element))
        .collect()
}
