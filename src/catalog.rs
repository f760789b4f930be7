//! Endpoint catalog: the closed mapping from logical query type to the
//! upstream CWA dataset endpoint and its parameter schema.
//!
//! Each query kind owns one immutable [`EndpointSpec`] (forecasts one
//! per horizon), resolved through a total `match` rather than
//! string-keyed branching scattered across call sites.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical query kinds the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// 36-hour township/county forecast
    Forecast,
    /// Active weather warnings and advisories
    Warnings,
    /// Rain-gauge accumulation observations
    Rainfall,
    /// Surface weather station observations
    Observation,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryType::Forecast => "forecast",
            QueryType::Warnings => "warnings",
            QueryType::Rainfall => "rainfall",
            QueryType::Observation => "observation",
        };
        write!(f, "{name}")
    }
}

impl FromStr for QueryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forecast" => Ok(QueryType::Forecast),
            "warnings" => Ok(QueryType::Warnings),
            "rainfall" => Ok(QueryType::Rainfall),
            "observation" => Ok(QueryType::Observation),
            other => Err(Error::UnknownQueryType(other.to_string())),
        }
    }
}

/// Forecast product horizon: the 36-hour county forecast and the
/// 7-day forecast are separate upstream datasets with different shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ForecastHorizon {
    /// 36-hour county forecast (the default product)
    #[default]
    #[serde(rename = "36h")]
    ThirtySixHour,
    /// 7-day county forecast
    #[serde(rename = "7d")]
    SevenDay,
}

impl fmt::Display for ForecastHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ForecastHorizon::ThirtySixHour => "36h",
            ForecastHorizon::SevenDay => "7d",
        };
        write!(f, "{name}")
    }
}

/// Structural family of an upstream response payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Per-location, per-element, per-period nesting
    Forecast,
    /// 7-day variant: capitalized field names and `ElementValue` arrays
    WeekForecast,
    /// Per-location hazard list with validity windows
    Warning,
    /// Per-station scalar readings
    Observation,
    /// Per-station rainfall accumulations
    Rainfall,
}

/// Immutable descriptor of one upstream dataset endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointSpec {
    /// Upstream-assigned dataset identifier, e.g. `F-C0032-001`
    pub dataset_code: &'static str,
    /// Parameters the endpoint cannot be called without
    pub required_params: &'static [&'static str],
    /// Parameters the caller may supply to narrow the result
    pub optional_params: &'static [&'static str],
    /// Which normalizer interprets the payload
    pub response_shape: ResponseShape,
}

impl EndpointSpec {
    /// Whether the endpoint recognizes `name` as a query parameter
    #[must_use]
    pub fn accepts_param(&self, name: &str) -> bool {
        self.required_params.contains(&name) || self.optional_params.contains(&name)
    }
}

const FORECAST_SPEC: EndpointSpec = EndpointSpec {
    dataset_code: "F-C0032-001",
    required_params: &[],
    optional_params: &[
        "locationName",
        "elementName",
        "sort",
        "timeFrom",
        "timeTo",
        "limit",
        "offset",
    ],
    response_shape: ResponseShape::Forecast,
};

const WEEK_FORECAST_SPEC: EndpointSpec = EndpointSpec {
    dataset_code: "F-D0047-091",
    required_params: &[],
    optional_params: &[
        "locationName",
        "elementName",
        "sort",
        "timeFrom",
        "timeTo",
        "limit",
        "offset",
    ],
    response_shape: ResponseShape::WeekForecast,
};

const WARNINGS_SPEC: EndpointSpec = EndpointSpec {
    dataset_code: "W-C0033-001",
    required_params: &[],
    optional_params: &["locationName", "phenomena", "sort", "startTime", "limit", "offset"],
    response_shape: ResponseShape::Warning,
};

const RAINFALL_SPEC: EndpointSpec = EndpointSpec {
    dataset_code: "O-A0002-001",
    required_params: &[],
    optional_params: &["StationId", "StationName", "GeoInfo", "sort", "limit", "offset"],
    response_shape: ResponseShape::Rainfall,
};

const OBSERVATION_SPEC: EndpointSpec = EndpointSpec {
    dataset_code: "O-A0003-001",
    required_params: &[],
    optional_params: &[
        "StationId",
        "StationName",
        "WeatherElement",
        "GeoInfo",
        "sort",
        "limit",
        "offset",
    ],
    response_shape: ResponseShape::Observation,
};

/// Resolve a query type to its endpoint descriptor.
///
/// Total over [`QueryType`]; unrecognized kinds are rejected earlier,
/// at [`QueryType::from_str`], before any network call.
#[must_use]
pub fn lookup(query_type: QueryType) -> &'static EndpointSpec {
    match query_type {
        QueryType::Forecast => &FORECAST_SPEC,
        QueryType::Warnings => &WARNINGS_SPEC,
        QueryType::Rainfall => &RAINFALL_SPEC,
        QueryType::Observation => &OBSERVATION_SPEC,
    }
}

/// Resolve a forecast query to the endpoint for the requested horizon
#[must_use]
pub fn lookup_forecast(horizon: ForecastHorizon) -> &'static EndpointSpec {
    match horizon {
        ForecastHorizon::ThirtySixHour => &FORECAST_SPEC,
        ForecastHorizon::SevenDay => &WEEK_FORECAST_SPEC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("forecast", QueryType::Forecast)]
    #[case("Forecast", QueryType::Forecast)]
    #[case("WARNINGS", QueryType::Warnings)]
    #[case(" rainfall ", QueryType::Rainfall)]
    #[case("observation", QueryType::Observation)]
    fn test_query_type_parsing(#[case] input: &str, #[case] expected: QueryType) {
        assert_eq!(input.parse::<QueryType>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_query_type_rejected() {
        let err = "tides".parse::<QueryType>().unwrap_err();
        assert!(matches!(err, Error::UnknownQueryType(kind) if kind == "tides"));
    }

    #[rstest]
    #[case(QueryType::Forecast, "F-C0032-001", ResponseShape::Forecast)]
    #[case(QueryType::Warnings, "W-C0033-001", ResponseShape::Warning)]
    #[case(QueryType::Rainfall, "O-A0002-001", ResponseShape::Rainfall)]
    #[case(QueryType::Observation, "O-A0003-001", ResponseShape::Observation)]
    fn test_lookup_is_total(
        #[case] query_type: QueryType,
        #[case] dataset_code: &str,
        #[case] shape: ResponseShape,
    ) {
        let spec = lookup(query_type);
        assert_eq!(spec.dataset_code, dataset_code);
        assert_eq!(spec.response_shape, shape);
    }

    #[test]
    fn test_accepts_param() {
        let spec = lookup(QueryType::Forecast);
        assert!(spec.accepts_param("locationName"));
        assert!(spec.accepts_param("elementName"));
        assert!(!spec.accepts_param("StationId"));
    }

    #[test]
    fn test_forecast_horizon_selects_dataset() {
        let spec = lookup_forecast(ForecastHorizon::ThirtySixHour);
        assert_eq!(spec.dataset_code, "F-C0032-001");
        assert_eq!(spec, lookup(QueryType::Forecast));

        let spec = lookup_forecast(ForecastHorizon::SevenDay);
        assert_eq!(spec.dataset_code, "F-D0047-091");
        assert_eq!(spec.response_shape, ResponseShape::WeekForecast);
        assert!(spec.accepts_param("locationName"));
        assert!(spec.accepts_param("elementName"));
    }

    #[test]
    fn test_forecast_horizon_serde() {
        let parsed: ForecastHorizon = serde_json::from_str("\"7d\"").unwrap();
        assert_eq!(parsed, ForecastHorizon::SevenDay);
        assert_eq!(ForecastHorizon::default(), ForecastHorizon::ThirtySixHour);
        assert_eq!(
            serde_json::to_string(&ForecastHorizon::ThirtySixHour).unwrap(),
            "\"36h\""
        );
    }

    #[test]
    fn test_query_type_serde_roundtrip() {
        let parsed: QueryType = serde_json::from_str("\"forecast\"").unwrap();
        assert_eq!(parsed, QueryType::Forecast);
        assert_eq!(serde_json::to_string(&QueryType::Warnings).unwrap(), "\"warnings\"");
    }
}
