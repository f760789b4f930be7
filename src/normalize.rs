//! Normalization of the upstream response shapes into one uniform
//! record contract.
//!
//! Each normalizer is a pure single-pass transform from the raw
//! `records` subtree to a flat sequence of [`NormalizedRecord`]s.
//! Structural fields a shape depends on are hard requirements: their
//! absence is a [`MalformedResponse`](crate::Error::MalformedResponse),
//! never silently defaulted, since a quietly dropped validity window or
//! station block masks an upstream schema change.

use crate::catalog::ResponseShape;
use crate::client::UpstreamResponse;
use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Readings CWA reports as `-99` / `-990` mean "instrument has no data"
const SENTINEL_VALUES: &[f64] = &[-99.0, -990.0];

/// One uniform output record: a single (location, element, period) cell
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedRecord {
    /// Location or station the value applies to
    pub location: String,
    /// Weather element name, e.g. `Wx`, `MinT`, `Precipitation`
    pub element: String,
    /// Element value; `null` when upstream reported a missing reading
    pub value: Value,
    /// Start of the validity window (observation time for readings)
    pub start_time: NaiveDateTime,
    /// End of the validity window (equals `start_time` for readings)
    pub end_time: NaiveDateTime,
    /// Optional geo info, units, and other per-record annotations
    pub metadata: BTreeMap<String, String>,
}

/// Dispatch the payload to the normalizer matching its tagged shape
pub fn normalize(raw: &UpstreamResponse) -> Result<Vec<NormalizedRecord>> {
    match raw.shape {
        ResponseShape::Forecast => normalize_forecast(&raw.records),
        ResponseShape::WeekForecast => normalize_week_forecast(&raw.records),
        ResponseShape::Warning => normalize_warning(&raw.records),
        ResponseShape::Observation => normalize_observation(&raw.records),
        ResponseShape::Rainfall => normalize_rainfall(&raw.records),
    }
}

/// Flatten the per-location, per-element, per-period forecast nesting
/// into one record per (location, element, period).
pub fn normalize_forecast(records: &Value) -> Result<Vec<NormalizedRecord>> {
    let locations = array_field(records, "location", "forecast records")?;
    let mut out = Vec::new();

    for location in locations {
        let location_name = str_field(location, "locationName", "forecast location")?;
        let elements = array_field(location, "weatherElement", "forecast location")?;

        for element in elements {
            let element_name = str_field(element, "elementName", "forecast element")?;
            let periods = array_field(element, "time", "forecast element")?;

            for period in periods {
                let start_time = time_field(period, "startTime", "forecast period")?;
                let end_time = time_field(period, "endTime", "forecast period")?;
                let parameter = period
                    .get("parameter")
                    .and_then(Value::as_object)
                    .ok_or_else(|| malformed("forecast period", "parameter"))?;

                let value = parameter.get("parameterName").cloned().unwrap_or(Value::Null);

                let mut metadata = BTreeMap::new();
                for key in ["parameterValue", "parameterUnit"] {
                    if let Some(text) = parameter.get(key).and_then(scalar_to_string) {
                        metadata.insert(key.to_string(), text);
                    }
                }

                out.push(NormalizedRecord {
                    location: location_name.to_string(),
                    element: element_name.to_string(),
                    value: scrub_sentinel(&value),
                    start_time,
                    end_time,
                    metadata,
                });
            }
        }
    }

    Ok(out)
}

/// Flatten the 7-day forecast nesting. Unlike the 36-hour product the
/// locations sit one level deeper (`Locations[].Location[]`), field
/// names are capitalized, and each period carries an `ElementValue`
/// array instead of a `parameter` object. Instantaneous elements use a
/// single `DataTime` in place of a start/end pair.
pub fn normalize_week_forecast(records: &Value) -> Result<Vec<NormalizedRecord>> {
    let groups = array_field(records, "Locations", "week forecast records")?;
    let mut out = Vec::new();

    for group in groups {
        let locations = array_field(group, "Location", "week forecast group")?;

        for location in locations {
            let location_name = str_field(location, "LocationName", "week forecast location")?;
            let elements = array_field(location, "WeatherElement", "week forecast location")?;

            for element in elements {
                let element_name = str_field(element, "ElementName", "week forecast element")?;
                let periods = array_field(element, "Time", "week forecast element")?;

                for period in periods {
                    let (start_time, end_time) = if period.get("DataTime").is_some() {
                        let t = time_field(period, "DataTime", "week forecast period")?;
                        (t, t)
                    } else {
                        (
                            time_field(period, "StartTime", "week forecast period")?,
                            time_field(period, "EndTime", "week forecast period")?,
                        )
                    };

                    let values = array_field(period, "ElementValue", "week forecast period")?;
                    let entry = values
                        .first()
                        .and_then(Value::as_object)
                        .ok_or_else(|| malformed("week forecast period", "ElementValue"))?;

                    // A single-member entry is the value itself; keep
                    // multi-member entries (e.g. wind speed plus its
                    // Beaufort scale) whole rather than guessing.
                    let value = if entry.len() == 1 {
                        entry.values().next().map(scrub_sentinel).unwrap_or(Value::Null)
                    } else {
                        Value::Object(entry.clone())
                    };

                    out.push(NormalizedRecord {
                        location: location_name.to_string(),
                        element: element_name.to_string(),
                        value,
                        start_time,
                        end_time,
                        metadata: BTreeMap::new(),
                    });
                }
            }
        }
    }

    Ok(out)
}

/// Extract active hazards per location. Validity bounds must come from
/// the hazard's own `validTime`; a hazard without them is malformed.
pub fn normalize_warning(records: &Value) -> Result<Vec<NormalizedRecord>> {
    let locations = array_field(records, "location", "warning records")?;
    let mut out = Vec::new();

    for location in locations {
        let location_name = str_field(location, "locationName", "warning location")?;

        // A location with no hazardConditions simply has no active warnings
        let Some(hazards) = location
            .pointer("/hazardConditions/hazards")
            .and_then(Value::as_array)
        else {
            continue;
        };

        for hazard in hazards {
            let phenomena = hazard
                .pointer("/info/phenomena")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("warning hazard", "info.phenomena"))?;

            let valid_time = hazard
                .get("validTime")
                .ok_or_else(|| malformed("warning hazard", "validTime"))?;
            let start_time = time_field(valid_time, "startTime", "warning validTime")?;
            let end_time = time_field(valid_time, "endTime", "warning validTime")?;
            if start_time > end_time {
                return Err(Error::MalformedResponse(format!(
                    "warning validity window is inverted: {start_time} > {end_time}"
                )));
            }

            let value = hazard
                .pointer("/info/significance")
                .cloned()
                .unwrap_or(Value::Null);

            out.push(NormalizedRecord {
                location: location_name.to_string(),
                element: phenomena.to_string(),
                value,
                start_time,
                end_time,
                metadata: BTreeMap::new(),
            });
        }
    }

    Ok(out)
}

/// Flatten per-station scalar readings into one record per
/// (station, element), embedding geo info into metadata.
pub fn normalize_observation(records: &Value) -> Result<Vec<NormalizedRecord>> {
    let stations = array_field(records, "Station", "observation records")?;
    let mut out = Vec::new();

    for station in stations {
        let station_name = str_field(station, "StationName", "observation station")?;
        let obs_time = station
            .pointer("/ObsTime/DateTime")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("observation station", "ObsTime.DateTime"))?;
        let obs_time = parse_time(obs_time, "observation ObsTime")?;

        let metadata = station_metadata(station);
        let elements = station
            .get("WeatherElement")
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("observation station", "WeatherElement"))?;

        for (name, reading) in elements {
            let value = match reading {
                // Instantaneous precipitation is nested one level down
                Value::Object(inner) if name == "Now" => {
                    match inner.get("Precipitation") {
                        Some(v) => scrub_sentinel(v),
                        None => continue,
                    }
                }
                Value::Object(_) | Value::Array(_) => {
                    debug!(element = %name, "skipping non-scalar observation element");
                    continue;
                }
                scalar => scrub_sentinel(scalar),
            };
            let element = if name == "Now" { "Precipitation" } else { name };

            out.push(NormalizedRecord {
                location: station_name.to_string(),
                element: element.to_string(),
                value,
                start_time: obs_time,
                end_time: obs_time,
                metadata: metadata.clone(),
            });
        }
    }

    Ok(out)
}

/// Rain-gauge variant of the observation shape: one record per
/// (station, accumulation window). An absent location filter upstream
/// means every station is present here, and all of them are returned.
pub fn normalize_rainfall(records: &Value) -> Result<Vec<NormalizedRecord>> {
    let stations = array_field(records, "Station", "rainfall records")?;
    let mut out = Vec::new();

    for station in stations {
        let station_name = str_field(station, "StationName", "rainfall station")?;
        let obs_time = station
            .pointer("/ObsTime/DateTime")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("rainfall station", "ObsTime.DateTime"))?;
        let obs_time = parse_time(obs_time, "rainfall ObsTime")?;

        let metadata = station_metadata(station);
        let elements = station
            .get("RainfallElement")
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("rainfall station", "RainfallElement"))?;

        for (name, reading) in elements {
            let value = match reading {
                Value::Object(inner) => match inner.get("Precipitation") {
                    Some(v) => scrub_sentinel(v),
                    None => continue,
                },
                Value::Array(_) => continue,
                scalar => scrub_sentinel(scalar),
            };

            out.push(NormalizedRecord {
                location: station_name.to_string(),
                element: name.to_string(),
                value,
                start_time: obs_time,
                end_time: obs_time,
                metadata: metadata.clone(),
            });
        }
    }

    Ok(out)
}

/// Pull station identity and geo info into record metadata
fn station_metadata(station: &Value) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();

    if let Some(id) = station.get("StationId").and_then(scalar_to_string) {
        metadata.insert("station_id".to_string(), id);
    }

    if let Some(geo) = station.get("GeoInfo") {
        for (key, field) in [
            ("county_name", "CountyName"),
            ("town_name", "TownName"),
            ("altitude", "StationAltitude"),
        ] {
            if let Some(text) = geo.get(field).and_then(scalar_to_string) {
                metadata.insert(key.to_string(), text);
            }
        }

        // Prefer WGS84 coordinates when several datums are reported
        if let Some(coords) = geo.get("Coordinates").and_then(Value::as_array) {
            let preferred = coords
                .iter()
                .find(|c| {
                    c.get("CoordinateName").and_then(Value::as_str) == Some("WGS84")
                })
                .or_else(|| coords.first());
            if let Some(coord) = preferred {
                for (key, field) in [
                    ("latitude", "StationLatitude"),
                    ("longitude", "StationLongitude"),
                ] {
                    if let Some(text) = coord.get(field).and_then(scalar_to_string) {
                        metadata.insert(key.to_string(), text);
                    }
                }
            }
        }
    }

    metadata
}

/// Replace CWA's missing-reading sentinels with an explicit null
fn scrub_sentinel(value: &Value) -> Value {
    match value {
        Value::Number(n) => {
            if n.as_f64().is_some_and(|f| SENTINEL_VALUES.contains(&f)) {
                Value::Null
            } else {
                value.clone()
            }
        }
        Value::String(s) => {
            if s.parse::<f64>().is_ok_and(|f| SENTINEL_VALUES.contains(&f)) {
                Value::Null
            } else {
                value.clone()
            }
        }
        _ => value.clone(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// CWA reports Taiwan local time, either space-separated or RFC 3339
fn parse_time(text: &str, context: &str) -> Result<NaiveDateTime> {
    if let Ok(t) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(t);
    }
    if let Ok(t) = chrono::DateTime::parse_from_rfc3339(text) {
        return Ok(t.naive_local());
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Ok(t);
    }
    Err(Error::MalformedResponse(format!(
        "{context}: unparseable timestamp '{text}'"
    )))
}

fn time_field(value: &Value, key: &str, context: &str) -> Result<NaiveDateTime> {
    let text = value
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(context, key))?;
    parse_time(text, context)
}

fn str_field<'a>(value: &'a Value, key: &str, context: &str) -> Result<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(context, key))
}

fn array_field<'a>(value: &'a Value, key: &str, context: &str) -> Result<&'a Vec<Value>> {
    value
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(context, key))
}

fn malformed(context: &str, field: &str) -> Error {
    Error::MalformedResponse(format!("{context}: missing '{field}'"))
}
