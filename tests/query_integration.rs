//! End-to-end query tests against a mocked CWA upstream

use cwa_weather::{CwaConfig, Error, ForecastHorizon, QueryRequest, QueryType, WeatherService};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> CwaConfig {
    let mut config = CwaConfig::default();
    config.upstream.api_key = Some("CWB-TEST-KEY-123456".to_string());
    config.upstream.timeout_seconds = 5;
    config.upstream.max_retries = 2;
    config.upstream.retry_backoff_ms = 10;
    config
}

fn envelope(records: Value) -> Value {
    json!({"success": "true", "records": records})
}

fn taipei_forecast_records() -> Value {
    let period = |start: &str, end: &str, name: &str| {
        json!({
            "startTime": start,
            "endTime": end,
            "parameter": {"parameterName": name}
        })
    };
    let element = |name: &str| {
        json!({
            "elementName": name,
            "time": [
                period("2026-08-23 12:00:00", "2026-08-23 18:00:00", "a"),
                period("2026-08-23 18:00:00", "2026-08-24 06:00:00", "b"),
                period("2026-08-24 06:00:00", "2026-08-24 18:00:00", "c"),
            ]
        })
    };
    json!({
        "location": [{
            "locationName": "臺北市",
            "weatherElement": [element("Wx"), element("MinT"), element("MaxT")]
        }]
    })
}

fn tainan_warning_records() -> Value {
    json!({
        "location": [{
            "locationName": "臺南市",
            "hazardConditions": {
                "hazards": [{
                    "info": {"phenomena": "大雨", "significance": "特報"},
                    "validTime": {
                        "startTime": "2026-08-23 10:00:00",
                        "endTime": "2026-08-23 22:00:00"
                    }
                }]
            }
        }]
    })
}

#[tokio::test]
async fn test_forecast_three_elements_three_periods() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/F-C0032-001"))
        .and(query_param("locationName", "臺北市"))
        .and(query_param("elementName", "Wx,MinT,MaxT"))
        .and(query_param("sort", "time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(taipei_forecast_records())))
        .expect(1)
        .mount(&server)
        .await;

    let service = WeatherService::with_base_url(&test_config(), server.uri()).unwrap();
    let mut request = QueryRequest::new(QueryType::Forecast);
    request.location = vec!["臺北市".to_string()];
    request.element = vec!["Wx".to_string(), "MinT".to_string(), "MaxT".to_string()];

    let result = service.execute(&request).await.unwrap();
    assert_eq!(result.records.len(), 9); // 3 elements x 3 periods
    assert!(result.unmatched_locations.is_empty());

    for record in &result.records {
        assert_eq!(record.location, "臺北市");
        // Window bounds must be the period's own pair
        assert!(record.start_time < record.end_time);
    }
    let wx_count = result.records.iter().filter(|r| r.element == "Wx").count();
    assert_eq!(wx_count, 3);
}

#[tokio::test]
async fn test_seven_day_forecast_targets_its_own_dataset() {
    let records = json!({
        "Locations": [{
            "LocationsName": "臺灣",
            "Location": [{
                "LocationName": "臺北市",
                "WeatherElement": [{
                    "ElementName": "天氣預報綜合描述",
                    "Time": [
                        {
                            "StartTime": "2026-08-23T06:00:00+08:00",
                            "EndTime": "2026-08-23T18:00:00+08:00",
                            "ElementValue": [{"WeatherDescription": "多雲時晴"}]
                        },
                        {
                            "StartTime": "2026-08-23T18:00:00+08:00",
                            "EndTime": "2026-08-24T06:00:00+08:00",
                            "ElementValue": [{"WeatherDescription": "多雲"}]
                        }
                    ]
                }]
            }]
        }]
    });

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/F-D0047-091"))
        .and(query_param("locationName", "臺北市"))
        .and(query_param("elementName", "天氣預報綜合描述"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(records)))
        .expect(1)
        .mount(&server)
        .await;

    let service = WeatherService::with_base_url(&test_config(), server.uri()).unwrap();
    let mut request = QueryRequest::new(QueryType::Forecast);
    request.forecast_horizon = ForecastHorizon::SevenDay;
    request.location = vec!["台北市".to_string()];
    request.element = vec!["天氣預報綜合描述".to_string()];

    let result = service.execute(&request).await.unwrap();
    assert_eq!(result.records.len(), 2);
    assert_eq!(result.records[0].location, "臺北市");
    assert_eq!(result.records[0].element, "天氣預報綜合描述");
    assert_eq!(result.records[0].value, json!("多雲時晴"));
    assert!(result.records[0].start_time < result.records[0].end_time);
}

#[tokio::test]
async fn test_warning_hazard_filter_reaches_upstream_as_phenomena() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/W-C0033-001"))
        .and(query_param("phenomena", "大雨"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(tainan_warning_records())))
        .expect(1)
        .mount(&server)
        .await;

    let service = WeatherService::with_base_url(&test_config(), server.uri()).unwrap();
    let mut request = QueryRequest::new(QueryType::Warnings);
    request.element = vec!["大雨".to_string()];

    let result = service.execute(&request).await.unwrap();
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].element, "大雨");
}

#[tokio::test]
async fn test_warning_variant_glyphs_yield_identical_records() {
    let server = MockServer::start().await;
    // Both spellings must reach upstream as the canonical 臺 form
    Mock::given(method("GET"))
        .and(path("/W-C0033-001"))
        .and(query_param("locationName", "臺南市"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(tainan_warning_records())))
        .expect(2)
        .mount(&server)
        .await;

    let service = WeatherService::with_base_url(&test_config(), server.uri()).unwrap();

    let mut simplified = QueryRequest::new(QueryType::Warnings);
    simplified.location = vec!["台南市".to_string()];
    let mut traditional = QueryRequest::new(QueryType::Warnings);
    traditional.location = vec!["臺南市".to_string()];

    let a = service.execute(&simplified).await.unwrap();
    let b = service.execute(&traditional).await.unwrap();

    assert_eq!(a.records.len(), 1);
    assert_eq!(a.records.len(), b.records.len());
    assert_eq!(a.records[0].location, b.records[0].location);
    assert_eq!(a.records[0].element, b.records[0].element);
    assert_eq!(a.records[0].start_time, b.records[0].start_time);
    assert_eq!(a.records[0].end_time, b.records[0].end_time);
}

#[tokio::test]
async fn test_rainfall_empty_filter_returns_every_station() {
    let station = |name: &str, county: &str| {
        json!({
            "StationName": name,
            "GeoInfo": {"CountyName": county},
            "ObsTime": {"DateTime": "2026-08-23 14:10:00"},
            "RainfallElement": {"Now": {"Precipitation": 0.5}}
        })
    };
    let records = json!({
        "Station": [
            station("三峽", "新北市"),
            station("阿里山", "嘉義縣"),
            station("太麻里", "臺東縣"),
        ]
    });

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/O-A0002-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(records)))
        .expect(1)
        .mount(&server)
        .await;

    let service = WeatherService::with_base_url(&test_config(), server.uri()).unwrap();
    let request = QueryRequest::new(QueryType::Rainfall);

    let result = service.execute(&request).await.unwrap();
    assert_eq!(result.records.len(), 3);
}

#[tokio::test]
async fn test_observation_filtered_to_resolved_county() {
    let station = |name: &str, county: &str, temp: f64| {
        json!({
            "StationName": name,
            "GeoInfo": {"CountyName": county},
            "ObsTime": {"DateTime": "2026-08-23 14:00:00"},
            "WeatherElement": {"AirTemperature": temp}
        })
    };
    let records = json!({
        "Station": [
            station("板橋", "新北市", 31.2),
            station("臺中", "臺中市", 33.0),
        ]
    });

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/O-A0003-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(records)))
        .expect(1)
        .mount(&server)
        .await;

    let service = WeatherService::with_base_url(&test_config(), server.uri()).unwrap();
    let mut request = QueryRequest::new(QueryType::Observation);
    // Shorthand glyph on input, canonical form in the station metadata
    request.location = vec!["台中市".to_string()];

    let result = service.execute(&request).await.unwrap();
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].location, "臺中");
    assert_eq!(result.records[0].value, json!(33.0));
}

#[tokio::test]
async fn test_all_locations_unmatched_issues_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let service = WeatherService::with_base_url(&test_config(), server.uri()).unwrap();
    let mut request = QueryRequest::new(QueryType::Forecast);
    request.location = vec!["Atlantis".to_string(), "Mordor".to_string()];

    let err = service.execute(&request).await.unwrap_err();
    assert!(matches!(err, Error::NoMatchingLocation { names } if names.len() == 2));
}

#[tokio::test]
async fn test_partially_unmatched_locations_are_advisory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/F-C0032-001"))
        .and(query_param("locationName", "臺北市"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(taipei_forecast_records())))
        .expect(1)
        .mount(&server)
        .await;

    let service = WeatherService::with_base_url(&test_config(), server.uri()).unwrap();
    let mut request = QueryRequest::new(QueryType::Forecast);
    request.location = vec!["臺北市".to_string(), "Atlantis".to_string()];

    let result = service.execute(&request).await.unwrap();
    assert!(!result.records.is_empty());
    assert_eq!(result.unmatched_locations, vec!["Atlantis".to_string()]);
}

#[tokio::test]
async fn test_empty_upstream_payload_yields_zero_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/W-C0033-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": "true",
            "records": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = WeatherService::with_base_url(&test_config(), server.uri()).unwrap();
    let request = QueryRequest::new(QueryType::Warnings);

    let result = service.execute(&request).await.unwrap();
    assert!(result.records.is_empty());
    assert!(result.unmatched_locations.is_empty());
}
