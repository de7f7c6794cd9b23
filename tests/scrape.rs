// wu_exporter - Prometheus metrics exporter for Weather Underground
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use reqwest::{Client, Url};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wu_exporter::cache::ObservationCache;
use wu_exporter::client::WeatherUndergroundClient;
use wu_exporter::http::{text_metrics, RequestContext, INTERNAL_ERROR_BODY};
use wu_exporter::metrics::{ObservationMetrics, CONTENT_TYPE as METRICS_CONTENT_TYPE};

const STATION: &str = "KMAHANOV10";
const API_KEY: &str = "secret-key";
const API_PATH: &str = "/v2/pws/observations/current";

fn app(server: &MockServer, max_age: Duration) -> Router {
    let url = Url::parse(&format!("{}{}", server.uri(), API_PATH)).unwrap();
    let client = WeatherUndergroundClient::new(Client::new(), url, STATION, API_KEY);
    let cache = ObservationCache::with_max_age(client, max_age);
    text_metrics(Arc::new(RequestContext::new(cache, ObservationMetrics::default())))
}

fn observation_request() -> wiremock::MockBuilder {
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("numericPrecision", "decimal"))
        .and(query_param("format", "json"))
        .and(query_param("units", "m"))
        .and(query_param("stationId", STATION))
        .and(query_param("apiKey", API_KEY))
}

async fn request(app: &Router, method: Method, uri: &str) -> (StatusCode, Option<String>, String) {
    let res = app
        .clone()
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = res.status();
    let content_type = res
        .headers()
        .get(CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_owned());
    let bytes = hyper::body::to_bytes(res.into_body()).await.unwrap();

    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn scrape(app: &Router) -> (StatusCode, String) {
    let (status, _, body) = request(app, Method::GET, "/metrics").await;
    (status, body)
}

fn sample(body: &str, name: &str) -> Option<f64> {
    body.lines()
        .filter(|l| !l.starts_with('#'))
        .filter_map(|l| {
            let mut parts = l.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(n), Some(v)) if n == name => v.parse::<f64>().ok(),
                _ => None,
            }
        })
        .next()
}

fn has_samples(body: &str) -> bool {
    body.lines().any(|l| !l.starts_with('#') && !l.is_empty())
}

#[tokio::test]
async fn test_first_scrape_fetches_observation() {
    let server = MockServer::start().await;
    observation_request()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "observations": [{"humidity": 55, "metric": {"temp": 18.2}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&server, ObservationCache::<WeatherUndergroundClient>::DEFAULT_MAX_AGE);
    let (status, content_type, body) = request(&app, Method::GET, "/metrics").await;

    assert_eq!(StatusCode::OK, status);
    assert_eq!(Some(METRICS_CONTENT_TYPE.to_owned()), content_type);
    assert_eq!(Some(55.0), sample(&body, "wu_humidity"));
    assert_eq!(Some(18.2), sample(&body, "wu_temperature"));
    assert!(body.contains("wu_humidity 55"));
    assert!(body.contains("wu_temperature 18.2"));
    assert!(!body.contains("wu_uv_index"));
}

#[tokio::test]
async fn test_second_scrape_uses_cache() {
    let server = MockServer::start().await;
    observation_request()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "observations": [{
                "stationID": STATION,
                "solarRadiation": 412.3,
                "uv": 3,
                "winddir": 270,
                "humidity": 55,
                "metric": {
                    "temp": 18.2,
                    "heatIndex": 18.5,
                    "dewpt": 9.1,
                    "windChill": 17.9,
                    "windSpeed": 11.3,
                    "windGust": 20.9,
                    "pressure": 1013.2,
                    "precipRate": 0.5,
                    "precipTotal": 3.8
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&server, ObservationCache::<WeatherUndergroundClient>::DEFAULT_MAX_AGE);
    let (first_status, first) = scrape(&app).await;
    let (second_status, second) = scrape(&app).await;

    assert_eq!(StatusCode::OK, first_status);
    assert_eq!(StatusCode::OK, second_status);
    assert_eq!(first, second);
    assert_eq!(Some(1013.2), sample(&second, "wu_pressure"));
    assert_eq!(Some(17.9), sample(&second, "wu_windChill"));
    assert_eq!(Some(3.8), sample(&second, "wu_precipitation_total"));
}

#[tokio::test]
async fn test_stale_scrape_fetches_again() {
    let server = MockServer::start().await;
    observation_request()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "observations": [{"metric": {"temp": 18.2}}]
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    observation_request()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "observations": [{"metric": {"temp": 19.6}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&server, Duration::ZERO);
    let (_, first) = scrape(&app).await;
    let (_, second) = scrape(&app).await;

    assert_eq!(Some(18.2), sample(&first, "wu_temperature"));
    assert_eq!(Some(19.6), sample(&second, "wu_temperature"));
}

#[tokio::test]
async fn test_upstream_failure_serves_previous_values() {
    let server = MockServer::start().await;
    observation_request()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "observations": [{"humidity": 40, "metric": {"temp": 21.0}}]
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    observation_request()
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&server, Duration::ZERO);
    let (_, first) = scrape(&app).await;
    let (status, second) = scrape(&app).await;

    assert_eq!(StatusCode::OK, status);
    assert_eq!(first, second);
    assert_eq!(Some(21.0), sample(&second, "wu_temperature"));
}

#[tokio::test]
async fn test_upstream_failure_without_previous_values() {
    let server = MockServer::start().await;
    observation_request()
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&server, ObservationCache::<WeatherUndergroundClient>::DEFAULT_MAX_AGE);
    let (status, body) = scrape(&app).await;

    assert_eq!(StatusCode::OK, status);
    assert!(!has_samples(&body));
    assert!(!body.contains(INTERNAL_ERROR_BODY));
}

#[tokio::test]
async fn test_missing_observations_is_not_fatal() {
    let server = MockServer::start().await;
    observation_request()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&server, ObservationCache::<WeatherUndergroundClient>::DEFAULT_MAX_AGE);
    let (status, body) = scrape(&app).await;

    assert_eq!(StatusCode::OK, status);
    assert!(!has_samples(&body));
}

#[tokio::test]
async fn test_malformed_body_is_not_fatal() {
    let server = MockServer::start().await;
    observation_request()
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&server, ObservationCache::<WeatherUndergroundClient>::DEFAULT_MAX_AGE);
    let (status, body) = scrape(&app).await;

    assert_eq!(StatusCode::OK, status);
    assert!(!has_samples(&body));
}

#[tokio::test]
async fn test_unknown_path_not_found() {
    let server = MockServer::start().await;
    let app = app(&server, ObservationCache::<WeatherUndergroundClient>::DEFAULT_MAX_AGE);
    let (status, _, _) = request(&app, Method::GET, "/").await;

    assert_eq!(StatusCode::NOT_FOUND, status);
}

#[tokio::test]
async fn test_wrong_method_not_allowed() {
    let server = MockServer::start().await;
    let app = app(&server, ObservationCache::<WeatherUndergroundClient>::DEFAULT_MAX_AGE);
    let (status, _, _) = request(&app, Method::POST, "/metrics").await;

    assert_eq!(StatusCode::METHOD_NOT_ALLOWED, status);
}
