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

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::error;
use std::fmt;

const PARAM_API_KEY: &str = "apiKey";
const REDACTED: &str = "REDACTED";

#[derive(Debug)]
pub enum ClientError {
    Internal(reqwest::Error),
    Unexpected(StatusCode, Url),
    NoObservations(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
            Self::Unexpected(status, url) => write!(f, "unexpected status {} for {}", status, url),
            Self::NoObservations(s) => write!(f, "no observations returned for station {}", s),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        // Request URLs carry the API key as a query parameter so never keep them in errors
        // that end up in logs.
        Self::Internal(e.without_url())
    }
}

/// Something that can produce the current observation for a single weather station.
///
/// The HTTP client is the only production implementation. Tests substitute their own
/// to count and script upstream calls.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn observation(&self) -> Result<Observation, ClientError>;
}

#[derive(Debug)]
pub struct WeatherUndergroundClient {
    client: Client,
    base_url: Url,
    station: String,
    api_key: String,
}

impl WeatherUndergroundClient {
    const USER_AGENT: &'static str = "wu_exporter Prometheus Exporter (https://github.com/56quarters/wu_exporter)";
    const JSON_RESPONSE: &'static str = "application/json";

    pub fn new<S1, S2>(client: Client, base_url: Url, station: S1, api_key: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        WeatherUndergroundClient {
            client,
            base_url,
            station: station.into(),
            api_key: api_key.into(),
        }
    }

    async fn make_request(&self, url: Url) -> Result<Response, ClientError> {
        let res = self
            .client
            .get(url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::JSON_RESPONSE)
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::NO_CONTENT {
            // Returned for stations that exist but haven't reported recently
            Err(ClientError::NoObservations(self.station.clone()))
        } else if status.is_success() {
            Ok(res)
        } else {
            Err(ClientError::Unexpected(status, redacted(&url)))
        }
    }

    fn observation_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("numericPrecision", "decimal")
            .append_pair("format", "json")
            .append_pair("units", "m")
            .append_pair("stationId", &self.station)
            .append_pair(PARAM_API_KEY, &self.api_key);
        url
    }
}

#[async_trait]
impl ObservationSource for WeatherUndergroundClient {
    async fn observation(&self) -> Result<Observation, ClientError> {
        let request_url = self.observation_url();
        tracing::debug!(message = "making current observation request", url = %redacted(&request_url));

        let res = self.make_request(request_url).await?;
        let body = res.json::<ObservationsResponse>().await?;

        body.observations
            .and_then(|obs| obs.into_iter().next())
            .ok_or_else(|| ClientError::NoObservations(self.station.clone()))
    }
}

/// Copy of `url` with the API key replaced so that it is safe to log.
fn redacted(url: &Url) -> Url {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if k == PARAM_API_KEY {
                (k.into_owned(), REDACTED.to_owned())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();

    let mut out = url.clone();
    if !pairs.is_empty() {
        out.query_pairs_mut().clear().extend_pairs(pairs);
    }

    out
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ObservationsResponse {
    #[serde(alias = "observations")]
    pub observations: Option<Vec<Observation>>,
}

/// Current conditions reported by a station.
///
/// Every measurement is optional since the set of sensors varies from station to
/// station and the API reports missing sensors as `null`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Observation {
    #[serde(alias = "stationID")]
    pub station_id: Option<String>,
    #[serde(alias = "obsTimeUtc")]
    pub observed_at: Option<String>,
    #[serde(alias = "solarRadiation")]
    pub solar_radiation: Option<f64>,
    #[serde(alias = "uv")]
    pub uv: Option<f64>,
    #[serde(alias = "winddir")]
    pub wind_direction: Option<f64>,
    #[serde(alias = "humidity")]
    pub humidity: Option<f64>,
    #[serde(alias = "metric")]
    pub metric: Option<MetricObservation>,
}

/// Measurements reported in metric units (`units=m`).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MetricObservation {
    #[serde(alias = "temp")]
    pub temperature: Option<f64>,
    #[serde(alias = "heatIndex")]
    pub heat_index: Option<f64>,
    #[serde(alias = "dewpt")]
    pub dewpoint: Option<f64>,
    #[serde(alias = "windChill")]
    pub wind_chill: Option<f64>,
    #[serde(alias = "windSpeed")]
    pub wind_speed: Option<f64>,
    #[serde(alias = "windGust")]
    pub wind_gust: Option<f64>,
    #[serde(alias = "pressure")]
    pub pressure: Option<f64>,
    #[serde(alias = "precipRate")]
    pub precipitation_rate: Option<f64>,
    #[serde(alias = "precipTotal")]
    pub precipitation_total: Option<f64>,
}
