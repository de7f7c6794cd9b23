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

//! Prometheus metrics exporter for Weather Underground personal weather stations
//!
//! ## Features
//!
//! `wu_exporter` fetches current conditions for a particular personal weather station using the
//! [Weather Underground PWS API] and emits them as Prometheus metrics. Observations are fetched
//! when Prometheus scrapes the exporter, at most once every 58 seconds (stations usually report
//! once a minute). If fetching a new observation fails, the previous one is exported. The following
//! metrics are emitted when available (not all fields are available for all stations).
//!
//! * `wu_solar_radiation` - Solar radiation, in W/m2.
//! * `wu_uv_index` - UV index.
//! * `wu_wind_direction` - Wind direction, in degrees.
//! * `wu_humidity` - Relative humidity (0-100).
//! * `wu_temperature` - Temperature, in degrees celsius.
//! * `wu_heat_index` - Heat index, in degrees celsius.
//! * `wu_dewpoint` - Dewpoint, in degrees celsius.
//! * `wu_windChill` - Temperature with wind chill, in degrees celsius.
//! * `wu_wind_speed` - Wind speed, in km/h.
//! * `wu_wind_gust` - Wind gust speed, in km/h.
//! * `wu_pressure` - Pressure, in hPa.
//! * `wu_precipitation_rate` - Precipitation rate, in mm per hour.
//! * `wu_precipitation_total` - Precipitation since midnight, in mm.
//!
//! [Weather Underground PWS API]: https://www.wunderground.com/member/api-keys
//!
//! ## Build
//!
//! `wu_exporter` is a Rust program and must be built from source using a [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! git clone git@github.com:56quarters/wu_exporter.git && cd wu_exporter
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! `wu_exporter` needs the ID of the station to export and an API key. Both may be passed as
//! flags or environment variables. Environment variables can also be set in a `.env` file in
//! the working directory.
//!
//! ```text
//! STATION_ID=KMAHANOV10 API_KEY=your-api-key PORT=9791 ./wu_exporter
//! ```
//!
//! ### Prometheus
//!
//! Prometheus metrics are exposed on port `9791` at `/metrics` by default. Add the host running
//! `wu_exporter` as a target under the Prometheus `scrape_configs` section as described by the
//! example below.
//!
//! ```yaml
//! scrape_configs:
//! - job_name: wu_exporter
//!   scrape_interval: 60s
//!   static_configs:
//!   - targets: ['example:9791']
//! ```
//!

pub mod cache;
pub mod client;
pub mod http;
pub mod metrics;
