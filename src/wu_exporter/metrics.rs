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

use crate::client::{MetricObservation, Observation};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::error;
use std::fmt;
use std::sync::atomic::AtomicU64;

/// Content type of the text produced by `ObservationMetrics::render()`.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[derive(Debug)]
pub enum RenderError {
    Encoding(fmt::Error),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoding(e) => write!(f, "unable to encode metrics: {}", e),
        }
    }
}

impl error::Error for RenderError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Encoding(e) => Some(e),
        }
    }
}

/// A gauge and the function used to read its value from an observation.
#[derive(Debug, Clone, Copy)]
pub struct GaugeBinding {
    pub name: &'static str,
    pub help: &'static str,
    pub read: fn(&Observation) -> Option<f64>,
}

fn metric(obs: &Observation) -> Option<&MetricObservation> {
    obs.metric.as_ref()
}

/// Every gauge emitted by the exporter.
pub static GAUGES: [GaugeBinding; 13] = [
    GaugeBinding {
        name: "wu_solar_radiation",
        help: "Watt per square meter W/m2",
        read: |o| o.solar_radiation,
    },
    GaugeBinding {
        name: "wu_uv_index",
        help: "UV index",
        read: |o| o.uv,
    },
    GaugeBinding {
        name: "wu_wind_direction",
        help: "Wind direction in degrees",
        read: |o| o.wind_direction,
    },
    GaugeBinding {
        name: "wu_humidity",
        help: "Humidity as percentage",
        read: |o| o.humidity,
    },
    GaugeBinding {
        name: "wu_temperature",
        help: "temperature in degrees celsius",
        read: |o| metric(o).and_then(|m| m.temperature),
    },
    GaugeBinding {
        name: "wu_heat_index",
        help: "temperature as it feels in degrees celsius",
        read: |o| metric(o).and_then(|m| m.heat_index),
    },
    GaugeBinding {
        name: "wu_dewpoint",
        help: "dewpoint in degrees celsius",
        read: |o| metric(o).and_then(|m| m.dewpoint),
    },
    GaugeBinding {
        name: "wu_windChill",
        help: "wind chill in degrees celsius",
        read: |o| metric(o).and_then(|m| m.wind_chill),
    },
    GaugeBinding {
        name: "wu_wind_speed",
        help: "wind speed in km/h",
        read: |o| metric(o).and_then(|m| m.wind_speed),
    },
    GaugeBinding {
        name: "wu_wind_gust",
        help: "peak wind speed in km/h",
        read: |o| metric(o).and_then(|m| m.wind_gust),
    },
    GaugeBinding {
        name: "wu_pressure",
        help: "Pressure in hPa",
        read: |o| metric(o).and_then(|m| m.pressure),
    },
    GaugeBinding {
        name: "wu_precipitation_rate",
        help: "how much rain would fall if the precipitation intensity did not change for one hour in mm",
        read: |o| metric(o).and_then(|m| m.precipitation_rate),
    },
    GaugeBinding {
        name: "wu_precipitation_total",
        help: "accumulated precipitation for today from midnight to present in mm",
        read: |o| metric(o).and_then(|m| m.precipitation_total),
    },
];

/// Result of rendering metrics: the body of the response and its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub body: String,
    pub content_type: &'static str,
}

/// Renders gauges from an `Observation` in the Prometheus text format.
///
/// Values are not stored between renders. Each call to `render()` builds a new registry
/// containing a gauge for each value present in the observation being rendered. Values
/// missing from the observation (because the station doesn't have a particular sensor,
/// or it was offline) are omitted from the output entirely rather than being reported
/// as zero.
#[derive(Debug, Clone)]
pub struct ObservationMetrics {
    gauges: &'static [GaugeBinding],
}

impl ObservationMetrics {
    pub fn new(gauges: &'static [GaugeBinding]) -> Self {
        ObservationMetrics { gauges }
    }

    pub fn render(&self, obs: Option<&Observation>) -> Result<Rendered, RenderError> {
        let mut registry = Registry::default();

        if let Some(obs) = obs {
            for binding in self.gauges {
                if let Some(v) = (binding.read)(obs) {
                    let gauge = Gauge::<f64, AtomicU64>::default();
                    gauge.set(v);
                    registry.register(binding.name, binding.help, gauge);
                }
            }
        }

        let mut body = String::new();
        encode(&mut body, &registry).map_err(RenderError::Encoding)?;

        Ok(Rendered {
            body,
            content_type: CONTENT_TYPE,
        })
    }
}

impl Default for ObservationMetrics {
    fn default() -> Self {
        Self::new(&GAUGES)
    }
}
