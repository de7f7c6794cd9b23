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

use clap::Parser;
use reqwest::{Client, Url};
use std::error::Error;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tracing::Level;
use wu_exporter::cache::ObservationCache;
use wu_exporter::client::WeatherUndergroundClient;
use wu_exporter::http::RequestContext;
use wu_exporter::metrics::ObservationMetrics;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
const DEFAULT_PORT: u16 = 9791;
const DEFAULT_REFRESH_SECS: u64 = 58;
const DEFAULT_API_URL: &str = "https://api.weather.com/v2/pws/observations/current";

#[derive(Debug, Parser)]
#[clap(name = "wu_exporter", version = clap::crate_version!())]
struct WuExporterApplication {
    /// Weather Underground personal weather station ID to export observations for
    #[clap(long, env = "STATION_ID")]
    station_id: String,

    /// API key for the Weather Underground API
    #[clap(long, env = "API_KEY", hide_env_values = true)]
    api_key: String,

    /// URL of the current observations endpoint of the Weather Underground API
    #[clap(long, env = "API_URL", default_value = DEFAULT_API_URL)]
    api_url: Url,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Fetch a new observation when scraped if the last one was fetched more than this many
    /// seconds ago.
    #[clap(long, default_value_t = DEFAULT_REFRESH_SECS)]
    refresh_secs: u64,

    /// Timeout for fetching observations from the Weather Underground API, in milliseconds.
    /// By default, no timeout is used.
    #[clap(long)]
    timeout_millis: Option<u64>,

    /// Address to bind to. By default, wu_exporter will bind to public address since
    /// the purpose is to expose metrics to an external system (Prometheus or another
    /// agent for ingestion)
    #[clap(long, env = "BIND_IP", default_value_t = DEFAULT_BIND_IP)]
    bind_ip: IpAddr,

    /// Port to expose metrics on
    #[clap(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // A missing .env file is fine, settings can come from flags or the environment
    let _ = dotenv::dotenv();

    let opts = WuExporterApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let mut builder = Client::builder();
    if let Some(millis) = opts.timeout_millis {
        builder = builder.timeout(Duration::from_millis(millis));
    }

    let http_client = builder.build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let client = WeatherUndergroundClient::new(http_client, opts.api_url.clone(), &opts.station_id, &opts.api_key);
    let cache = ObservationCache::with_max_age(client, Duration::from_secs(opts.refresh_secs));
    let context = Arc::new(RequestContext::new(cache, ObservationMetrics::default()));
    let handler = wu_exporter::http::text_metrics(context);

    let bind = SocketAddr::new(opts.bind_ip, opts.port);
    let server = axum::Server::try_bind(&bind)
        .unwrap_or_else(|e| {
            tracing::error!(message = "error binding to address", address = %bind, error = %e);
            process::exit(1)
        })
        .serve(handler.into_make_service());

    tracing::info!(
        message = "server started",
        address = %server.local_addr(),
        station = %opts.station_id,
        api_url = %opts.api_url,
    );

    server
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
