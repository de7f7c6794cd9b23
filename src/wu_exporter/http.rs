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

use crate::cache::{ObservationCache, Refresh};
use crate::client::ObservationSource;
use crate::metrics::{ObservationMetrics, RenderError, Rendered};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, Level};

/// Body sent for any failure to render metrics. Details are only logged.
pub const INTERNAL_ERROR_BODY: &str = "An internal server error occurred";

/// State shared by all requests: the observation cache and the gauges rendered from it.
#[derive(Debug)]
pub struct RequestContext<S> {
    cache: ObservationCache<S>,
    metrics: ObservationMetrics,
}

impl<S> RequestContext<S> {
    pub fn new(cache: ObservationCache<S>, metrics: ObservationMetrics) -> Self {
        RequestContext { cache, metrics }
    }
}

/// Create a router that serves metrics at `/metrics`, refreshing the cached observation
/// first if it's stale.
pub fn text_metrics<S>(context: Arc<RequestContext<S>>) -> Router
where
    S: ObservationSource + 'static,
{
    Router::new()
        .route("/metrics", get(handle_metrics::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn handle_metrics<S>(State(context): State<Arc<RequestContext<S>>>) -> Response
where
    S: ObservationSource + 'static,
{
    // Failing to fetch a new observation isn't fatal, the last one we have (if any) is
    // rendered instead.
    let refresh = context
        .cache
        .refresh_if_stale()
        .instrument(tracing::span!(Level::DEBUG, "wu_observation"))
        .await;

    let snapshot = context.cache.snapshot();
    match refresh {
        Ok(Refresh::Updated) => {
            let obs = snapshot.as_deref();
            tracing::info!(
                message = "fetched new observation",
                station = ?obs.and_then(|o| o.station_id.as_deref()),
                observed_at = ?obs.and_then(|o| o.observed_at.as_deref()),
            );
        }
        Ok(Refresh::Fresh) => {
            tracing::debug!(message = "using cached observation");
        }
        Ok(Refresh::Superseded) => {
            tracing::debug!(message = "discarded observation older than cached observation");
        }
        Err(e) => {
            tracing::error!(message = "failed to fetch observation, using cached values", error = %e);
        }
    }

    metrics_response(context.metrics.render(snapshot.as_deref()))
}

fn metrics_response(res: Result<Rendered, RenderError>) -> Response {
    match res {
        Ok(rendered) => {
            tracing::debug!(
                message = "encoded prometheus metrics to text format",
                num_bytes = rendered.body.len(),
            );

            (StatusCode::OK, [(CONTENT_TYPE, rendered.content_type)], rendered.body).into_response()
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics", error = %e);
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response()
        }
    }
}
