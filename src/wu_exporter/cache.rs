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

use crate::client::{ClientError, Observation, ObservationSource};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a successful call to `ObservationCache::refresh_if_stale()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// The cached observation was recent enough, no upstream request was made.
    Fresh,
    /// A new observation was fetched and replaced the cached one.
    Updated,
    /// An observation was fetched but a request started after it already replaced the
    /// cached one, so it was discarded.
    Superseded,
}

#[derive(Debug, Default)]
struct CacheState {
    last_observation: Option<Arc<Observation>>,
    /// When the request that produced `last_observation` was started.
    observation_fetch: Option<Instant>,
    last_fetch: Option<Instant>,
}

/// Most recent observation for a station, fetched lazily.
///
/// Nothing refreshes the cache in the background. Callers (the `/metrics` handler) ask for
/// a refresh on each scrape via `refresh_if_stale()` and an upstream request is only made
/// when the last one is older than the maximum age. The time of the attempt is recorded
/// *before* the request is made so that scrapes arriving while a request is in flight use
/// the existing observation instead of making requests of their own.
#[derive(Debug)]
pub struct ObservationCache<S> {
    source: S,
    max_age: Duration,
    state: Mutex<CacheState>,
}

impl<S> ObservationCache<S>
where
    S: ObservationSource,
{
    /// Stations typically report once a minute, check slightly more often than that.
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(58);

    pub fn new(source: S) -> Self {
        Self::with_max_age(source, Self::DEFAULT_MAX_AGE)
    }

    pub fn with_max_age(source: S, max_age: Duration) -> Self {
        ObservationCache {
            source,
            max_age,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Fetch a new observation if none has been fetched yet or the last attempt was more
    /// than the maximum age ago.
    ///
    /// If the upstream request fails, the previously cached observation (if any) is kept
    /// and the next attempt will not be made until the maximum age has elapsed again. A
    /// slow request that completes after a later one never replaces the later result.
    pub async fn refresh_if_stale(&self) -> Result<Refresh, ClientError> {
        self.refresh_if_stale_at(Instant::now()).await
    }

    async fn refresh_if_stale_at(&self, now: Instant) -> Result<Refresh, ClientError> {
        if !self.mark_if_due(now) {
            return Ok(Refresh::Fresh);
        }

        let obs = self.source.observation().await?;
        Ok(self.replace_if_newer(now, obs))
    }

    fn replace_if_newer(&self, started: Instant, obs: Observation) -> Refresh {
        let mut state = self.state.lock();
        if state.observation_fetch.map_or(false, |t| t > started) {
            return Refresh::Superseded;
        }

        state.last_observation = Some(Arc::new(obs));
        state.observation_fetch = Some(started);
        Refresh::Updated
    }

    fn mark_if_due(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        let due = match state.last_fetch {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.max_age,
        };

        if due {
            state.last_fetch = Some(now);
        }

        due
    }

    /// The most recently fetched observation, `None` if no fetch has succeeded yet.
    pub fn snapshot(&self) -> Option<Arc<Observation>> {
        self.state.lock().last_observation.clone()
    }
}
