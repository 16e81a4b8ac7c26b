use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::task::{spawn_blocking, JoinError};

use crate::config::{Config, ConfigError};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::position::position_snapshot;
use crate::predict::{compute_sightings, PredictError, Propagator, Sgp4Propagator, Sighting, TleCache};
use crate::resilience::{Outcome, ResilienceState, SourceStatus};
use crate::roster::fetch_roster;

#[derive(Debug, Error)]
pub enum SpotterError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("predict error: {0}")]
    Predict(#[from] PredictError),
}

/// Merged result of one poll cycle, ready for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub updated: DateTime<Utc>,
    /// False only when no fresh or cached sightings could be produced.
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    pub next: Option<Sighting>,
    pub sightings: Vec<Sighting>,
    pub astronaut_count: Option<usize>,
    pub astronaut_names: Vec<String>,
    pub status: CycleStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleStatus {
    pub sightings: SourceStatus,
    pub roster: SourceStatus,
    pub position: SourceStatus,
}

/// Core handle: owns the element cache and the last-good state across cycles.
pub struct Spotter<P: Propagator + 'static = Sgp4Propagator> {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<TleCache>,
    propagator: Arc<P>,
    state: ResilienceState,
}

impl Spotter<Sgp4Propagator> {
    pub fn initialize(config: Config) -> Result<Self, SpotterError> {
        config.validate()?;
        let fetcher = Arc::new(HttpFetcher::new(config.request_timeout)?);
        Ok(Self::with_parts(config, fetcher, Sgp4Propagator))
    }
}

impl<P: Propagator + 'static> Spotter<P> {
    pub fn with_parts(config: Config, fetcher: Arc<dyn Fetcher>, propagator: P) -> Self {
        let cache = TleCache::new(
            config.tle_url.clone(),
            config.tle_cache_path.clone(),
            config.tle_ttl_days,
            fetcher.clone(),
        );
        log::info!(
            "Tracking {} from ({:.3}, {:.3}), TLE cache at {}",
            config.target,
            config.observer.latitude,
            config.observer.longitude,
            cache.path().display()
        );
        Self {
            config: Arc::new(config),
            fetcher,
            cache: Arc::new(cache),
            propagator: Arc::new(propagator),
            state: ResilienceState::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn poll(&mut self) -> Snapshot {
        self.poll_at(Utc::now()).await
    }

    /// Run one cycle as of `now`. Roster, sightings and position run
    /// concurrently; each result is committed only after all three finish.
    ///
    /// Dropping the returned future abandons the cycle: the blocking tasks
    /// keep running to completion but write neither state nor cache.
    pub async fn poll_at(&mut self, now: DateTime<Utc>) -> Snapshot {
        let grace = to_chrono(self.config.grace_period);
        let refresh = to_chrono(self.config.roster_refresh_interval);
        let mut abandon = AbandonOnDrop::new();

        let roster_task = if self.state.roster_due(now, refresh) {
            let fetcher = self.fetcher.clone();
            let config = self.config.clone();
            Some(spawn_blocking(move || {
                fetch_roster(fetcher.as_ref(), &config.roster_url, &config.roster_craft)
            }))
        } else {
            None
        };

        let sightings_task = {
            let cache = self.cache.clone();
            let propagator = self.propagator.clone();
            let config = self.config.clone();
            let cancelled = abandon.flag();
            spawn_blocking(move || {
                let set = cache.ensure_unless_cancelled(&config.target, now, &cancelled)?;
                compute_sightings(
                    propagator.as_ref(),
                    &set,
                    &config.observer,
                    &config.sighting_params(),
                    now,
                )
            })
        };

        let position_task = {
            let cache = self.cache.clone();
            let propagator = self.propagator.clone();
            let config = self.config.clone();
            let cancelled = abandon.flag();
            spawn_blocking(move || {
                position_snapshot(&cache, propagator.as_ref(), &config.target, now, &cancelled)
            })
        };

        let (roster, sightings, position) = tokio::join!(
            async move {
                match roster_task {
                    Some(handle) => Some(handle.await),
                    None => None,
                }
            },
            sightings_task,
            position_task,
        );
        abandon.disarm();

        let roster = match roster {
            Some(result) => self.state.resolve_roster(now, flatten(result), grace),
            None => self
                .state
                .current_roster()
                .unwrap_or_else(|| Outcome::Failed("no cached roster".into())),
        };
        let sightings = self.state.resolve_sightings(now, flatten(sightings), grace);
        let (position, position_status) = match flatten(position) {
            Ok(point) => (Some(point), SourceStatus::Fresh),
            Err(e) => {
                log::warn!("Position unavailable: {}", e);
                (None, SourceStatus::Unavailable)
            }
        };

        let status = CycleStatus {
            sightings: sightings.status(),
            roster: roster.status(),
            position: position_status,
        };
        let available = !matches!(sightings, Outcome::Failed(_));
        let sightings = sightings.into_value().unwrap_or_default();
        let roster = roster.into_value();

        log::info!(
            "Cycle at {}: {} sightings ({:?}), roster {:?}, position {:?}",
            now,
            sightings.len(),
            status.sightings,
            status.roster,
            status.position
        );

        Snapshot {
            updated: now,
            available,
            latitude: position.map(|p| p.latitude),
            longitude: position.map(|p| p.longitude),
            elevation: position.map(|p| p.elevation),
            next: sightings.first().cloned(),
            sightings,
            astronaut_count: roster.as_ref().map(|r| r.count),
            astronaut_names: roster.map(|r| r.names).unwrap_or_default(),
            status,
        }
    }

    pub fn shutdown(self) {
        log::info!("Shutting down spotter for {}", self.config.target);
    }
}

/// Raises the cancellation flag shared with a cycle's blocking tasks unless
/// the cycle ran to completion.
struct AbandonOnDrop {
    cancelled: Arc<AtomicBool>,
    armed: bool,
}

impl AbandonOnDrop {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            armed: true,
        }
    }

    fn flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        if self.armed {
            log::warn!("Poll cycle abandoned before completion");
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }
}

fn to_chrono(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

fn flatten<T>(result: Result<Result<T, PredictError>, JoinError>) -> Result<T, String> {
    match result {
        Ok(inner) => inner.map_err(|e| e.to_string()),
        Err(e) => Err(format!("task failed: {}", e)),
    }
}
