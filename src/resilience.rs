use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::predict::Sighting;
use crate::roster::AstronautRoster;

/// Result of one resilience-wrapped operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Fresh(T),
    /// Last good value, served inside the grace period.
    Stale { value: T, as_of: DateTime<Utc> },
    Failed(String),
}

impl<T> Outcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Fresh(v) | Outcome::Stale { value: v, .. } => Some(v),
            Outcome::Failed(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Fresh(v) | Outcome::Stale { value: v, .. } => Some(v),
            Outcome::Failed(_) => None,
        }
    }

    pub fn status(&self) -> SourceStatus {
        match self {
            Outcome::Fresh(_) => SourceStatus::Fresh,
            Outcome::Stale { as_of, .. } => SourceStatus::Stale { as_of: *as_of },
            Outcome::Failed(reason) => SourceStatus::Failed {
                reason: reason.clone(),
            },
        }
    }
}

/// Serializable view of an [`Outcome`] without its payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SourceStatus {
    Fresh,
    Stale { as_of: DateTime<Utc> },
    Failed { reason: String },
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slot<T> {
    pub value: T,
    pub updated: DateTime<Utc>,
}

/// Last good value per data source, carried across poll cycles.
#[derive(Debug, Default)]
pub struct ResilienceState {
    pub roster: Option<Slot<AstronautRoster>>,
    pub sightings: Option<Slot<Vec<Sighting>>>,
}

impl ResilienceState {
    /// Whether the roster needs refetching, or the cached one is still valid.
    pub fn roster_due(&self, now: DateTime<Utc>, refresh_interval: Duration) -> bool {
        match &self.roster {
            Some(slot) => now - slot.updated >= refresh_interval,
            None => true,
        }
    }

    /// The cached roster while it is within its refresh interval.
    pub fn current_roster(&self) -> Option<Outcome<AstronautRoster>> {
        self.roster.as_ref().map(|slot| Outcome::Fresh(slot.value.clone()))
    }

    pub fn resolve_roster<E: Display>(
        &mut self,
        now: DateTime<Utc>,
        result: Result<AstronautRoster, E>,
        grace_period: Duration,
    ) -> Outcome<AstronautRoster> {
        resolve(&mut self.roster, "astronaut roster", now, result, grace_period)
    }

    pub fn resolve_sightings<E: Display>(
        &mut self,
        now: DateTime<Utc>,
        result: Result<Vec<Sighting>, E>,
        grace_period: Duration,
    ) -> Outcome<Vec<Sighting>> {
        resolve(&mut self.sightings, "sightings", now, result, grace_period)
    }
}

/// Commit a success to `slot`, or fall back to it within the grace period.
fn resolve<T: Clone, E: Display>(
    slot: &mut Option<Slot<T>>,
    source: &str,
    now: DateTime<Utc>,
    result: Result<T, E>,
    grace_period: Duration,
) -> Outcome<T> {
    match result {
        Ok(value) => {
            *slot = Some(Slot {
                value: value.clone(),
                updated: now,
            });
            Outcome::Fresh(value)
        }
        Err(e) => match slot {
            Some(cached) if now - cached.updated <= grace_period => {
                log::info!(
                    "Using cached {} from {} due to grace period: {}",
                    source,
                    cached.updated,
                    e
                );
                Outcome::Stale {
                    value: cached.value.clone(),
                    as_of: cached.updated,
                }
            }
            _ => {
                log::error!("Error updating {}: {}", source, e);
                Outcome::Failed(format!("Error updating {}: {}", source, e))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::PredictError;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 5, 18, 0, 0).unwrap()
    }

    fn grace() -> Duration {
        Duration::minutes(60)
    }

    fn sighting() -> Sighting {
        Sighting {
            start: t0() + Duration::hours(1),
            peak: t0() + Duration::hours(1) + Duration::minutes(3),
            end: t0() + Duration::hours(1) + Duration::minutes(6),
            duration_seconds: 360,
            duration: "6m".into(),
            peak_elevation_deg: 54.0,
            start_elevation_deg: 20.0,
            end_elevation_deg: 31.0,
            direction: "WSW",
            disappear_direction: "ENE",
        }
    }

    fn failure() -> Result<Vec<Sighting>, PredictError> {
        Err(PredictError::Fetch {
            url: "http://tle.test".into(),
            message: "timed out".into(),
        })
    }

    fn roster() -> AstronautRoster {
        AstronautRoster {
            count: 1,
            names: vec!["Sunita Williams".into()],
        }
    }

    #[test]
    fn failure_within_grace_serves_cached_list_unchanged() {
        let mut state = ResilienceState::default();
        let fresh = state.resolve_sightings(t0(), Ok::<_, PredictError>(vec![sighting()]), grace());
        assert_eq!(fresh, Outcome::Fresh(vec![sighting()]));

        let outcome = state.resolve_sightings(t0() + Duration::minutes(30), failure(), grace());
        assert_eq!(
            outcome,
            Outcome::Stale {
                value: vec![sighting()],
                as_of: t0()
            }
        );
    }

    #[test]
    fn failure_after_grace_is_hard_failure() {
        let mut state = ResilienceState::default();
        state.resolve_sightings(t0(), Ok::<_, PredictError>(vec![sighting()]), grace());

        let outcome = state.resolve_sightings(t0() + Duration::minutes(61), failure(), grace());
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert!(outcome.value().is_none());
    }

    #[test]
    fn grace_boundary_is_inclusive() {
        let mut state = ResilienceState::default();
        state.resolve_sightings(t0(), Ok::<_, PredictError>(vec![sighting()]), grace());
        let outcome = state.resolve_sightings(t0() + grace(), failure(), grace());
        assert!(matches!(outcome, Outcome::Stale { .. }));
    }

    #[test]
    fn no_cache_means_failure() {
        let mut state = ResilienceState::default();
        let outcome = state.resolve_sightings(t0(), failure(), grace());
        assert_eq!(outcome.status(), SourceStatus::Failed {
            reason: "Error updating sightings: Fetch error for http://tle.test: timed out".into()
        });
    }

    #[test]
    fn stale_recovers_to_fresh_and_restarts_grace() {
        let mut state = ResilienceState::default();
        state.resolve_sightings(t0(), Ok::<_, PredictError>(vec![sighting()]), grace());
        state.resolve_sightings(t0() + Duration::minutes(30), failure(), grace());

        let recovered = t0() + Duration::minutes(50);
        let outcome = state.resolve_sightings(recovered, Ok::<_, PredictError>(vec![]), grace());
        assert_eq!(outcome, Outcome::Fresh(vec![]));
        assert_eq!(state.sightings.as_ref().unwrap().updated, recovered);

        // 100 minutes after the first success but only 50 after the last.
        let later = state.resolve_sightings(recovered + Duration::minutes(50), failure(), grace());
        assert_eq!(
            later,
            Outcome::Stale {
                value: vec![],
                as_of: recovered
            }
        );
    }

    #[test]
    fn failure_does_not_overwrite_slot() {
        let mut state = ResilienceState::default();
        state.resolve_sightings(t0(), Ok::<_, PredictError>(vec![sighting()]), grace());
        state.resolve_sightings(t0() + Duration::minutes(90), failure(), grace());
        let slot = state.sightings.as_ref().unwrap();
        assert_eq!(slot.updated, t0());
        assert_eq!(slot.value, vec![sighting()]);
    }

    #[test]
    fn roster_is_only_due_after_refresh_interval() {
        let mut state = ResilienceState::default();
        let interval = Duration::hours(1);
        assert!(state.roster_due(t0(), interval));
        assert!(state.current_roster().is_none());

        state.resolve_roster(t0(), Ok::<_, PredictError>(roster()), grace());
        assert!(!state.roster_due(t0() + Duration::minutes(59), interval));
        assert_eq!(state.current_roster(), Some(Outcome::Fresh(roster())));
        assert!(state.roster_due(t0() + interval, interval));
    }

    #[test]
    fn roster_failure_goes_stale_then_failed() {
        let mut state = ResilienceState::default();
        state.resolve_roster(t0(), Ok::<_, PredictError>(roster()), grace());

        let err = || Err::<AstronautRoster, _>("503 Service Unavailable");
        let stale = state.resolve_roster(t0() + Duration::minutes(45), err(), grace());
        assert_eq!(stale.status(), SourceStatus::Stale { as_of: t0() });
        assert_eq!(stale.into_value(), Some(roster()));

        let failed = state.resolve_roster(t0() + Duration::minutes(75), err(), grace());
        assert!(matches!(failed.status(), SourceStatus::Failed { .. }));
    }
}
