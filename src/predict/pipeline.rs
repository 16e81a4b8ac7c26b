use chrono::{DateTime, Duration, Utc};

use crate::predict::error::PredictError;
use crate::predict::observer::Observer;
use crate::predict::pass_finder::find_events;
use crate::predict::propagation::Propagator;
use crate::predict::sighting::assemble;
use crate::predict::types::{ElementSet, Sighting};
use crate::predict::visibility::refine;

/// Knobs for one run of the sighting pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SightingParams {
    pub min_elevation_deg: f64,
    pub min_duration_minutes: u32,
    pub look_ahead_days: u32,
    pub darkness_threshold_deg: f64,
    pub step_seconds: i64,
}

impl Default for SightingParams {
    fn default() -> Self {
        Self {
            min_elevation_deg: 20.0,
            min_duration_minutes: 2,
            look_ahead_days: 20,
            darkness_threshold_deg: -6.0,
            step_seconds: 1,
        }
    }
}

/// All naked-eye sightings from `now` through the look-ahead window, in time
/// order. An empty result is reported as `NoPasses`.
pub fn compute_sightings<P: Propagator + ?Sized>(
    propagator: &P,
    set: &ElementSet,
    observer: &Observer,
    params: &SightingParams,
    now: DateTime<Utc>,
) -> Result<Vec<Sighting>, PredictError> {
    let end = now + Duration::days(i64::from(params.look_ahead_days));
    let events = find_events(propagator, set, observer, now, end, params.min_elevation_deg)?;

    let mut sightings = Vec::new();
    for event in &events {
        let window = match refine(
            propagator,
            set,
            observer,
            event,
            params.step_seconds,
            params.darkness_threshold_deg,
        )? {
            Some(w) => w,
            None => continue,
        };
        if let Some(sighting) = assemble(&window, params.min_duration_minutes) {
            sightings.push(sighting);
        }
    }

    log::info!(
        "{}: {} passes, {} visible sightings between {} and {}",
        set.name,
        events.len(),
        sightings.len(),
        now.format("%Y-%m-%d %H:%M"),
        end.format("%Y-%m-%d %H:%M")
    );

    if sightings.is_empty() {
        return Err(PredictError::NoPasses {
            start: now.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }
    Ok(sightings)
}
