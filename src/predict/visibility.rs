use chrono::{DateTime, Duration, Utc};

use crate::predict::error::PredictError;
use crate::predict::observer::Observer;
use crate::predict::propagation::Propagator;
use crate::predict::types::{CandidateEvent, ElementSet, RefinedWindow, VisibilitySample};

/// Narrow a geometric pass to the part where the satellite is sunlit and the
/// observer's sky is dark.
///
/// Returns `Ok(None)` when no sample of the pass is visible.
pub fn refine<P: Propagator + ?Sized>(
    propagator: &P,
    set: &ElementSet,
    observer: &Observer,
    event: &CandidateEvent,
    step_seconds: i64,
    darkness_threshold_deg: f64,
) -> Result<Option<RefinedWindow>, PredictError> {
    let times = sample_times(event.rise, event.set, step_seconds);
    let positions = propagator.observe(set, observer, &times)?;
    let sunlit = propagator.is_sunlit(set, &times)?;
    let sun_altitudes = propagator.sun_altitude(observer, &times);

    let samples: Vec<VisibilitySample> = times
        .iter()
        .zip(positions)
        .zip(sunlit)
        .zip(sun_altitudes)
        .map(|(((time, position), sunlit), sun_altitude_deg)| VisibilitySample {
            time: *time,
            altitude_deg: position.altitude_deg,
            azimuth_deg: position.azimuth_deg,
            sunlit,
            sun_altitude_deg,
        })
        .collect();

    Ok(visible_window(samples, darkness_threshold_deg))
}

/// Inclusive `start..=end` at `step_seconds`, always ending exactly on `end`.
pub fn sample_times(start: DateTime<Utc>, end: DateTime<Utc>, step_seconds: i64) -> Vec<DateTime<Utc>> {
    let step = Duration::seconds(step_seconds.max(1));
    let mut times = Vec::new();
    let mut cursor = start;

    while cursor <= end {
        times.push(cursor);
        cursor += step;
    }
    if times.last() != Some(&end) {
        times.push(end);
    }

    times
}

fn visible_window(samples: Vec<VisibilitySample>, darkness_threshold_deg: f64) -> Option<RefinedWindow> {
    let visible = |s: &VisibilitySample| s.is_visible(darkness_threshold_deg);
    let first = samples.iter().position(visible)?;
    let last = samples.iter().rposition(visible)?;

    let mut peak = first;
    for (i, sample) in samples.iter().enumerate().take(last + 1).skip(first) {
        if visible(sample) && sample.altitude_deg > samples[peak].altitude_deg {
            peak = i;
        }
    }

    Some(RefinedWindow {
        samples,
        first,
        last,
        peak,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::predict::propagation::scan_threshold_crossings;
    use crate::predict::propagation::tests::iss;
    use crate::predict::types::{SubPoint, ThresholdEvent, Topocentric};
    use chrono::TimeZone;

    type Curve<T> = Box<dyn Fn(DateTime<Utc>) -> T + Send + Sync>;

    /// Propagator driven by closures over time, for exercising pipeline logic
    /// against a known sky.
    pub struct ScriptedPropagator {
        pub altitude: Curve<f64>,
        pub azimuth: Curve<f64>,
        pub sunlit: Curve<bool>,
        pub sun_altitude: Curve<f64>,
    }

    impl Propagator for ScriptedPropagator {
        fn find_threshold_events(
            &self,
            _set: &ElementSet,
            _observer: &Observer,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            min_elevation_deg: f64,
        ) -> Result<Vec<ThresholdEvent>, PredictError> {
            scan_threshold_crossings(|t| Ok((self.altitude)(t)), start, end, min_elevation_deg)
        }

        fn observe(
            &self,
            _set: &ElementSet,
            _observer: &Observer,
            times: &[DateTime<Utc>],
        ) -> Result<Vec<Topocentric>, PredictError> {
            Ok(times
                .iter()
                .map(|t| Topocentric {
                    altitude_deg: (self.altitude)(*t),
                    azimuth_deg: (self.azimuth)(*t),
                })
                .collect())
        }

        fn sun_altitude(&self, _observer: &Observer, times: &[DateTime<Utc>]) -> Vec<f64> {
            times.iter().map(|t| (self.sun_altitude)(*t)).collect()
        }

        fn is_sunlit(&self, _set: &ElementSet, times: &[DateTime<Utc>]) -> Result<Vec<bool>, PredictError> {
            Ok(times.iter().map(|t| (self.sunlit)(*t)).collect())
        }

        fn sub_point(&self, _set: &ElementSet, time: DateTime<Utc>) -> Result<SubPoint, PredictError> {
            Ok(SubPoint {
                time,
                latitude: 12.5,
                longitude: -40.25,
                elevation: 418.0,
            })
        }
    }

    pub fn rise() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 6, 19, 0, 0).unwrap()
    }

    /// Ten-minute pass peaking at 60 degrees five minutes after rise.
    pub fn tent(t: DateTime<Utc>) -> f64 {
        let from_peak = ((t - rise()).num_milliseconds() as f64 / 60_000.0 - 5.0).abs();
        60.0 - 8.0 * from_peak
    }

    fn pass() -> CandidateEvent {
        CandidateEvent {
            rise: rise(),
            culminate: rise() + Duration::minutes(5),
            set: rise() + Duration::minutes(10),
        }
    }

    fn propagator(sunlit: Curve<bool>, sun_altitude: Curve<f64>) -> ScriptedPropagator {
        ScriptedPropagator {
            altitude: Box::new(tent),
            azimuth: Box::new(|t| ((t - rise()).num_seconds() as f64 * 0.3).rem_euclid(360.0)),
            sunlit,
            sun_altitude,
        }
    }

    #[test]
    fn sample_times_include_unaligned_end() {
        let start = rise();
        let times = sample_times(start, start + Duration::seconds(25), 10);
        let offsets: Vec<_> = times.iter().map(|t| (*t - start).num_seconds()).collect();
        assert_eq!(offsets, vec![0, 10, 20, 25]);

        let aligned = sample_times(start, start + Duration::seconds(20), 10);
        assert_eq!(aligned.len(), 3);
    }

    #[test]
    fn whole_pass_visible_peaks_at_culmination() {
        let p = propagator(Box::new(|_| true), Box::new(|_| -18.0));
        let window = refine(&p, &iss(), &Observer::default(), &pass(), 1, -6.0)
            .unwrap()
            .unwrap();
        assert_eq!(window.first, 0);
        assert_eq!(window.last, window.samples.len() - 1);
        assert_eq!(window.peak().time, rise() + Duration::minutes(5));
        assert!((window.peak().altitude_deg - 60.0).abs() < 1e-9);
    }

    #[test]
    fn earth_shadow_cuts_the_window_short() {
        let shadow_entry = rise() + Duration::minutes(7);
        let p = propagator(Box::new(move |t| t < shadow_entry), Box::new(|_| -18.0));
        let window = refine(&p, &iss(), &Observer::default(), &pass(), 1, -6.0)
            .unwrap()
            .unwrap();
        assert_eq!(window.end().time, shadow_entry - Duration::seconds(1));
        assert!(window.end().sunlit);
    }

    #[test]
    fn darkness_threshold_is_strict() {
        let at_threshold = propagator(Box::new(|_| true), Box::new(|_| -6.0));
        assert!(refine(&at_threshold, &iss(), &Observer::default(), &pass(), 1, -6.0)
            .unwrap()
            .is_none());

        // Sky darkens to just below the threshold for a single sample.
        let dark_instant = rise() + Duration::minutes(4);
        let one_dark = propagator(
            Box::new(|_| true),
            Box::new(move |t| if t == dark_instant { -6.000001 } else { -6.0 }),
        );
        let window = refine(&one_dark, &iss(), &Observer::default(), &pass(), 1, -6.0)
            .unwrap()
            .unwrap();
        assert_eq!(window.first, window.last);
        assert_eq!(window.start().time, dark_instant);
    }

    #[test]
    fn daylight_pass_has_no_window() {
        let p = propagator(Box::new(|_| true), Box::new(|_| 12.0));
        assert!(refine(&p, &iss(), &Observer::default(), &pass(), 1, -6.0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn peak_ignores_invisible_samples() {
        // Sunlit only after culmination: the visible peak is the first visible sample.
        let exit = rise() + Duration::minutes(6);
        let p = propagator(Box::new(move |t| t >= exit), Box::new(|_| -18.0));
        let window = refine(&p, &iss(), &Observer::default(), &pass(), 1, -6.0)
            .unwrap()
            .unwrap();
        assert_eq!(window.peak, window.first);
        assert_eq!(window.peak().time, exit);
    }
}
