use chrono::{DateTime, Utc};

use crate::predict::error::PredictError;
use crate::predict::observer::Observer;
use crate::predict::propagation::Propagator;
use crate::predict::types::{CandidateEvent, ElementSet, ThresholdEvent, ThresholdEventKind};

/// Find all complete passes above `min_elevation` within a time range
pub fn find_events<P: Propagator + ?Sized>(
    propagator: &P,
    set: &ElementSet,
    observer: &Observer,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    min_elevation: f64,
) -> Result<Vec<CandidateEvent>, PredictError> {
    let events = propagator.find_threshold_events(set, observer, start, end, min_elevation)?;
    let passes = group_passes(&events);
    log::debug!(
        "{} threshold events, {} complete passes above {}° for {}",
        events.len(),
        passes.len(),
        min_elevation,
        set.name
    );
    Ok(passes)
}

/// Group a flat event stream into (rise, culminate, set) triples.
///
/// Passes cut by either end of the range never form a full triple and are
/// dropped. A pass with several culminations keeps the last one reported.
fn group_passes(events: &[ThresholdEvent]) -> Vec<CandidateEvent> {
    let mut passes = Vec::new();
    let mut rise: Option<DateTime<Utc>> = None;
    let mut culminate: Option<DateTime<Utc>> = None;

    for event in events {
        match event.kind {
            ThresholdEventKind::Rise => {
                rise = Some(event.time);
                culminate = None;
            }
            ThresholdEventKind::Culminate => {
                if rise.is_some() {
                    culminate = Some(event.time);
                }
            }
            ThresholdEventKind::Set => {
                if let (Some(r), Some(c)) = (rise, culminate) {
                    if r <= c && c <= event.time {
                        passes.push(CandidateEvent {
                            rise: r,
                            culminate: c,
                            set: event.time,
                        });
                    }
                }
                rise = None;
                culminate = None;
            }
        }
    }

    passes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 5, 18, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn ev(minutes: i64, kind: ThresholdEventKind) -> ThresholdEvent {
        ThresholdEvent {
            time: at(minutes),
            kind,
        }
    }

    use ThresholdEventKind::{Culminate, Rise, Set};

    #[test]
    fn groups_complete_triples() {
        let events = [
            ev(0, Rise),
            ev(3, Culminate),
            ev(6, Set),
            ev(95, Rise),
            ev(98, Culminate),
            ev(101, Set),
        ];
        let passes = group_passes(&events);
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0].rise, at(0));
        assert_eq!(passes[1].set, at(101));
        for p in &passes {
            assert!(p.rise <= p.culminate && p.culminate <= p.set);
        }
    }

    #[test]
    fn drops_truncated_passes_at_both_boundaries() {
        let events = [
            ev(0, Culminate),
            ev(2, Set),
            ev(90, Rise),
            ev(93, Culminate),
            ev(96, Set),
            ev(180, Rise),
            ev(183, Culminate),
        ];
        let passes = group_passes(&events);
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].rise, at(90));
    }

    #[test]
    fn rise_without_culmination_is_not_a_pass() {
        let events = [ev(0, Rise), ev(1, Set)];
        assert!(group_passes(&events).is_empty());
    }

    #[test]
    fn empty_stream_is_empty_result() {
        assert!(group_passes(&[]).is_empty());
    }

    #[test]
    fn real_passes_are_ordered() {
        use crate::predict::propagation::tests::iss;
        use crate::predict::Sgp4Propagator;

        let set = iss();
        let start = Utc.with_ymd_and_hms(2025, 10, 5, 0, 0, 0).unwrap();
        let passes = find_events(
            &Sgp4Propagator,
            &set,
            &Observer::new(48.0, 7.5),
            start,
            start + Duration::days(2),
            20.0,
        )
        .unwrap();
        for pair in passes.windows(2) {
            assert!(pair[0].set < pair[1].rise);
        }
        for p in &passes {
            assert!(p.rise <= p.culminate && p.culminate <= p.set);
        }
    }
}
