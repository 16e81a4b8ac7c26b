mod error;
mod observer;
mod pass_finder;
mod pipeline;
mod propagation;
mod sighting;
mod tle_loader;
mod types;
mod visibility;

pub use error::PredictError;
pub use observer::Observer;
pub use pass_finder::find_events;
pub use pipeline::{compute_sightings, SightingParams};
pub use propagation::{Propagator, Sgp4Propagator};
pub use sighting::{assemble, compass_direction, format_duration, COMPASS_POINTS};
pub use tle_loader::{find_body, TleCache};
pub use types::{
    CandidateEvent, ElementSet, RefinedWindow, Sighting, SubPoint, ThresholdEvent,
    ThresholdEventKind, Topocentric, VisibilitySample,
};
pub use visibility::{refine, sample_times};
