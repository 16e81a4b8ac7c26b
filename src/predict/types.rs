use chrono::{DateTime, Utc};
use serde::Serialize;
use sgp4::{Constants, Elements};

use crate::predict::error::PredictError;

/// Parsed orbital elements for one named body, ready to propagate.
pub struct ElementSet {
    pub name: String,
    pub source_url: String,
    pub cache_age_days: f64,
    pub raw: String,
    pub elements: Elements,
    pub constants: Constants,
}

impl ElementSet {
    /// Builds a propagatable element set from a name and its two TLE lines.
    pub fn from_tle(name: &str, line1: &str, line2: &str) -> Result<Self, PredictError> {
        let invalid = |message: String| PredictError::Parse {
            name: name.to_string(),
            message,
        };

        let elements = Elements::from_tle(
            Some(name.to_string()),
            line1.as_bytes(),
            line2.as_bytes(),
        )
        .map_err(|e| invalid(e.to_string()))?;
        let constants = Constants::from_elements(&elements).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            source_url: String::new(),
            cache_age_days: 0.0,
            raw: format!("{}\n{}\n{}", name, line1, line2),
            elements,
            constants,
        })
    }

    pub fn norad_id(&self) -> u64 {
        self.elements.norad_id
    }
}

impl std::fmt::Debug for ElementSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementSet")
            .field("name", &self.name)
            .field("norad_id", &self.elements.norad_id)
            .field("epoch", &self.elements.datetime)
            .field("source_url", &self.source_url)
            .field("cache_age_days", &self.cache_age_days)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdEventKind {
    Rise,
    Culminate,
    Set,
}

/// One crossing (or culmination) reported by the propagation capability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdEvent {
    pub time: DateTime<Utc>,
    pub kind: ThresholdEventKind,
}

/// A complete geometric pass above the elevation threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateEvent {
    pub rise: DateTime<Utc>,
    pub culminate: DateTime<Utc>,
    pub set: DateTime<Utc>,
}

/// Satellite position in the observer's horizon frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Topocentric {
    pub altitude_deg: f64,
    pub azimuth_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilitySample {
    pub time: DateTime<Utc>,
    pub altitude_deg: f64,
    pub azimuth_deg: f64,
    pub sunlit: bool,
    pub sun_altitude_deg: f64,
}

impl VisibilitySample {
    pub fn is_visible(&self, darkness_threshold_deg: f64) -> bool {
        self.sunlit && self.sun_altitude_deg < darkness_threshold_deg
    }
}

/// The visible part of a pass, as indexes into the sampled pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinedWindow {
    pub samples: Vec<VisibilitySample>,
    pub first: usize,
    pub last: usize,
    pub peak: usize,
}

impl RefinedWindow {
    pub fn start(&self) -> &VisibilitySample {
        &self.samples[self.first]
    }

    pub fn end(&self) -> &VisibilitySample {
        &self.samples[self.last]
    }

    pub fn peak(&self) -> &VisibilitySample {
        &self.samples[self.peak]
    }
}

/// A naked-eye sighting opportunity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sighting {
    pub start: DateTime<Utc>,
    pub peak: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_seconds: i64,
    pub duration: String,
    pub peak_elevation_deg: f64,
    pub start_elevation_deg: f64,
    pub end_elevation_deg: f64,
    pub direction: &'static str,
    pub disappear_direction: &'static str,
}

/// Point on the WGS-84 ellipsoid directly beneath the satellite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubPoint {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Height above the ellipsoid in km
    pub elevation: f64,
}
