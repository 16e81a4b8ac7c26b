use serde::{Deserialize, Serialize};

// WGS-84 constants
pub const EARTH_EQUATORIAL_RADIUS_KM: f64 = 6378.137;
pub const EARTH_ECCENTRICITY_SQ: f64 = 0.00669437999014;

/// Fixed observing site. Elevation is implicitly sea level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for Observer {
    fn default() -> Self {
        Self {
            latitude: 48.001,
            longitude: 7.481,
        }
    }
}

impl Observer {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parses "lat, lon" the way station coordinates are written in config files.
    pub fn from_coordinates(coordinates: &str) -> Option<Self> {
        let parts: Vec<_> = coordinates.split(',').map(|s| s.trim()).collect();
        if parts.len() != 2 {
            return None;
        }
        let lat = parts[0].parse().ok()?;
        let lon = parts[1].parse().ok()?;
        Some(Self::new(lat, lon))
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude.to_radians()
    }

    pub fn position_ecef_km(&self) -> [f64; 3] {
        let lat = self.lat_rad();
        let lon = self.lon_rad();
        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let n = EARTH_EQUATORIAL_RADIUS_KM / (1.0 - EARTH_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
        [
            n * cos_lat * lon.cos(),
            n * cos_lat * lon.sin(),
            n * (1.0 - EARTH_ECCENTRICITY_SQ) * sin_lat,
        ]
    }
}
