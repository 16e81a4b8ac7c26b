use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use practical_astronomy_rust::sun as pa_sun;

use crate::predict::error::PredictError;
use crate::predict::observer::{Observer, EARTH_ECCENTRICITY_SQ, EARTH_EQUATORIAL_RADIUS_KM};
use crate::predict::types::{ElementSet, SubPoint, ThresholdEvent, ThresholdEventKind, Topocentric};

const COARSE_STEP_SECONDS: i64 = 60; // 1 minute for initial scan
const FINE_STEP_SECONDS: i64 = 1; // 1 second for refinement

/// Orbital propagation and ephemeris capability consumed by the pass pipeline.
///
/// Element loading is `ElementSet::from_tle`; everything that needs an orbit
/// or the Sun goes through this trait so the pipeline can run against any
/// conforming implementation.
pub trait Propagator: Send + Sync {
    /// Time-ordered rise / culminate / set events for `min_elevation_deg`.
    ///
    /// A pass already in progress at `start` reports no rise, and a pass still
    /// in progress at `end` reports no culmination or set.
    fn find_threshold_events(
        &self,
        set: &ElementSet,
        observer: &Observer,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        min_elevation_deg: f64,
    ) -> Result<Vec<ThresholdEvent>, PredictError>;

    fn observe(
        &self,
        set: &ElementSet,
        observer: &Observer,
        times: &[DateTime<Utc>],
    ) -> Result<Vec<Topocentric>, PredictError>;

    fn sun_altitude(&self, observer: &Observer, times: &[DateTime<Utc>]) -> Vec<f64>;

    fn is_sunlit(&self, set: &ElementSet, times: &[DateTime<Utc>]) -> Result<Vec<bool>, PredictError>;

    fn sub_point(&self, set: &ElementSet, time: DateTime<Utc>) -> Result<SubPoint, PredictError>;
}

/// SGP4 propagation with a low-precision solar ephemeris and a cylindrical
/// Earth shadow.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sgp4Propagator;

impl Propagator for Sgp4Propagator {
    fn find_threshold_events(
        &self,
        set: &ElementSet,
        observer: &Observer,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        min_elevation_deg: f64,
    ) -> Result<Vec<ThresholdEvent>, PredictError> {
        scan_threshold_crossings(
            |t| topocentric(set, observer, t).map(|p| p.altitude_deg),
            start,
            end,
            min_elevation_deg,
        )
    }

    fn observe(
        &self,
        set: &ElementSet,
        observer: &Observer,
        times: &[DateTime<Utc>],
    ) -> Result<Vec<Topocentric>, PredictError> {
        times.iter().map(|t| topocentric(set, observer, *t)).collect()
    }

    fn sun_altitude(&self, observer: &Observer, times: &[DateTime<Utc>]) -> Vec<f64> {
        times
            .iter()
            .map(|t| {
                let sun_ecef = teme_to_ecef_position(sun_position_km(*t), gmst(*t));
                horizon_coordinates(observer, sun_ecef).altitude_deg
            })
            .collect()
    }

    fn is_sunlit(&self, set: &ElementSet, times: &[DateTime<Utc>]) -> Result<Vec<bool>, PredictError> {
        times
            .iter()
            .map(|t| {
                let sat = teme_position_km(set, *t)?;
                Ok(!in_earth_shadow(sat, sun_position_km(*t)))
            })
            .collect()
    }

    fn sub_point(&self, set: &ElementSet, time: DateTime<Utc>) -> Result<SubPoint, PredictError> {
        let ecef = teme_to_ecef_position(teme_position_km(set, time)?, gmst(time));
        let (latitude, longitude, elevation) = ecef_to_geodetic(ecef);
        Ok(SubPoint {
            time,
            latitude,
            longitude,
            elevation,
        })
    }
}

/// Coarse scan for threshold crossings, refined by bisection to one second.
pub(crate) fn scan_threshold_crossings<F>(
    mut elevation: F,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    threshold_deg: f64,
) -> Result<Vec<ThresholdEvent>, PredictError>
where
    F: FnMut(DateTime<Utc>) -> Result<f64, PredictError>,
{
    let coarse_step = Duration::seconds(COARSE_STEP_SECONDS);
    let mut events = Vec::new();

    let first = elevation(start)?;
    let mut above = first >= threshold_deg;
    let mut pass_start = start;
    let mut peak = above.then_some((start, first));
    let mut prev = start;

    while prev < end {
        let cursor = (prev + coarse_step).min(end);
        let el = elevation(cursor)?;
        let now_above = el >= threshold_deg;

        match (above, now_above) {
            (false, true) => {
                pass_start = refine_crossing(&mut elevation, prev, cursor, threshold_deg, true)?;
                events.push(ThresholdEvent {
                    time: pass_start,
                    kind: ThresholdEventKind::Rise,
                });
                peak = Some((cursor, el));
            }
            (true, true) => {
                if peak.map_or(true, |(_, max)| el > max) {
                    peak = Some((cursor, el));
                }
            }
            (true, false) => {
                let set_time = refine_crossing(&mut elevation, prev, cursor, threshold_deg, false)?;
                if let Some((coarse_peak, _)) = peak.take() {
                    let lower = (coarse_peak - coarse_step).max(pass_start);
                    let upper = (coarse_peak + coarse_step).min(set_time);
                    events.push(ThresholdEvent {
                        time: refine_peak(&mut elevation, coarse_peak, lower, upper)?,
                        kind: ThresholdEventKind::Culminate,
                    });
                }
                events.push(ThresholdEvent {
                    time: set_time,
                    kind: ThresholdEventKind::Set,
                });
            }
            (false, false) => {}
        }

        above = now_above;
        prev = cursor;
    }

    Ok(events)
}

/// Binary search to find the threshold crossing time
fn refine_crossing<F>(
    elevation: &mut F,
    before: DateTime<Utc>,
    after: DateTime<Utc>,
    threshold_deg: f64,
    rising: bool,
) -> Result<DateTime<Utc>, PredictError>
where
    F: FnMut(DateTime<Utc>) -> Result<f64, PredictError>,
{
    let mut low = before;
    let mut high = after;

    while (high - low).num_seconds() > FINE_STEP_SECONDS {
        let mid = low + (high - low) / 2;
        let above = elevation(mid)? >= threshold_deg;
        if above == rising {
            high = mid;
        } else {
            low = mid;
        }
    }

    Ok(high)
}

fn refine_peak<F>(
    elevation: &mut F,
    coarse_peak: DateTime<Utc>,
    lower: DateTime<Utc>,
    upper: DateTime<Utc>,
) -> Result<DateTime<Utc>, PredictError>
where
    F: FnMut(DateTime<Utc>) -> Result<f64, PredictError>,
{
    let fine_step = Duration::seconds(FINE_STEP_SECONDS);
    let mut best = (coarse_peak, elevation(coarse_peak)?);
    let mut cursor = lower;
    while cursor <= upper {
        let el = elevation(cursor)?;
        if el > best.1 {
            best = (cursor, el);
        }
        cursor += fine_step;
    }
    Ok(best.0)
}

fn teme_position_km(set: &ElementSet, timestamp: DateTime<Utc>) -> Result<[f64; 3], PredictError> {
    let minutes = set
        .elements
        .datetime_to_minutes_since_epoch(&timestamp.naive_utc())
        .map_err(|e| PredictError::Propagation(e.to_string()))?;
    let prediction = set.constants.propagate(minutes)?;
    Ok(prediction.position)
}

fn topocentric(
    set: &ElementSet,
    observer: &Observer,
    timestamp: DateTime<Utc>,
) -> Result<Topocentric, PredictError> {
    let sat_ecef = teme_to_ecef_position(teme_position_km(set, timestamp)?, gmst(timestamp));
    Ok(horizon_coordinates(observer, sat_ecef))
}

fn horizon_coordinates(observer: &Observer, target_ecef: [f64; 3]) -> Topocentric {
    let sta = observer.position_ecef_km();
    let dr = [
        target_ecef[0] - sta[0],
        target_ecef[1] - sta[1],
        target_ecef[2] - sta[2],
    ];
    let range = norm(dr);
    let (east, north, up) = ecef_to_enu(dr, observer.lat_rad(), observer.lon_rad());
    Topocentric {
        altitude_deg: if range > 0.0 {
            (up / range).asin().to_degrees()
        } else {
            0.0
        },
        azimuth_deg: east.atan2(north).to_degrees().rem_euclid(360.0),
    }
}

fn gmst(timestamp: DateTime<Utc>) -> f64 {
    sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&timestamp.naive_utc()))
}

/// Apparent geocentric Sun position in the equatorial frame of date, in km.
pub fn sun_position_km(timestamp: DateTime<Utc>) -> [f64; 3] {
    let year = timestamp.year() as u32;
    let month = timestamp.month();
    let day = timestamp.day() as f64;
    let hour = timestamp.hour() as f64;
    let minute = timestamp.minute() as f64;
    let second = timestamp.second() as f64 + timestamp.timestamp_subsec_micros() as f64 / 1.0e6;

    let (ra_h, ra_m, ra_s, dec_d, dec_m, dec_s) =
        pa_sun::precise_position_of_sun(hour, minute, second, day, month, year, false, 0);
    let (distance_km, _, _, _) =
        pa_sun::sun_distance_and_angular_size(hour, minute, second, day, month, year, false, 0);

    let ra = hms_to_deg(ra_h, ra_m, ra_s).to_radians();
    let dec = dms_to_deg(dec_d, dec_m, dec_s).to_radians();
    [
        distance_km * dec.cos() * ra.cos(),
        distance_km * dec.cos() * ra.sin(),
        distance_km * dec.sin(),
    ]
}

fn hms_to_deg(h: f64, m: f64, s: f64) -> f64 {
    (h + m / 60.0 + s / 3600.0) * 15.0
}

fn dms_to_deg(d: f64, m: f64, s: f64) -> f64 {
    let sign = if d.is_sign_negative() { -1.0 } else { 1.0 };
    sign * (d.abs() + m / 60.0 + s / 3600.0)
}

/// The satellite is in shadow when, seen from the satellite, the Sun lies
/// inside the Earth's disk.
pub fn in_earth_shadow(sat_km: [f64; 3], sun_km: [f64; 3]) -> bool {
    let to_earth = [-sat_km[0], -sat_km[1], -sat_km[2]];
    let to_sun = [
        sun_km[0] - sat_km[0],
        sun_km[1] - sat_km[1],
        sun_km[2] - sat_km[2],
    ];
    let earth_radius_deg = (EARTH_EQUATORIAL_RADIUS_KM / norm(sat_km)).min(1.0).asin().to_degrees();
    angular_separation_deg(to_earth, to_sun) < earth_radius_deg
}

fn angular_separation_deg(a: [f64; 3], b: [f64; 3]) -> f64 {
    let cos_sep = (a[0] * b[0] + a[1] * b[1] + a[2] * b[2]) / (norm(a) * norm(b));
    cos_sep.clamp(-1.0, 1.0).acos().to_degrees()
}

pub fn teme_to_ecef_position(pos_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let cos_gmst = gmst.cos();
    let sin_gmst = gmst.sin();
    [
        pos_teme[0] * cos_gmst + pos_teme[1] * sin_gmst,
        -pos_teme[0] * sin_gmst + pos_teme[1] * cos_gmst,
        pos_teme[2],
    ]
}

pub fn ecef_to_enu(dr: [f64; 3], lat_rad: f64, lon_rad: f64) -> (f64, f64, f64) {
    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();
    let sin_lon = lon_rad.sin();
    let cos_lon = lon_rad.cos();

    let east = -sin_lon * dr[0] + cos_lon * dr[1];
    let north = -sin_lat * cos_lon * dr[0] - sin_lat * sin_lon * dr[1] + cos_lat * dr[2];
    let up = cos_lat * cos_lon * dr[0] + cos_lat * sin_lon * dr[1] + sin_lat * dr[2];
    (east, north, up)
}

/// ECEF (km) to geodetic latitude/longitude (degrees) and height (km).
pub fn ecef_to_geodetic(pos: [f64; 3]) -> (f64, f64, f64) {
    let p = (pos[0] * pos[0] + pos[1] * pos[1]).sqrt();
    let longitude = pos[1].atan2(pos[0]);
    // Spherical latitude as the first guess, then fixed-point on the ellipsoid.
    let mut latitude = pos[2].atan2(p);
    let mut height = 0.0;

    for _ in 0..6 {
        let sin_lat = latitude.sin();
        let n = EARTH_EQUATORIAL_RADIUS_KM / (1.0 - EARTH_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
        height = p / latitude.cos() - n;
        latitude = pos[2].atan2(p * (1.0 - EARTH_ECCENTRICITY_SQ * n / (n + height)));
    }

    (latitude.to_degrees(), longitude.to_degrees(), height)
}

fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}
