use crate::predict::types::{RefinedWindow, Sighting};

pub const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// 16-point compass label. Each label owns the 22.5° bucket centered on it,
/// closed below and open above, so 348.75° up to 360° wraps to N.
pub fn compass_direction(azimuth_deg: f64) -> &'static str {
    let normalized = azimuth_deg.rem_euclid(360.0);
    let index = ((normalized + 11.25) / 22.5).floor() as usize % COMPASS_POINTS.len();
    COMPASS_POINTS[index]
}

/// Turn a refined window into a sighting, or drop it if it is too short or
/// its peak sits on the window's edge.
pub fn assemble(window: &RefinedWindow, min_duration_minutes: u32) -> Option<Sighting> {
    let start = window.start();
    let end = window.end();
    let peak = window.peak();

    let duration_seconds = (end.time - start.time).num_seconds();
    if duration_seconds < i64::from(min_duration_minutes) * 60 {
        log::debug!(
            "Dropping {}s window starting {} (minimum {} min)",
            duration_seconds,
            start.time,
            min_duration_minutes
        );
        return None;
    }

    if !(start.time < peak.time && peak.time < end.time) {
        log::info!(
            "Skipping pass visible from {} to {}: brightest point at {} is on the edge of the visible span",
            start.time,
            end.time,
            peak.time
        );
        return None;
    }

    Some(Sighting {
        start: start.time,
        peak: peak.time,
        end: end.time,
        duration_seconds,
        duration: format_duration(duration_seconds),
        peak_elevation_deg: round2(peak.altitude_deg),
        start_elevation_deg: round2(start.altitude_deg),
        end_elevation_deg: round2(end.altitude_deg),
        direction: compass_direction(start.azimuth_deg),
        disappear_direction: compass_direction(end.azimuth_deg),
    })
}

/// Human-readable duration to the second, e.g. "6m 12s".
pub fn format_duration(seconds: i64) -> String {
    humantime::format_duration(std::time::Duration::from_secs(seconds.max(0) as u64)).to_string()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
