use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Utc};

use crate::predict::{PredictError, Propagator, SubPoint, TleCache};

/// Where the target is right now. Supplementary: callers treat any error as
/// "position unavailable".
pub fn position_snapshot<P: Propagator + ?Sized>(
    cache: &TleCache,
    propagator: &P,
    body: &str,
    now: DateTime<Utc>,
    cancelled: &AtomicBool,
) -> Result<SubPoint, PredictError> {
    let set = cache.ensure_unless_cancelled(body, now, cancelled)?;
    propagator.sub_point(&set, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::StaticFetcher;
    use crate::predict::test_support::{stations_txt, temp_cache_path, URL};
    use crate::predict::Sgp4Propagator;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[test]
    fn sub_point_of_cached_body() {
        let fetcher = Arc::new(StaticFetcher::with(URL, &stations_txt()));
        let cache = TleCache::new(URL.into(), temp_cache_path(), 1.0, fetcher);
        let now = Utc.with_ymd_and_hms(2025, 10, 5, 12, 0, 0).unwrap();

        let point = position_snapshot(&cache, &Sgp4Propagator, "ISS (ZARYA)", now, &AtomicBool::new(false))
                .unwrap();
        assert_eq!(point.time, now);
        assert!(point.latitude.abs() <= 52.0);
        assert!(point.elevation > 300.0);
    }

    #[test]
    fn missing_body_surfaces_error() {
        let fetcher = Arc::new(StaticFetcher::with(URL, &stations_txt()));
        let cache = TleCache::new(URL.into(), temp_cache_path(), 1.0, fetcher);
        let cancelled = AtomicBool::new(false);
        assert!(position_snapshot(&cache, &Sgp4Propagator, "TIANHE", Utc::now(), &cancelled).is_err());
    }
}
