use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::fetch::Fetcher;
use crate::predict::error::PredictError;
use crate::predict::types::ElementSet;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Locally persisted copy of a TLE source, refreshed when older than its TTL.
pub struct TleCache {
    url: String,
    path: PathBuf,
    ttl_days: f64,
    fetcher: Arc<dyn Fetcher>,
    refresh: Mutex<()>,
}

impl TleCache {
    pub fn new(url: String, path: PathBuf, ttl_days: f64, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            url,
            path,
            ttl_days,
            fetcher,
            refresh: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Element set for `body`, refreshing the cache file first if it is stale.
    pub fn ensure(&self, body: &str) -> Result<ElementSet, PredictError> {
        self.ensure_at(body, Utc::now())
    }

    pub fn ensure_at(&self, body: &str, now: DateTime<Utc>) -> Result<ElementSet, PredictError> {
        self.ensure_unless_cancelled(body, now, &AtomicBool::new(false))
    }

    /// Like [`TleCache::ensure_at`], but once `cancelled` is set no refresh is
    /// started and a refresh already in flight is discarded instead of written.
    pub fn ensure_unless_cancelled(
        &self,
        body: &str,
        now: DateTime<Utc>,
        cancelled: &AtomicBool,
    ) -> Result<ElementSet, PredictError> {
        let (content, age_days) = {
            // Serializes refreshes so concurrent callers fetch at most once.
            let _guard = self.refresh.lock().unwrap_or_else(PoisonError::into_inner);
            match self.cache_age_days(now)? {
                Some(age) if age < self.ttl_days => (fs::read_to_string(&self.path)?, age),
                age => {
                    log::info!(
                        "Refreshing TLE cache {} from {} (age: {})",
                        self.path.display(),
                        self.url,
                        age.map(|a| format!("{:.2} days", a))
                            .unwrap_or_else(|| "missing".into())
                    );
                    if cancelled.load(Ordering::SeqCst) {
                        return Err(PredictError::Cancelled);
                    }
                    let content = self.fetcher.get_text(&self.url)?;
                    if cancelled.load(Ordering::SeqCst) {
                        log::info!("Cycle abandoned, discarding TLE refresh from {}", self.url);
                        return Err(PredictError::Cancelled);
                    }
                    self.write_cache(&content)?;
                    (content, 0.0)
                }
            }
        };

        let mut set = find_body(&content, body)?;
        set.source_url = self.url.clone();
        set.cache_age_days = age_days;
        Ok(set)
    }

    /// Age of the cache file in days, `None` if there is no usable cache.
    pub fn cache_age_days(&self, now: DateTime<Utc>) -> Result<Option<f64>, PredictError> {
        let metadata = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() || metadata.len() == 0 {
            return Ok(None);
        }
        let modified: DateTime<Utc> = metadata.modified()?.into();
        Ok(Some(
            (now - modified).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY,
        ))
    }

    fn write_cache(&self, content: &str) -> Result<(), PredictError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // Write to a temporary file first so a failed write never clobbers the cache.
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// Parse the element set named exactly `body` out of multi-satellite TLE text.
pub fn find_body(content: &str, body: &str) -> Result<ElementSet, PredictError> {
    let blocks = tle_blocks(content);
    if blocks.is_empty() {
        return Err(PredictError::Parse {
            name: body.to_string(),
            message: "no element sets in TLE text".into(),
        });
    }

    let block = blocks
        .into_iter()
        .find(|b| b.name == Some(body.trim()))
        .ok_or_else(|| PredictError::NotFound(body.to_string()))?;

    ElementSet::from_tle(block.name.unwrap_or(body), block.line1, block.line2)
}

struct TleBlock<'a> {
    name: Option<&'a str>,
    line1: &'a str,
    line2: &'a str,
}

/// Element line pairs in file order, each with the title line right before
/// it if there is one. Anything else is skipped.
fn tle_blocks(content: &str) -> Vec<TleBlock<'_>> {
    let mut lines = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .peekable();
    let mut blocks = Vec::new();
    let mut title = None;

    while let Some(line) = lines.next() {
        if line.starts_with("1 ") {
            if let Some(line2) = lines.next_if(|next| next.starts_with("2 ")) {
                blocks.push(TleBlock {
                    name: title.take(),
                    line1: line,
                    line2,
                });
                continue;
            }
        }
        title = Some(line);
    }

    blocks
}
