use std::time::Duration;

use crate::predict::PredictError;

/// Pulls a text document from an upstream URL.
pub trait Fetcher: Send + Sync {
    fn get_text(&self, url: &str) -> Result<String, PredictError>;
}

/// Blocking HTTP fetcher. Runs on the blocking pool inside a poll cycle.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, PredictError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("iss-spotter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PredictError::Fetch {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn get_text(&self, url: &str) -> Result<String, PredictError> {
        let fetch_error = |message: String| PredictError::Fetch {
            url: url.to_string(),
            message,
        };

        log::debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fetch_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP status {}", response.status())));
        }

        response.text().map_err(|e| fetch_error(e.to_string()))
    }
}
