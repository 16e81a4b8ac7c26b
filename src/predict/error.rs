use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("Element cache error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid TLE for {name}: {message}")]
    Parse { name: String, message: String },
    #[error("Body not found in element set: {0}")]
    NotFound(String),
    #[error("No visible passes between {start} and {end}")]
    NoPasses { start: String, end: String },
    #[error("Poll cycle abandoned")]
    Cancelled,
    #[error("Propagation error: {0}")]
    Propagation(String),
}

impl From<sgp4::Error> for PredictError {
    fn from(err: sgp4::Error) -> Self {
        PredictError::Propagation(err.to_string())
    }
}
