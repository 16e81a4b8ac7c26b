pub mod config;
pub mod fetch;
pub mod position;
pub mod predict;
pub mod resilience;
pub mod roster;
pub mod spotter;

pub use config::{Config, ConfigError};
pub use resilience::{Outcome, SourceStatus};
pub use spotter::{Snapshot, Spotter, SpotterError};
