pub mod collector;

pub use collector::{load_config_default, load_config_from, CollectorConfig, JobConfig};
