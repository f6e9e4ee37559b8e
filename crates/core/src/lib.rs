pub mod config;
pub mod controller;
pub mod metrics;
pub mod runner;
pub mod search;

pub use config::{EngineConfig, EngineError};
pub use controller::{ControllerState, RunReport, SelfHealController};
pub use metrics::{Metrics, MetricsSnapshot};
pub use runner::CommandRunner;
pub use search::search_url;
