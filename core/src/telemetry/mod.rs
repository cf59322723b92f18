pub mod log;
pub mod metrics;
pub mod status;

pub use log::LogManager;
pub use metrics::{MetricsRecorder, MetricsSnapshot};
pub use status::{LoopStatus, StatusBoard};
