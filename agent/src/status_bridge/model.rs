use doorcore::notify::ConnectivityStatus;
use doorcore::schedule::ScheduleSnapshot;
use doorcore::telemetry::{LoopStatus, MetricsSnapshot};
use serde::Serialize;

/// JSON document served on `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub status: LoopStatus,
    pub schedule: ScheduleSnapshot,
    pub connectivity: ConnectivityStatus,
    pub metrics: MetricsSnapshot,
}
