use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::interface::DoorState;

/// Shared configuration for the image normalisation stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest edge allowed after downscaling, in pixels.
    pub max_dimension: u32,
    /// Encoded size ceiling in kilobytes (1 KB = 1024 bytes).
    pub max_size_kb: usize,
    pub start_quality: u8,
    pub quality_step: u8,
    /// Quality floor; the encoder never goes below it, even when over budget.
    pub min_quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_dimension: 320,
            max_size_kb: 500,
            start_quality: 100,
            quality_step: 10,
            min_quality: 10,
        }
    }
}

impl PipelineConfig {
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_kb.saturating_mul(1024)
    }
}

/// Timing of the countdown and capture phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub countdown_secs: u32,
    /// Length of one countdown step. One second outside of tests.
    pub countdown_tick_ms: u64,
    pub capture_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 10,
            countdown_tick_ms: 1000,
            capture_interval_ms: 5000,
        }
    }
}

impl ScheduleConfig {
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms.max(1))
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms.max(1))
    }
}

/// How pass 1 of the classifier settles a batch that holds both an "open"
/// and a "closed" label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Any open label wins over any closed label.
    #[default]
    OpenPriority,
    /// The first polar label in detection order wins.
    FirstMatch,
    /// The polar label with the highest confidence wins; earlier wins on ties.
    HighestConfidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub open_keywords: Vec<String>,
    pub closed_keywords: Vec<String>,
    pub door_keyword: String,
    /// Pass 2 only considers detections strictly above this confidence.
    pub door_confidence: f32,
    pub tie_break: TieBreak,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            open_keywords: vec!["open".into(), "opened".into()],
            closed_keywords: vec!["closed".into(), "shut".into()],
            door_keyword: "door".into(),
            door_confidence: 0.7,
            tie_break: TieBreak::OpenPriority,
        }
    }
}

/// Address of the actuator controller that receives state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    pub open_path: String,
    pub closed_path: String,
    pub probe_path: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 80,
            open_path: "/open".into(),
            closed_path: "/closed".into(),
            probe_path: "/".into(),
        }
    }
}

impl EndpointConfig {
    pub fn url_for(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host, self.port, path)
    }

    pub fn path_for(&self, state: DoorState) -> Option<&str> {
        match state {
            DoorState::Open => Some(&self.open_path),
            DoorState::Closed => Some(&self.closed_path),
            DoorState::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Stop capturing once this many images have been stored.
    pub max_images: Option<usize>,
    /// Drop inference results older than the newest one already applied.
    pub discard_stale: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_images: None,
            discard_stale: true,
        }
    }
}

/// Everything the control loop needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub pipeline: PipelineConfig,
    pub schedule: ScheduleConfig,
    pub classifier: ClassifierConfig,
    pub orchestrator: OrchestratorConfig,
}

/// Errors raised while normalising a frame. Fatal to that cycle only.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    #[error("encode failed: {0}")]
    EncodeFailed(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type StageResult<T> = Result<T, PipelineError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture unavailable: {0}")]
    Unavailable(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("model not loaded")]
    ModelNotReady,
    #[error("model not configured: {0}")]
    NotConfigured(String),
    #[error("inference failed: {0}")]
    Failed(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("store failed: {0}")]
    StoreFailed(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("endpoint returned HTTP {0}")]
    Status(u16),
    #[error("no endpoint for state {0}")]
    UnsupportedState(DoorState),
}

/// Failure before a frame reaches the inference collaborator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Trait describing one step of the image normalisation chain.
pub trait ProcessingStage {
    fn initialize(&mut self, config: &PipelineConfig) -> StageResult<()>;
    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput>;
    fn cleanup(&mut self);
}

/// Input payload for a processing stage.
#[derive(Debug, Clone)]
pub struct StageInput {
    pub image: image::DynamicImage,
}

/// Output produced by each stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub image: image::DynamicImage,
    pub metadata: StageMetadata,
}

/// Metadata used for chaining stages and telemetry.
#[derive(Debug, Clone, Default)]
pub struct StageMetadata {
    pub encoded: Option<Vec<u8>>,
    pub quality: Option<u8>,
    pub notes: Vec<String>,
}
