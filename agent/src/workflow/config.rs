use anyhow::Context;
use doorcore::prelude::{
    ClassifierConfig, EndpointConfig, LoopConfig, OrchestratorConfig, PipelineConfig,
    ScheduleConfig,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY_HERE";
pub const PLACEHOLDER_MODEL: &str = "YOUR_MODEL_NAME";

/// Hosted object-detection model settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub version: u32,
    pub confidence_threshold: f32,
    pub overlap_threshold: f32,
    pub max_objects: u32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            api_url: "https://detect.roboflow.com".into(),
            api_key: PLACEHOLDER_API_KEY.into(),
            model: PLACEHOLDER_MODEL.into(),
            version: 1,
            confidence_threshold: 0.5,
            overlap_threshold: 0.5,
            max_objects: 10,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Directory of still images to cycle through. Synthetic frames otherwise.
    pub frames_dir: Option<PathBuf>,
    pub synthetic_seed: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Where processed captures are written. Nothing is stored when unset.
    pub output_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub endpoint: EndpointConfig,
    pub pipeline: PipelineConfig,
    pub schedule: ScheduleConfig,
    pub classifier: ClassifierConfig,
    pub orchestrator: OrchestratorConfig,
    pub inference: InferenceSettings,
    pub capture: CaptureSettings,
    pub storage: StorageSettings,
    pub bridge_port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            pipeline: PipelineConfig::default(),
            schedule: ScheduleConfig::default(),
            classifier: ClassifierConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            inference: InferenceSettings::default(),
            capture: CaptureSettings::default(),
            storage: StorageSettings::default(),
            bridge_port: 9000,
        }
    }
}

impl AgentConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading agent config {}", path_ref.display()))?;
        let config: AgentConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing agent config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        host: String,
        port: u16,
        countdown_secs: u32,
        capture_interval_ms: u64,
        frames_dir: Option<PathBuf>,
        output_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            endpoint: EndpointConfig {
                host,
                port,
                ..Default::default()
            },
            schedule: ScheduleConfig {
                countdown_secs,
                capture_interval_ms,
                ..Default::default()
            },
            capture: CaptureSettings {
                frames_dir,
                ..Default::default()
            },
            storage: StorageSettings { output_dir },
            ..Default::default()
        }
    }

    pub fn to_loop_config(&self) -> LoopConfig {
        LoopConfig {
            pipeline: self.pipeline.clone(),
            schedule: self.schedule.clone(),
            classifier: self.classifier.clone(),
            orchestrator: self.orchestrator.clone(),
        }
    }
}
