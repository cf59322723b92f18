use crate::adapters::{DirectoryFrameSource, DirectoryImageStore, HostedDetector};
use crate::generator::frames::{FrameConfig, SyntheticFrames};
use crate::workflow::config::AgentConfig;
use anyhow::Context;
use doorcore::interface::{FrameSource, ImageStore};
use doorcore::notify::NotificationLink;
use doorcore::{CaptureOrchestrator, Collaborators};
use log::info;
use std::sync::Arc;

/// Loop plus the link it notifies through, wired from an [`AgentConfig`].
pub struct Runner {
    pub orchestrator: CaptureOrchestrator,
    pub link: Arc<NotificationLink>,
}

impl Runner {
    pub async fn build(config: &AgentConfig) -> anyhow::Result<Self> {
        let link = Arc::new(NotificationLink::new(config.endpoint.clone()));

        let frames: Arc<dyn FrameSource> = match &config.capture.frames_dir {
            Some(dir) => {
                let source = DirectoryFrameSource::open(dir)
                    .await
                    .with_context(|| format!("opening frames directory {}", dir.display()))?;
                info!("replaying {} frames from {}", source.frame_count(), dir.display());
                Arc::new(source)
            }
            None => {
                info!("no frames directory configured, using synthetic frames");
                Arc::new(SyntheticFrames::new(FrameConfig {
                    seed: config.capture.synthetic_seed,
                    ..Default::default()
                }))
            }
        };

        let store = config.storage.output_dir.as_ref().map(|dir| {
            let store = DirectoryImageStore::new(dir.clone());
            info!("storing captures in {}", store.dir().display());
            Arc::new(store) as Arc<dyn ImageStore>
        });

        let collaborators = Collaborators {
            frames,
            inference: Arc::new(HostedDetector::new(config.inference.clone())),
            store,
            notifier: link.clone(),
        };

        Ok(Self {
            orchestrator: CaptureOrchestrator::new(config.to_loop_config(), collaborators),
            link,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[tokio::test]
    async fn runner_builds_with_synthetic_frames() {
        let cfg = AgentConfig::from_args("127.0.0.1".into(), 8080, 1, 1000, None, None);
        let runner = Runner::build(&cfg).await.unwrap();
        assert_eq!(runner.link.endpoint().port, 8080);
        assert_eq!(runner.orchestrator.status().capture_status, "Idle");
    }

    #[tokio::test]
    async fn runner_rejects_missing_frames_directory() {
        let dir = TempDir::new().unwrap();
        let missing = PathBuf::from(dir.path()).join("absent");
        let cfg = AgentConfig::from_args("127.0.0.1".into(), 80, 1, 1000, Some(missing), None);
        let err = Runner::build(&cfg).await.err().unwrap();
        assert!(err.to_string().contains("opening frames directory"));
    }
}
