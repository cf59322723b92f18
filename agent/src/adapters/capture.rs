use async_trait::async_trait;
use doorcore::interface::{FrameSource, RawImage};
use doorcore::prelude::CaptureError;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

const FRAME_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Replays still images from a directory in name order, wrapping around.
pub struct DirectoryFrameSource {
    frames: Vec<PathBuf>,
    next: AtomicUsize,
}

impl DirectoryFrameSource {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let dir = dir.as_ref();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|err| CaptureError::Unavailable(format!("{}: {}", dir.display(), err)))?;

        let mut frames = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| CaptureError::Unavailable(err.to_string()))?
        {
            let path = entry.path();
            if is_frame_file(&path) {
                frames.push(path);
            }
        }
        if frames.is_empty() {
            return Err(CaptureError::Unavailable(format!(
                "no image files in {}",
                dir.display()
            )));
        }
        frames.sort();
        debug!("replaying {} frames from {}", frames.len(), dir.display());

        Ok(Self {
            frames,
            next: AtomicUsize::new(0),
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    async fn request_frame(&self) -> Result<RawImage, CaptureError> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        let path = &self.frames[index];
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| CaptureError::Unavailable(format!("{}: {}", path.display(), err)))?;
        Ok(RawImage::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn frames_replay_in_name_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.png"), b"second").unwrap();
        std::fs::write(dir.path().join("a.JPG"), b"first").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();

        let source = DirectoryFrameSource::open(dir.path()).await.unwrap();
        assert_eq!(source.frame_count(), 2);
        assert_eq!(source.request_frame().await.unwrap().bytes, b"first");
        assert_eq!(source.request_frame().await.unwrap().bytes, b"second");
        assert_eq!(source.request_frame().await.unwrap().bytes, b"first");
    }

    #[tokio::test]
    async fn empty_directory_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = DirectoryFrameSource::open(dir.path()).await.err().unwrap();
        assert!(matches!(err, CaptureError::Unavailable(_)));
    }
}
