use async_trait::async_trait;
use doorcore::interface::{ImageStore, ProcessedImage};
use doorcore::prelude::StoreError;
use log::info;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Writes processed captures as numbered JPEG files.
pub struct DirectoryImageStore {
    dir: PathBuf,
    /// File numbering keeps running across count resets.
    sequence: AtomicUsize,
    saved: AtomicUsize,
}

fn store_error(path: &Path, err: std::io::Error) -> StoreError {
    let reason = format!("{}: {}", path.display(), err);
    match err.kind() {
        ErrorKind::PermissionDenied => StoreError::PermissionDenied(reason),
        _ => StoreError::StoreFailed(reason),
    }
}

impl DirectoryImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicUsize::new(0),
            saved: AtomicUsize::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ImageStore for DirectoryImageStore {
    async fn store(&self, image: &ProcessedImage) -> Result<usize, StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| store_error(&self.dir, err))?;

        // Reserve the number first so concurrent saves never share a name.
        let number = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self.dir.join(format!("capture-{:05}.jpg", number));
        tokio::fs::write(&path, image.bytes())
            .await
            .map_err(|err| store_error(&path, err))?;
        info!("saved {} ({}KB)", path.display(), image.size_kb());
        Ok(self.saved.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn reset_count(&self) {
        self.saved.store(0, Ordering::SeqCst);
    }
}
