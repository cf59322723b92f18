//! Async ports for the collaborators the control loop drives.

use async_trait::async_trait;

use super::{DoorState, ProcessedImage, RawDetection, RawImage};
use crate::prelude::{CaptureError, InferenceError, NotifyError, StoreError};

/// Produces one encoded frame per request.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn request_frame(&self) -> Result<RawImage, CaptureError>;
}

/// Object-detection model.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Whether `detect` may be called. Checked before every call.
    fn is_ready(&self) -> bool;

    /// Load (or reload) the model. Readiness flips to true on success.
    async fn load(&self) -> Result<(), InferenceError>;

    /// Run detection. Fails fast with [`InferenceError::ModelNotReady`] when
    /// called before a successful `load`.
    async fn detect(&self, image: &ProcessedImage) -> Result<Vec<RawDetection>, InferenceError>;
}

/// Persists processed images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store the image and return how many images have been stored so far.
    async fn store(&self, image: &ProcessedImage) -> Result<usize, StoreError>;

    /// Restart the stored-image count from zero. Stored images are kept.
    fn reset_count(&self);
}

/// Delivers door-state changes to the actuator controller.
#[async_trait]
pub trait StateNotifier: Send + Sync {
    async fn notify(&self, state: DoorState) -> Result<(), NotifyError>;

    /// Zero-payload reachability check.
    async fn probe(&self) -> Result<(), NotifyError>;
}
