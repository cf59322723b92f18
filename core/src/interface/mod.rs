pub mod detection;
pub mod frame;
pub mod ports;

pub use detection::{BoundingBox, DoorState, RawDetection, Verdict};
pub use frame::{ProcessedImage, RawImage};
pub use ports::{FrameSource, ImageStore, InferenceEngine, StateNotifier};
