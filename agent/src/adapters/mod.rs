//! Concrete collaborators for the control loop.

pub mod capture;
pub mod detector;
pub mod store;

pub use capture::DirectoryFrameSource;
pub use detector::HostedDetector;
pub use store::DirectoryImageStore;
