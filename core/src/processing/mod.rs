pub mod buffer_pool;
pub mod compress;
pub mod desaturate;
pub mod downscale;
pub mod pipeline;

pub use buffer_pool::BufferPool;
pub use compress::CompressStage;
pub use desaturate::DesaturateStage;
pub use downscale::DownscaleStage;
pub use pipeline::ImagePipeline;
