use image::codecs::jpeg::JpegEncoder;

use crate::prelude::{
    PipelineConfig, PipelineError, ProcessingStage, StageInput, StageMetadata, StageOutput,
    StageResult,
};
use crate::processing::buffer_pool::BufferPool;
use crate::telemetry::log::LogManager;

/// JPEG quality search: re-encode at falling quality until the output fits
/// the size ceiling or the quality floor is reached.
///
/// The last attempt is returned even when it is still over budget.
pub struct CompressStage {
    pool: BufferPool,
    config: Option<PipelineConfig>,
    logger: LogManager,
}

impl CompressStage {
    pub fn new() -> Self {
        Self {
            pool: BufferPool::with_capacity(1),
            config: None,
            logger: LogManager::new("compress"),
        }
    }
}

impl Default for CompressStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for CompressStage {
    fn initialize(&mut self, config: &PipelineConfig) -> StageResult<()> {
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| PipelineError::Internal("stage not initialized".into()))?;

        let ceiling = config.max_size_bytes();
        let floor = config.min_quality.clamp(1, 100);
        let step = config.quality_step.max(1);
        let mut quality = config.start_quality.clamp(floor, 100);
        let gray = input.image.to_luma8();
        let mut attempts = 0usize;

        let encoded = loop {
            attempts += 1;
            let mut buffer = self.pool.checkout()?;
            let result = JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(&gray);
            if let Err(err) = result {
                self.pool.release(buffer);
                return Err(PipelineError::EncodeFailed(err.to_string()));
            }

            if buffer.len() <= ceiling || quality <= floor {
                self.pool.detach();
                break buffer;
            }

            self.logger.record(&format!(
                "quality {} gave {} bytes, over {}",
                quality,
                buffer.len(),
                ceiling
            ));
            self.pool.release(buffer);
            quality = quality.saturating_sub(step).max(floor);
        };

        if encoded.len() > ceiling {
            self.logger.warn(&format!(
                "still {} bytes at quality floor {}",
                encoded.len(),
                quality
            ));
        }

        let metadata = StageMetadata {
            notes: vec![format!(
                "quality {} after {} attempt(s), {} bytes",
                quality,
                attempts,
                encoded.len()
            )],
            encoded: Some(encoded),
            quality: Some(quality),
        };

        Ok(StageOutput {
            image: input.image,
            metadata,
        })
    }

    fn cleanup(&mut self) {
        self.pool.reset();
        self.config = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};

    fn noisy(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
            Luma([((x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) % 251) as u8])
        }))
    }

    fn compress(image: DynamicImage, config: PipelineConfig) -> StageOutput {
        let mut stage = CompressStage::new();
        stage.initialize(&config).unwrap();
        let output = stage.execute(StageInput { image }).unwrap();
        stage.cleanup();
        output
    }

    #[test]
    fn generous_ceiling_keeps_start_quality() {
        let output = compress(noisy(64, 64), PipelineConfig::default());
        assert_eq!(output.metadata.quality, Some(100));
        assert!(output.metadata.encoded.unwrap().len() <= 500 * 1024);
    }

    #[test]
    fn impossible_ceiling_stops_at_floor() {
        let config = PipelineConfig {
            max_size_kb: 0,
            ..Default::default()
        };
        let output = compress(noisy(64, 64), config);
        assert_eq!(output.metadata.quality, Some(10));
        assert!(!output.metadata.encoded.unwrap().is_empty());
    }

    #[test]
    fn output_fits_ceiling_or_reaches_floor() {
        for max_size_kb in [0, 1, 2, 4, 8, 500] {
            let config = PipelineConfig {
                max_size_kb,
                ..Default::default()
            };
            let output = compress(noisy(200, 150), config.clone());
            let size = output.metadata.encoded.as_ref().unwrap().len();
            let quality = output.metadata.quality.unwrap();
            assert!(
                size <= config.max_size_bytes() || quality == config.min_quality,
                "max_size_kb={} size={} quality={}",
                max_size_kb,
                size,
                quality
            );
        }
    }

    #[test]
    fn zero_step_still_terminates() {
        let config = PipelineConfig {
            max_size_kb: 0,
            quality_step: 0,
            ..Default::default()
        };
        let output = compress(noisy(16, 16), config);
        assert_eq!(output.metadata.quality, Some(10));
    }
}
