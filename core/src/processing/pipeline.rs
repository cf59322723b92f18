use image::DynamicImage;

use crate::interface::{ProcessedImage, RawImage};
use crate::prelude::{
    PipelineConfig, PipelineError, ProcessingStage, StageInput, StageOutput, StageResult,
};
use crate::processing::{CompressStage, DesaturateStage, DownscaleStage};

/// Turns a raw captured frame into a small grayscale JPEG.
///
/// Stages are built per call, so one pipeline can serve overlapping cycles
/// from several threads.
#[derive(Debug, Clone, Default)]
pub struct ImagePipeline {
    config: PipelineConfig,
}

fn run_stage(
    stage: &mut dyn ProcessingStage,
    config: &PipelineConfig,
    input: StageInput,
) -> StageResult<StageOutput> {
    stage.initialize(config)?;
    let output = stage.execute(input);
    stage.cleanup();
    output
}

impl ImagePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn process(&self, raw: &RawImage) -> StageResult<ProcessedImage> {
        let decoded = image::load_from_memory(&raw.bytes)
            .map_err(|err| PipelineError::DecodeFailed(err.to_string()))?;
        self.process_decoded(decoded)
    }

    /// Same as [`process`](Self::process) for a frame that is already decoded.
    pub fn process_decoded(&self, image: DynamicImage) -> StageResult<ProcessedImage> {
        let gray = run_stage(&mut DesaturateStage::new(), &self.config, StageInput { image })?;
        let small = run_stage(
            &mut DownscaleStage::new(),
            &self.config,
            StageInput { image: gray.image },
        )?;
        let compressed = run_stage(
            &mut CompressStage::new(),
            &self.config,
            StageInput { image: small.image },
        )?;

        let (width, height) = (compressed.image.width(), compressed.image.height());
        let quality = compressed
            .metadata
            .quality
            .ok_or_else(|| PipelineError::Internal("compress stage reported no quality".into()))?;
        let bytes = compressed
            .metadata
            .encoded
            .ok_or_else(|| PipelineError::Internal("compress stage produced no bytes".into()))?;

        Ok(ProcessedImage::new(bytes, width, height, quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_frame(width: u32, height: u32) -> RawImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        RawImage::new(bytes)
    }

    #[test]
    fn pipeline_produces_small_grayscale_jpeg() {
        let pipeline = ImagePipeline::default();
        let processed = pipeline.process(&png_frame(1280, 720)).unwrap();

        assert_eq!(processed.dimensions(), (320, 180));
        assert!(processed.size_bytes() <= pipeline.config().max_size_bytes());

        let decoded = image::load_from_memory(processed.bytes()).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
    }

    #[test]
    fn pipeline_rejects_undecodable_input() {
        let pipeline = ImagePipeline::default();
        let result = pipeline.process(&RawImage::new(b"not an image".to_vec()));
        assert!(matches!(result, Err(PipelineError::DecodeFailed(_))));
    }

    #[test]
    fn pipeline_is_deterministic() {
        let pipeline = ImagePipeline::default();
        let frame = png_frame(400, 300);
        let first = pipeline.process(&frame).unwrap();
        let second = pipeline.process(&frame).unwrap();
        assert_eq!(first.bytes(), second.bytes());
    }

    #[test]
    fn tight_budget_reports_floor_quality() {
        let pipeline = ImagePipeline::new(PipelineConfig {
            max_size_kb: 0,
            ..Default::default()
        });
        let processed = pipeline.process(&png_frame(64, 64)).unwrap();
        assert_eq!(processed.quality(), 10);
    }
}
