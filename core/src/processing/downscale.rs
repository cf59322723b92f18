use image::imageops::{self, FilterType};
use image::DynamicImage;

use crate::prelude::{
    PipelineConfig, PipelineError, ProcessingStage, StageInput, StageMetadata, StageOutput,
    StageResult,
};
use crate::telemetry::log::LogManager;

/// Shrinks the frame so its longest edge fits `max_dimension`. Never upscales.
pub struct DownscaleStage {
    config: Option<PipelineConfig>,
    logger: LogManager,
}

impl DownscaleStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("downscale"),
        }
    }
}

impl Default for DownscaleStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Target size for `(width, height)` with the aspect ratio kept.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width, height);
    }
    let scale = max_dimension as f64 / longest as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_dimension);
    (scaled(width), scaled(height))
}

impl ProcessingStage for DownscaleStage {
    fn initialize(&mut self, config: &PipelineConfig) -> StageResult<()> {
        if config.max_dimension == 0 {
            return Err(PipelineError::Internal("max_dimension must be positive".into()));
        }
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| PipelineError::Internal("stage not initialized".into()))?;

        let (width, height) = (input.image.width(), input.image.height());
        let (target_w, target_h) = fit_within(width, height, config.max_dimension);
        if (target_w, target_h) == (width, height) {
            return Ok(StageOutput {
                image: input.image,
                metadata: StageMetadata {
                    notes: vec![format!("kept {}x{}", width, height)],
                    ..Default::default()
                },
            });
        }

        let gray = input.image.to_luma8();
        let resized = imageops::resize(&gray, target_w, target_h, FilterType::CatmullRom);
        self.logger.record(&format!(
            "{}x{} -> {}x{}",
            width, height, target_w, target_h
        ));

        Ok(StageOutput {
            image: DynamicImage::ImageLuma8(resized),
            metadata: StageMetadata {
                notes: vec![format!("resized to {}x{}", target_w, target_h)],
                ..Default::default()
            },
        })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}
