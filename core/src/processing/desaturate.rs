use image::DynamicImage;

use crate::prelude::{
    PipelineConfig, ProcessingStage, StageInput, StageMetadata, StageOutput, StageResult,
};
use crate::telemetry::log::LogManager;

/// Collapses the frame to a single luminance channel.
pub struct DesaturateStage {
    logger: LogManager,
}

impl DesaturateStage {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("desaturate"),
        }
    }
}

impl Default for DesaturateStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for DesaturateStage {
    fn initialize(&mut self, _config: &PipelineConfig) -> StageResult<()> {
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let gray = match input.image {
            DynamicImage::ImageLuma8(gray) => gray,
            other => other.to_luma8(),
        };
        self.logger
            .record(&format!("luma {}x{}", gray.width(), gray.height()));

        Ok(StageOutput {
            image: DynamicImage::ImageLuma8(gray),
            metadata: StageMetadata::default(),
        })
    }

    fn cleanup(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, Rgb, RgbImage};

    #[test]
    fn desaturate_stage_outputs_single_channel() {
        let mut stage = DesaturateStage::new();
        stage.initialize(&PipelineConfig::default()).unwrap();
        let rgb = RgbImage::from_pixel(4, 3, Rgb([255, 0, 0]));

        let output = stage
            .execute(StageInput {
                image: DynamicImage::ImageRgb8(rgb),
            })
            .unwrap();

        assert_eq!(output.image.color(), ColorType::L8);
        assert_eq!((output.image.width(), output.image.height()), (4, 3));
        stage.cleanup();
    }
}
