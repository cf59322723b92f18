use async_trait::async_trait;
use doorcore::interface::{FrameSource, RawImage};
use doorcore::prelude::CaptureError;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};

/// Configuration for generating synthetic camera frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub width: u32,
    pub height: u32,
    /// Peak per-channel noise added to every pixel.
    pub noise: u8,
    pub seed: u64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            noise: 12,
            seed: 0,
        }
    }
}

/// Renders a wall with a door panel whose opening angle drifts between frames.
pub fn render_frame(config: &FrameConfig, rng: &mut StdRng) -> RgbImage {
    let width = config.width.max(1);
    let height = config.height.max(1);
    let door_left = width * 2 / 5;
    let door_right = width * 3 / 5;
    let door_top = height / 8;
    // 0.0 = flush with the frame, 1.0 = swung fully out of view.
    let opening: f32 = rng.gen_range(0.0..1.0);
    let panel_right = door_left + ((door_right - door_left) as f32 * (1.0 - opening)) as u32;
    let noise = i16::from(config.noise);

    RgbImage::from_fn(width, height, |x, y| {
        let base: [u8; 3] = if (door_left..door_right).contains(&x) && y >= door_top {
            if x < panel_right {
                [120, 82, 45]
            } else {
                [18, 18, 22]
            }
        } else {
            [205, 200, 190]
        };
        let jitter = if noise > 0 {
            rng.gen_range(-noise..=noise)
        } else {
            0
        };
        Rgb(base.map(|channel| (i16::from(channel) + jitter).clamp(0, 255) as u8))
    })
}

/// Frame source that fabricates PNG frames from a seeded generator.
pub struct SyntheticFrames {
    config: Arc<FrameConfig>,
    rng: Arc<Mutex<StdRng>>,
}

fn encode_next(config: &FrameConfig, rng: &Mutex<StdRng>) -> Result<Vec<u8>, CaptureError> {
    let frame = {
        let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
        render_frame(config, &mut rng)
    };
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(frame)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|err| CaptureError::Unavailable(format!("synthetic frame: {}", err)))?;
    Ok(bytes)
}

impl SyntheticFrames {
    pub fn new(config: FrameConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config: Arc::new(config),
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn next_png(&self) -> Result<Vec<u8>, CaptureError> {
        encode_next(&self.config, &self.rng)
    }
}

#[async_trait]
impl FrameSource for SyntheticFrames {
    async fn request_frame(&self) -> Result<RawImage, CaptureError> {
        let config = self.config.clone();
        let rng = self.rng.clone();
        let bytes = tokio::task::spawn_blocking(move || encode_next(&config, &rng))
            .await
            .map_err(|err| CaptureError::Unavailable(format!("synthetic frame: {}", err)))??;
        Ok(RawImage::new(bytes))
    }
}
