// Pure-Rust vision backend built on image + imageproc

use image::{DynamicImage, GrayImage, ImageBuffer, Rgb, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::map::{blue_channel, green_channel, red_channel};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};
use tracing::trace;

use super::VisionOps;
use crate::core::types::RotationAction;

/// Vision operations backed by `imageproc`
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageprocOps;

impl ImageprocOps {
    pub fn new() -> Self {
        Self
    }

    /// Erode `iterations` times, then dilate `iterations` times
    fn open_channel(channel: &GrayImage, mask: &Mask, iterations: u32) -> GrayImage {
        let mut result = channel.clone();
        for _ in 0..iterations {
            result = grayscale_erode(&result, mask);
        }
        for _ in 0..iterations {
            result = grayscale_dilate(&result, mask);
        }
        result
    }
}

impl VisionOps for ImageprocOps {
    fn grayscale(&self, image: &DynamicImage) -> DynamicImage {
        DynamicImage::ImageLuma8(image.to_luma8())
    }

    fn threshold_binary(&self, image: &DynamicImage) -> DynamicImage {
        let gray = image.to_luma8();
        let level = otsu_level(&gray);
        trace!("Otsu threshold level: {}", level);
        DynamicImage::ImageLuma8(threshold(&gray, level, ThresholdType::Binary))
    }

    fn morphological_open(
        &self,
        image: &DynamicImage,
        kernel_size: u32,
        iterations: u32,
    ) -> DynamicImage {
        // Even kernel sizes round down to the nearest centred square
        let radius = (kernel_size / 2).min(u8::MAX as u32) as u8;
        let mask = Mask::square(radius);

        match image {
            DynamicImage::ImageLuma8(gray) => {
                DynamicImage::ImageLuma8(Self::open_channel(gray, &mask, iterations))
            }
            _ => {
                // Colour input is opened channel by channel; alpha is dropped
                let rgb: RgbImage = image.to_rgb8();
                let red = Self::open_channel(&red_channel(&rgb), &mask, iterations);
                let green = Self::open_channel(&green_channel(&rgb), &mask, iterations);
                let blue = Self::open_channel(&blue_channel(&rgb), &mask, iterations);

                let merged = ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
                    Rgb([
                        red.get_pixel(x, y)[0],
                        green.get_pixel(x, y)[0],
                        blue.get_pixel(x, y)[0],
                    ])
                });
                DynamicImage::ImageRgb8(merged)
            }
        }
    }

    fn rotate(&self, image: &DynamicImage, action: RotationAction) -> DynamicImage {
        match action {
            RotationAction::None => image.clone(),
            RotationAction::Rotate90Clockwise => image.rotate90(),
            RotationAction::Rotate180 => image.rotate180(),
            RotationAction::Rotate90CounterClockwise => image.rotate270(),
        }
    }
}
