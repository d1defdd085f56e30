// Vision capability: the image primitives the preprocessor and orchestrator consume

pub mod imageproc_ops;

use image::DynamicImage;

use crate::core::types::RotationAction;

pub use imageproc_ops::ImageprocOps;

/// Image transforms used by the recognition pipeline.
///
/// Implementations must not retain the input; every call returns a new buffer.
pub trait VisionOps: Send + Sync {
    /// Single intensity channel
    fn grayscale(&self, image: &DynamicImage) -> DynamicImage;

    /// Black/white image using an automatically selected global threshold
    fn threshold_binary(&self, image: &DynamicImage) -> DynamicImage;

    /// Erosion followed by dilation with a square all-ones kernel
    fn morphological_open(
        &self,
        image: &DynamicImage,
        kernel_size: u32,
        iterations: u32,
    ) -> DynamicImage;

    fn rotate(&self, image: &DynamicImage, action: RotationAction) -> DynamicImage;
}
