// Image preprocessing: opening, grayscale, automatic binary threshold

use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::services::vision::VisionOps;

/// Square structuring element side length for the opening step
pub const OPENING_KERNEL_SIZE: u32 = 5;
/// Erosion and dilation passes for the opening step
pub const OPENING_ITERATIONS: u32 = 1;

/// Fixed morphological pipeline that makes label photos easier to read.
///
/// The step order is part of the output contract:
/// 1. opening (erode then dilate, 5x5, one pass each)
/// 2. grayscale
/// 3. Otsu binary threshold
pub struct Preprocessor {
    vision: Arc<dyn VisionOps>,
}

impl Preprocessor {
    pub fn new(vision: Arc<dyn VisionOps>) -> Self {
        Self { vision }
    }

    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn preprocess(&self, image: &DynamicImage) -> DynamicImage {
        let opened = self
            .vision
            .morphological_open(image, OPENING_KERNEL_SIZE, OPENING_ITERATIONS);
        let gray = self.vision.grayscale(&opened);
        let binary = self.vision.threshold_binary(&gray);

        debug!("Preprocessed image to {}x{} binary", binary.width(), binary.height());
        binary
    }
}
