pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use image_ops::{decode_image, decode_image_async, encode_png, has_image_extension, load_image_file};
pub use metrics::{Metrics, MetricsSnapshot};
