pub mod care;
pub mod ocr;
pub mod vision;

// Re-export commonly used services
pub use care::{CareExtractor, PlantCare, ReminderSchedule};
pub use ocr::{OcrEngine, TesseractEngine};
pub use vision::{ImageprocOps, VisionOps};
