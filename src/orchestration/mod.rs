pub mod batch;
pub mod recognition_orchestrator;

pub use batch::{collect_images, BatchReport, BatchRunner, LabelResult};
pub use recognition_orchestrator::RecognitionOrchestrator;
