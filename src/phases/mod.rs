// Recognition pipeline stages, in execution order

pub mod preprocess;
pub mod orientation;
pub mod extraction;
pub mod fragments;

pub use extraction::{assess_quality, QualityGatedExtractor};
pub use fragments::split_fragments;
pub use orientation::OrientationResolver;
pub use preprocess::Preprocessor;
