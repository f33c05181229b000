//! Tempo-segmented chord recognition.

pub mod audio;
pub mod classifier;
pub mod features;
pub mod pipeline;
pub mod segmentation;
pub mod timeline;

pub use audio::Waveform;
pub use classifier::{CentroidModel, ChordCentroid, ChordClassifier};
pub use features::{FeatureExtractor, MfccExtractor};
pub use pipeline::{AnalysisError, ChordPipeline};
pub use timeline::{ChordEvent, ChordTimeline};
