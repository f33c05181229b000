use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use super::audio::Waveform;
use super::classifier::ChordClassifier;
use super::features::FeatureExtractor;
use super::segmentation::{segment_bounds, segment_count, segment_duration, segment_start_secs};
use super::timeline::ChordTimeline;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The track had whole segments but none of them could be classified.
    #[error("all {0} segments failed to classify")]
    AllSegmentsFailed(usize),
}

/// Turns a waveform and a tempo into a compressed chord timeline.
///
/// Shared read-only between connections; analysis itself keeps no state.
pub struct ChordPipeline {
    extractor: Arc<dyn FeatureExtractor>,
    classifier: Arc<dyn ChordClassifier>,
}

impl ChordPipeline {
    pub fn new(
        extractor: Arc<dyn FeatureExtractor>,
        classifier: Arc<dyn ChordClassifier>,
    ) -> Result<Self> {
        if extractor.feature_len() != classifier.feature_len() {
            bail!(
                "Feature extractor produces {} values but the classifier expects {}",
                extractor.feature_len(),
                classifier.feature_len()
            );
        }
        Ok(Self {
            extractor,
            classifier,
        })
    }

    /// Loads `path` and analyzes it at `bpm`.
    pub fn analyze_file(&self, path: &Path, bpm: u32) -> Result<ChordTimeline> {
        let waveform = Waveform::load_wav(path)
            .with_context(|| format!("Failed to load audio from {}", path.display()))?;
        self.analyze(&waveform, bpm)
    }

    /// Resamples to the extractor's rate, classifies every whole segment and collapses
    /// the predictions. Fails with [`AnalysisError::AllSegmentsFailed`] when there were
    /// segments to classify and none succeeded.
    pub fn analyze(&self, waveform: &Waveform, bpm: u32) -> Result<ChordTimeline> {
        if bpm == 0 {
            bail!("Tempo must be positive");
        }
        let waveform = waveform
            .resampled(self.extractor.sample_rate())
            .context("resampling for analysis")?;
        let segment_secs = segment_duration(bpm);
        let segments = segment_count(waveform.duration_secs(), segment_secs);
        debug!(
            "Analyzing {:.2}s of audio at {} BPM: {} segments of {:.3}s",
            waveform.duration_secs(),
            bpm,
            segments,
            segment_secs
        );

        let mut predictions = Vec::with_capacity(segments);
        for index in 0..segments {
            let (start, end) = segment_bounds(index, segment_secs, waveform.sample_rate);
            let end = end.min(waveform.samples.len());
            let start = start.min(end);
            let segment = &waveform.samples[start..end];

            let label = match self.classify_segment(segment, waveform.sample_rate) {
                Ok(label) => label,
                Err(err) => {
                    warn!("Skipping segment {} ({}..{}): {:#}", index, start, end, err);
                    continue;
                }
            };
            predictions.push((label, segment_start_secs(index, segment_secs)));
        }

        if segments > 0 && predictions.is_empty() {
            return Err(AnalysisError::AllSegmentsFailed(segments).into());
        }
        Ok(ChordTimeline::from_predictions(predictions))
    }

    fn classify_segment(&self, segment: &[f32], sample_rate: u32) -> Result<String> {
        let features = self
            .extractor
            .extract(segment, sample_rate)
            .context("feature extraction failed")?;
        self.classifier
            .predict(&features)
            .context("classification failed")
    }
}
