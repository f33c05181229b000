//! WAV files and a chord model that recognises them.

use super::constants::*;
use anyhow::Result;
use chordline_server::chords::{CentroidModel, ChordCentroid, FeatureExtractor, MfccExtractor};
use std::path::{Path, PathBuf};

/// A block of constant sine tone.
#[derive(Debug, Clone, Copy)]
pub struct Tone {
    pub freq_hz: f32,
    pub secs: f32,
}

impl Tone {
    pub fn low(secs: f32) -> Self {
        Tone {
            freq_hz: LOW_TONE_HZ,
            secs,
        }
    }

    pub fn high(secs: f32) -> Self {
        Tone {
            freq_hz: HIGH_TONE_HZ,
            secs,
        }
    }
}

fn sine(freq_hz: f32, secs: f32, sample_rate: u32) -> Vec<f32> {
    let n = (secs * sample_rate as f32).round() as usize;
    (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * freq_hz * i as f32 / sample_rate as f32).sin() * 0.5)
        .collect()
}

/// Writes the tones back to back as a mono 16-bit WAV at [`TEST_SAMPLE_RATE`].
#[allow(dead_code)]
pub fn write_tone_wav(path: &Path, tones: &[Tone]) -> Result<()> {
    write_tone_wav_at(path, TEST_SAMPLE_RATE, tones)
}

#[allow(dead_code)]
pub fn write_tone_wav_at(path: &Path, sample_rate: u32, tones: &[Tone]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for tone in tones {
        for sample in sine(tone.freq_hz, tone.secs, sample_rate) {
            writer.write_sample((sample * i16::MAX as f32) as i16)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Builds a two-class model whose centroids are the features of the two test tones,
/// taken at the extractor's own rate.
pub fn write_test_model(dir: &Path) -> Result<PathBuf> {
    let extractor = MfccExtractor::default();
    let rate = extractor.sample_rate();
    let classes = [(LOW_TONE_LABEL, LOW_TONE_HZ), (HIGH_TONE_LABEL, HIGH_TONE_HZ)]
        .into_iter()
        .map(|(label, freq)| -> Result<ChordCentroid> {
            let centroid = extractor.extract(&sine(freq, 2.0, rate), rate)?;
            Ok(ChordCentroid {
                label: label.to_string(),
                centroid,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let model = CentroidModel::new(extractor.feature_len(), classes)?;
    let path = dir.join("model.json");
    std::fs::write(&path, model.to_json()?)?;
    Ok(path)
}
