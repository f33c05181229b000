//! Spectral features for one analysis segment.
//!
//! The default extractor computes mel-frequency cepstral coefficients averaged over
//! the frames of the segment, yielding one fixed-length vector per segment.

use std::sync::Arc;

use anyhow::{bail, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

pub const DEFAULT_SAMPLE_RATE: u32 = 22050;
pub const DEFAULT_FRAME_LEN: usize = 2048;
pub const DEFAULT_HOP_LEN: usize = 512;
pub const DEFAULT_MEL_BANDS: usize = 128;
pub const DEFAULT_MFCC_COUNT: usize = 40;

/// Floor applied before taking logs of the mel power.
const POWER_FLOOR: f32 = 1e-10;
/// Dynamic range kept below the loudest mel bin.
const TOP_DB: f32 = 80.0;

pub trait FeatureExtractor: Send + Sync {
    /// Length of every vector returned by [`FeatureExtractor::extract`].
    fn feature_len(&self) -> usize;

    /// Rate the extractor is tuned for. Audio is resampled to it before segmentation.
    fn sample_rate(&self) -> u32;

    fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>>;
}

pub struct MfccExtractor {
    sample_rate: u32,
    frame_len: usize,
    hop_len: usize,
    mel_bands: usize,
    coefficients: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl MfccExtractor {
    pub fn new(
        sample_rate: u32,
        frame_len: usize,
        hop_len: usize,
        mel_bands: usize,
        coefficients: usize,
    ) -> Self {
        // periodic Hann
        let window = (0..frame_len)
            .map(|i| {
                0.5 * (1.0 - ((2.0 * std::f32::consts::PI * i as f32) / frame_len as f32).cos())
            })
            .collect();
        let fft = FftPlanner::new().plan_fft_forward(frame_len);
        Self {
            sample_rate,
            frame_len,
            hop_len: hop_len.max(1),
            mel_bands,
            coefficients: coefficients.min(mel_bands),
            window,
            fft,
        }
    }

    fn frame_count(&self, len: usize) -> usize {
        if len <= self.frame_len {
            1
        } else {
            1 + (len - self.frame_len).div_ceil(self.hop_len)
        }
    }

    /// Power spectrum (`frame_len / 2 + 1` bins) of one zero-padded, windowed frame.
    fn power_spectrum(&self, frame: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = self
            .window
            .iter()
            .enumerate()
            .map(|(i, w)| Complex::new(frame.get(i).copied().unwrap_or(0.0) * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);
        buffer[..self.frame_len / 2 + 1]
            .iter()
            .map(|c| c.norm_sqr())
            .collect()
    }
}

impl Default for MfccExtractor {
    fn default() -> Self {
        Self::new(
            DEFAULT_SAMPLE_RATE,
            DEFAULT_FRAME_LEN,
            DEFAULT_HOP_LEN,
            DEFAULT_MEL_BANDS,
            DEFAULT_MFCC_COUNT,
        )
    }
}

impl FeatureExtractor for MfccExtractor {
    fn feature_len(&self) -> usize {
        self.coefficients
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
        if samples.is_empty() {
            bail!("Cannot extract features from an empty segment");
        }
        if sample_rate == 0 {
            bail!("Sample rate must be positive");
        }
        if samples.iter().any(|s| !s.is_finite()) {
            bail!("Segment contains non-finite samples");
        }

        let filters = mel_filterbank(self.mel_bands, self.frame_len, sample_rate);
        let frames = self.frame_count(samples.len());

        let mut mel_db: Vec<Vec<f32>> = Vec::with_capacity(frames);
        for f in 0..frames {
            let start = (f * self.hop_len).min(samples.len());
            let end = (start + self.frame_len).min(samples.len());
            let spectrum = self.power_spectrum(&samples[start..end]);
            let mel = filters
                .iter()
                .map(|filter| {
                    let energy: f32 = filter.iter().zip(&spectrum).map(|(w, p)| w * p).sum();
                    10.0 * energy.max(POWER_FLOOR).log10()
                })
                .collect();
            mel_db.push(mel);
        }

        let peak = mel_db
            .iter()
            .flatten()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - TOP_DB;

        let mut mean = vec![0.0f32; self.coefficients];
        for mel in &mut mel_db {
            for value in mel.iter_mut() {
                *value = value.max(floor);
            }
            for (acc, c) in mean.iter_mut().zip(dct_ortho(mel, self.coefficients)) {
                *acc += c;
            }
        }
        for value in &mut mean {
            *value /= frames as f32;
        }

        if mean.iter().any(|v| !v.is_finite()) {
            bail!("Feature extraction produced non-finite values");
        }
        Ok(mean)
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular, area-normalised filters spanning 0 Hz to Nyquist.
fn mel_filterbank(bands: usize, frame_len: usize, sample_rate: u32) -> Vec<Vec<f32>> {
    let bins = frame_len / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;
    let max_mel = hz_to_mel(nyquist);
    let edges: Vec<f32> = (0..bands + 2)
        .map(|i| mel_to_hz(max_mel * i as f32 / (bands + 1) as f32))
        .collect();
    let bin_hz: Vec<f32> = (0..bins)
        .map(|b| b as f32 * sample_rate as f32 / frame_len as f32)
        .collect();

    (0..bands)
        .map(|m| {
            let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
            let norm = 2.0 / (hi - lo);
            bin_hz
                .iter()
                .map(|&hz| {
                    let rising = (hz - lo) / (center - lo);
                    let falling = (hi - hz) / (hi - center);
                    rising.min(falling).max(0.0) * norm
                })
                .collect()
        })
        .collect()
}

/// First `count` coefficients of the orthonormal DCT-II of `input`.
fn dct_ortho(input: &[f32], count: usize) -> Vec<f32> {
    let n = input.len() as f32;
    (0..count)
        .map(|k| {
            let sum: f32 = input
                .iter()
                .enumerate()
                .map(|(i, x)| {
                    x * (std::f32::consts::PI * k as f32 * (2.0 * i as f32 + 1.0) / (2.0 * n))
                        .cos()
                })
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * scale
        })
        .collect()
}
