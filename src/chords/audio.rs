use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use rubato::{FftFixedIn, Resampler};

/// Input frames handed to the resampler per call.
const RESAMPLE_CHUNK: usize = 1024;

/// Mono PCM samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Loads a WAV file, averaging channels down to mono.
    pub fn load_wav(path: &Path) -> Result<Waveform> {
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        let spec = reader.spec();
        if spec.channels == 0 {
            bail!("{} has zero channels", path.display());
        }
        if spec.sample_rate == 0 {
            bail!("{} has a sample rate of zero", path.display());
        }

        let interleaved = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|sample| sample.map_err(|err| anyhow!(err)))
                .collect::<Result<Vec<f32>>>()?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                match spec.bits_per_sample {
                    8 => reader
                        .samples::<i8>()
                        .map(|sample| sample.map(|v| v as f32 / scale).map_err(|err| anyhow!(err)))
                        .collect::<Result<Vec<f32>>>()?,
                    16 => reader
                        .samples::<i16>()
                        .map(|sample| sample.map(|v| v as f32 / scale).map_err(|err| anyhow!(err)))
                        .collect::<Result<Vec<f32>>>()?,
                    24 | 32 => reader
                        .samples::<i32>()
                        .map(|sample| sample.map(|v| v as f32 / scale).map_err(|err| anyhow!(err)))
                        .collect::<Result<Vec<f32>>>()?,
                    other => bail!(
                        "Unsupported bits per sample {} in {}",
                        other,
                        path.display()
                    ),
                }
            }
        };

        let samples = downmix(&interleaved, spec.channels as usize);
        Ok(Waveform::new(samples, spec.sample_rate))
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Converts to `target_rate`. The output keeps the input's duration, with the
    /// resampler's delay trimmed from the front.
    pub fn resampled(&self, target_rate: u32) -> Result<Waveform> {
        if target_rate == 0 || self.sample_rate == 0 {
            bail!(
                "Cannot resample from {} Hz to {} Hz",
                self.sample_rate,
                target_rate
            );
        }
        if target_rate == self.sample_rate || self.samples.is_empty() {
            return Ok(Waveform::new(self.samples.clone(), target_rate));
        }

        let mut resampler = FftFixedIn::<f32>::new(
            self.sample_rate as usize,
            target_rate as usize,
            RESAMPLE_CHUNK,
            2,
            1,
        )
        .context("creating resampler")?;
        let expected =
            (self.samples.len() as u64 * target_rate as u64 / self.sample_rate as u64) as usize;
        let delay = resampler.output_delay();

        let mut output = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);
        let mut chunks = self.samples.chunks_exact(RESAMPLE_CHUNK);
        for chunk in &mut chunks {
            let frames = resampler.process(std::slice::from_ref(&chunk), None)?;
            output.extend_from_slice(&frames[0]);
        }
        let tail = chunks.remainder();
        if !tail.is_empty() {
            let frames = resampler.process_partial(Some(std::slice::from_ref(&tail)), None)?;
            output.extend_from_slice(&frames[0]);
        }
        while output.len() < expected + delay {
            let frames = resampler.process_partial(None::<&[&[f32]]>, None)?;
            if frames[0].is_empty() {
                break;
            }
            output.extend_from_slice(&frames[0]);
        }

        output.drain(..delay.min(output.len()));
        output.resize(expected, 0.0);
        Ok(Waveform::new(output, target_rate))
    }
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: &[Vec<i16>]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for sample in frame {
                writer.write_sample(*sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn loads_mono_16_bit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mono.wav");
        let frames: Vec<Vec<i16>> = (0..8000).map(|_| vec![16384]).collect();
        write_wav(&path, 1, 8000, &frames);

        let waveform = Waveform::load_wav(&path).unwrap();
        assert_eq!(waveform.sample_rate, 8000);
        assert_eq!(waveform.samples.len(), 8000);
        assert!((waveform.samples[0] - 0.5).abs() < 1e-4);
        assert!((waveform.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        let frames: Vec<Vec<i16>> = (0..100).map(|_| vec![16384, -16384]).collect();
        write_wav(&path, 2, 4000, &frames);

        let waveform = Waveform::load_wav(&path).unwrap();
        assert_eq!(waveform.samples.len(), 100);
        assert!(waveform.samples.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn float_samples_are_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("float.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(0.25f32).unwrap();
        }
        writer.finalize().unwrap();

        let waveform = Waveform::load_wav(&path).unwrap();
        assert_eq!(waveform.samples, vec![0.25; 10]);
    }

    fn sine(freq: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * secs) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    /// Sign changes per second, a rough pitch estimate for a pure tone.
    fn crossing_rate(waveform: &Waveform) -> f64 {
        let crossings = waveform
            .samples
            .windows(2)
            .filter(|pair| (pair[0] < 0.0) != (pair[1] < 0.0))
            .count();
        crossings as f64 / waveform.duration_secs()
    }

    #[test]
    fn resampling_keeps_duration_and_pitch() {
        let original = Waveform::new(sine(440.0, 8000, 2.0), 8000);
        let resampled = original.resampled(22050).unwrap();

        assert_eq!(resampled.sample_rate, 22050);
        assert_eq!(resampled.samples.len(), 44100);
        assert!((resampled.duration_secs() - original.duration_secs()).abs() < 1e-9);
        // A 440 Hz tone crosses zero 880 times per second.
        assert!((crossing_rate(&resampled) - 880.0).abs() < 10.0);
        let peak = resampled.samples[4000..40000]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.05);
    }

    #[test]
    fn resampling_to_the_same_rate_is_identity() {
        let original = Waveform::new(vec![0.1, -0.2, 0.3], 16000);
        let same = original.resampled(16000).unwrap();
        assert_eq!(same.samples, original.samples);
        assert_eq!(same.sample_rate, 16000);
    }

    #[test]
    fn resampling_to_zero_hz_fails() {
        assert!(Waveform::new(vec![0.0; 10], 8000).resampled(0).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Waveform::load_wav(&dir.path().join("nope.wav")).is_err());
    }

    #[test]
    fn non_wav_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.wav");
        std::fs::write(&path, b"definitely not a RIFF file").unwrap();
        assert!(Waveform::load_wav(&path).is_err());
    }
}
