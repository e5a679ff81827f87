use crate::engine::{ScoreError, ScoreSource, WaveformScorer};

const DEFAULT_FRAME_LEN: usize = 512;

/// Synthetic-speech artifact scoring over a raw waveform.
///
/// Vocoded audio tends to have unnaturally uniform frame energy and
/// zero-crossing behavior compared to live speech, so the score combines
/// per-frame RMS uniformity, zero-crossing uniformity, and the mean
/// zero-crossing rate into one artifact score in [0, 1].
#[derive(Debug)]
pub struct AcousticScorer {
    frame_len: usize,
}

impl Default for AcousticScorer {
    fn default() -> Self {
        Self {
            frame_len: DEFAULT_FRAME_LEN,
        }
    }
}

fn rms(frame: &[f32]) -> f64 {
    let sum: f64 = frame.iter().map(|s| (*s as f64) * (*s as f64)).sum();
    (sum / frame.len() as f64).sqrt()
}

fn zero_crossing_rate(frame: &[f32]) -> f64 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / (frame.len() - 1) as f64
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// 1 - coefficient of variation, clamped. A dead-flat sequence (including
/// all-zero) reads as maximally uniform.
fn uniformity(values: &[f64]) -> f64 {
    let m = mean(values);
    if m < 1e-9 {
        return 1.0;
    }
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    (1.0 - variance.sqrt() / m).clamp(0.0, 1.0)
}

impl WaveformScorer for AcousticScorer {
    fn score(&self, samples: &[f32]) -> Result<f64, ScoreError> {
        if samples.is_empty() {
            return Err(ScoreError::new(ScoreSource::Acoustic, "empty waveform"));
        }
        let frames: Vec<&[f32]> = samples.chunks(self.frame_len).collect();
        let energies: Vec<f64> = frames.iter().map(|f| rms(f)).collect();
        let rates: Vec<f64> = frames.iter().map(|f| zero_crossing_rate(f)).collect();

        let artifact = 0.4 * uniformity(&energies) + 0.3 * uniformity(&rates) + 0.3 * mean(&rates);
        Ok(artifact.clamp(0.0, 1.0))
    }
}
