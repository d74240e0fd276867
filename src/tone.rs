//! Alert tone synthesis: a short sine chirp with an exponential fall in both
//! pitch and gain.

use std::f32::consts::TAU;
use std::time::Duration;

/// Tone parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ToneSpec {
    pub start_hz: f32,
    pub end_hz: f32,
    pub start_gain: f32,
    pub end_gain: f32,
    pub duration: Duration,
}

impl ToneSpec {
    /// 880 Hz falling to 440 Hz over 100 ms
    pub fn alert() -> Self {
        Self {
            start_hz: 880.0,
            end_hz: 440.0,
            start_gain: 0.1,
            end_gain: 0.01,
            duration: Duration::from_millis(100),
        }
    }
}

impl Default for ToneSpec {
    fn default() -> Self {
        Self::alert()
    }
}

/// Mono PCM buffer ready for an audio sink
#[derive(Debug, Clone)]
pub struct Tone {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl Tone {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

/// Exponential interpolation from `from` to `to` at fraction `t` in [0, 1].
fn exp_ramp(from: f32, to: f32, t: f32) -> f32 {
    from * (to / from).powf(t)
}

/// Render the tone at the given sample rate.
pub fn synthesize(spec: &ToneSpec, sample_rate: u32) -> Tone {
    let count = (spec.duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;
    let mut samples = Vec::with_capacity(count);
    let mut phase = 0.0f32;

    for i in 0..count {
        let t = if count > 1 { i as f32 / (count - 1) as f32 } else { 0.0 };
        let freq = exp_ramp(spec.start_hz, spec.end_hz, t);
        let gain = exp_ramp(spec.start_gain, spec.end_gain, t);

        samples.push(phase.sin() * gain);

        phase += TAU * freq / sample_rate as f32;
        if phase > TAU {
            phase -= TAU;
        }
    }

    Tone { sample_rate, samples }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_count_matches_duration() {
        let tone = synthesize(&ToneSpec::alert(), 44_100);
        assert_eq!(tone.samples.len(), 4_410);
        assert!((tone.duration().as_secs_f64() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_gain_envelope_bounds() {
        let tone = synthesize(&ToneSpec::alert(), 16_000);
        assert!(tone.peak() <= 0.1 + 1e-6);
        assert!(tone.peak() > 0.05);

        // Tail is quieter than the head
        let n = tone.samples.len();
        let head = tone.samples[..n / 10].iter().fold(0.0f32, |a, s| a.max(s.abs()));
        let tail = tone.samples[n - n / 10..].iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!(tail < head);
        assert!(tail <= 0.02);
    }

    #[test]
    fn test_exp_ramp_endpoints() {
        assert!((exp_ramp(880.0, 440.0, 0.0) - 880.0).abs() < 1e-3);
        assert!((exp_ramp(880.0, 440.0, 1.0) - 440.0).abs() < 1e-3);
        assert!((exp_ramp(880.0, 440.0, 0.5) - 622.25).abs() < 0.1);
    }
}
