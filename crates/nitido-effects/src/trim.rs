//! Smoothed linear gain stage.

use nitido_core::{Effect, ParamDescriptor, ParamUnit, ParameterInfo, SmoothedParam};

/// A plain gain multiplier with 10 ms smoothing.
///
/// The enhancement chain uses two of these: a pre-gain ahead of the
/// reverb to lift weak microphone signals, and an output trim behind
/// the gate. Gain is linear, 0 to 8 (up to +18 dB).
///
/// ## Parameter Indices (`ParameterInfo`)
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Gain | 0.0–8.0 | 1.0 |
#[derive(Debug, Clone)]
pub struct Trim {
    gain: SmoothedParam,
}

impl Trim {
    /// Create a unity-gain trim.
    pub fn new(sample_rate: f32) -> Self {
        Trim {
            gain: SmoothedParam::standard(1.0, sample_rate),
        }
    }

    /// Create with a starting gain, applied without a ramp.
    pub fn with_gain(sample_rate: f32, gain: f32) -> Self {
        let mut trim = Self::new(sample_rate);
        trim.gain.set_immediate(gain.clamp(0.0, 8.0));
        trim
    }

    /// Set the linear gain target (0 to 8).
    pub fn set_gain(&mut self, gain: f32) {
        self.gain.set_target(gain.clamp(0.0, 8.0));
    }

    /// Current gain target.
    pub fn gain(&self) -> f32 {
        self.gain.target()
    }
}

impl Effect for Trim {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        input * self.gain.advance()
    }

    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        // One advance per frame keeps the channels identically scaled.
        let gain = self.gain.advance();
        (left * gain, right * gain)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.gain.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.gain.snap_to_target();
    }
}

impl ParameterInfo for Trim {
    fn param_count(&self) -> usize {
        1
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(ParamDescriptor {
                name: "Gain",
                short_name: "Gain",
                unit: ParamUnit::None,
                min: 0.0,
                max: 8.0,
                default: 1.0,
                step: 0.01,
            }),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.gain.target(),
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if index == 0 {
            self.set_gain(value);
        }
    }
}
