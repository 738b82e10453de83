//! Level gate for suppressing signal below a threshold.
//!
//! The gate watches block energy, not individual samples: detection
//! runs once per processed block against the RMS of that block, and the
//! resulting gain change is ramped per sample so a decision never
//! clicks. When closed the gate settles at a small floor gain rather
//! than zero, which keeps a trace of room tone and avoids the pumping
//! feel of hard muting.

use nitido_core::{
    Effect, LinearSmoothedParam, ParamDescriptor, ParamUnit, ParameterInfo, linear_to_db, rms,
};

/// Position in the open/close cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Observer snapshot of the gate.
///
/// `is_open` reflects the detector's most recent decision, not the gain
/// ramp: it flips the moment a transition starts, while the audible
/// gain is still in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateState {
    /// True from the open decision until the close decision.
    pub is_open: bool,
    /// Active threshold in dB.
    pub threshold_db: f32,
    /// Position of the most recent transition on the processed-sample
    /// clock, in seconds. `None` until the first transition.
    pub last_transition_secs: Option<f32>,
}

/// Block-driven RMS noise gate.
///
/// The same threshold gates both directions; the asymmetric attack and
/// release ramps are what keep brief threshold crossings from
/// chattering. Stereo processing is linked: one detector drives one
/// gain ramp applied to both channels.
///
/// ## Parameter Indices (`ParameterInfo`)
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Threshold | -80.0–0.0 dB | -40.0 |
/// | 1 | Attack | 1.0–100.0 ms | 10.0 |
/// | 2 | Release | 10.0–1000.0 ms | 100.0 |
/// | 3 | Floor | 0.001–0.1 | 0.01 |
///
/// # Example
///
/// ```rust
/// use nitido_effects::LevelGate;
/// use nitido_core::Effect;
///
/// let mut gate = LevelGate::new(48000.0);
/// gate.set_threshold_db(-40.0);
///
/// let mut left = vec![0.3f32; 256];
/// let mut right = vec![0.3f32; 256];
/// gate.process_block_stereo(&mut left, &mut right);
/// assert!(gate.state().is_open);
/// ```
#[derive(Debug, Clone)]
pub struct LevelGate {
    threshold_db: f32,
    attack_ms: f32,
    release_ms: f32,
    floor: f32,

    phase: Phase,
    /// Shared gain ramp, applied to every channel.
    gain: LinearSmoothedParam,
    sample_rate: f32,

    open_transitions: u64,
    close_transitions: u64,
    /// Sample clock, advanced by every processed frame.
    samples_processed: u64,
    last_transition_at: Option<u64>,
}

impl LevelGate {
    /// Create a gate in the closed state.
    pub fn new(sample_rate: f32) -> Self {
        let floor = 0.01;
        LevelGate {
            threshold_db: -40.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            floor,
            phase: Phase::Closed,
            gain: LinearSmoothedParam::with_config(floor, sample_rate, 100.0),
            sample_rate,
            open_transitions: 0,
            close_transitions: 0,
            samples_processed: 0,
            last_transition_at: None,
        }
    }

    /// Set threshold in dB (-80 to 0).
    pub fn set_threshold_db(&mut self, threshold_db: f32) {
        self.threshold_db = threshold_db.clamp(-80.0, 0.0);
    }

    /// Current threshold in dB.
    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    /// Set attack (open ramp) time in ms (1 to 100).
    ///
    /// Applies to transitions started after the call; an in-flight ramp
    /// keeps its rate.
    pub fn set_attack_ms(&mut self, attack_ms: f32) {
        self.attack_ms = attack_ms.clamp(1.0, 100.0);
    }

    /// Current attack time in ms.
    pub fn attack_ms(&self) -> f32 {
        self.attack_ms
    }

    /// Set release (close ramp) time in ms (10 to 1000).
    pub fn set_release_ms(&mut self, release_ms: f32) {
        self.release_ms = release_ms.clamp(10.0, 1000.0);
    }

    /// Current release time in ms.
    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    /// Set the closed-state floor gain (0.001 to 0.1, never zero).
    pub fn set_floor(&mut self, floor: f32) {
        self.floor = floor.clamp(0.001, 0.1);
        if matches!(self.phase, Phase::Closed | Phase::Closing) {
            self.gain.set_transition_time_ms(self.release_ms);
            self.gain.set_target(self.floor);
        }
    }

    /// Current floor gain.
    pub fn floor(&self) -> f32 {
        self.floor
    }

    /// Observer snapshot: open flag, threshold, last transition time.
    pub fn state(&self) -> GateState {
        GateState {
            is_open: matches!(self.phase, Phase::Opening | Phase::Open),
            threshold_db: self.threshold_db,
            last_transition_secs: self
                .last_transition_at
                .map(|at| at as f32 / self.sample_rate),
        }
    }

    /// Times the gate has started opening.
    pub fn open_transitions(&self) -> u64 {
        self.open_transitions
    }

    /// Times the gate has started closing.
    pub fn close_transitions(&self) -> u64 {
        self.close_transitions
    }

    /// Instantaneous gain, mostly for diagnostics.
    pub fn current_gain(&self) -> f32 {
        self.gain.get()
    }

    /// Run one detection step against a block-level input measurement.
    ///
    /// The comparison happens in decibels; `linear_to_db` floors its
    /// input, so silence lands near -200 dB instead of -inf and still
    /// compares cleanly against any threshold.
    fn drive(&mut self, level: f32) {
        let above = linear_to_db(level) > self.threshold_db;
        match self.phase {
            Phase::Closed | Phase::Closing if above => {
                self.phase = Phase::Opening;
                self.open_transitions += 1;
                self.last_transition_at = Some(self.samples_processed);
                self.gain.set_transition_time_ms(self.attack_ms);
                self.gain.set_target(1.0);
            }
            Phase::Open | Phase::Opening if !above => {
                self.phase = Phase::Closing;
                self.close_transitions += 1;
                self.last_transition_at = Some(self.samples_processed);
                self.gain.set_transition_time_ms(self.release_ms);
                self.gain.set_target(self.floor);
            }
            _ => {}
        }
    }

    /// Promote a finished ramp to its settled phase.
    fn settle(&mut self) {
        if self.gain.is_settled() {
            match self.phase {
                Phase::Opening => self.phase = Phase::Open,
                Phase::Closing => self.phase = Phase::Closed,
                _ => {}
            }
        }
    }
}

impl Effect for LevelGate {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        // Per-sample use degenerates to one-sample blocks.
        self.drive(input.abs());
        let gain = self.gain.advance();
        self.samples_processed += 1;
        self.settle();
        input * gain
    }

    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        self.drive((left.abs() + right.abs()) * 0.5);
        let gain = self.gain.advance();
        self.samples_processed += 1;
        self.settle();
        (left * gain, right * gain)
    }

    fn process_block_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        let len = left.len().min(right.len());
        if len == 0 {
            return;
        }
        // One detection per block: combined RMS across both channels.
        let rms_left = rms(&left[..len]);
        let rms_right = rms(&right[..len]);
        let level = ((rms_left * rms_left + rms_right * rms_right) * 0.5).sqrt();
        self.drive(level);

        for i in 0..len {
            let gain = self.gain.advance();
            left[i] *= gain;
            right[i] *= gain;
        }
        self.samples_processed += len as u64;
        self.settle();
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.gain.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.phase = Phase::Closed;
        self.gain.set_immediate(self.floor);
        self.open_transitions = 0;
        self.close_transitions = 0;
        self.samples_processed = 0;
        self.last_transition_at = None;
    }
}

impl ParameterInfo for LevelGate {
    fn param_count(&self) -> usize {
        4
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(ParamDescriptor {
                name: "Threshold",
                short_name: "Thresh",
                unit: ParamUnit::Decibels,
                min: -80.0,
                max: 0.0,
                default: -40.0,
                step: 1.0,
            }),
            1 => Some(ParamDescriptor {
                name: "Attack",
                short_name: "Atk",
                unit: ParamUnit::Milliseconds,
                min: 1.0,
                max: 100.0,
                default: 10.0,
                step: 1.0,
            }),
            2 => Some(ParamDescriptor {
                name: "Release",
                short_name: "Rel",
                unit: ParamUnit::Milliseconds,
                min: 10.0,
                max: 1000.0,
                default: 100.0,
                step: 1.0,
            }),
            3 => Some(ParamDescriptor {
                name: "Floor",
                short_name: "Floor",
                unit: ParamUnit::None,
                min: 0.001,
                max: 0.1,
                default: 0.01,
                step: 0.001,
            }),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.threshold_db,
            1 => self.attack_ms,
            2 => self.release_ms,
            3 => self.floor,
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_threshold_db(value),
            1 => self.set_attack_ms(value),
            2 => self.set_release_ms(value),
            3 => self.set_floor(value),
            _ => {}
        }
    }
}
