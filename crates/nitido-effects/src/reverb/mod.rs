//! Procedural convolution reverb with background response regeneration.
//!
//! The reverb never records a room: it synthesizes a Schroeder-style
//! impulse response from [`ReverbParams`] (see [`ir`]) and convolves the
//! input with it through the [`nitido_accel`] broker. Geometry changes
//! (room size, decay, damping) re-render the response on a worker thread
//! while audio keeps running on the previous one; mix, pre-delay, and
//! shelf changes retune live state and never touch the response.
//!
//! Wet path per channel: pre-delay (fractional read) -> low shelf ->
//! high shelf -> convolution. Output per sample is
//! `dry_in * dry_mix + wet * wet_mix` with both mix gains ramped over
//! 10 ms. Shelves at 0 dB and a zero pre-delay leave the wet path as the
//! raw convolution.
//!
//! # Example
//!
//! ```rust
//! use nitido_accel::BrokerConfig;
//! use nitido_core::Effect;
//! use nitido_effects::reverb::{Reverb, ReverbParams};
//!
//! let params = ReverbParams {
//!     decay_time: 0.5,
//!     ..ReverbParams::default()
//! };
//! let mut reverb = Reverb::new(48000.0, 256, params, BrokerConfig::default())?;
//!
//! let mut left = vec![0.0f32; 256];
//! let mut right = vec![0.0f32; 256];
//! left[0] = 1.0;
//! right[0] = 1.0;
//! reverb.process_block_stereo(&mut left, &mut right);
//! # Ok::<(), nitido_effects::reverb::ReverbParamsError>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use nitido_accel::{AccelerationBroker, BrokerConfig, PreparedIr};
use nitido_core::{
    Biquad, Effect, InterpolatedDelay, Interpolation, LinearSmoothedParam, ParamDescriptor,
    ParamWriteError, ParameterInfo, StereoBuffer, high_shelf_coefficients, low_shelf_coefficients,
};
use thiserror::Error;

pub mod ir;
pub mod params;
mod regen;

pub use ir::{ImpulseResponse, generate_impulse_response};
pub use params::{ReverbAnalysis, ReverbParams, ReverbParamsError, ShelfParams, preset_names};
pub use regen::RegenHandle;

use crate::reverb::params::{MAX_PRE_DELAY_SECS, MIX_SUM_SLACK};
use crate::reverb::regen::{RegenProgress, RegenRequest, RegenWorker};

/// Ramp time for wet/dry gain moves, in milliseconds.
const MIX_FADE_MS: f32 = 10.0;

/// RBJ shelf slope; 1.0 is the steepest slope without overshoot.
const SHELF_SLOPE: f32 = 1.0;

/// Rejection from [`Reverb::update_parameter`].
///
/// A rejected update leaves every parameter at its previous value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpdateError {
    /// The name matches no reverb parameter.
    #[error("unknown reverb parameter \"{0}\"")]
    UnknownParameter(String),
    /// The value failed validation.
    #[error("reverb parameter rejected: {0}")]
    Rejected(#[from] ParamWriteError),
}

/// Rejection from [`Reverb::apply_preset`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PresetError {
    /// The name matches no built-in preset.
    #[error("unknown reverb preset \"{0}\"")]
    UnknownPreset(String),
    /// A preset field failed the normal update path.
    #[error("preset application failed: {0}")]
    Update(#[from] UpdateError),
}

/// Procedural reverb stage.
///
/// Construction renders the initial impulse response synchronously so
/// the effect is audible from the first block. After that, geometry
/// edits only enqueue work: [`process_block_stereo`](Effect::process_block_stereo)
/// polls for finished renders and installs them at block boundaries, so
/// the audio thread never waits on the worker.
///
/// The effect reports zero latency: the dry path is undelayed, and the
/// pre-delay shapes only the wet tail.
///
/// # Parameters
///
/// | # | Name | Unit | Range | Default |
/// |---|-----------------|------|--------------|---------|
/// | 0 | `room_size`     | -    | 0.0..1.0     | 0.5     |
/// | 1 | `decay_time`    | s    | 0.1..20.0    | 2.0     |
/// | 2 | `damping`       | -    | 0.0..1.0     | 0.5     |
/// | 3 | `wet_mix`       | -    | 0.0..1.0     | 0.3     |
/// | 4 | `dry_mix`       | -    | 0.0..1.0     | 0.7     |
/// | 5 | `pre_delay`     | s    | 0.0..0.1     | 0.03    |
/// | 6 | `low_shelf_freq`  | Hz | 20..20000    | 200     |
/// | 7 | `low_shelf_gain`  | dB | -24..24      | 0       |
/// | 8 | `high_shelf_freq` | Hz | 20..20000    | 4000    |
/// | 9 | `high_shelf_gain` | dB | -24..24      | -2      |
///
/// Indices 0..=2 trigger background regeneration; the rest retune live
/// state. Writes to `wet_mix` / `dry_mix` that would push the sum past
/// unity are rejected with [`ParamWriteError::Conflict`].
pub struct Reverb {
    params: ReverbParams,
    sample_rate: f32,
    block_size: usize,
    broker: AccelerationBroker,
    worker: RegenWorker,
    requested: Arc<AtomicU64>,
    progress: Arc<RegenProgress>,
    pre_delay: [InterpolatedDelay; 2],
    pre_delay_samples: f32,
    low_shelf: [Biquad; 2],
    high_shelf: [Biquad; 2],
    wet_gain: LinearSmoothedParam,
    dry_gain: LinearSmoothedParam,
    wet_in: StereoBuffer,
    wet_out: StereoBuffer,
    // Input rings for the single-sample path, sized to the response
    // length. Built lazily; the block path never touches them.
    sample_history: Option<[InterpolatedDelay; 2]>,
    sample_clock: u64,
}

impl Reverb {
    /// Build a reverb and render its initial response.
    ///
    /// Blocks until the first impulse response is published, so a
    /// freshly constructed reverb is immediately usable. Rejects
    /// parameter sets that fail [`ReverbParams::validate`]; nothing is
    /// spawned in that case.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero.
    pub fn new(
        sample_rate: f32,
        block_size: usize,
        params: ReverbParams,
        accel: BrokerConfig,
    ) -> Result<Self, ReverbParamsError> {
        params.validate()?;

        let worker = RegenWorker::spawn(2);
        let progress = worker.progress();
        let mut reverb = Reverb {
            params,
            sample_rate,
            block_size,
            broker: AccelerationBroker::new(block_size, accel),
            worker,
            requested: Arc::new(AtomicU64::new(0)),
            progress,
            pre_delay: [
                InterpolatedDelay::from_time(sample_rate, MAX_PRE_DELAY_SECS),
                InterpolatedDelay::from_time(sample_rate, MAX_PRE_DELAY_SECS),
            ],
            pre_delay_samples: params.pre_delay * sample_rate,
            low_shelf: [Biquad::new(), Biquad::new()],
            high_shelf: [Biquad::new(), Biquad::new()],
            wet_gain: LinearSmoothedParam::with_config(params.wet_mix, sample_rate, MIX_FADE_MS),
            dry_gain: LinearSmoothedParam::with_config(params.dry_mix, sample_rate, MIX_FADE_MS),
            wet_in: StereoBuffer::new(block_size),
            wet_out: StereoBuffer::new(block_size),
            sample_history: None,
            sample_clock: 0,
        };
        reverb.update_shelves();
        reverb.schedule_regen();
        reverb.flush_regeneration();
        Ok(reverb)
    }

    /// Current parameter set.
    pub fn params(&self) -> ReverbParams {
        self.params
    }

    /// Derived room characteristics for status readouts.
    pub fn analysis(&self) -> ReverbAnalysis {
        self.params.analysis()
    }

    /// The convolution broker, for capability inspection.
    pub fn broker(&self) -> &AccelerationBroker {
        &self.broker
    }

    /// Mutable broker access, for tests and capability control.
    pub fn broker_mut(&mut self) -> &mut AccelerationBroker {
        &mut self.broker
    }

    /// Update one parameter by contract name.
    ///
    /// Unknown names and invalid values are rejected without touching
    /// any state. Geometry names (`room_size`, `decay_time`, `damping`)
    /// enqueue a background re-render; audio keeps the previous
    /// response until the new one is published.
    pub fn update_parameter(&mut self, name: &str, value: f32) -> Result<(), UpdateError> {
        let index = self
            .find_param_by_name(name)
            .ok_or_else(|| UpdateError::UnknownParameter(name.to_string()))?;
        self.set_param_checked(index, value)?;
        tracing::debug!("reverb_param: {name} = {value}");
        Ok(())
    }

    /// Apply a named preset field by field through the validated update
    /// path.
    ///
    /// Unknown names are rejected with the parameters untouched. The
    /// burst of geometry updates coalesces in the regeneration worker,
    /// so the final published response always reflects the full preset.
    pub fn apply_preset(&mut self, name: &str) -> Result<(), PresetError> {
        let fields = params::preset_fields(name)
            .ok_or_else(|| PresetError::UnknownPreset(name.to_string()))?;

        let mut wet = self.params.wet_mix;
        let mut dry = self.params.dry_mix;
        for (field, value) in fields {
            match field {
                "wet_mix" => wet = value,
                "dry_mix" => dry = value,
                _ => self.update_parameter(field, value)?,
            }
        }
        // The mix levels are coupled through the wet + dry <= 1 bound.
        // Applying the non-increasing side first keeps every
        // intermediate state legal.
        if wet <= self.params.wet_mix {
            self.update_parameter("wet_mix", wet)?;
            self.update_parameter("dry_mix", dry)?;
        } else {
            self.update_parameter("dry_mix", dry)?;
            self.update_parameter("wet_mix", wet)?;
        }
        tracing::debug!("reverb_preset: applied \"{name}\"");
        Ok(())
    }

    /// Install the newest finished render, if any.
    ///
    /// Returns `true` when a new response went live. Called once per
    /// block from the processing path; installing drops the previous
    /// response's unfinished tail.
    pub fn poll_regeneration(&mut self) -> bool {
        let mut newest = None;
        while let Some(result) = self.worker.try_recv() {
            if let Some(prepared) = result.prepared {
                newest = Some(prepared);
            }
        }
        match newest {
            Some(prepared) => {
                self.install(prepared);
                true
            }
            None => false,
        }
    }

    /// Block until every enqueued regeneration has been rendered, then
    /// install the result.
    ///
    /// Renders that failed validation count as finished but publish
    /// nothing, so this always terminates. Setup and test use; never
    /// call it from the audio thread.
    pub fn flush_regeneration(&mut self) {
        self.progress
            .wait_for(self.requested.load(Ordering::Acquire));
        self.poll_regeneration();
    }

    /// Cloneable observer for pending regeneration work.
    pub fn regen_handle(&self) -> RegenHandle {
        RegenHandle::new(Arc::clone(&self.requested), Arc::clone(&self.progress))
    }

    fn schedule_regen(&mut self) {
        let generation = self.requested.fetch_add(1, Ordering::AcqRel) + 1;
        self.worker.submit(RegenRequest {
            params: self.params,
            sample_rate: self.sample_rate,
            block_size: self.block_size,
            generation,
        });
    }

    fn install(&mut self, prepared: Arc<PreparedIr>) {
        self.broker.install_ir(prepared);
        if self.sample_history.is_some() {
            self.sample_history = Some(self.build_sample_history());
        }
    }

    fn update_shelves(&mut self) {
        let low = low_shelf_coefficients(
            self.params.low_shelf.frequency_hz,
            SHELF_SLOPE,
            self.params.low_shelf.gain_db,
            self.sample_rate,
        );
        let high = high_shelf_coefficients(
            self.params.high_shelf.frequency_hz,
            SHELF_SLOPE,
            self.params.high_shelf.gain_db,
            self.sample_rate,
        );
        for filter in &mut self.low_shelf {
            filter.set_coefficients(low.0, low.1, low.2, low.3, low.4, low.5);
        }
        for filter in &mut self.high_shelf {
            filter.set_coefficients(high.0, high.1, high.2, high.3, high.4, high.5);
        }
    }

    /// Wet pre-chain for one channel: pre-delay, then both shelves.
    ///
    /// Write-then-read keeps a zero pre-delay an exact identity.
    fn shape_wet(&mut self, lane: usize, input: f32) -> f32 {
        self.pre_delay[lane].write(input);
        let delayed = self.pre_delay[lane].read(self.pre_delay_samples);
        let low = self.low_shelf[lane].process(delayed);
        self.high_shelf[lane].process(low)
    }

    fn build_sample_history(&self) -> [InterpolatedDelay; 2] {
        let taps = self
            .broker
            .prepared_ir()
            .map_or(1, |prepared| prepared.taps_len().max(1));
        let mut left = InterpolatedDelay::new(taps);
        left.set_interpolation(Interpolation::None);
        let mut right = InterpolatedDelay::new(taps);
        right.set_interpolation(Interpolation::None);
        [left, right]
    }

    fn ensure_sample_history(&mut self) {
        if self.sample_history.is_none() {
            self.sample_history = Some(self.build_sample_history());
        }
    }

    /// Direct-form convolution of one input sample against the current
    /// response. Accumulates in f64, like the broker's software path.
    fn convolve_sample(&mut self, lane: usize, input: f32) -> f32 {
        let Some(history) = &mut self.sample_history else {
            return 0.0;
        };
        let ring = &mut history[lane];
        ring.write(input);
        let Some(prepared) = self.broker.prepared_ir() else {
            return 0.0;
        };
        let taps = channel_taps(prepared, lane);
        let mut acc = 0.0f64;
        for (j, tap) in taps.iter().enumerate() {
            acc += f64::from(*tap) * f64::from(ring.read(j as f32));
        }
        acc as f32
    }
}

impl Effect for Reverb {
    fn process(&mut self, input: f32) -> f32 {
        self.process_stereo(input, input).0
    }

    /// Single-frame path with its own convolution history.
    ///
    /// Orders of magnitude slower than the block path for long decays;
    /// meant for probing and tools, not the audio callback.
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        if self.sample_clock % self.block_size as u64 == 0 {
            self.poll_regeneration();
        }
        self.sample_clock += 1;
        self.ensure_sample_history();

        let shaped_left = self.shape_wet(0, left);
        let shaped_right = self.shape_wet(1, right);
        let wet_left = self.convolve_sample(0, shaped_left);
        let wet_right = self.convolve_sample(1, shaped_right);

        let wet = self.wet_gain.advance();
        let dry = self.dry_gain.advance();
        (left * dry + wet_left * wet, right * dry + wet_right * wet)
    }

    fn process_block_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        let len = left.len().min(right.len()).min(self.block_size);
        self.poll_regeneration();

        for i in 0..len {
            let shaped_left = self.shape_wet(0, left[i]);
            let shaped_right = self.shape_wet(1, right[i]);
            self.wet_in.left[i] = shaped_left;
            self.wet_in.right[i] = shaped_right;
        }

        // Accelerated attempt first; any refusal or fault falls back to
        // the software path against the identical staged input.
        if self
            .broker
            .convolve(
                &self.wet_in.left[..len],
                &self.wet_in.right[..len],
                &mut self.wet_out.left[..len],
                &mut self.wet_out.right[..len],
            )
            .is_err()
        {
            self.broker.convolve_software(
                &self.wet_in.left[..len],
                &self.wet_in.right[..len],
                &mut self.wet_out.left[..len],
                &mut self.wet_out.right[..len],
            );
        }

        for i in 0..len {
            let wet = self.wet_gain.advance();
            let dry = self.dry_gain.advance();
            left[i] = left[i] * dry + self.wet_out.left[i] * wet;
            right[i] = right[i] * dry + self.wet_out.right[i] * wet;
        }
        self.sample_clock += len as u64;
    }

    /// Re-derives every rate-dependent piece, response included, and
    /// blocks until the re-render is published.
    fn set_sample_rate(&mut self, sample_rate: f32) {
        if sample_rate == self.sample_rate {
            return;
        }
        self.sample_rate = sample_rate;
        self.pre_delay = [
            InterpolatedDelay::from_time(sample_rate, MAX_PRE_DELAY_SECS),
            InterpolatedDelay::from_time(sample_rate, MAX_PRE_DELAY_SECS),
        ];
        self.pre_delay_samples = self.params.pre_delay * sample_rate;
        self.update_shelves();
        self.wet_gain.set_sample_rate(sample_rate);
        self.dry_gain.set_sample_rate(sample_rate);
        self.sample_history = None;
        self.schedule_regen();
        self.flush_regeneration();
    }

    /// Clears all signal state; parameters and the published response
    /// survive.
    fn reset(&mut self) {
        for delay in &mut self.pre_delay {
            delay.clear();
        }
        for filter in &mut self.low_shelf {
            filter.clear();
        }
        for filter in &mut self.high_shelf {
            filter.clear();
        }
        self.wet_in.clear();
        self.wet_out.clear();
        self.broker.reset();
        self.wet_gain.snap_to_target();
        self.dry_gain.snap_to_target();
        self.sample_history = None;
        self.sample_clock = 0;
    }
}

impl ParameterInfo for Reverb {
    fn param_count(&self) -> usize {
        10
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(ParamDescriptor::ratio("room_size", "Room", 0.5)),
            1 => Some(ParamDescriptor::seconds(
                "decay_time",
                "Decay",
                params::MIN_DECAY_TIME_SECS,
                params::MAX_DECAY_TIME_SECS,
                2.0,
            )),
            2 => Some(ParamDescriptor::ratio("damping", "Damping", 0.5)),
            3 => Some(ParamDescriptor::ratio("wet_mix", "Wet", 0.3)),
            4 => Some(ParamDescriptor::ratio("dry_mix", "Dry", 0.7)),
            5 => Some(ParamDescriptor::seconds(
                "pre_delay",
                "PreDly",
                0.0,
                MAX_PRE_DELAY_SECS,
                0.03,
            )),
            6 => Some(ParamDescriptor::frequency_hz(
                "low_shelf_freq",
                "LoFreq",
                params::SHELF_FREQ_RANGE.0,
                params::SHELF_FREQ_RANGE.1,
                200.0,
            )),
            7 => Some(ParamDescriptor::gain_db(
                "low_shelf_gain",
                "LoGain",
                params::SHELF_GAIN_RANGE.0,
                params::SHELF_GAIN_RANGE.1,
                0.0,
            )),
            8 => Some(ParamDescriptor::frequency_hz(
                "high_shelf_freq",
                "HiFreq",
                params::SHELF_FREQ_RANGE.0,
                params::SHELF_FREQ_RANGE.1,
                4000.0,
            )),
            9 => Some(ParamDescriptor::gain_db(
                "high_shelf_gain",
                "HiGain",
                params::SHELF_GAIN_RANGE.0,
                params::SHELF_GAIN_RANGE.1,
                -2.0,
            )),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.params.room_size,
            1 => self.params.decay_time,
            2 => self.params.damping,
            3 => self.params.wet_mix,
            4 => self.params.dry_mix,
            5 => self.params.pre_delay,
            6 => self.params.low_shelf.frequency_hz,
            7 => self.params.low_shelf.gain_db,
            8 => self.params.high_shelf.frequency_hz,
            9 => self.params.high_shelf.gain_db,
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        let Some(desc) = self.param_info(index) else {
            return;
        };
        let value = desc.clamp(value);
        match index {
            0 => {
                self.params.room_size = value;
                self.schedule_regen();
            }
            1 => {
                self.params.decay_time = value;
                self.schedule_regen();
            }
            2 => {
                self.params.damping = value;
                self.schedule_regen();
            }
            3 => {
                self.params.wet_mix = value;
                self.wet_gain.set_target(value);
            }
            4 => {
                self.params.dry_mix = value;
                self.dry_gain.set_target(value);
            }
            5 => {
                self.params.pre_delay = value;
                self.pre_delay_samples = value * self.sample_rate;
            }
            6 => {
                self.params.low_shelf.frequency_hz = value;
                self.update_shelves();
            }
            7 => {
                self.params.low_shelf.gain_db = value;
                self.update_shelves();
            }
            8 => {
                self.params.high_shelf.frequency_hz = value;
                self.update_shelves();
            }
            9 => {
                self.params.high_shelf.gain_db = value;
                self.update_shelves();
            }
            _ => {}
        }
    }

    /// Range checks plus the cross-parameter mix bound: a wet or dry
    /// write that would push `wet_mix + dry_mix` past unity is a
    /// conflict, not a clamp.
    fn set_param_checked(&mut self, index: usize, value: f32) -> Result<(), ParamWriteError> {
        let Some(desc) = self.param_info(index) else {
            return Err(ParamWriteError::NoSuchParam { index });
        };
        if !desc.contains(value) {
            return Err(ParamWriteError::OutOfRange {
                value,
                min: desc.min,
                max: desc.max,
            });
        }
        if index == 3 || index == 4 {
            let (wet, dry) = if index == 3 {
                (value, self.params.dry_mix)
            } else {
                (self.params.wet_mix, value)
            };
            if wet + dry > 1.0 + MIX_SUM_SLACK {
                return Err(ParamWriteError::Conflict {
                    reason: "wet_mix + dry_mix must not exceed 1.0",
                });
            }
        }
        self.set_param(index, value);
        Ok(())
    }
}

fn channel_taps(prepared: &PreparedIr, lane: usize) -> &[f32] {
    if prepared.channel_count() == 0 {
        &[]
    } else {
        prepared
            .channel(lane.min(prepared.channel_count() - 1))
            .taps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 8000.0;
    const BLOCK: usize = 64;

    /// Sub-sample comb delays collapse to one sample, so the response
    /// has energy from the very head. Keeps convolution checks short.
    fn tiny_room() -> ReverbParams {
        ReverbParams {
            room_size: 0.001,
            decay_time: 0.1,
            wet_mix: 1.0,
            dry_mix: 0.0,
            pre_delay: 0.0,
            high_shelf: ShelfParams {
                frequency_hz: 4000.0,
                gain_db: 0.0,
            },
            ..ReverbParams::default()
        }
    }

    fn fast_defaults() -> ReverbParams {
        ReverbParams {
            decay_time: 0.1,
            ..ReverbParams::default()
        }
    }

    fn make(params: ReverbParams) -> Reverb {
        Reverb::new(RATE, BLOCK, params, BrokerConfig::default()).unwrap()
    }

    fn current_response(reverb: &Reverb) -> Arc<PreparedIr> {
        Arc::clone(reverb.broker().prepared_ir().unwrap())
    }

    #[test]
    fn test_constructor_renders_initial_response() {
        let reverb = make(fast_defaults());
        let prepared = current_response(&reverb);
        // 0.1 s at 8 kHz.
        assert_eq!(prepared.taps_len(), 800);
        assert_eq!(prepared.channel_count(), 2);
        assert!(reverb.regen_handle().is_idle());
    }

    #[test]
    fn test_wet_only_block_reproduces_response_head() {
        let params = tiny_room();
        let mut reverb = make(params);

        let mut left = vec![0.0f32; BLOCK];
        let mut right = vec![0.0f32; BLOCK];
        left[0] = 1.0;
        right[0] = 1.0;
        reverb.process_block_stereo(&mut left, &mut right);

        // Zero pre-delay and 0 dB shelves leave the wet path as the
        // raw convolution, and convolving an impulse gives the
        // response itself.
        let response = generate_impulse_response(&params, RATE, 2);
        for i in 0..BLOCK {
            assert!(
                (left[i] - response.channels()[0][i]).abs() < 1e-4,
                "left sample {i}: {} vs {}",
                left[i],
                response.channels()[0][i]
            );
            assert!(
                (right[i] - response.channels()[1][i]).abs() < 1e-4,
                "right sample {i}: {} vs {}",
                right[i],
                response.channels()[1][i]
            );
        }
    }

    #[test]
    fn test_block_mix_is_elementwise() {
        let wet_only = tiny_room();
        let mixed = ReverbParams {
            wet_mix: 0.25,
            dry_mix: 0.5,
            ..wet_only
        };

        let mut reference = make(wet_only);
        let mut reverb = make(mixed);

        let input: Vec<f32> = (0..BLOCK).map(|i| (i as f32 * 0.37).sin() * 0.5).collect();
        let mut conv_l = input.clone();
        let mut conv_r = input.clone();
        reference.process_block_stereo(&mut conv_l, &mut conv_r);

        let mut left = input.clone();
        let mut right = input.clone();
        reverb.process_block_stereo(&mut left, &mut right);

        for i in 0..BLOCK {
            let expected = input[i] * 0.5 + conv_l[i] * 0.25;
            assert!(
                (left[i] - expected).abs() < 1e-5,
                "sample {i}: {} vs {expected}",
                left[i]
            );
            let expected = input[i] * 0.5 + conv_r[i] * 0.25;
            assert!((right[i] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_pre_delay_shifts_wet_tail() {
        let params = ReverbParams {
            // 16 samples at 8 kHz.
            pre_delay: 0.002,
            ..tiny_room()
        };
        let mut reverb = make(params);

        let mut left = vec![0.0f32; BLOCK];
        let mut right = vec![0.0f32; BLOCK];
        left[0] = 1.0;
        right[0] = 1.0;
        reverb.process_block_stereo(&mut left, &mut right);

        let response = generate_impulse_response(&params, RATE, 2);
        for i in 0..16 {
            assert!(left[i].abs() < 1e-9, "sample {i} leaked: {}", left[i]);
        }
        for i in 16..BLOCK {
            assert!(
                (left[i] - response.channels()[0][i - 16]).abs() < 1e-4,
                "sample {i}: {} vs {}",
                left[i],
                response.channels()[0][i - 16]
            );
        }
    }

    #[test]
    fn test_sample_path_matches_block_path() {
        let params = ReverbParams {
            wet_mix: 0.25,
            dry_mix: 0.5,
            ..tiny_room()
        };
        let mut by_block = make(params);
        let mut by_sample = make(params);

        let input: Vec<f32> = (0..2 * BLOCK)
            .map(|i| ((i * 37 % 101) as f32 / 101.0) - 0.5)
            .collect();

        let mut left = input.clone();
        let mut right = input.clone();
        for start in [0, BLOCK] {
            by_block.process_block_stereo(
                &mut left[start..start + BLOCK],
                &mut right[start..start + BLOCK],
            );
        }

        for (i, &x) in input.iter().enumerate() {
            let (l, r) = by_sample.process_stereo(x, x);
            assert!(
                (l - left[i]).abs() < 1e-6,
                "sample {i}: per-sample {l} vs block {}",
                left[i]
            );
            assert!((r - right[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_mix_updates_keep_response() {
        let mut reverb = make(fast_defaults());
        let before = current_response(&reverb);

        reverb.update_parameter("wet_mix", 0.2).unwrap();
        reverb.update_parameter("wet_mix", 0.2).unwrap();
        reverb.update_parameter("dry_mix", 0.6).unwrap();
        assert!(reverb.regen_handle().is_idle(), "mix edits queued a render");

        let mut left = vec![0.0f32; BLOCK];
        let mut right = vec![0.0f32; BLOCK];
        reverb.process_block_stereo(&mut left, &mut right);

        assert!(Arc::ptr_eq(&before, &current_response(&reverb)));
        assert_eq!(reverb.params().wet_mix, 0.2);
        assert_eq!(reverb.params().dry_mix, 0.6);
    }

    #[test]
    fn test_geometry_update_regenerates() {
        let mut reverb = make(fast_defaults());
        let before = current_response(&reverb);

        reverb.update_parameter("room_size", 0.9).unwrap();
        reverb.flush_regeneration();

        let after = current_response(&reverb);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.taps_len(), 800, "decay unchanged, length unchanged");
        assert_eq!(reverb.params().room_size, 0.9);
    }

    #[test]
    fn test_decay_update_resizes_response() {
        let mut reverb = make(fast_defaults());
        reverb.update_parameter("decay_time", 0.2).unwrap();
        reverb.flush_regeneration();
        assert_eq!(current_response(&reverb).taps_len(), 1600);
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let mut reverb = make(fast_defaults());
        let before = reverb.params();

        let err = reverb.update_parameter("sparkle", 0.5).unwrap_err();
        assert_eq!(err, UpdateError::UnknownParameter("sparkle".to_string()));
        assert_eq!(reverb.params(), before);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut reverb = make(fast_defaults());
        let before = reverb.params();

        let err = reverb.update_parameter("room_size", 1.5).unwrap_err();
        assert_eq!(
            err,
            UpdateError::Rejected(ParamWriteError::OutOfRange {
                value: 1.5,
                min: 0.0,
                max: 1.0,
            })
        );
        assert!(reverb.update_parameter("decay_time", f32::NAN).is_err());
        assert_eq!(reverb.params(), before);
    }

    #[test]
    fn test_mix_conflict_rejected_atomically() {
        let mut reverb = make(fast_defaults());

        // Defaults are wet 0.3 / dry 0.7. Raising dry to 0.5 is fine;
        // wet 0.8 against it would sum to 1.3.
        reverb.update_parameter("dry_mix", 0.5).unwrap();
        let err = reverb.update_parameter("wet_mix", 0.8).unwrap_err();
        assert!(matches!(
            err,
            UpdateError::Rejected(ParamWriteError::Conflict { .. })
        ));
        assert_eq!(reverb.params().wet_mix, 0.3);
        assert_eq!(reverb.params().dry_mix, 0.5);

        // Lowering dry makes room for the same wet write.
        reverb.update_parameter("dry_mix", 0.2).unwrap();
        reverb.update_parameter("wet_mix", 0.8).unwrap();
        assert_eq!(reverb.params().wet_mix, 0.8);
    }

    #[test]
    fn test_apply_preset_hall_lands_exact() {
        let mut reverb = make(ReverbParams::default());
        reverb.apply_preset("hall").unwrap();

        let params = reverb.params();
        assert_eq!(params.room_size, 0.8);
        assert_eq!(params.decay_time, 3.5);
        assert_eq!(params.damping, 0.3);
        assert_eq!(params.wet_mix, 0.4);
        assert_eq!(params.dry_mix, 0.6);
        assert_eq!(params.pre_delay, 0.05);
        // Shelves are not part of presets.
        assert_eq!(params.low_shelf.frequency_hz, 200.0);
        assert_eq!(params.high_shelf.gain_db, -2.0);

        reverb.flush_regeneration();
        assert_eq!(current_response(&reverb).taps_len(), 28000);
    }

    #[test]
    fn test_preset_cycle_keeps_mix_legal() {
        let mut reverb = make(ReverbParams::default());
        for name in ["hall", "room", "cathedral", "plate", "hall"] {
            reverb.apply_preset(name).unwrap();
            reverb.params().validate().unwrap();
        }
        assert_eq!(reverb.params().wet_mix, 0.4);
        assert_eq!(reverb.params().dry_mix, 0.6);
    }

    #[test]
    fn test_unknown_preset_rejected() {
        let mut reverb = make(fast_defaults());
        let before = reverb.params();

        let err = reverb.apply_preset("cave").unwrap_err();
        assert_eq!(err, PresetError::UnknownPreset("cave".to_string()));
        assert_eq!(reverb.params(), before);
    }

    #[test]
    fn test_set_sample_rate_rederives_response() {
        let mut reverb = make(fast_defaults());
        reverb.set_sample_rate(16000.0);

        // Blocking re-render: the response is already swapped.
        assert_eq!(current_response(&reverb).taps_len(), 1600);
        assert_eq!(reverb.params(), fast_defaults());

        let mut left = vec![0.0f32; BLOCK];
        let mut right = vec![0.0f32; BLOCK];
        left[0] = 1.0;
        right[0] = 1.0;
        reverb.process_block_stereo(&mut left, &mut right);
        assert!(left.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_reset_clears_tail() {
        let params = ReverbParams {
            // Ten-sample comb delays put solid energy past one block.
            room_size: 0.05,
            ..tiny_room()
        };
        let mut reverb = make(params);

        let mut left = vec![0.0f32; BLOCK];
        let mut right = vec![0.0f32; BLOCK];
        left[0] = 1.0;
        right[0] = 1.0;
        reverb.process_block_stereo(&mut left, &mut right);

        left.fill(0.0);
        right.fill(0.0);
        reverb.process_block_stereo(&mut left, &mut right);
        assert!(
            left.iter().any(|x| x.abs() > 1e-6),
            "expected a tail into the second block"
        );

        reverb.reset();
        left.fill(0.0);
        right.fill(0.0);
        reverb.process_block_stereo(&mut left, &mut right);
        assert!(
            left.iter().all(|&x| x == 0.0) && right.iter().all(|&x| x == 0.0),
            "reset did not clear the tail"
        );
    }

    #[test]
    fn test_descriptor_lookup_round_trip() {
        let reverb = make(ReverbParams::default());
        assert_eq!(reverb.param_count(), 10);
        assert_eq!(reverb.find_param_by_name("ROOM_SIZE"), Some(0));
        assert_eq!(reverb.find_param_by_name("Wet"), Some(3));
        assert_eq!(reverb.find_param_by_name("high_shelf_gain"), Some(9));
        assert_eq!(reverb.find_param_by_name("feedback"), None);

        // A default-constructed reverb reads back every descriptor
        // default.
        for index in 0..reverb.param_count() {
            let desc = reverb.param_info(index).unwrap();
            assert_eq!(
                reverb.get_param(index),
                desc.default,
                "param {} out of step with its descriptor",
                desc.name
            );
        }
    }

    #[test]
    fn test_reverb_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Reverb>();
    }
}
