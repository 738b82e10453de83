//! Procedural impulse response synthesis.
//!
//! Renders a room response from parameters instead of loading one from
//! disk: a Schroeder echo network (eight parallel feedback combs into
//! four serial allpass diffusers) is excited with a unit impulse and
//! the ring-down is recorded under an exponential decay envelope. The
//! network state starts from zero for every render, so the same
//! parameters always produce the same response.

use libm::{expf, powf};
use nitido_core::{AllpassFilter, CombFilter};

use crate::reverb::params::ReverbParams;

/// Comb delay lengths in samples at the reference rate.
const COMB_DELAYS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass delay lengths in samples at the reference rate.
const ALLPASS_DELAYS: [usize; 4] = [556, 441, 341, 225];

/// Sample rate the delay tables are tuned for.
const REFERENCE_RATE: f32 = 44100.0;

/// Base comb feedback gain before the decay-time correction.
const COMB_FEEDBACK: f32 = 0.742;

/// Allpass diffusion gain.
const ALLPASS_GAIN: f32 = 0.7;

/// Level scale for every channel after the first, a slight stereo
/// decorrelation.
const SIDE_CHANNEL_SCALE: f32 = 0.8;

/// A rendered multi-channel impulse response.
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    channels: Vec<Vec<f32>>,
    sample_rate: f32,
}

impl ImpulseResponse {
    /// Per-channel sample data.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Length of each channel in samples.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// True when the response holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample rate the response was rendered at.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// True when every sample in every channel is finite.
    pub fn is_finite(&self) -> bool {
        self.channels
            .iter()
            .all(|ch| ch.iter().all(|x| x.is_finite()))
    }
}

/// Scale a reference delay length to the target room size and rate.
///
/// Pinned to one sample at the low end so the filter rings stay
/// constructible at tiny room sizes.
fn scale_delay(reference: usize, room_size: f32, sample_rate: f32) -> usize {
    ((reference as f32 * room_size * (sample_rate / REFERENCE_RATE)) as usize).max(1)
}

/// Comb feedback for a given tail length: the base gain corrected so
/// the recirculating energy falls 60 dB over the decay time.
fn comb_feedback(decay_time: f32, sample_rate: f32) -> f32 {
    COMB_FEEDBACK * powf(0.001, 1.0 / (decay_time * sample_rate))
}

/// Render an impulse response for the given parameters.
///
/// The response is `floor(sample_rate * decay_time)` samples long.
/// Channels beyond the first carry the same signal scaled by
/// [`SIDE_CHANNEL_SCALE`]. The `damping` parameter scales the whole
/// response, so zero damping renders silence.
pub fn generate_impulse_response(
    params: &ReverbParams,
    sample_rate: f32,
    channel_count: usize,
) -> ImpulseResponse {
    let length = (sample_rate * params.decay_time) as usize;
    let feedback = comb_feedback(params.decay_time, sample_rate);

    let mut combs: Vec<CombFilter> = COMB_DELAYS
        .iter()
        .map(|&d| {
            let mut comb = CombFilter::new(scale_delay(d, params.room_size, sample_rate));
            comb.set_feedback(feedback);
            comb
        })
        .collect();
    let mut allpasses: Vec<AllpassFilter> = ALLPASS_DELAYS
        .iter()
        .map(|&d| {
            let mut allpass = AllpassFilter::new(scale_delay(d, params.room_size, sample_rate));
            allpass.set_gain(ALLPASS_GAIN);
            allpass
        })
        .collect();

    // The network is deterministic from zero state, so the base signal
    // is rendered once and per-channel data is a scaled copy.
    let envelope_samples = params.decay_time * sample_rate * 0.5;
    let mut base = Vec::with_capacity(length);
    for i in 0..length {
        let input = if i == 0 { 1.0 } else { 0.0 };
        let comb_sum: f32 = combs.iter_mut().map(|comb| comb.process(input)).sum();
        let diffused = allpasses
            .iter_mut()
            .fold(comb_sum, |signal, allpass| allpass.process(signal));
        let envelope = expf(-(i as f32) / envelope_samples);
        base.push(diffused * envelope * params.damping);
    }

    let channels = (0..channel_count)
        .map(|ch| {
            if ch == 0 {
                base.clone()
            } else {
                base.iter().map(|&x| x * SIDE_CHANNEL_SCALE).collect()
            }
        })
        .collect();

    ImpulseResponse {
        channels,
        sample_rate,
    }
}
