//! Allpass filter for diffusion.
//!
//! A Schroeder-style allpass stage that smears the echo pattern from the
//! comb bank into a dense tail without strongly coloring the spectrum.
//! Several of these in series form the diffusion section of the impulse
//! synthesis network.

use crate::InterpolatedDelay;
use crate::Interpolation;
use crate::flush_denormal;

/// Allpass diffusion filter.
///
/// Structure per sample, with `d` the oldest sample in the delay ring:
///
/// ```text
/// output      = d + input * gain
/// delay input = input - d * gain
/// ```
///
/// # Example
///
/// ```rust
/// use nitido_core::AllpassFilter;
///
/// let mut allpass = AllpassFilter::new(500);
/// allpass.set_gain(0.7);
///
/// let output = allpass.process(1.0);
/// ```
#[derive(Debug, Clone)]
pub struct AllpassFilter {
    delay: InterpolatedDelay,
    gain: f32,
}

impl AllpassFilter {
    /// Create a new allpass filter with the given delay size in samples.
    ///
    /// # Arguments
    ///
    /// * `delay_samples` - The delay length in samples
    pub fn new(delay_samples: usize) -> Self {
        let mut delay = InterpolatedDelay::new(delay_samples);
        delay.set_interpolation(Interpolation::None);
        Self { delay, gain: 0.7 }
    }

    /// Set the diffusion gain.
    ///
    /// Typical values are around 0.7. The filter is stable for |gain| < 1.0.
    #[inline]
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(-0.99, 0.99);
    }

    /// Get the current gain value.
    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Process a single sample through the allpass filter.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let delay_samples = (self.delay.capacity() - 1) as f32;
        let delayed = self.delay.read(delay_samples);

        let output = delayed + input * self.gain;
        self.delay
            .write(flush_denormal(input - delayed * self.gain));

        output
    }

    /// Clear the allpass filter state.
    pub fn clear(&mut self) {
        self.delay.clear();
    }

    /// Get the delay capacity in samples.
    pub fn capacity(&self) -> usize {
        self.delay.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allpass_basic() {
        let mut allpass = AllpassFilter::new(100);
        allpass.set_gain(0.7);

        for _ in 0..200 {
            let out = allpass.process(0.5);
            assert!(out.is_finite());
        }
    }

    #[test]
    fn test_allpass_impulse_response() {
        let mut allpass = AllpassFilter::new(10);
        allpass.set_gain(0.7);

        // Direct path: input * gain appears immediately
        let first = allpass.process(1.0);
        assert!(
            (first - 0.7).abs() < 1e-6,
            "First output should be input * gain, got {}",
            first
        );

        // Delayed path arrives after the ring length
        for _ in 0..9 {
            allpass.process(0.0);
        }
        let delayed = allpass.process(0.0);
        assert!(
            (delayed - 1.0).abs() < 1e-6,
            "Delayed output should be the stored input, got {}",
            delayed
        );
    }

    #[test]
    fn test_allpass_decaying_tail() {
        let mut allpass = AllpassFilter::new(10);
        allpass.set_gain(0.7);

        allpass.process(1.0);

        // Collect tail energy in two halves; the recirculating -gain term
        // must decay
        let mut first_half = 0.0f32;
        let mut second_half = 0.0f32;
        for i in 0..200 {
            let out = allpass.process(0.0);
            if i < 100 {
                first_half += out * out;
            } else {
                second_half += out * out;
            }
        }

        assert!(
            second_half < first_half,
            "Tail should decay: first={}, second={}",
            first_half,
            second_half
        );
    }

    #[test]
    fn test_allpass_clear() {
        let mut allpass = AllpassFilter::new(10);

        // Fill with signal
        for _ in 0..20 {
            allpass.process(1.0);
        }

        allpass.clear();

        let out = allpass.process(0.0);
        assert!(out.abs() < 1e-10, "Should be silent after clear");
    }

    #[test]
    fn test_no_denormals_after_silence() {
        let mut allpass = AllpassFilter::new(100);
        allpass.set_gain(0.7);

        // Feed signal for 1000 samples to build up internal state
        for _ in 0..1000 {
            allpass.process(0.5);
        }

        // Feed silence for 100k samples -- output should decay cleanly without
        // producing IEEE 754 subnormal values (which start below ~1.2e-38 and
        // cause severe CPU performance degradation on most architectures).
        for i in 0..100_000 {
            let out = allpass.process(0.0);
            assert!(
                out == 0.0 || out.abs() > f32::MIN_POSITIVE,
                "Denormal detected at sample {}: {:.2e} (below f32::MIN_POSITIVE {:.2e})",
                i,
                out,
                f32::MIN_POSITIVE
            );
        }
    }
}
