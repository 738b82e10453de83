//! Biquad (bi-quadratic) filter structure.
//!
//! Provides a generic second-order IIR filter plus the shelf coefficient
//! formulas the enhancement wet path uses for low- and high-frequency
//! shaping ahead of the convolution stage.
//!
//! Coefficient calculation uses the RBJ Audio EQ Cookbook formulas.

use core::f32::consts::PI;
use libm::{cosf, powf, sinf, sqrtf};

/// Generic biquad filter coefficients and state.
///
/// Implements the Direct Form I biquad structure:
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
///                - a1*y[n-1] - a2*y[n-2]
/// ```
///
/// This is a building block for creating specific filter types.
#[derive(Debug, Clone)]
pub struct Biquad {
    /// Feedforward coefficients
    b0: f32,
    b1: f32,
    b2: f32,

    /// Feedback coefficients (stored normalized by a0)
    a1: f32,
    a2: f32,

    /// Input delay line: x[n-1], x[n-2]
    x1: f32,
    x2: f32,

    /// Output delay line: y[n-1], y[n-2]
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Creates a new biquad with passthrough coefficients.
    ///
    /// Initial state: `y[n] = x[n]` (no filtering)
    pub fn new() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Sets the biquad coefficients.
    ///
    /// # Arguments
    ///
    /// * `b0, b1, b2` - Feedforward coefficients
    /// * `a0, a1, a2` - Feedback coefficients (a0 is typically 1.0)
    ///
    /// Note: This function normalizes by a0 internally.
    pub fn set_coefficients(&mut self, b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) {
        // Normalize by a0
        let a0_inv = 1.0 / a0;
        self.b0 = b0 * a0_inv;
        self.b1 = b1 * a0_inv;
        self.b2 = b2 * a0_inv;
        self.a1 = a1 * a0_inv;
        self.a2 = a2 * a0_inv;
    }

    /// Processes a single sample through the biquad filter.
    ///
    /// Uses Direct Form I structure for numerical stability.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        // Update delay lines
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Clears the filter state (delay lines).
    ///
    /// Useful for resetting the filter without changing coefficients.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculates low-shelf filter coefficients using the RBJ cookbook formula.
///
/// Boosts or cuts everything below the corner frequency by `gain_db`,
/// leaving the spectrum above it untouched. `gain_db` of 0 yields an
/// identity filter.
///
/// # Arguments
///
/// * `frequency` - Corner frequency in Hz
/// * `slope` - Shelf slope (1.0 = steepest without overshoot)
/// * `gain_db` - Shelf gain in decibels (positive = boost, negative = cut)
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
///
/// (b0, b1, b2, a0, a1, a2) coefficients
pub fn low_shelf_coefficients(
    frequency: f32,
    slope: f32,
    gain_db: f32,
    sample_rate: f32,
) -> (f32, f32, f32, f32, f32, f32) {
    let a = powf(10.0, gain_db / 40.0); // sqrt(10^(dB/20))
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = cosf(omega);
    let sin_omega = sinf(omega);
    let alpha = sin_omega / 2.0 * sqrtf((a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0);
    let two_sqrt_a_alpha = 2.0 * sqrtf(a) * alpha;

    let b0 = a * ((a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha);
    let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega);
    let b2 = a * ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha);
    let a0 = (a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha;
    let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega);
    let a2 = (a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha;

    (b0, b1, b2, a0, a1, a2)
}

/// Calculates high-shelf filter coefficients using the RBJ cookbook formula.
///
/// Boosts or cuts everything above the corner frequency by `gain_db`,
/// leaving the spectrum below it untouched. `gain_db` of 0 yields an
/// identity filter.
///
/// # Arguments
///
/// * `frequency` - Corner frequency in Hz
/// * `slope` - Shelf slope (1.0 = steepest without overshoot)
/// * `gain_db` - Shelf gain in decibels (positive = boost, negative = cut)
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
///
/// (b0, b1, b2, a0, a1, a2) coefficients
pub fn high_shelf_coefficients(
    frequency: f32,
    slope: f32,
    gain_db: f32,
    sample_rate: f32,
) -> (f32, f32, f32, f32, f32, f32) {
    let a = powf(10.0, gain_db / 40.0);
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = cosf(omega);
    let sin_omega = sinf(omega);
    let alpha = sin_omega / 2.0 * sqrtf((a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0);
    let two_sqrt_a_alpha = 2.0 * sqrtf(a) * alpha;

    let b0 = a * ((a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha);
    let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega);
    let b2 = a * ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha);
    let a0 = (a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha;
    let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos_omega);
    let a2 = (a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha;

    (b0, b1, b2, a0, a1, a2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_biquad_passthrough() {
        let mut biquad = Biquad::new();

        // Default coefficients should pass signal through
        for i in 0..10 {
            let input = i as f32 * 0.1;
            let output = biquad.process(input);
            assert!((output - input).abs() < 0.0001);
        }
    }

    #[test]
    fn test_biquad_clear() {
        let mut biquad = Biquad::new();

        // Process some samples to fill state
        for _ in 0..10 {
            biquad.process(1.0);
        }

        // Clear state
        biquad.clear();

        // State should be zero
        assert_eq!(biquad.x1, 0.0);
        assert_eq!(biquad.x2, 0.0);
        assert_eq!(biquad.y1, 0.0);
        assert_eq!(biquad.y2, 0.0);
    }

    #[test]
    fn test_low_shelf_coefficients_finite() {
        let (b0, b1, b2, a0, a1, a2) = low_shelf_coefficients(200.0, 1.0, 6.0, 48000.0);

        assert!(b0.is_finite());
        assert!(b1.is_finite());
        assert!(b2.is_finite());
        assert!(a0.is_finite());
        assert!(a1.is_finite());
        assert!(a2.is_finite());
        assert!(a0 > 0.0);
    }

    #[test]
    fn test_low_shelf_unity_at_zero_gain() {
        let mut biquad = Biquad::new();
        let (b0, b1, b2, a0, a1, a2) = low_shelf_coefficients(200.0, 1.0, 0.0, 48000.0);
        biquad.set_coefficients(b0, b1, b2, a0, a1, a2);

        // At 0dB gain the shelf is an identity filter
        for i in 0..100 {
            let input = libm::sinf(i as f32 * 0.3);
            let output = biquad.process(input);
            assert!(
                (output - input).abs() < 1e-4,
                "0 dB shelf should be identity: in={}, out={}",
                input,
                output
            );
        }
    }

    #[test]
    fn test_low_shelf_boosts_dc() {
        let mut biquad = Biquad::new();
        let (b0, b1, b2, a0, a1, a2) = low_shelf_coefficients(1000.0, 1.0, 6.0, 48000.0);
        biquad.set_coefficients(b0, b1, b2, a0, a1, a2);

        // DC sits below the corner, so it gets the full shelf gain (~2x)
        let mut output = 0.0;
        for _ in 0..2000 {
            output = biquad.process(1.0);
        }

        let expected = powf(10.0, 6.0 / 20.0);
        assert!(
            (output - expected).abs() < 0.05,
            "DC gain should be ~{}, got {}",
            expected,
            output
        );
    }

    #[test]
    fn test_high_shelf_leaves_dc_alone() {
        let mut biquad = Biquad::new();
        let (b0, b1, b2, a0, a1, a2) = high_shelf_coefficients(4000.0, 1.0, -2.0, 48000.0);
        biquad.set_coefficients(b0, b1, b2, a0, a1, a2);

        // DC sits below the corner, unaffected by a high shelf
        let mut output = 0.0;
        for _ in 0..2000 {
            output = biquad.process(1.0);
        }

        assert!(
            (output - 1.0).abs() < 0.02,
            "DC should pass a high shelf at unity, got {}",
            output
        );
    }

    #[test]
    fn test_high_shelf_unity_at_zero_gain() {
        let mut biquad = Biquad::new();
        let (b0, b1, b2, a0, a1, a2) = high_shelf_coefficients(4000.0, 1.0, 0.0, 48000.0);
        biquad.set_coefficients(b0, b1, b2, a0, a1, a2);

        for i in 0..100 {
            let input = libm::sinf(i as f32 * 0.3);
            let output = biquad.process(input);
            assert!(
                (output - input).abs() < 1e-4,
                "0 dB shelf should be identity: in={}, out={}",
                input,
                output
            );
        }
    }

    #[test]
    fn test_high_shelf_cut_reduces_high_frequency() {
        let sample_rate = 48000.0;
        let mut cut = Biquad::new();
        let (b0, b1, b2, a0, a1, a2) = high_shelf_coefficients(2000.0, 1.0, -12.0, sample_rate);
        cut.set_coefficients(b0, b1, b2, a0, a1, a2);

        // Drive with a tone well above the corner and compare RMS
        let freq = 12000.0;
        let mut in_energy = 0.0f32;
        let mut out_energy = 0.0f32;
        for i in 0..4800 {
            let x = libm::sinf(core::f32::consts::TAU * freq * i as f32 / sample_rate);
            let y = cut.process(x);
            // Skip the settling transient
            if i > 200 {
                in_energy += x * x;
                out_energy += y * y;
            }
        }

        let gain = sqrtf(out_energy / in_energy);
        let expected = powf(10.0, -12.0 / 20.0);
        assert!(
            (gain - expected).abs() < 0.05,
            "High tone should be cut to ~{}, got {}",
            expected,
            gain
        );
    }
}
