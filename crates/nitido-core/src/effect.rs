//! Core Effect trait and related types.
//!
//! The [`Effect`] trait is the foundation of the enhancement framework. All
//! stages implement this trait, providing a consistent interface for
//! single-sample and block-based processing.
//!
//! ## Design Decisions
//!
//! - **Stereo-aware**: Capture paths are two-channel, so the trait carries a
//!   stereo path alongside the mono one. Effects with per-channel state or a
//!   shared control signal (a gate envelope, a wet level ramp) override the
//!   stereo methods; trivial effects get a working default for free.
//!
//! - **Object-safe**: The trait is designed to be object-safe, allowing
//!   `dyn Effect` for runtime effect chaining. However, generic/static
//!   dispatch is preferred for maximum performance.
//!
//! - **No allocations**: All methods are designed to be called in real-time
//!   audio contexts with zero heap allocations.

/// Core trait for all audio effects.
///
/// Effects process audio samples, either one at a time or in blocks.
/// The trait is designed to be object-safe while supporting efficient
/// static dispatch when used with generics.
///
/// # Example
///
/// ```rust
/// use nitido_core::Effect;
///
/// struct Gain {
///     gain: f32,
/// }
///
/// impl Effect for Gain {
///     fn process(&mut self, input: f32) -> f32 {
///         input * self.gain
///     }
///
///     fn set_sample_rate(&mut self, _sample_rate: f32) {
///         // Gain doesn't depend on sample rate
///     }
///
///     fn reset(&mut self) {
///         // Gain has no internal state to reset
///     }
/// }
/// ```
pub trait Effect {
    /// Process a single sample.
    ///
    /// This is the core processing function. For effects with internal state
    /// (filters, delays, etc.), this advances the state by one sample.
    ///
    /// # Arguments
    /// * `input` - Input sample, typically in range [-1.0, 1.0]
    ///
    /// # Returns
    /// Processed output sample
    fn process(&mut self, input: f32) -> f32;

    /// Process one stereo frame.
    ///
    /// The default routes each side through the mono path in turn, which is
    /// only correct for effects whose state is per-sample stateless or
    /// channel-independent. Effects that keep mono state (filters, delays)
    /// or derive one control signal for both channels must override this.
    ///
    /// # Arguments
    /// * `left` - Left input sample
    /// * `right` - Right input sample
    ///
    /// # Returns
    /// `(left, right)` processed frame
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        (self.process(left), self.process(right))
    }

    /// Process a block of samples.
    ///
    /// Default implementation calls `process()` for each sample. Effects
    /// may override this for SIMD optimization or more efficient block
    /// processing.
    ///
    /// # Arguments
    /// * `input` - Input sample buffer
    /// * `output` - Output sample buffer (must be same length as input)
    ///
    /// # Panics
    /// Default implementation panics if `input.len() != output.len()`
    fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        debug_assert_eq!(
            input.len(),
            output.len(),
            "Input and output buffers must have same length"
        );
        for (inp, out) in input.iter().zip(output.iter_mut()) {
            *out = self.process(*inp);
        }
    }

    /// Process a block of samples in-place.
    ///
    /// Convenience method for when input and output are the same buffer.
    /// Default implementation processes each sample in place.
    ///
    /// # Arguments
    /// * `buffer` - Buffer to process in-place
    fn process_block_inplace(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Process a stereo block in-place.
    ///
    /// Default implementation calls [`process_stereo`](Self::process_stereo)
    /// frame by frame. Effects that work on whole blocks (convolution,
    /// frame-level analysis) override this; it is the method the chain
    /// drives.
    ///
    /// # Arguments
    /// * `left` - Left channel buffer, processed in-place
    /// * `right` - Right channel buffer, must be the same length
    fn process_block_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(
            left.len(),
            right.len(),
            "Stereo channel buffers must have same length"
        );
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (ol, or) = self.process_stereo(*l, *r);
            *l = ol;
            *r = or;
        }
    }

    /// Update the sample rate.
    ///
    /// Called when the sample rate changes. Effects should recalculate
    /// any sample-rate-dependent coefficients (filter coefficients,
    /// delay times in samples, smoother increments, etc.).
    ///
    /// # Arguments
    /// * `sample_rate` - New sample rate in Hz (e.g., 44100.0, 48000.0)
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Reset internal state.
    ///
    /// Clears all internal state (delay lines, filter history, etc.)
    /// without changing parameters. Called when capture stops/starts
    /// or when the effect is bypassed to prevent artifacts.
    fn reset(&mut self);

    /// Report processing latency in samples.
    ///
    /// Returns the number of samples of latency introduced by this effect.
    /// Most effects have zero latency; a pre-delay line is an exception.
    ///
    /// Default returns 0 (no latency).
    fn latency_samples(&self) -> usize {
        0
    }
}
