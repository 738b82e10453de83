//! Block-level signal quality measurement.
//!
//! The score is a coarse health indicator for a capture path, not a
//! perceptual metric: it rewards a healthy average level and some
//! dynamic movement, which is what separates a working microphone from
//! one that is muted, mis-gained, or feeding constant noise.

use nitido_core::linear_to_db;

/// RMS level below which a signal counts as weak, in dB.
const WEAK_RMS_DB: f32 = -40.0;

/// Quality snapshot of one stereo block.
///
/// `dynamic_range_db` is the crest factor (peak minus RMS). `score` is
/// in `[0, 1]`: each of level and dynamic range contributes up to three
/// points out of six.
///
/// | Points | RMS       | Dynamic range |
/// |--------|-----------|---------------|
/// | 3      | > -20 dB  | > 18 dB       |
/// | 2      | > -35 dB  | > 12 dB       |
/// | 1      | > -50 dB  | > 6 dB        |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalQuality {
    /// Peak absolute level in dB, across both channels.
    pub peak_db: f32,
    /// RMS level in dB, across both channels.
    pub rms_db: f32,
    /// Peak minus RMS, in dB.
    pub dynamic_range_db: f32,
    /// Aggregate health score in `[0, 1]`.
    pub score: f32,
}

impl SignalQuality {
    /// Measure one block. A mono block is passed as both channels.
    pub fn measure(left: &[f32], right: &[f32]) -> Self {
        let peak = left
            .iter()
            .chain(right.iter())
            .fold(0.0f32, |acc, &x| acc.max(x.abs()));
        let rms_left = nitido_core::rms(left);
        let rms_right = nitido_core::rms(right);
        let rms = ((rms_left * rms_left + rms_right * rms_right) * 0.5).sqrt();

        let peak_db = linear_to_db(peak);
        let rms_db = linear_to_db(rms);
        let dynamic_range_db = peak_db - rms_db;

        let mut points = 0u32;
        points += match dynamic_range_db {
            d if d > 18.0 => 3,
            d if d > 12.0 => 2,
            d if d > 6.0 => 1,
            _ => 0,
        };
        points += match rms_db {
            r if r > -20.0 => 3,
            r if r > -35.0 => 2,
            r if r > -50.0 => 1,
            _ => 0,
        };

        SignalQuality {
            peak_db,
            rms_db,
            dynamic_range_db,
            score: points as f32 / 6.0,
        }
    }

    /// True when the block is too quiet for the default gate to pass.
    pub fn is_weak(&self) -> bool {
        self.rms_db < WEAK_RMS_DB
    }
}
