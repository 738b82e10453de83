//! Reverb parameter set, validation, presets, and derived analysis.

use thiserror::Error;

/// Longest supported pre-delay in seconds.
pub const MAX_PRE_DELAY_SECS: f32 = 0.1;

/// Shortest supported decay time in seconds.
pub const MIN_DECAY_TIME_SECS: f32 = 0.1;

/// Longest supported decay time in seconds.
pub const MAX_DECAY_TIME_SECS: f32 = 20.0;

/// Shelf corner frequency range in Hz.
pub const SHELF_FREQ_RANGE: (f32, f32) = (20.0, 20000.0);

/// Shelf gain range in dB.
pub const SHELF_GAIN_RANGE: (f32, f32) = (-24.0, 24.0);

/// Tolerance on the wet + dry <= 1.0 check.
pub(crate) const MIX_SUM_SLACK: f32 = 1e-6;

/// One shelf filter's corner and gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShelfParams {
    /// Corner frequency in Hz.
    pub frequency_hz: f32,
    /// Shelf gain in dB; 0 dB is an identity filter.
    pub gain_db: f32,
}

/// Full parameter set for the reverb stage.
///
/// `wet_mix` and `dry_mix` are independent levels, not a single blend
/// knob; their sum must stay at or below unity so the mixed output
/// cannot exceed the louder of the two paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    /// Room size scaling for the echo network delays, 0.0 to 1.0.
    pub room_size: f32,
    /// Tail length in seconds.
    pub decay_time: f32,
    /// Tail level scale baked into the rendered response, 0.0 (silent
    /// tail) to 1.0 (full level).
    pub damping: f32,
    /// Processed signal level, 0.0 to 1.0.
    pub wet_mix: f32,
    /// Unprocessed signal level, 0.0 to 1.0.
    pub dry_mix: f32,
    /// Wet-path delay before the echo network, in seconds.
    pub pre_delay: f32,
    /// Low shelf applied to the wet path.
    pub low_shelf: ShelfParams,
    /// High shelf applied to the wet path.
    pub high_shelf: ShelfParams,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            room_size: 0.5,
            decay_time: 2.0,
            damping: 0.5,
            wet_mix: 0.3,
            dry_mix: 0.7,
            pre_delay: 0.03,
            low_shelf: ShelfParams {
                frequency_hz: 200.0,
                gain_db: 0.0,
            },
            high_shelf: ShelfParams {
                frequency_hz: 4000.0,
                gain_db: -2.0,
            },
        }
    }
}

impl ReverbParams {
    /// Check every field against its documented range, plus the
    /// wet + dry sum constraint. The first violation is reported.
    pub fn validate(&self) -> Result<(), ReverbParamsError> {
        check("room_size", self.room_size, 0.0, 1.0)?;
        check(
            "decay_time",
            self.decay_time,
            MIN_DECAY_TIME_SECS,
            MAX_DECAY_TIME_SECS,
        )?;
        check("damping", self.damping, 0.0, 1.0)?;
        check("wet_mix", self.wet_mix, 0.0, 1.0)?;
        check("dry_mix", self.dry_mix, 0.0, 1.0)?;
        check("pre_delay", self.pre_delay, 0.0, MAX_PRE_DELAY_SECS)?;
        check(
            "low_shelf_freq",
            self.low_shelf.frequency_hz,
            SHELF_FREQ_RANGE.0,
            SHELF_FREQ_RANGE.1,
        )?;
        check(
            "low_shelf_gain",
            self.low_shelf.gain_db,
            SHELF_GAIN_RANGE.0,
            SHELF_GAIN_RANGE.1,
        )?;
        check(
            "high_shelf_freq",
            self.high_shelf.frequency_hz,
            SHELF_FREQ_RANGE.0,
            SHELF_FREQ_RANGE.1,
        )?;
        check(
            "high_shelf_gain",
            self.high_shelf.gain_db,
            SHELF_GAIN_RANGE.0,
            SHELF_GAIN_RANGE.1,
        )?;
        if self.wet_mix + self.dry_mix > 1.0 + MIX_SUM_SLACK {
            return Err(ReverbParamsError::MixOverUnity {
                wet: self.wet_mix,
                dry: self.dry_mix,
            });
        }
        Ok(())
    }

    /// Derived room characteristics for status readouts.
    pub fn analysis(&self) -> ReverbAnalysis {
        ReverbAnalysis {
            rt60_secs: self.decay_time * 0.6,
            early_reflections_ms: self.pre_delay * 1000.0,
            diffusion_pct: self.room_size * 100.0,
            brightness_pct: 100.0 - self.damping * 100.0,
            wet_level_pct: self.wet_mix * 100.0,
            dry_level_pct: self.dry_mix * 100.0,
        }
    }
}

fn check(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ReverbParamsError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ReverbParamsError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// A parameter set that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ReverbParamsError {
    /// A field falls outside its documented range (or is non-finite).
    #[error("{field} = {value} outside valid range [{min}, {max}]")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f32,
        /// Lower bound of the valid range.
        min: f32,
        /// Upper bound of the valid range.
        max: f32,
    },
    /// Wet and dry levels are individually valid but sum past unity.
    #[error("wet_mix {wet} + dry_mix {dry} exceeds 1.0")]
    MixOverUnity {
        /// The wet level.
        wet: f32,
        /// The dry level.
        dry: f32,
    },
}

/// Derived room characteristics, all read-only.
///
/// Mirrors what a status display would show: estimated RT60, early
/// reflection spacing, and percentage views of the shaping parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbAnalysis {
    /// Estimated time for the tail to fall 60 dB, in seconds.
    pub rt60_secs: f32,
    /// Early reflection delay in milliseconds (the pre-delay).
    pub early_reflections_ms: f32,
    /// Echo density as a percentage of the room-size range.
    pub diffusion_pct: f32,
    /// Inverse of damping as a percentage.
    pub brightness_pct: f32,
    /// Wet level as a percentage.
    pub wet_level_pct: f32,
    /// Dry level as a percentage.
    pub dry_level_pct: f32,
}

/// Built-in room presets, applied field by field through the validated
/// update path.
pub fn preset_names() -> &'static [&'static str] {
    &["hall", "room", "cathedral", "plate"]
}

/// Field list for a named preset, in declaration order:
/// room_size, decay_time, damping, wet_mix, dry_mix, pre_delay.
pub(crate) fn preset_fields(name: &str) -> Option<[(&'static str, f32); 6]> {
    let fields = match name {
        "hall" => [
            ("room_size", 0.8),
            ("decay_time", 3.5),
            ("damping", 0.3),
            ("wet_mix", 0.4),
            ("dry_mix", 0.6),
            ("pre_delay", 0.05),
        ],
        "room" => [
            ("room_size", 0.5),
            ("decay_time", 1.2),
            ("damping", 0.7),
            ("wet_mix", 0.3),
            ("dry_mix", 0.7),
            ("pre_delay", 0.02),
        ],
        "cathedral" => [
            ("room_size", 0.95),
            ("decay_time", 6.0),
            ("damping", 0.2),
            ("wet_mix", 0.5),
            ("dry_mix", 0.5),
            ("pre_delay", 0.1),
        ],
        "plate" => [
            ("room_size", 0.3),
            ("decay_time", 2.5),
            ("damping", 0.8),
            ("wet_mix", 0.35),
            ("dry_mix", 0.65),
            ("pre_delay", 0.01),
        ],
        _ => return None,
    };
    Some(fields)
}
