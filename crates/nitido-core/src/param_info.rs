//! Parameter introspection for discoverable effect parameters.
//!
//! This module provides the [`ParameterInfo`] trait and supporting types that
//! enable runtime discovery and manipulation of effect parameters. This is
//! what the configuration layer and the chain snapshot system build on:
//!
//! - **Live retuning**: update a parameter by name on a running chain
//! - **Snapshots**: save and restore parameter state per node
//! - **Validation**: reject writes outside a parameter's documented range
//!
//! # Design
//!
//! The system uses index-based parameter access for efficiency and simplicity.
//! Each parameter is described by a [`ParamDescriptor`] containing metadata
//! for display and validation. Writes go through
//! [`set_param_checked`](ParameterInfo::set_param_checked), which rejects
//! out-of-range values without touching the effect; implementations with
//! cross-parameter constraints override it and return
//! [`ParamWriteError::Conflict`] when a write would violate one.
//!
//! # Example
//!
//! ```rust
//! use nitido_core::{ParameterInfo, ParamDescriptor, ParamUnit};
//!
//! struct SimpleGain {
//!     gain_db: f32,
//! }
//!
//! impl ParameterInfo for SimpleGain {
//!     fn param_count(&self) -> usize { 1 }
//!
//!     fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
//!         match index {
//!             0 => Some(ParamDescriptor::gain_db("Gain", "Gain", -60.0, 12.0, 0.0)),
//!             _ => None,
//!         }
//!     }
//!
//!     fn get_param(&self, index: usize) -> f32 {
//!         match index {
//!             0 => self.gain_db,
//!             _ => 0.0,
//!         }
//!     }
//!
//!     fn set_param(&mut self, index: usize, value: f32) {
//!         match index {
//!             0 => self.gain_db = value.clamp(-60.0, 12.0),
//!             _ => {}
//!         }
//!     }
//! }
//! ```
//!
//! # no_std Support
//!
//! This module is fully `no_std` compatible with no heap allocations required.

use core::fmt;

/// Error returned by a rejected parameter write.
///
/// A rejected write leaves the effect's state untouched. The caller decides
/// whether to surface, log, or skip the failure (snapshot restore skips and
/// keeps going; live retune surfaces it).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamWriteError {
    /// The value falls outside the parameter's documented range.
    ///
    /// Non-finite values (NaN, infinity) are reported with the same variant.
    OutOfRange {
        /// The rejected value.
        value: f32,
        /// Lower bound of the valid range.
        min: f32,
        /// Upper bound of the valid range.
        max: f32,
    },

    /// The value is in range on its own but conflicts with another parameter.
    ///
    /// Example: a wet level that would push the combined wet + dry sum past
    /// unity.
    Conflict {
        /// Static description of the violated constraint.
        reason: &'static str,
    },

    /// No parameter exists at the given index.
    NoSuchParam {
        /// The out-of-bounds index.
        index: usize,
    },
}

impl fmt::Display for ParamWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { value, min, max } => {
                write!(f, "value {value} outside valid range [{min}, {max}]")
            }
            Self::Conflict { reason } => write!(f, "{reason}"),
            Self::NoSuchParam { index } => write!(f, "no parameter at index {index}"),
        }
    }
}

impl core::error::Error for ParamWriteError {}

/// Trait for effects that expose introspectable parameters.
///
/// Implement this trait to allow runtime discovery and manipulation of your
/// effect's parameters. The chain uses it to retune nodes by name while audio
/// keeps running and to capture and restore snapshots.
///
/// # Parameter Indexing
///
/// Parameters are accessed by zero-based index. The index must be stable for
/// the lifetime of the effect instance. Use [`param_count`](Self::param_count)
/// to determine valid indices.
///
/// # Validated Writes
///
/// [`set_param`](Self::set_param) clamps and always succeeds;
/// [`set_param_checked`](Self::set_param_checked) validates first and returns
/// an error instead of clamping. The chain's by-name update path and the
/// snapshot restore path both use the checked form, so an effect that
/// overrides it gets its cross-parameter constraints enforced everywhere.
pub trait ParameterInfo {
    /// Returns the number of parameters this effect exposes.
    ///
    /// Valid parameter indices are `0..param_count()`.
    fn param_count(&self) -> usize;

    /// Returns the descriptor for the parameter at the given index.
    ///
    /// Returns `None` if `index >= param_count()`.
    fn param_info(&self, index: usize) -> Option<ParamDescriptor>;

    /// Gets the current value of the parameter at the given index.
    ///
    /// Returns `0.0` if `index >= param_count()` (implementations should
    /// handle out-of-bounds gracefully).
    fn get_param(&self, index: usize) -> f32;

    /// Sets the value of the parameter at the given index.
    ///
    /// Implementations should clamp the value to the valid range specified
    /// in the parameter descriptor. Out-of-bounds indices should be ignored.
    fn set_param(&mut self, index: usize, value: f32);

    /// Find a parameter index by name (case-insensitive).
    ///
    /// Matches against both [`ParamDescriptor::name`] and
    /// [`ParamDescriptor::short_name`].
    ///
    /// # Returns
    ///
    /// `Some(index)` if found, `None` if no parameter matches.
    fn find_param_by_name(&self, name: &str) -> Option<usize> {
        for i in 0..self.param_count() {
            if let Some(desc) = self.param_info(i)
                && (desc.name.eq_ignore_ascii_case(name)
                    || desc.short_name.eq_ignore_ascii_case(name))
            {
                return Some(i);
            }
        }
        None
    }

    /// Sets a parameter value, rejecting invalid writes instead of clamping.
    ///
    /// The default implementation validates against the descriptor's range
    /// and delegates to [`set_param`](Self::set_param). A rejected write
    /// leaves the effect untouched.
    ///
    /// Override this to enforce constraints that span multiple parameters;
    /// return [`ParamWriteError::Conflict`] when a write would violate one.
    fn set_param_checked(&mut self, index: usize, value: f32) -> Result<(), ParamWriteError> {
        let Some(desc) = self.param_info(index) else {
            return Err(ParamWriteError::NoSuchParam { index });
        };
        // NaN fails both range comparisons, so test finiteness explicitly.
        if !value.is_finite() || value < desc.min || value > desc.max {
            return Err(ParamWriteError::OutOfRange {
                value,
                min: desc.min,
                max: desc.max,
            });
        }
        self.set_param(index, value);
        Ok(())
    }
}

/// Describes a single parameter's metadata for display and validation.
///
/// This struct provides all the information needed to:
/// - Display the parameter in a status readout or log line
/// - Validate parameter values
/// - Format values with appropriate units
///
/// # Short Name
///
/// The `short_name` field should be 8 characters or less so compact displays
/// and log columns stay aligned.
///
/// # Example
///
/// ```rust
/// use nitido_core::ParamDescriptor;
///
/// let decay = ParamDescriptor::seconds("Decay Time", "Decay", 0.1, 20.0, 2.0);
/// assert_eq!(decay.clamp(25.0), 20.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    /// Full parameter name for display (e.g., "Decay Time", "Room Size").
    pub name: &'static str,

    /// Short name for compact displays, max 8 characters (e.g., "Decay").
    pub short_name: &'static str,

    /// Unit type for formatting the parameter value.
    pub unit: ParamUnit,

    /// Minimum allowed value for this parameter.
    pub min: f32,

    /// Maximum allowed value for this parameter.
    pub max: f32,

    /// Default value when the effect is initialized or reset.
    pub default: f32,

    /// Recommended step increment for coarse adjustment.
    ///
    /// Use small values (e.g., `0.01`) for continuous parameters and
    /// larger values (e.g., `1.0`) for discrete or coarse parameters.
    pub step: f32,
}

impl ParamDescriptor {
    /// Unitless 0.0–1.0 parameter with a custom name.
    ///
    /// Used for blend and shape controls (room size, damping, wet/dry level).
    pub fn ratio(name: &'static str, short_name: &'static str, default: f32) -> Self {
        Self {
            name,
            short_name,
            unit: ParamUnit::None,
            min: 0.0,
            max: 1.0,
            default,
            step: 0.01,
        }
    }

    /// Gain parameter with custom name and range (decibels).
    ///
    /// # Arguments
    ///
    /// * `name` - Full parameter name (e.g., "Threshold")
    /// * `short_name` - Short name for compact displays (e.g., "Thresh")
    /// * `min` - Minimum gain in dB
    /// * `max` - Maximum gain in dB
    /// * `default` - Default gain in dB
    pub fn gain_db(
        name: &'static str,
        short_name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self {
            name,
            short_name,
            unit: ParamUnit::Decibels,
            min,
            max,
            default,
            step: 0.5,
        }
    }

    /// Time parameter with custom name and range (milliseconds).
    ///
    /// # Arguments
    ///
    /// * `name` - Full parameter name (e.g., "Attack Time")
    /// * `short_name` - Short name for compact displays (e.g., "Attack")
    /// * `min` - Minimum time in ms
    /// * `max` - Maximum time in ms
    /// * `default` - Default time in ms
    pub fn time_ms(
        name: &'static str,
        short_name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self {
            name,
            short_name,
            unit: ParamUnit::Milliseconds,
            min,
            max,
            default,
            step: 1.0,
        }
    }

    /// Time parameter with custom name and range (seconds).
    ///
    /// Used for long time constants (decay length, pre-delay) where
    /// milliseconds would read awkwardly.
    pub fn seconds(
        name: &'static str,
        short_name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self {
            name,
            short_name,
            unit: ParamUnit::Seconds,
            min,
            max,
            default,
            step: 0.01,
        }
    }

    /// Frequency parameter with custom name and range (Hz).
    ///
    /// # Arguments
    ///
    /// * `name` - Full parameter name (e.g., "Low Shelf Freq")
    /// * `short_name` - Short name for compact displays (e.g., "LoFreq")
    /// * `min` - Minimum frequency in Hz
    /// * `max` - Maximum frequency in Hz
    /// * `default` - Default frequency in Hz
    pub fn frequency_hz(
        name: &'static str,
        short_name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self {
            name,
            short_name,
            unit: ParamUnit::Hertz,
            min,
            max,
            default,
            step: 1.0,
        }
    }

    /// Clamps a value to this parameter's valid range.
    ///
    /// # Example
    ///
    /// ```rust
    /// use nitido_core::ParamDescriptor;
    ///
    /// let desc = ParamDescriptor::gain_db("Gain", "Gain", -60.0, 12.0, 0.0);
    /// assert_eq!(desc.clamp(0.0), 0.0);
    /// assert_eq!(desc.clamp(-100.0), -60.0);
    /// assert_eq!(desc.clamp(100.0), 12.0);
    /// ```
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    /// Returns `true` if the value lies within this parameter's range.
    ///
    /// Non-finite values are never contained.
    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Unit type for parameter display and formatting.
///
/// Helps status readouts and log formatting render parameter values with
/// appropriate units and precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamUnit {
    /// Decibels (dB) - for gain, threshold, and level parameters.
    Decibels,

    /// Hertz (Hz) - for frequency parameters like shelf corners.
    Hertz,

    /// Milliseconds (ms) - for short time parameters like attack, release.
    Milliseconds,

    /// Seconds (s) - for long time parameters like decay and pre-delay.
    Seconds,

    /// Percentage (%) - for normalized display of blend parameters.
    Percent,

    /// No unit - for dimensionless or custom parameters.
    None,
}

impl ParamUnit {
    /// Returns the unit suffix string for display.
    ///
    /// # Example
    ///
    /// ```rust
    /// use nitido_core::ParamUnit;
    ///
    /// assert_eq!(ParamUnit::Decibels.suffix(), " dB");
    /// assert_eq!(ParamUnit::Seconds.suffix(), " s");
    /// assert_eq!(ParamUnit::None.suffix(), "");
    /// ```
    pub const fn suffix(&self) -> &'static str {
        match self {
            ParamUnit::Decibels => " dB",
            ParamUnit::Hertz => " Hz",
            ParamUnit::Milliseconds => " ms",
            ParamUnit::Seconds => " s",
            ParamUnit::Percent => "%",
            ParamUnit::None => "",
        }
    }
}
