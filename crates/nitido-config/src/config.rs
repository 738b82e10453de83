//! The enhancer configuration file format.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Audio input format the pipeline is built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Sample rate in Hz (8000 to 192000).
    pub sample_rate: u32,
    /// Processing block size in frames (64 to 4096).
    pub buffer_size: usize,
    /// Channel count (1 or 2).
    pub channels: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig {
            sample_rate: 48000,
            buffer_size: 512,
            channels: 2,
        }
    }
}

/// Noise gate settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Open/close threshold in dB.
    pub threshold_db: f32,
    /// Opening ramp in milliseconds.
    pub attack_ms: f32,
    /// Closing ramp in milliseconds.
    pub release_ms: f32,
    /// Closed-state gain floor.
    pub floor: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            threshold_db: -40.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            floor: 0.01,
        }
    }
}

/// One shelving filter corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
    /// Corner frequency in Hz.
    pub frequency: f32,
    /// Shelf gain in dB.
    pub gain_db: f32,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        ShelfConfig {
            frequency: 200.0,
            gain_db: 0.0,
        }
    }
}

/// Reverb settings, mirroring the runtime parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    /// Room geometry scale, 0 to 1.
    pub room_size: f32,
    /// Tail length in seconds.
    pub decay_time: f32,
    /// Response amplitude scale, 0 to 1.
    pub damping: f32,
    /// Wet level, 0 to 1.
    pub wet_mix: f32,
    /// Dry level, 0 to 1.
    pub dry_mix: f32,
    /// Wet-path delay in seconds.
    pub pre_delay: f32,
    /// Low shelf on the wet path.
    pub low_shelf: ShelfConfig,
    /// High shelf on the wet path.
    pub high_shelf: ShelfConfig,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        ReverbConfig {
            room_size: 0.5,
            decay_time: 2.0,
            damping: 0.5,
            wet_mix: 0.3,
            dry_mix: 0.7,
            pre_delay: 0.03,
            low_shelf: ShelfConfig {
                frequency: 200.0,
                gain_db: 0.0,
            },
            high_shelf: ShelfConfig {
                frequency: 4000.0,
                gain_db: -2.0,
            },
        }
    }
}

/// Acceleration broker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelConfig {
    /// Per-block latency budget in milliseconds.
    pub max_latency_ms: f32,
    /// Worker threads granted to the accelerated path.
    pub thread_count: usize,
    /// Buffer pool alignment in bytes, a power of two.
    pub memory_alignment: usize,
    /// Precision mode: "full", "mixed", or "half".
    pub precision: String,
    /// Engine faults tolerated before the session drops to software.
    pub max_consecutive_failures: u32,
}

impl Default for AccelConfig {
    fn default() -> Self {
        AccelConfig {
            max_latency_ms: 10.0,
            thread_count: 4,
            memory_alignment: 64,
            precision: String::from("mixed"),
            max_consecutive_failures: 3,
        }
    }
}

/// Queue depths for the surrounding I/O plumbing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferingConfig {
    /// Capture-side queue depth in blocks.
    pub input_queue: usize,
    /// Playback-side queue depth in blocks.
    pub output_queue: usize,
    /// In-flight processing queue depth in blocks.
    pub process_queue: usize,
    /// Scratch ring capacity in frames.
    pub ring: usize,
}

impl Default for BufferingConfig {
    fn default() -> Self {
        BufferingConfig {
            input_queue: 3,
            output_queue: 2,
            process_queue: 4,
            ring: 8192,
        }
    }
}

/// Complete configuration for the enhancement pipeline.
///
/// Every section and field is optional in the file; missing values take
/// the documented defaults, so an empty string parses to the default
/// configuration.
///
/// # TOML Format
///
/// ```toml
/// [input]
/// sample_rate = 48000
/// buffer_size = 512
/// channels = 2
///
/// [gate]
/// threshold_db = -40.0
/// attack_ms = 10.0
/// release_ms = 100.0
/// floor = 0.01
///
/// [reverb]
/// room_size = 0.5
/// decay_time = 2.0
/// damping = 0.5
/// wet_mix = 0.3
/// dry_mix = 0.7
/// pre_delay = 0.03
///
/// [reverb.low_shelf]
/// frequency = 200.0
/// gain_db = 0.0
///
/// [reverb.high_shelf]
/// frequency = 4000.0
/// gain_db = -2.0
///
/// [accel]
/// max_latency_ms = 10.0
/// thread_count = 4
/// memory_alignment = 64
/// precision = "mixed"
/// max_consecutive_failures = 3
///
/// [buffering]
/// input_queue = 3
/// output_queue = 2
/// process_queue = 4
/// ring = 8192
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancerConfig {
    /// Input format.
    pub input: InputConfig,
    /// Noise gate.
    pub gate: GateConfig,
    /// Reverb.
    pub reverb: ReverbConfig,
    /// Acceleration broker.
    pub accel: AccelConfig,
    /// I/O queue depths.
    pub buffering: BufferingConfig,
}

/// Range check yielding the dotted field path on failure.
fn check(param: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            param,
            value,
            min,
            max,
        })
    }
}

impl EnhancerConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the configuration to a TOML file, creating parent
    /// directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every documented range.
    ///
    /// The first offending field is reported and nothing downstream of
    /// a failed check runs; a configuration either passes whole or is
    /// unusable, so no partially configured pipeline can exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(
            "input.sample_rate",
            f64::from(self.input.sample_rate),
            8000.0,
            192000.0,
        )?;
        check(
            "input.buffer_size",
            self.input.buffer_size as f64,
            64.0,
            4096.0,
        )?;
        check("input.channels", self.input.channels as f64, 1.0, 2.0)?;

        check(
            "reverb.room_size",
            f64::from(self.reverb.room_size),
            0.0,
            1.0,
        )?;
        check("reverb.damping", f64::from(self.reverb.damping), 0.0, 1.0)?;
        if !self.reverb.decay_time.is_finite() || self.reverb.decay_time <= 0.0 {
            return Err(ConfigError::OutOfRange {
                param: "reverb.decay_time",
                value: f64::from(self.reverb.decay_time),
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        check("reverb.wet_mix", f64::from(self.reverb.wet_mix), 0.0, 1.0)?;
        check("reverb.dry_mix", f64::from(self.reverb.dry_mix), 0.0, 1.0)?;
        if self.reverb.wet_mix + self.reverb.dry_mix > 1.0 {
            return Err(ConfigError::MixSum {
                wet: self.reverb.wet_mix,
                dry: self.reverb.dry_mix,
            });
        }
        check(
            "reverb.pre_delay",
            f64::from(self.reverb.pre_delay),
            0.0,
            f64::INFINITY,
        )?;

        if self.accel.memory_alignment < 4 || !self.accel.memory_alignment.is_power_of_two() {
            return Err(ConfigError::InvalidAlignment(self.accel.memory_alignment));
        }
        match self.accel.precision.as_str() {
            "full" | "mixed" | "half" => {}
            other => return Err(ConfigError::InvalidPrecision(other.to_string())),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = EnhancerConfig::default();
        assert_eq!(config.input.sample_rate, 48000);
        assert_eq!(config.input.buffer_size, 512);
        assert_eq!(config.input.channels, 2);
        assert_eq!(config.gate.threshold_db, -40.0);
        assert_eq!(config.gate.attack_ms, 10.0);
        assert_eq!(config.gate.release_ms, 100.0);
        assert_eq!(config.gate.floor, 0.01);
        assert_eq!(config.reverb.room_size, 0.5);
        assert_eq!(config.reverb.decay_time, 2.0);
        assert_eq!(config.reverb.wet_mix, 0.3);
        assert_eq!(config.reverb.dry_mix, 0.7);
        assert_eq!(config.reverb.low_shelf.frequency, 200.0);
        assert_eq!(config.reverb.high_shelf.gain_db, -2.0);
        assert_eq!(config.accel.max_latency_ms, 10.0);
        assert_eq!(config.accel.thread_count, 4);
        assert_eq!(config.accel.memory_alignment, 64);
        assert_eq!(config.accel.precision, "mixed");
        assert_eq!(config.accel.max_consecutive_failures, 3);
        assert_eq!(config.buffering.input_queue, 3);
        assert_eq!(config.buffering.ring, 8192);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_toml_is_the_default() {
        let config = EnhancerConfig::from_toml("").unwrap();
        assert_eq!(config, EnhancerConfig::default());
    }

    #[test]
    fn test_partial_toml_fills_missing_fields() {
        let config = EnhancerConfig::from_toml(
            r#"
[input]
sample_rate = 44100

[reverb]
wet_mix = 0.25
"#,
        )
        .unwrap();
        assert_eq!(config.input.sample_rate, 44100);
        // Untouched fields in a present section keep their defaults.
        assert_eq!(config.input.buffer_size, 512);
        assert_eq!(config.reverb.wet_mix, 0.25);
        assert_eq!(config.reverb.dry_mix, 0.7);
        // Absent sections come back whole.
        assert_eq!(config.gate, GateConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = EnhancerConfig::default();
        config.input.sample_rate = 96000;
        config.reverb.decay_time = 4.0;
        config.accel.precision = String::from("full");

        let toml = config.to_toml().unwrap();
        let parsed = EnhancerConfig::from_toml(&toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_sample_rate_bounds() {
        let mut config = EnhancerConfig::default();
        config.input.sample_rate = 8000;
        config.validate().unwrap();
        config.input.sample_rate = 192000;
        config.validate().unwrap();

        config.input.sample_rate = 7999;
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::OutOfRange { param, .. } if param == "input.sample_rate")
        );
        config.input.sample_rate = 192001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_buffer_size_bounds() {
        let mut config = EnhancerConfig::default();
        config.input.buffer_size = 64;
        config.validate().unwrap();
        config.input.buffer_size = 4096;
        config.validate().unwrap();

        config.input.buffer_size = 63;
        assert!(config.validate().is_err());
        config.input.buffer_size = 4097;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_bounds() {
        let mut config = EnhancerConfig::default();
        config.input.channels = 1;
        config.validate().unwrap();
        config.input.channels = 0;
        assert!(config.validate().is_err());
        config.input.channels = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mix_sum_over_unity_rejected() {
        let mut config = EnhancerConfig::default();
        config.reverb.wet_mix = 0.8;
        config.reverb.dry_mix = 0.5;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MixSum { wet: 0.8, dry: 0.5 }));
    }

    #[test]
    fn test_geometry_bounds() {
        let mut config = EnhancerConfig::default();
        config.reverb.room_size = 1.5;
        assert!(config.validate().is_err());

        let mut config = EnhancerConfig::default();
        config.reverb.damping = -0.1;
        assert!(config.validate().is_err());

        let mut config = EnhancerConfig::default();
        config.reverb.decay_time = 0.0;
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::OutOfRange { param, .. } if param == "reverb.decay_time")
        );

        let mut config = EnhancerConfig::default();
        config.reverb.pre_delay = -0.01;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let mut config = EnhancerConfig::default();
        config.reverb.room_size = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = EnhancerConfig::default();
        config.reverb.decay_time = f32::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_alignment_must_be_power_of_two() {
        let mut config = EnhancerConfig::default();
        for good in [4, 16, 64, 4096] {
            config.accel.memory_alignment = good;
            config.validate().unwrap();
        }
        for bad in [0, 2, 3, 6, 100] {
            config.accel.memory_alignment = bad;
            let err = config.validate().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidAlignment(a) if a == bad));
        }
    }

    #[test]
    fn test_precision_names() {
        let mut config = EnhancerConfig::default();
        for good in ["full", "mixed", "half"] {
            config.accel.precision = String::from(good);
            config.validate().unwrap();
        }
        config.accel.precision = String::from("turbo");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPrecision(ref p) if p == "turbo"));
    }

    #[test]
    fn test_first_failure_wins() {
        // Two invalid fields: the report names the earlier check.
        let mut config = EnhancerConfig::default();
        config.input.sample_rate = 100;
        config.accel.precision = String::from("turbo");
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::OutOfRange { param, .. } if param == "input.sample_rate")
        );
    }
}
