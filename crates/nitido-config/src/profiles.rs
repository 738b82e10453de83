//! Built-in configuration profiles.
//!
//! Profiles are code-level constructors for the common operating
//! points. Each starts from the default configuration and adjusts only
//! the fields that define its trade-off.

use crate::EnhancerConfig;

/// Names accepted by [`get_profile`].
pub static PROFILE_NAMES: &[&str] = &["low_latency", "high_quality", "power_saving"];

/// Small blocks and a short tail for interactive monitoring.
pub fn low_latency() -> EnhancerConfig {
    let mut config = EnhancerConfig::default();
    config.input.buffer_size = 256;
    config.accel.max_latency_ms = 5.0;
    config.reverb.decay_time = 1.0;
    config.reverb.wet_mix = 0.2;
    config
}

/// Studio rendering: 96 kHz, large blocks, full precision, long tail.
pub fn high_quality() -> EnhancerConfig {
    let mut config = EnhancerConfig::default();
    config.input.sample_rate = 96000;
    config.input.buffer_size = 1024;
    config.accel.precision = String::from("full");
    config.reverb.decay_time = 4.0;
    // wet + dry must not exceed unity
    config.reverb.wet_mix = 0.4;
    config.reverb.dry_mix = 0.6;
    config
}

/// Battery-friendly: two worker threads and half precision.
pub fn power_saving() -> EnhancerConfig {
    let mut config = EnhancerConfig::default();
    config.accel.thread_count = 2;
    config.accel.precision = String::from("half");
    config.reverb.decay_time = 1.5;
    config.reverb.wet_mix = 0.2;
    config
}

/// Look up a profile constructor by name.
pub fn get_profile(name: &str) -> Option<EnhancerConfig> {
    match name {
        "low_latency" => Some(low_latency()),
        "high_quality" => Some(high_quality()),
        "power_saving" => Some(power_saving()),
        _ => None,
    }
}

/// All profile names.
pub fn profile_names() -> &'static [&'static str] {
    PROFILE_NAMES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_profile_validates() {
        for name in profile_names() {
            let config = get_profile(name).unwrap();
            config
                .validate()
                .unwrap_or_else(|e| panic!("profile '{name}' invalid: {e}"));
        }
    }

    #[test]
    fn test_low_latency_shape() {
        let config = low_latency();
        assert_eq!(config.input.buffer_size, 256);
        assert_eq!(config.accel.max_latency_ms, 5.0);
        assert_eq!(config.reverb.decay_time, 1.0);
        assert_eq!(config.reverb.wet_mix, 0.2);
        // Untouched fields stay at their defaults.
        assert_eq!(config.input.sample_rate, 48000);
        assert_eq!(config.accel.precision, "mixed");
    }

    #[test]
    fn test_high_quality_shape() {
        let config = high_quality();
        assert_eq!(config.input.sample_rate, 96000);
        assert_eq!(config.input.buffer_size, 1024);
        assert_eq!(config.accel.precision, "full");
        assert_eq!(config.reverb.decay_time, 4.0);
        assert_eq!(config.reverb.wet_mix, 0.4);
        assert!(config.reverb.wet_mix + config.reverb.dry_mix <= 1.0);
    }

    #[test]
    fn test_power_saving_shape() {
        let config = power_saving();
        assert_eq!(config.accel.thread_count, 2);
        assert_eq!(config.accel.precision, "half");
        assert_eq!(config.reverb.decay_time, 1.5);
    }

    #[test]
    fn test_unknown_profile_is_none() {
        assert!(get_profile("studio_mega").is_none());
        assert!(get_profile("").is_none());
    }
}
