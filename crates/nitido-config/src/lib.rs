//! Configuration for the nitido microphone enhancement pipeline.
//!
//! This crate defines the TOML-backed configuration the pipeline is
//! constructed from:
//!
//! - **[`EnhancerConfig`]**: every tunable of the pipeline in one
//!   document, with per-field defaults so partial files work
//! - **Validation**: range checks for every documented bound, run
//!   before any pipeline is built
//! - **Profiles**: code-level constructors for common operating points
//!
//! # Example
//!
//! ```rust
//! use nitido_config::EnhancerConfig;
//!
//! let config = EnhancerConfig::from_toml(
//!     r#"
//! [input]
//! sample_rate = 44100
//!
//! [reverb]
//! decay_time = 1.5
//! "#,
//! )?;
//! config.validate()?;
//! assert_eq!(config.input.sample_rate, 44100);
//! assert_eq!(config.input.buffer_size, 512);
//! # Ok::<(), nitido_config::ConfigError>(())
//! ```

mod config;
mod error;
mod profiles;

pub use config::{
    AccelConfig, BufferingConfig, EnhancerConfig, GateConfig, InputConfig, ReverbConfig,
    ShelfConfig,
};
pub use error::ConfigError;
pub use profiles::{
    PROFILE_NAMES, get_profile, high_quality, low_latency, power_saving, profile_names,
};
