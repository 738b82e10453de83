//! Nitido Effects - Enhancement stages for the microphone pipeline
//!
//! This crate provides the three stages the enhancement chain is built from:
//!
//! - [`LevelGate`] - RMS noise gate with per-block level detection
//! - [`Reverb`] - Procedural convolution reverb with background impulse
//!   response regeneration
//! - [`Trim`] - Smoothed linear gain for the pre and output stages
//!
//! ## Example
//!
//! ```rust
//! use nitido_accel::BrokerConfig;
//! use nitido_core::Effect;
//! use nitido_effects::{LevelGate, Reverb, ReverbParams, Trim};
//!
//! let params = ReverbParams {
//!     decay_time: 0.5,
//!     ..ReverbParams::default()
//! };
//! let mut reverb = Reverb::new(48000.0, 256, params, BrokerConfig::default())?;
//! let mut gate = LevelGate::new(48000.0);
//! let mut trim = Trim::new(48000.0);
//!
//! let mut left = vec![0.0f32; 256];
//! let mut right = vec![0.0f32; 256];
//! reverb.process_block_stereo(&mut left, &mut right);
//! gate.process_block_stereo(&mut left, &mut right);
//! trim.process_block_stereo(&mut left, &mut right);
//! # Ok::<(), nitido_effects::ReverbParamsError>(())
//! ```

pub mod gate;
pub mod reverb;
pub mod trim;

// Re-export main types at crate root
pub use gate::{GateState, LevelGate};
pub use reverb::{
    ImpulseResponse, PresetError, RegenHandle, Reverb, ReverbAnalysis, ReverbParams,
    ReverbParamsError, ShelfParams, UpdateError, generate_impulse_response, preset_names,
};
pub use trim::Trim;
