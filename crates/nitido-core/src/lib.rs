//! Nitido Core - DSP primitives for real-time signal enhancement
//!
//! This crate provides the foundational building blocks for the nitido
//! microphone-signal enhancer: the effect abstraction, the processing chain,
//! and the DSP primitives the enhancement effects are assembled from. All
//! audio-path code is allocation-free.
//!
//! # Core Abstractions
//!
//! ## Effect System
//!
//! - [`Effect`] - Object-safe trait for all audio effects (mono and stereo)
//! - [`EffectWithParams`] - Bridge trait for boxed effects with parameter access
//! - [`EffectChain`] - Ordered chain with per-node enable state and click-free
//!   bypass crossfades
//!
//! ## Parameter Smoothing
//!
//! Zipper-free parameter changes for click-free automation:
//!
//! - [`SmoothedParam`] - Exponential smoothing (RC-like response)
//! - [`LinearSmoothedParam`] - Linear ramps (constant rate, exact duration)
//!
//! ## Filters and Delays
//!
//! - [`Biquad`] - Second-order IIR filter with RBJ shelf coefficients
//! - [`CombFilter`] - Feedback comb for Schroeder-style impulse synthesis
//! - [`AllpassFilter`] - Schroeder allpass for diffusion
//! - [`InterpolatedDelay`] - Variable-length delay with fractional reads
//!
//! ## Utilities
//!
//! - Math functions: [`db_to_linear`], [`linear_to_db`], [`flush_denormal`],
//!   [`wet_dry_mix`]
//! - [`ParameterInfo`] / [`ParamDescriptor`] - runtime parameter discovery
//!   and validated writes
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible for embedded targets. Disable the
//! default `std` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! nitido-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Design Principles
//!
//! - **Real-time safe**: no allocations in audio processing paths
//! - **No dependencies on std**: pure `no_std` with `libm` for math
//! - **Object-safe traits**: dynamic dispatch at the chain boundary
//! - **Click-free control**: every audible parameter moves through a smoother

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod allpass;
pub mod biquad;
pub mod buffer;
pub mod chain;
pub mod comb;
pub mod delay;
pub mod effect;
pub mod effect_with_params;
pub mod math;
pub mod param;
pub mod param_info;

// Re-export main types at crate root
pub use allpass::AllpassFilter;
pub use biquad::{Biquad, high_shelf_coefficients, low_shelf_coefficients};
pub use buffer::StereoBuffer;
pub use chain::{ChainError, ChainSnapshot, EffectChain, NodeId, NodeSnapshot};
pub use comb::CombFilter;
pub use delay::{InterpolatedDelay, Interpolation};
pub use effect::Effect;
pub use effect_with_params::EffectWithParams;
pub use math::{
    db_to_linear, flush_denormal, lerp, linear_to_db, ms_to_samples, rms, samples_to_ms,
    wet_dry_mix, wet_dry_mix_stereo,
};
pub use param::{LinearSmoothedParam, SmoothedParam};
pub use param_info::{ParamDescriptor, ParamUnit, ParamWriteError, ParameterInfo};
