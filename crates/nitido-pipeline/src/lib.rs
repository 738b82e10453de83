//! Nitido Pipeline - The enhancement facade over the effect chain
//!
//! [`Enhancer`] assembles the full microphone enhancement path (input
//! trim, procedural reverb, noise gate, output trim) from an
//! [`EnhancerConfig`](nitido_config::EnhancerConfig), drives it block
//! by block, and accounts for processing cost. Companion types:
//!
//! - [`PipelineState`] - lifecycle state machine
//! - [`ProcessMetrics`] - per-block cost statistics
//! - [`SignalQuality`] - block health measurement feeding the
//!   weak-signal recovery path
//!
//! ## Example
//!
//! ```rust
//! use nitido_config::{EnhancerConfig, InputConfig, ReverbConfig};
//! use nitido_pipeline::{AccelCapability, Enhancer, SignalQuality};
//!
//! let config = EnhancerConfig {
//!     input: InputConfig {
//!         sample_rate: 16000,
//!         buffer_size: 256,
//!         ..InputConfig::default()
//!     },
//!     reverb: ReverbConfig {
//!         decay_time: 0.5,
//!         ..ReverbConfig::default()
//!     },
//!     ..EnhancerConfig::default()
//! };
//! let mut enhancer = Enhancer::new(config, AccelCapability { available: false })?;
//!
//! // A weak capture: boost it before the gate eats it.
//! let block = vec![0.004f32; 256];
//! let quality = SignalQuality::measure(&block, &block);
//! if quality.is_weak() {
//!     enhancer.configure_for_weak_signal()?;
//! }
//!
//! enhancer.start();
//! let mut left = vec![0.0f32; 256];
//! let mut right = vec![0.0f32; 256];
//! enhancer.process_block(&block, &block, &mut left, &mut right);
//! enhancer.stop();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod enhancer;
mod metrics;
mod quality;
mod state;

pub use enhancer::{
    AccelCapability, Enhancer, EnhancerError, STAGE_GATE, STAGE_OUTPUT, STAGE_PRE, STAGE_REVERB,
};
pub use metrics::ProcessMetrics;
pub use quality::SignalQuality;
pub use state::PipelineState;
