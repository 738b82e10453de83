//! Nitido Accel - Dual-path convolution with injected acceleration
//!
//! This crate brokers block convolution between two engines that share
//! one input history:
//!
//! - [`broker`] - The [`AccelerationBroker`]: capability gating, per-call
//!   fallback, latency-driven downgrades, permanent disable
//! - [`convolve`] - Uniform partitioned overlap-save FFT engine and the
//!   software-direct kernel
//! - [`ir`] - Impulse response partitioning and spectrum preparation
//! - [`pool`] - Alignment-guaranteed staging buffers
//! - [`precision`] - Precision ladder (full / mixed / half)
//! - [`error`] - The [`AccelError`] fallback signal
//!
//! Acceleration capability is injected by the host; this crate never
//! probes hardware. A broker without the capability, or one whose
//! accelerated path has faulted too many times, reports
//! [`AccelError`] from every accelerated call and the caller completes
//! the block on the software path:
//!
//! ```rust
//! use std::sync::Arc;
//! use nitido_accel::{AccelerationBroker, BrokerConfig, PreparedIr};
//!
//! let mut broker = AccelerationBroker::new(256, BrokerConfig::default());
//! broker.install_ir(Arc::new(PreparedIr::prepare(
//!     &[vec![0.5, 0.25], vec![0.5, 0.25]],
//!     256,
//! )));
//!
//! let left = vec![0.0f32; 256];
//! let right = vec![0.0f32; 256];
//! let mut out_left = vec![0.0f32; 256];
//! let mut out_right = vec![0.0f32; 256];
//! if broker.convolve(&left, &right, &mut out_left, &mut out_right).is_err() {
//!     broker.convolve_software(&left, &right, &mut out_left, &mut out_right);
//! }
//! ```
//!
//! Both engines are numerically equivalent on finite input, so a
//! stream may switch paths between any two blocks without a seam.

pub mod broker;
pub mod convolve;
pub mod error;
pub mod ir;
pub mod pool;
pub mod precision;

// Re-export main types
pub use broker::{AccelerationBroker, BrokerConfig};
pub use error::AccelError;
pub use ir::{IrChannel, PreparedIr};
pub use pool::AlignedPool;
pub use precision::{ParsePrecisionError, PrecisionMode};
