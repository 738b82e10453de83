//! Error types for the acceleration broker.

use thiserror::Error;

/// Errors surfaced by the accelerated convolution path.
///
/// Every variant means the same thing to the caller: the accelerated
/// engine did not produce this block, so the caller must run
/// [`convolve_software`](crate::AccelerationBroker::convolve_software)
/// with the same input before moving on. The variants exist so logs can
/// distinguish a missing capability from a runtime fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccelError {
    /// No acceleration capability was granted at construction.
    #[error("acceleration capability not granted")]
    NotGranted,

    /// The broker shut the accelerated path down after repeated faults.
    #[error("accelerated path disabled after {failures} consecutive failures")]
    Disabled {
        /// Failure count at the moment the path was disabled.
        failures: u32,
    },

    /// No impulse response has been installed yet.
    #[error("no impulse response installed")]
    NoImpulseResponse,

    /// The installed impulse response was partitioned for a different
    /// block size than the broker processes.
    #[error("impulse response partitioned for block size {ir_block}, broker runs {broker_block}")]
    BlockSizeMismatch {
        /// Partition block size the impulse response was prepared with.
        ir_block: usize,
        /// Block size the broker was constructed with.
        broker_block: usize,
    },

    /// The accelerated engine produced a non-finite sample.
    #[error("accelerated output contained non-finite samples")]
    NonFiniteOutput,
}

impl AccelError {
    /// Whether this error counts toward the consecutive-failure limit.
    ///
    /// Missing capability, an already-disabled path, and a missing
    /// impulse response are caller-state conditions, not engine faults,
    /// and never push the broker toward permanent disable.
    pub fn is_engine_fault(&self) -> bool {
        matches!(
            self,
            AccelError::BlockSizeMismatch { .. } | AccelError::NonFiniteOutput
        )
    }
}
