//! Pipeline lifecycle states.

use std::fmt;

/// Lifecycle state of the enhancement pipeline.
///
/// Audio is only modified in [`Running`](PipelineState::Running); every
/// other state passes input through untouched. The transient states
/// bracket the work `start` and `stop` do, so a state subscriber sees
/// them even when that work is quick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Built and configured, not processing.
    Idle,
    /// `start` is settling pending work before processing begins.
    Initializing,
    /// Blocks run through the enhancement chain.
    Running,
    /// `stop` is draining effect state before going idle.
    Stopping,
    /// The processing graph is incomplete and cannot run.
    Error,
}

impl PipelineState {
    /// Lowercase name, as used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Initializing => "initializing",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
            PipelineState::Error => "error",
        }
    }

    /// True when blocks are being enhanced rather than passed through.
    pub fn is_running(self) -> bool {
        self == PipelineState::Running
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_name() {
        for state in [
            PipelineState::Idle,
            PipelineState::Initializing,
            PipelineState::Running,
            PipelineState::Stopping,
            PipelineState::Error,
        ] {
            assert_eq!(format!("{state}"), state.as_str());
        }
    }

    #[test]
    fn only_running_is_running() {
        assert!(PipelineState::Running.is_running());
        assert!(!PipelineState::Idle.is_running());
        assert!(!PipelineState::Error.is_running());
    }
}
