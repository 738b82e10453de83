//! Per-block processing cost accounting.

/// Weight of the newest block in the running average.
const AVG_ALPHA: f64 = 0.1;

/// Running cost statistics for processed blocks.
///
/// All times are in microseconds. The average is an exponential moving
/// average seeded with the first block's cost, so it is meaningful from
/// the first reading while still favoring recent behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessMetrics {
    /// Blocks processed since construction or the last reset.
    pub blocks: u64,
    /// Cost of the most recent block.
    pub last_us: f64,
    /// Exponential moving average of block cost.
    pub avg_us: f64,
    /// Worst block cost seen.
    pub peak_us: f64,
    /// Blocks that cost more than their real-time duration.
    pub overruns: u64,
}

impl ProcessMetrics {
    /// Folds one block's cost in. Returns true when the block overran
    /// the budget.
    pub(crate) fn record(&mut self, cost_us: f64, budget_us: f64) -> bool {
        self.blocks += 1;
        self.last_us = cost_us;
        self.avg_us = if self.blocks == 1 {
            cost_us
        } else {
            AVG_ALPHA * cost_us + (1.0 - AVG_ALPHA) * self.avg_us
        };
        if cost_us > self.peak_us {
            self.peak_us = cost_us;
        }
        let overrun = cost_us > budget_us;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }

    pub(crate) fn clear(&mut self) {
        *self = ProcessMetrics::default();
    }
}
