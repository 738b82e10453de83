//! Dual-path convolution broker.
//!
//! The broker owns both convolution engines and the shared input
//! history they read from. Capability is injected at construction,
//! never probed: a broker built without the accelerated flag answers
//! every [`convolve`](AccelerationBroker::convolve) call with
//! [`AccelError::NotGranted`] and the caller runs the software path in
//! the same call. Because both paths consume one shared history, the
//! stream stays seamless no matter which engine produced any given
//! block.
//!
//! The accelerated engine also polices itself: blocks that overrun the
//! latency budget step precision and thread budget down one notch
//! (never back up), and repeated engine faults latch the path off for
//! the life of the broker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rustfft::num_complex::Complex;

use crate::convolve::{FftEngine, direct_convolve};
use crate::error::AccelError;
use crate::ir::{IrChannel, PreparedIr};
use crate::pool::AlignedPool;
use crate::precision::PrecisionMode;

/// Capability and tuning injected into a broker at construction.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Whether the accelerated path may run at all. Callers learn this
    /// from the host environment and pass it in; the broker never
    /// detects hardware on its own.
    pub accelerated: bool,
    /// Per-block latency budget. An accelerated block that takes longer
    /// triggers a one-step downgrade.
    pub max_block_time: Duration,
    /// Worker threads the spectrum multiply may use. Downgrades reduce
    /// this by one at a time, never below 2.
    pub thread_budget: usize,
    /// Starting arithmetic precision.
    pub precision: PrecisionMode,
    /// Engine faults tolerated in a row before the accelerated path is
    /// permanently disabled.
    pub max_consecutive_failures: u32,
    /// Byte alignment for the staging pool.
    pub alignment: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            accelerated: false,
            max_block_time: Duration::from_millis(10),
            thread_budget: 4,
            precision: PrecisionMode::Mixed,
            max_consecutive_failures: 3,
            alignment: 64,
        }
    }
}

/// Per-channel convolution state.
///
/// `history` and `cur` are shared by both engines; `fdl` and `head`
/// belong to the accelerated path alone.
struct Lane {
    history: Vec<f32>,
    cur: Vec<f32>,
    fdl: Vec<Vec<Complex<f32>>>,
    head: usize,
    frame_scratch: Vec<f32>,
}

impl Lane {
    fn new(block_size: usize) -> Self {
        Lane {
            history: Vec::new(),
            cur: vec![0.0; block_size],
            fdl: Vec::new(),
            head: 0,
            frame_scratch: Vec::new(),
        }
    }
}

/// Brokers one impulse response across an accelerated FFT engine and a
/// software fallback.
///
/// Call discipline per block: present the input to
/// [`convolve`](Self::convolve) first. On `Ok` the output block is
/// ready. On `Err` the output buffers are unspecified and the caller
/// must immediately run [`convolve_software`](Self::convolve_software)
/// with the same input, which reuses the already-staged block. A caller
/// that wants the software path unconditionally may skip `convolve`
/// and present each block to `convolve_software` directly.
pub struct AccelerationBroker {
    config: BrokerConfig,
    precision: PrecisionMode,
    thread_budget: usize,
    block_size: usize,
    hist_cap: usize,
    pool: AlignedPool,
    engine: FftEngine,
    prepared: Option<Arc<PreparedIr>>,
    lanes: [Lane; 2],
    staged: bool,
    fallback_pending: bool,
    consecutive_failures: u32,
    disabled: bool,
    last_block_time: Duration,
}

impl AccelerationBroker {
    /// Build a broker for a fixed block size.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero or the configured alignment is
    /// not a power of two of at least 4.
    pub fn new(block_size: usize, config: BrokerConfig) -> Self {
        let pool = AlignedPool::new(block_size, config.alignment);
        let engine = FftEngine::new(block_size);
        let precision = config.precision;
        let thread_budget = config.thread_budget.max(1);
        AccelerationBroker {
            config,
            precision,
            thread_budget,
            block_size,
            hist_cap: block_size,
            pool,
            engine,
            prepared: None,
            lanes: [Lane::new(block_size), Lane::new(block_size)],
            staged: false,
            fallback_pending: false,
            consecutive_failures: 0,
            disabled: false,
            last_block_time: Duration::ZERO,
        }
    }

    /// Install a prepared impulse response, replacing any previous one.
    ///
    /// Allocation happens here, not in the block loop: per-channel
    /// frequency-domain delay lines are rebuilt from scratch and the
    /// shared history is re-capped for the new tap count. The old
    /// response's unfinished tail is dropped with it.
    pub fn install_ir(&mut self, ir: Arc<PreparedIr>) {
        let fft_size = self.engine.fft_size();
        for (ch, lane) in self.lanes.iter_mut().enumerate() {
            match ir_channel(&ir, ch) {
                Some(src) => {
                    lane.fdl = vec![vec![Complex::new(0.0, 0.0); fft_size]; src.spectra().len()];
                }
                None => lane.fdl.clear(),
            }
            lane.head = 0;
        }
        self.hist_cap = self.block_size.max(ir.taps_len().saturating_sub(1));
        for lane in &mut self.lanes {
            if lane.history.len() > self.hist_cap {
                let overflow = lane.history.len() - self.hist_cap;
                lane.history.drain(..overflow);
            }
        }
        tracing::debug!(
            "accel_install: {} taps, {} partitions, block {}",
            ir.taps_len(),
            ir.partition_count(),
            ir.block_size()
        );
        self.prepared = Some(ir);
    }

    /// The currently installed response, if any.
    pub fn prepared_ir(&self) -> Option<&Arc<PreparedIr>> {
        self.prepared.as_ref()
    }

    /// Convolve one stereo block on the accelerated path.
    ///
    /// The input is staged into the shared history before the attempt,
    /// so a failure here never desynchronizes the fallback. On `Err`
    /// the output buffers are unspecified; run
    /// [`convolve_software`](Self::convolve_software) with the same
    /// input in the same call.
    pub fn convolve(
        &mut self,
        left: &[f32],
        right: &[f32],
        out_left: &mut [f32],
        out_right: &mut [f32],
    ) -> Result<(), AccelError> {
        self.stage(left, right);
        self.fallback_pending = true;

        if !self.config.accelerated {
            return Err(AccelError::NotGranted);
        }
        if self.disabled {
            return Err(AccelError::Disabled {
                failures: self.consecutive_failures,
            });
        }
        let Some(ir) = self.prepared.clone() else {
            return Err(AccelError::NoImpulseResponse);
        };

        match self.accelerated_block(&ir, out_left, out_right) {
            Ok(()) => {
                self.fallback_pending = false;
                self.consecutive_failures = 0;
                Ok(())
            }
            Err(err) => {
                if err.is_engine_fault() {
                    self.consecutive_failures += 1;
                    tracing::warn!(
                        "accel_fault: {err} ({} consecutive)",
                        self.consecutive_failures
                    );
                    if self.consecutive_failures >= self.config.max_consecutive_failures {
                        self.disabled = true;
                        tracing::warn!(
                            "accel_disable: giving up after {} consecutive failures",
                            self.consecutive_failures
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Convolve one stereo block on the software path.
    ///
    /// When this call follows a failed [`convolve`](Self::convolve) it
    /// reuses the block staged by that call; otherwise it stages the
    /// given input itself. With no response installed the output is
    /// silence.
    pub fn convolve_software(
        &mut self,
        left: &[f32],
        right: &[f32],
        out_left: &mut [f32],
        out_right: &mut [f32],
    ) {
        if !self.fallback_pending {
            self.stage(left, right);
        }
        self.fallback_pending = false;

        let prepared = self.prepared.clone();
        for (ch, out) in [out_left, out_right].into_iter().enumerate() {
            let lane = &mut self.lanes[ch];
            let n = out.len().min(self.block_size);
            let taps = prepared
                .as_deref()
                .and_then(|ir| ir_channel(ir, ch))
                .map_or(&[][..], IrChannel::taps);
            direct_convolve(
                taps,
                &lane.history,
                &lane.cur,
                &mut lane.frame_scratch,
                &mut out[..n],
            );
            out[n..].fill(0.0);
        }
    }

    /// Current arithmetic precision. Only moves down.
    pub fn precision(&self) -> PrecisionMode {
        self.precision
    }

    /// Current worker-thread budget. Only moves down, floored at 2.
    pub fn thread_budget(&self) -> usize {
        self.thread_budget
    }

    /// Whether the accelerated path has been permanently disabled.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Engine faults seen since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Wall time of the most recent accelerated block.
    pub fn last_block_time(&self) -> Duration {
        self.last_block_time
    }

    /// Whether acceleration was granted at construction.
    pub fn is_accelerated(&self) -> bool {
        self.config.accelerated
    }

    /// Block size the broker processes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The staging pool, exposed for alignment diagnostics.
    pub fn pool(&self) -> &AlignedPool {
        &self.pool
    }

    /// Clear all signal state: history, staged input, and delay lines.
    ///
    /// Health state survives: a disabled path stays disabled and the
    /// adapted precision and thread budget keep their values.
    pub fn reset(&mut self) {
        for lane in &mut self.lanes {
            lane.history.clear();
            lane.cur.fill(0.0);
            for slot in &mut lane.fdl {
                slot.fill(Complex::new(0.0, 0.0));
            }
            lane.head = 0;
        }
        self.staged = false;
        self.fallback_pending = false;
        self.pool.clear();
    }

    /// Copy the new block into the staging area, first committing the
    /// previously staged block to the shared history. The commit is
    /// lazy so that a failed accelerated attempt and its software
    /// retry see the identical stream position.
    fn stage(&mut self, left: &[f32], right: &[f32]) {
        if self.staged {
            self.commit_history();
        }
        for (lane, src) in self.lanes.iter_mut().zip([left, right]) {
            let n = src.len().min(self.block_size);
            lane.cur[..n].copy_from_slice(&src[..n]);
            lane.cur[n..].fill(0.0);
        }
        self.staged = true;
    }

    fn commit_history(&mut self) {
        for lane in &mut self.lanes {
            lane.history.extend_from_slice(&lane.cur);
            if lane.history.len() > self.hist_cap {
                let overflow = lane.history.len() - self.hist_cap;
                lane.history.drain(..overflow);
            }
        }
        self.staged = false;
    }

    fn accelerated_block(
        &mut self,
        ir: &PreparedIr,
        out_left: &mut [f32],
        out_right: &mut [f32],
    ) -> Result<(), AccelError> {
        if ir.block_size() != self.block_size {
            return Err(AccelError::BlockSizeMismatch {
                ir_block: ir.block_size(),
                broker_block: self.block_size,
            });
        }

        let started = Instant::now();
        let block = self.block_size;
        let (input, output, work) = self.pool.slots_mut();
        let (work_in, work_out) = work.split_at_mut(block * 2);

        for (ch, lane) in self.lanes.iter_mut().enumerate() {
            let have = lane.history.len().min(block);
            input[..block - have].fill(0.0);
            input[block - have..block]
                .copy_from_slice(&lane.history[lane.history.len() - have..]);
            input[block..].copy_from_slice(&lane.cur);
            work_in.copy_from_slice(input);

            let spectra = ir_channel(ir, ch).map_or(&[][..], IrChannel::spectra);
            self.engine.process_lane(
                spectra,
                &mut lane.fdl,
                &mut lane.head,
                work_in,
                work_out,
                self.precision,
                self.thread_budget,
            );
            output[ch * block..(ch + 1) * block].copy_from_slice(&work_out[block..]);
        }

        if output.iter().any(|s| !s.is_finite()) {
            return Err(AccelError::NonFiniteOutput);
        }

        let n_left = out_left.len().min(block);
        out_left[..n_left].copy_from_slice(&output[..n_left]);
        out_left[n_left..].fill(0.0);
        let n_right = out_right.len().min(block);
        out_right[..n_right].copy_from_slice(&output[block..block + n_right]);
        out_right[n_right..].fill(0.0);

        self.last_block_time = started.elapsed();
        if self.last_block_time > self.config.max_block_time {
            self.downgrade();
        }
        Ok(())
    }

    /// Step precision and thread budget down one notch each. Neither
    /// ever steps back up.
    fn downgrade(&mut self) {
        let precision = self.precision.lowered();
        let threads = if self.thread_budget > 2 {
            self.thread_budget - 1
        } else {
            self.thread_budget
        };
        if precision != self.precision || threads != self.thread_budget {
            tracing::debug!(
                "accel_adapt: precision {} -> {}, threads {} -> {}, block took {:?}",
                self.precision,
                precision,
                self.thread_budget,
                threads,
                self.last_block_time
            );
            self.precision = precision;
            self.thread_budget = threads;
        }
    }
}

fn ir_channel(ir: &PreparedIr, lane: usize) -> Option<&IrChannel> {
    if ir.channel_count() == 0 {
        None
    } else {
        Some(ir.channel(lane.min(ir.channel_count() - 1)))
    }
}
