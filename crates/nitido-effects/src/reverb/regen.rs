//! Background impulse response regeneration.
//!
//! Rendering a response means seconds of sample data plus FFT
//! partitioning, which must never run on the audio thread. A dedicated
//! worker receives regeneration requests, coalesces bursts down to the
//! most recent one, renders and partitions the response, and reports
//! the result for the audio side to install at a block boundary.
//!
//! Progress is tracked as a generation watermark: every request
//! carries a monotonically increasing generation number, and the
//! worker raises the watermark after each render. Coalesced (skipped)
//! requests never get a result of their own, so waiters compare
//! against the watermark with `>=`, never `==`. Failed renders raise
//! the watermark too; only publishing is withheld.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;

use nitido_accel::PreparedIr;

use crate::reverb::ir::generate_impulse_response;
use crate::reverb::params::ReverbParams;

/// One regeneration request, tagged with its generation number.
#[derive(Debug, Clone)]
pub(crate) struct RegenRequest {
    pub params: ReverbParams,
    pub sample_rate: f32,
    pub block_size: usize,
    pub generation: u64,
}

/// Outcome of one render.
///
/// `prepared` is `None` when the rendered response failed the validity
/// check; the previous response stays in service in that case.
pub(crate) struct RegenResult {
    pub generation: u64,
    pub prepared: Option<Arc<PreparedIr>>,
}

/// Completed-generation watermark shared between the render thread and
/// flush waiters.
pub(crate) struct RegenProgress {
    completed: Mutex<u64>,
    wakeup: Condvar,
}

impl RegenProgress {
    fn new() -> Self {
        RegenProgress {
            completed: Mutex::new(0),
            wakeup: Condvar::new(),
        }
    }

    /// Raise the watermark and wake waiters. The watermark never moves
    /// backwards.
    fn publish(&self, generation: u64) {
        let mut completed = self
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if generation > *completed {
            *completed = generation;
        }
        self.wakeup.notify_all();
    }

    /// Current watermark.
    pub fn current(&self) -> u64 {
        *self
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the watermark reaches `generation`.
    pub fn wait_for(&self, generation: u64) {
        let mut completed = self
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *completed < generation {
            completed = self
                .wakeup
                .wait(completed)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Cloneable observer for pending regeneration work.
///
/// The handle can outlive its reverb: work still queued at teardown is
/// rendered and accounted for before the worker thread exits, so a
/// stray [`flush`](Self::flush) always returns.
#[derive(Clone)]
pub struct RegenHandle {
    requested: Arc<AtomicU64>,
    progress: Arc<RegenProgress>,
}

impl RegenHandle {
    pub(crate) fn new(requested: Arc<AtomicU64>, progress: Arc<RegenProgress>) -> Self {
        RegenHandle {
            requested,
            progress,
        }
    }

    /// Block until every request issued so far has been rendered or
    /// superseded by a newer one.
    pub fn flush(&self) {
        self.progress
            .wait_for(self.requested.load(Ordering::Acquire));
    }

    /// True when no renders are pending.
    pub fn is_idle(&self) -> bool {
        self.progress.current() >= self.requested.load(Ordering::Acquire)
    }
}

/// Handle to the render thread.
///
/// Dropping the handle closes the request channel; the worker drains
/// and renders whatever is still queued (raising the watermark past
/// it), then exits and is joined.
pub(crate) struct RegenWorker {
    requests: Option<Sender<RegenRequest>>,
    results: Receiver<RegenResult>,
    progress: Arc<RegenProgress>,
    handle: Option<JoinHandle<()>>,
}

impl RegenWorker {
    /// Spawn the worker. Responses are rendered with `channel_count`
    /// channels.
    pub fn spawn(channel_count: usize) -> Self {
        let (req_tx, req_rx) = mpsc::channel::<RegenRequest>();
        let (res_tx, res_rx) = mpsc::channel::<RegenResult>();
        let progress = Arc::new(RegenProgress::new());
        let thread_progress = Arc::clone(&progress);
        let handle = std::thread::spawn(move || {
            worker_loop(&req_rx, &res_tx, &thread_progress, channel_count);
        });
        RegenWorker {
            requests: Some(req_tx),
            results: res_rx,
            progress,
            handle: Some(handle),
        }
    }

    /// Shared watermark for flush waiters.
    pub fn progress(&self) -> Arc<RegenProgress> {
        Arc::clone(&self.progress)
    }

    /// Queue a regeneration request.
    ///
    /// A request that cannot reach the worker counts as completed with
    /// nothing published, so flush waiters never hang on it.
    pub fn submit(&self, request: RegenRequest) {
        let generation = request.generation;
        if let Some(tx) = &self.requests
            && tx.send(request).is_err()
        {
            tracing::warn!("regen_submit: worker is gone, request {generation} dropped");
            self.progress.publish(generation);
        }
    }

    /// Non-blocking poll for a finished render.
    pub fn try_recv(&self) -> Option<RegenResult> {
        self.results.try_recv().ok()
    }
}

impl Drop for RegenWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    requests: &Receiver<RegenRequest>,
    results: &Sender<RegenResult>,
    progress: &RegenProgress,
    channel_count: usize,
) {
    while let Ok(mut request) = requests.recv() {
        // Coalesce: only the newest queued request is worth rendering.
        loop {
            match requests.try_recv() {
                Ok(newer) => request = newer,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        let response =
            generate_impulse_response(&request.params, request.sample_rate, channel_count);
        let prepared = if response.is_finite() {
            tracing::debug!(
                "regen_render: generation {} ({} taps at block {})",
                request.generation,
                response.len(),
                request.block_size
            );
            Some(Arc::new(PreparedIr::prepare(
                response.channels(),
                request.block_size,
            )))
        } else {
            tracing::warn!(
                "regen_render: generation {} produced a non-finite response, not published",
                request.generation
            );
            None
        };

        // The result must be queued before the watermark moves, so a
        // waiter that wakes on this generation can already drain it.
        let generation = request.generation;
        let delivered = results
            .send(RegenResult {
                generation,
                prepared,
            })
            .is_ok();
        progress.publish(generation);
        if !delivered {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(generation: u64, params: ReverbParams) -> RegenRequest {
        RegenRequest {
            params,
            sample_rate: 8000.0,
            block_size: 64,
            generation,
        }
    }

    fn fast_params() -> ReverbParams {
        ReverbParams {
            decay_time: 0.1,
            ..ReverbParams::default()
        }
    }

    #[test]
    fn test_render_round_trip() {
        let worker = RegenWorker::spawn(2);
        worker.submit(request(1, fast_params()));
        worker.progress().wait_for(1);

        let result = worker.try_recv().unwrap();
        assert_eq!(result.generation, 1);
        let prepared = result.prepared.unwrap();
        assert_eq!(prepared.channel_count(), 2);
        assert_eq!(prepared.block_size(), 64);
        // 0.1 s at 8 kHz.
        assert_eq!(prepared.taps_len(), 800);
    }

    #[test]
    fn test_invalid_render_reports_without_publishing() {
        // A non-finite parameter poisons every sample of the response.
        // The watermark must still advance so waiters make progress.
        let mut params = fast_params();
        params.damping = f32::NAN;

        let worker = RegenWorker::spawn(2);
        worker.submit(request(7, params));
        worker.progress().wait_for(7);

        let result = worker.try_recv().unwrap();
        assert_eq!(result.generation, 7);
        assert!(result.prepared.is_none());
    }

    #[test]
    fn test_burst_coalesces_to_latest() {
        let worker = RegenWorker::spawn(1);
        for generation in 1..=3 {
            worker.submit(request(generation, fast_params()));
        }
        worker.progress().wait_for(3);

        // Some of the burst may be skipped, but results arrive in
        // generation order, the last one is the newest request, and
        // there are never more results than requests.
        let mut generations = Vec::new();
        while let Some(result) = worker.try_recv() {
            generations.push(result.generation);
        }
        assert!(!generations.is_empty());
        assert!(generations.len() <= 3);
        assert!(generations.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*generations.last().unwrap(), 3);
    }

    #[test]
    fn test_handle_flush_and_idle() {
        let worker = RegenWorker::spawn(2);
        let requested = Arc::new(AtomicU64::new(0));
        let handle = RegenHandle::new(Arc::clone(&requested), worker.progress());
        assert!(handle.is_idle());

        requested.store(2, Ordering::Release);
        worker.submit(request(1, fast_params()));
        worker.submit(request(2, fast_params()));
        handle.flush();
        assert!(handle.is_idle());
        assert!(worker.progress().current() >= 2);
    }

    #[test]
    fn test_drop_joins_worker() {
        let worker = RegenWorker::spawn(2);
        let progress = worker.progress();
        worker.submit(request(1, fast_params()));
        // Dropping must render pending work, raise the watermark, and
        // join the thread.
        drop(worker);
        assert_eq!(progress.current(), 1);
    }
}
