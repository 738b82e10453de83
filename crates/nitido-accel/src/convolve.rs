//! Convolution kernels shared by the broker's two paths.
//!
//! Both kernels compute the same streaming convolution. The
//! accelerated path runs uniform partitioned overlap-save: one forward
//! transform per block, a frequency-domain delay line holding the last
//! `P` input spectra, a multiply-accumulate against the `P` partition
//! spectra, and one inverse transform. The software path is the plain
//! time-domain dot product against the same input history. For finite
//! inputs they agree to within transform round-off, which is what lets
//! the broker fall from one to the other mid-stream without a seam.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::precision::{PrecisionMode, truncate_bf16};

/// Minimum partition count before the spectrum multiply is split
/// across worker threads. Below this the dispatch overhead costs more
/// than the arithmetic.
const MIN_PARTITIONS_FOR_SPLIT: usize = 16;

/// Time-domain convolution of one block against the full tap list.
///
/// `history` holds past input with the newest sample last; `cur` is the
/// current block. Accumulation runs in f64, matching the numeric
/// behavior expected of an offline reference.
pub(crate) fn direct_convolve(
    taps: &[f32],
    history: &[f32],
    cur: &[f32],
    frame_scratch: &mut Vec<f32>,
    out: &mut [f32],
) {
    if taps.is_empty() {
        out.fill(0.0);
        return;
    }

    let hist_need = taps.len() - 1;
    let have = history.len().min(hist_need);

    frame_scratch.clear();
    frame_scratch.resize(hist_need - have, 0.0);
    frame_scratch.extend_from_slice(&history[history.len() - have..]);
    frame_scratch.extend_from_slice(cur);

    for (i, sample) in out.iter_mut().enumerate() {
        let base = hist_need + i;
        let mut acc = 0.0f64;
        for (j, &tap) in taps.iter().enumerate() {
            acc += f64::from(tap) * f64::from(frame_scratch[base - j]);
        }
        *sample = acc as f32;
    }
}

/// Transform plans and scratch for the accelerated path.
///
/// Planned once per broker; the frame size never changes after
/// construction.
pub(crate) struct FftEngine {
    fwd: Arc<dyn Fft<f32>>,
    inv: Arc<dyn Fft<f32>>,
    fft_size: usize,
    spectrum: Vec<Complex<f32>>,
    acc32: Vec<Complex<f32>>,
    acc64: Vec<Complex<f64>>,
    partials32: Vec<Vec<Complex<f32>>>,
    partials64: Vec<Vec<Complex<f64>>>,
}

impl FftEngine {
    pub(crate) fn new(block_size: usize) -> Self {
        let fft_size = block_size * 2;
        let mut planner = FftPlanner::new();
        FftEngine {
            fwd: planner.plan_fft_forward(fft_size),
            inv: planner.plan_fft_inverse(fft_size),
            fft_size,
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            acc32: vec![Complex::new(0.0, 0.0); fft_size],
            acc64: vec![Complex::new(0.0, 0.0); fft_size],
            partials32: Vec::new(),
            partials64: Vec::new(),
        }
    }

    pub(crate) fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Run one overlap-save step for a single channel.
    ///
    /// `frame` is the 2B real input frame, previous block first. The
    /// newest input spectrum is pushed into `fdl` at `head`, the
    /// multiply-accumulate runs against `spectra`, and the inverse
    /// transform lands in `out` (2B samples, the back half is the valid
    /// block).
    ///
    /// `fdl` must hold exactly `spectra.len()` slots of `fft_size`
    /// bins; the broker rebuilds it whenever a response is installed.
    pub(crate) fn process_lane(
        &mut self,
        spectra: &[Vec<Complex<f32>>],
        fdl: &mut [Vec<Complex<f32>>],
        head: &mut usize,
        frame: &[f32],
        out: &mut [f32],
        precision: PrecisionMode,
        threads: usize,
    ) {
        debug_assert_eq!(frame.len(), self.fft_size);
        debug_assert_eq!(out.len(), self.fft_size);
        debug_assert_eq!(fdl.len(), spectra.len());

        let partitions = spectra.len();
        if partitions == 0 {
            out.fill(0.0);
            return;
        }

        for (bin, &sample) in self.spectrum.iter_mut().zip(frame.iter()) {
            bin.re = sample;
            bin.im = 0.0;
        }
        self.fwd.process(&mut self.spectrum);

        if precision == PrecisionMode::Half {
            for bin in &mut self.spectrum {
                bin.re = truncate_bf16(bin.re);
                bin.im = truncate_bf16(bin.im);
            }
        }

        *head = (*head + partitions - 1) % partitions;
        fdl[*head].copy_from_slice(&self.spectrum);

        match precision {
            PrecisionMode::Full => {
                self.accumulate_f64(spectra, fdl, *head, threads);
                for (bin, acc) in self.spectrum.iter_mut().zip(self.acc64.iter()) {
                    bin.re = acc.re as f32;
                    bin.im = acc.im as f32;
                }
            }
            PrecisionMode::Mixed | PrecisionMode::Half => {
                self.accumulate_f32(spectra, fdl, *head, threads);
                self.spectrum.copy_from_slice(&self.acc32);
            }
        }

        self.inv.process(&mut self.spectrum);
        let scale = 1.0 / self.fft_size as f32;
        for (sample, bin) in out.iter_mut().zip(self.spectrum.iter()) {
            *sample = bin.re * scale;
        }
    }

    fn accumulate_f64(
        &mut self,
        spectra: &[Vec<Complex<f32>>],
        fdl: &[Vec<Complex<f32>>],
        head: usize,
        threads: usize,
    ) {
        let partitions = spectra.len();
        let fft_size = self.fft_size;
        let workers = threads.min(partitions);
        if workers >= 2 && partitions >= MIN_PARTITIONS_FOR_SPLIT {
            while self.partials64.len() < workers {
                self.partials64
                    .push(vec![Complex::new(0.0f64, 0.0); fft_size]);
            }
            let chunk = partitions.div_ceil(workers);
            std::thread::scope(|scope| {
                for (w, partial) in self.partials64[..workers].iter_mut().enumerate() {
                    let start = w * chunk;
                    let end = ((w + 1) * chunk).min(partitions);
                    scope.spawn(move || {
                        partial.fill(Complex::new(0.0, 0.0));
                        for k in start..end {
                            let x = &fdl[(head + k) % partitions];
                            let h = &spectra[k];
                            mac_f64(partial, x, h);
                        }
                    });
                }
            });
            self.acc64.fill(Complex::new(0.0, 0.0));
            for partial in &self.partials64[..workers] {
                for (acc, p) in self.acc64.iter_mut().zip(partial.iter()) {
                    *acc += *p;
                }
            }
        } else {
            self.acc64.fill(Complex::new(0.0, 0.0));
            for k in 0..partitions {
                let x = &fdl[(head + k) % partitions];
                mac_f64(&mut self.acc64, x, &spectra[k]);
            }
        }
    }

    fn accumulate_f32(
        &mut self,
        spectra: &[Vec<Complex<f32>>],
        fdl: &[Vec<Complex<f32>>],
        head: usize,
        threads: usize,
    ) {
        let partitions = spectra.len();
        let fft_size = self.fft_size;
        let workers = threads.min(partitions);
        if workers >= 2 && partitions >= MIN_PARTITIONS_FOR_SPLIT {
            while self.partials32.len() < workers {
                self.partials32
                    .push(vec![Complex::new(0.0f32, 0.0); fft_size]);
            }
            let chunk = partitions.div_ceil(workers);
            std::thread::scope(|scope| {
                for (w, partial) in self.partials32[..workers].iter_mut().enumerate() {
                    let start = w * chunk;
                    let end = ((w + 1) * chunk).min(partitions);
                    scope.spawn(move || {
                        partial.fill(Complex::new(0.0, 0.0));
                        for k in start..end {
                            let x = &fdl[(head + k) % partitions];
                            let h = &spectra[k];
                            mac_f32(partial, x, h);
                        }
                    });
                }
            });
            self.acc32.fill(Complex::new(0.0, 0.0));
            for partial in &self.partials32[..workers] {
                for (acc, p) in self.acc32.iter_mut().zip(partial.iter()) {
                    *acc += *p;
                }
            }
        } else {
            self.acc32.fill(Complex::new(0.0, 0.0));
            for k in 0..partitions {
                let x = &fdl[(head + k) % partitions];
                mac_f32(&mut self.acc32, x, &spectra[k]);
            }
        }
    }
}

#[inline]
fn mac_f32(acc: &mut [Complex<f32>], x: &[Complex<f32>], h: &[Complex<f32>]) {
    for ((a, &xv), &hv) in acc.iter_mut().zip(x.iter()).zip(h.iter()) {
        *a += xv * hv;
    }
}

#[inline]
fn mac_f64(acc: &mut [Complex<f64>], x: &[Complex<f32>], h: &[Complex<f32>]) {
    for ((a, &xv), &hv) in acc.iter_mut().zip(x.iter()).zip(h.iter()) {
        let xr = f64::from(xv.re);
        let xi = f64::from(xv.im);
        let hr = f64::from(hv.re);
        let hi = f64::from(hv.im);
        a.re += xr * hr - xi * hi;
        a.im += xr * hi + xi * hr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::PreparedIr;

    #[test]
    fn test_direct_identity_tap() {
        let taps = [1.0f32];
        let cur = [0.5, -0.25, 1.0, 0.0];
        let mut out = [0.0f32; 4];
        let mut scratch = Vec::new();
        direct_convolve(&taps, &[], &cur, &mut scratch, &mut out);
        assert_eq!(out, cur);
    }

    #[test]
    fn test_direct_delay_tap() {
        // taps = [0, 1] delays by one sample across the block boundary.
        let taps = [0.0f32, 1.0];
        let history = [0.9f32];
        let cur = [0.5, -0.25, 1.0];
        let mut out = [0.0f32; 3];
        let mut scratch = Vec::new();
        direct_convolve(&taps, &history, &cur, &mut scratch, &mut out);
        assert_eq!(out, [0.9, 0.5, -0.25]);
    }

    #[test]
    fn test_direct_dc_gain_is_tap_sum() {
        let taps = [0.25f32; 8];
        let history = [1.0f32; 16];
        let cur = [1.0f32; 4];
        let mut out = [0.0f32; 4];
        let mut scratch = Vec::new();
        direct_convolve(&taps, &history, &cur, &mut scratch, &mut out);
        for s in out {
            assert!((s - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_direct_empty_taps_is_silence() {
        let cur = [1.0f32; 4];
        let mut out = [9.0f32; 4];
        let mut scratch = Vec::new();
        direct_convolve(&[], &[], &cur, &mut scratch, &mut out);
        assert_eq!(out, [0.0; 4]);
    }

    /// Drives both kernels over several blocks with the same history
    /// discipline the broker uses and checks they agree.
    fn run_equivalence(precision: PrecisionMode, tolerance: f32) {
        run_equivalence_with(64, 200, 1, precision, tolerance);
    }

    fn run_equivalence_with(
        block: usize,
        taps_len: usize,
        threads: usize,
        precision: PrecisionMode,
        tolerance: f32,
    ) {
        let taps: Vec<f32> = (0..taps_len)
            .map(|i| ((i as f32 * 0.37).sin() * 0.5) / (1.0 + i as f32 * 0.05))
            .collect();
        let ir = PreparedIr::prepare(&[taps.clone()], block);

        let mut engine = FftEngine::new(block);
        let partitions = ir.partition_count();
        let mut fdl = vec![vec![Complex::new(0.0f32, 0.0); engine.fft_size()]; partitions];
        let mut head = 0usize;

        let mut history: Vec<f32> = Vec::new();
        let mut frame = vec![0.0f32; block * 2];
        let mut fft_out = vec![0.0f32; block * 2];
        let mut scratch = Vec::new();

        for b in 0..8 {
            let cur: Vec<f32> = (0..block)
                .map(|i| ((b * block + i) as f32 * 0.11).sin() * 0.8)
                .collect();

            // FFT path: frame is [last B of history | cur].
            frame[..block].fill(0.0);
            let have = history.len().min(block);
            frame[block - have..block]
                .copy_from_slice(&history[history.len() - have..]);
            frame[block..].copy_from_slice(&cur);
            engine.process_lane(
                ir.channel(0).spectra(),
                &mut fdl,
                &mut head,
                &frame,
                &mut fft_out,
                precision,
                threads,
            );

            let mut direct_out = vec![0.0f32; block];
            direct_convolve(ir.channel(0).taps(), &history, &cur, &mut scratch, &mut direct_out);

            for i in 0..block {
                let fft_sample = fft_out[block + i];
                assert!(
                    (fft_sample - direct_out[i]).abs() < tolerance,
                    "block {b} sample {i}: fft {fft_sample} direct {}",
                    direct_out[i]
                );
            }

            history.extend_from_slice(&cur);
            let cap = taps.len();
            if history.len() > cap {
                history.drain(..history.len() - cap);
            }
        }
    }

    #[test]
    fn test_overlap_save_matches_direct_full() {
        run_equivalence(PrecisionMode::Full, 1e-4);
    }

    #[test]
    fn test_overlap_save_matches_direct_mixed() {
        run_equivalence(PrecisionMode::Mixed, 1e-3);
    }

    #[test]
    fn test_overlap_save_matches_direct_half() {
        // bf16 keeps ~7 mantissa bits; the error budget scales with it.
        run_equivalence(PrecisionMode::Half, 0.05);
    }

    #[test]
    fn test_threaded_split_matches_direct() {
        // 600 taps at block 32 gives 19 partitions, enough to engage
        // the scoped-thread multiply.
        run_equivalence_with(32, 600, 4, PrecisionMode::Mixed, 1e-3);
    }

    #[test]
    fn test_threaded_split_matches_direct_full() {
        run_equivalence_with(32, 600, 4, PrecisionMode::Full, 1e-4);
    }

    #[test]
    fn test_zero_partitions_produce_silence() {
        let mut engine = FftEngine::new(32);
        let frame = vec![1.0f32; 64];
        let mut out = vec![9.0f32; 64];
        let mut head = 0;
        engine.process_lane(&[], &mut [], &mut head, &frame, &mut out, PrecisionMode::Mixed, 1);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
