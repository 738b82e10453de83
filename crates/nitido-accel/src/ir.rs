//! Impulse response preparation for partitioned convolution.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// One channel of a prepared impulse response.
#[derive(Debug, Clone)]
pub struct IrChannel {
    /// Time-domain taps, kept for the software-direct path.
    taps: Vec<f32>,
    /// Forward transform of each block-length partition, zero-padded to
    /// the frame size. One spectrum per partition.
    spectra: Vec<Vec<Complex<f32>>>,
}

impl IrChannel {
    /// Time-domain taps.
    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    /// Partition spectra, in tap order (partition 0 covers the first
    /// block of taps).
    pub fn spectra(&self) -> &[Vec<Complex<f32>>] {
        &self.spectra
    }
}

/// An impulse response partitioned and transformed for a fixed block
/// size.
///
/// Preparation happens once, off the audio thread, whenever a new
/// response is generated. The result is immutable and shared behind an
/// `Arc`, so installing a replacement on the audio thread is a pointer
/// swap. Both convolution paths read from the same object: the
/// accelerated engine uses the per-partition spectra, the software
/// fallback uses the raw taps.
#[derive(Debug, Clone)]
pub struct PreparedIr {
    channels: Vec<IrChannel>,
    block_size: usize,
    fft_size: usize,
    taps_len: usize,
}

impl PreparedIr {
    /// Partition each channel into block-length segments and transform
    /// them with frames of `2 * block_size`.
    ///
    /// Channels may have unequal lengths; each keeps its own partition
    /// count. An empty channel produces zero partitions and convolves
    /// to silence.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero.
    pub fn prepare(channels: &[Vec<f32>], block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be non-zero");
        let fft_size = block_size * 2;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let mut prepared = Vec::with_capacity(channels.len());
        let mut taps_len = 0;
        for taps in channels {
            taps_len = taps_len.max(taps.len());
            let mut spectra = Vec::with_capacity(taps.len().div_ceil(block_size));
            for partition in taps.chunks(block_size) {
                let mut buffer = vec![Complex::new(0.0f32, 0.0); fft_size];
                for (bin, &tap) in buffer.iter_mut().zip(partition.iter()) {
                    bin.re = tap;
                }
                fft.process(&mut buffer);
                spectra.push(buffer);
            }
            prepared.push(IrChannel {
                taps: taps.clone(),
                spectra,
            });
        }

        PreparedIr {
            channels: prepared,
            block_size,
            fft_size,
            taps_len,
        }
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// One prepared channel.
    pub fn channel(&self, index: usize) -> &IrChannel {
        &self.channels[index]
    }

    /// Block size the partitions were cut for.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Transform frame size, always `2 * block_size`.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Length in samples of the longest channel.
    pub fn taps_len(&self) -> usize {
        self.taps_len
    }

    /// Largest per-channel partition count.
    pub fn partition_count(&self) -> usize {
        self.channels
            .iter()
            .map(|ch| ch.spectra.len())
            .max()
            .unwrap_or(0)
    }

    /// Whether every tap in every channel is finite.
    pub fn is_finite(&self) -> bool {
        self.channels
            .iter()
            .all(|ch| ch.taps.iter().all(|t| t.is_finite()))
    }
}
