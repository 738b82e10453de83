//! Aligned staging buffers for the accelerated engine.
//!
//! Hardware DSP queues reject buffers that do not start on a cache-line
//! or vector-register boundary, so every block that crosses into the
//! accelerated path is staged through pre-allocated slots whose first
//! element sits at a configured byte alignment. Alignment is achieved
//! by over-allocating each slot and exposing a sub-slice that starts at
//! the first aligned element; no raw pointer casts are involved.

/// One over-allocated buffer exposing an aligned window.
#[derive(Debug)]
struct Slot {
    data: Vec<f32>,
    offset: usize,
    len: usize,
}

impl Slot {
    fn new(len: usize, alignment: usize) -> Self {
        // A Vec<f32> is always 4-byte aligned, and `alignment` is a
        // power of two >= 4, so the misalignment is a whole number of
        // f32 elements.
        let pad = alignment / core::mem::size_of::<f32>();
        let data = vec![0.0f32; len + pad];
        let addr = data.as_ptr() as usize;
        let misalign = addr % alignment;
        let offset = if misalign == 0 {
            0
        } else {
            (alignment - misalign) / core::mem::size_of::<f32>()
        };
        Slot { data, offset, len }
    }

    fn slice(&self) -> &[f32] {
        &self.data[self.offset..self.offset + self.len]
    }

    fn slice_mut(&mut self) -> &mut [f32] {
        &mut self.data[self.offset..self.offset + self.len]
    }

    fn is_aligned_to(&self, alignment: usize) -> bool {
        (self.slice().as_ptr() as usize) % alignment == 0
    }
}

/// Pre-allocated, alignment-guaranteed staging area for one broker.
///
/// Slot sizes are fixed by the engine's frame geometry for a block
/// length `B`:
///
/// * `input`, 2B samples: the overlap-save frame, previous block in the
///   front half and the current block in the back half.
/// * `output`, 2B samples: the finished wet block for both channels,
///   left at `[0, B)` and right at `[B, 2B)`.
/// * `work`, 4B samples: per-channel scratch, the FFT-bound real frame
///   in the front half and the inverse-transform result in the back.
#[derive(Debug)]
pub struct AlignedPool {
    input: Slot,
    output: Slot,
    work: Slot,
    block_size: usize,
    alignment: usize,
}

impl AlignedPool {
    /// Allocate a pool for the given block size.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero or `alignment` is not a power of
    /// two of at least 4 bytes. Configuration validation rejects such
    /// values before a broker is ever built.
    pub fn new(block_size: usize, alignment: usize) -> Self {
        assert!(block_size > 0, "block size must be non-zero");
        assert!(
            alignment.is_power_of_two() && alignment >= 4,
            "alignment must be a power of two >= 4, got {alignment}"
        );
        AlignedPool {
            input: Slot::new(block_size * 2, alignment),
            output: Slot::new(block_size * 2, alignment),
            work: Slot::new(block_size * 4, alignment),
            block_size,
            alignment,
        }
    }

    /// Block size the pool was sized for.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Byte alignment every slot start is guaranteed to satisfy.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Frame staging slot, 2x block size.
    pub fn input_mut(&mut self) -> &mut [f32] {
        self.input.slice_mut()
    }

    /// Finished stereo output slot, 2x block size.
    pub fn output_mut(&mut self) -> &mut [f32] {
        self.output.slice_mut()
    }

    /// Finished stereo output slot, read-only view.
    pub fn output(&self) -> &[f32] {
        self.output.slice()
    }

    /// Scratch slot, 4x block size.
    pub fn work_mut(&mut self) -> &mut [f32] {
        self.work.slice_mut()
    }

    /// All three slots borrowed mutably at once.
    pub fn slots_mut(&mut self) -> (&mut [f32], &mut [f32], &mut [f32]) {
        let AlignedPool {
            input,
            output,
            work,
            ..
        } = self;
        (input.slice_mut(), output.slice_mut(), work.slice_mut())
    }

    /// Zero every slot.
    pub fn clear(&mut self) {
        self.input.slice_mut().fill(0.0);
        self.output.slice_mut().fill(0.0);
        self.work.slice_mut().fill(0.0);
    }

    /// Verify the alignment invariant, used by tests and assertions.
    pub fn is_aligned(&self) -> bool {
        self.input.is_aligned_to(self.alignment)
            && self.output.is_aligned_to(self.alignment)
            && self.work.is_aligned_to(self.alignment)
    }
}
