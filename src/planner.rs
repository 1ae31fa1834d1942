//! Partition planner (spec §4.F): pure computation, no I/O.

/// One axis's range for a single block: the full stored ("origin")
/// region plus the guard-band widths at each end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub origin_start: i64,
    pub origin_end: i64,
    pub pad_start: i64,
    pub pad_end: i64,
}

impl AxisRange {
    pub fn roi_start(&self) -> i64 {
        self.origin_start + self.pad_start
    }

    pub fn roi_end(&self) -> i64 {
        self.origin_end - self.pad_end
    }

    pub fn dim(&self) -> i64 {
        self.origin_end - self.origin_start + 1
    }

    pub fn as_range_array(&self) -> [i64; 4] {
        [self.origin_start, self.origin_end, self.pad_start, self.pad_end]
    }

    pub fn from_range_array(r: [i64; 4]) -> Self {
        Self { origin_start: r[0], origin_end: r[1], pad_start: r[2], pad_end: r[3] }
    }
}

/// The three-axis range for a single block.
pub type BlockRanges = [AxisRange; 3];

fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

/// Number of blocks needed per axis to cover `image_size` with blocks no
/// larger than `max_block_size`.
pub fn num_blocks(image_size: &[i64; 3], max_block_size: &[i64; 3]) -> [i64; 3] {
    let mut out = [0i64; 3];
    for d in 0..3 {
        out[d] = ceil_div(image_size[d], max_block_size[d]);
    }
    out
}

/// A recommended per-axis block size so `number_of_blocks` divide
/// `image_size` as evenly as possible.
pub fn suggested_block_size(image_size: &[i64; 3], number_of_blocks: &[i64; 3]) -> [i64; 3] {
    let mut out = [0i64; 3];
    for d in 0..3 {
        out[d] = ceil_div(image_size[d], number_of_blocks[d]);
    }
    out
}

/// The min/max coordinate range (with guard-band widths) for block
/// index `n` on one axis, given its nominal `block_size`, the `overlap`
/// width, and the axis's total `axis_len`.
///
/// There is no overlap at the outer border of the image; the final
/// block's length is reduced (its `pad_end` dropped to 0) rather than
/// padded past the image boundary.
pub fn block_range(n: i64, block_size: i64, overlap: i64, axis_len: i64) -> AxisRange {
    let (min_coord, pad_start) = if n == 0 { (0, 0) } else { (n * block_size - overlap, overlap) };

    let mut max_coord = (n + 1) * block_size - 1 + overlap;
    let mut pad_end = overlap;
    if max_coord >= axis_len {
        max_coord = axis_len - 1;
        pad_end = 0;
    }

    AxisRange { origin_start: min_coord, origin_end: max_coord, pad_start, pad_end }
}

/// Compute every block's per-axis ranges for the whole volume. Blocks
/// are produced with axis 0 outermost and axis 2 innermost — part of
/// the descriptor contract (spec §4.F): a combiner auto-discovering a
/// series without a descriptor must reconstruct the same order.
pub fn image_block_ranges(image_size: &[i64; 3], max_block_size: &[i64; 3], overlap_size: &[i64; 3]) -> Vec<BlockRanges> {
    let n_blocks = num_blocks(image_size, max_block_size);
    let block_size = suggested_block_size(image_size, &n_blocks);

    let mut ranges = Vec::new();
    for i in 0..n_blocks[0] {
        for j in 0..n_blocks[1] {
            for k in 0..n_blocks[2] {
                let idx = [i, j, k];
                let mut block: BlockRanges = [
                    AxisRange { origin_start: 0, origin_end: 0, pad_start: 0, pad_end: 0 },
                    AxisRange { origin_start: 0, origin_end: 0, pad_start: 0, pad_end: 0 },
                    AxisRange { origin_start: 0, origin_end: 0, pad_start: 0, pad_end: 0 },
                ];
                for d in 0..3 {
                    block[d] = block_range(idx[d], block_size[d], overlap_size[d], image_size[d]);
                }
                ranges.push(block);
            }
        }
    }
    ranges
}
