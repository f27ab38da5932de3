use crate::error::AlignError;
use crate::types::AlignedBlock;

/// Cumulative per-segment sample-count partition of a conceptually
/// concatenated multi-segment stream.
///
/// External spike-detection tools see all segments as one flat sample
/// stream; this table maps their absolute sample indices back to
/// `(segment, local offset)` pairs and vice versa. Built once from final
/// segment sizes and immutable thereafter; rebuild it if sizes change.
#[derive(Debug, Clone)]
pub struct OffsetTable {
    starts: Vec<u64>,
    sizes: Vec<u64>,
    total: u64,
}

impl OffsetTable {
    /// Builds the table from ordered per-segment sample counts.
    ///
    /// `starts[0] = 0`, `starts[i] = starts[i-1] + sizes[i-1]`; the table
    /// exactly partitions `[0, total_samples)`.
    pub fn new(sizes: &[u64]) -> OffsetTable {
        let mut starts = Vec::with_capacity(sizes.len());
        let mut acc = 0u64;
        for &size in sizes {
            starts.push(acc);
            acc += size;
        }
        OffsetTable {
            starts,
            sizes: sizes.to_vec(),
            total: acc,
        }
    }

    /// Builds the table from the row counts of aligned blocks, in order.
    pub fn from_blocks(blocks: &[AlignedBlock]) -> OffsetTable {
        let sizes: Vec<u64> = blocks.iter().map(|b| b.data.nrows() as u64).collect();
        OffsetTable::new(&sizes)
    }

    /// Number of segments in the table.
    pub fn num_segments(&self) -> usize {
        self.sizes.len()
    }

    /// Total sample count over all segments.
    pub fn total_samples(&self) -> u64 {
        self.total
    }

    /// Sample count of one segment, if it exists.
    pub fn segment_size(&self, segment: usize) -> Option<u64> {
        self.sizes.get(segment).copied()
    }

    /// Converts a segment-relative offset to an absolute offset in the
    /// concatenated stream.
    ///
    /// # Errors
    ///
    /// [`AlignError::OutOfRange`] if the segment id is unknown or the local
    /// offset does not fall inside the segment.
    pub fn to_global(&self, segment: usize, local: u64) -> Result<u64, AlignError> {
        match self.sizes.get(segment) {
            Some(&size) if local < size => Ok(self.starts[segment] + local),
            _ => Err(AlignError::OutOfRange {
                offset: local,
                total: self.total,
            }),
        }
    }

    /// Converts an absolute offset in the concatenated stream to a
    /// `(segment, local offset)` pair.
    ///
    /// Containment is strict half-open: segment `i` owns
    /// `[starts[i], starts[i] + sizes[i])`. An offset equal to the total
    /// length is past the last segment and out of range.
    ///
    /// # Errors
    ///
    /// [`AlignError::OutOfRange`] if `global >= total_samples()`.
    pub fn to_local(&self, global: u64) -> Result<(usize, u64), AlignError> {
        if global >= self.total {
            return Err(AlignError::OutOfRange {
                offset: global,
                total: self.total,
            });
        }
        // Last segment whose start is <= global. An empty segment shares
        // its start with its successor and sorts before it, so it can never
        // be selected here.
        let segment = self.starts.partition_point(|&s| s <= global) - 1;
        Ok((segment, global - self.starts[segment]))
    }

    /// Remaps a batch of absolute sample indices (e.g. spike times from a
    /// sorter run on the concatenated stream) onto segments.
    ///
    /// # Errors
    ///
    /// [`AlignError::OutOfRange`] on the first index beyond the total
    /// length.
    pub fn remap(&self, indices: &[u64]) -> Result<Vec<(usize, u64)>, AlignError> {
        indices.iter().map(|&i| self.to_local(i)).collect()
    }
}
