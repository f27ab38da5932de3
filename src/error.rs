use thiserror::Error;

/// Error type for every fallible operation in this crate.
///
/// All failures are local, synchronous failures of a single pipeline stage.
/// Nothing is retried internally; each variant carries enough context
/// (channel label, segment index, or offending offset) to diagnose the
/// failure without re-running the whole batch.
#[derive(Debug, Error)]
pub enum AlignError {
    /// Raw per-channel input was malformed (empty, mismatched array lengths,
    /// or timestamps not strictly increasing).
    #[error("invalid input for channel {channel}: {reason}")]
    Input { channel: String, reason: String },

    /// Channels of the same recording produced different segment counts, so
    /// positional segment correspondence cannot hold.
    #[error(
        "channel {channel} produced {found} segments, expected {expected}; \
         channels of one recording must segment identically"
    )]
    SegmentMismatch {
        channel: String,
        expected: usize,
        found: usize,
    },

    /// The channels' common time window is empty.
    #[error("empty alignment window: start {start} >= stop {stop}")]
    EmptyWindow { start: f64, stop: f64 },

    /// A channel has too few samples in the segment for spline realignment.
    #[error("channel {channel} has {have} samples in segment, spline realignment needs {need}")]
    InsufficientSamples {
        channel: String,
        have: usize,
        need: usize,
    },

    /// Referencing requires at least two channels.
    #[error("cannot reference a block with {channels} channel(s); need at least 2")]
    DegenerateReference { channels: usize },

    /// The weight fit saw fewer pooled sample rows than channels, or the
    /// pooled rows were collinear.
    #[error("weight fit is underdetermined: {rows} pooled rows for {channels} channels")]
    UnderdeterminedFit { rows: usize, channels: usize },

    /// Blocks (or channels) with different sampling rates were mixed.
    #[error("sampling rate mismatch: expected {expected} Hz, found {found} Hz ({context})")]
    RateMismatch {
        expected: f64,
        found: f64,
        context: String,
    },

    /// An offset lookup fell outside the known concatenated sample range.
    #[error("offset {offset} is outside the known range of {total} samples")]
    OutOfRange { offset: u64, total: u64 },
}
