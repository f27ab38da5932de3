use ndarray::Array2;

/// One channel's raw recording as exported by the acquisition device.
///
/// Samples arrive as parallel `(timestamp, value)` arrays because each
/// channel carries its own clock: starts, stops, and internal gaps may all
/// differ between channels of the same recording. Traces are read-only
/// input to this crate and are never mutated.
#[derive(Debug, Clone)]
pub struct ChannelTrace {
    /// Channel label as exported (e.g. "Port_3")
    pub label: String,
    /// Declared sampling rate of the channel (Hz)
    pub sampling_rate: f64,
    /// Sample timestamps in seconds, strictly increasing
    pub times: Vec<f64>,
    /// Sample values, one per timestamp
    pub values: Vec<i16>,
}

impl ChannelTrace {
    /// Number of raw samples in the trace.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether the trace holds no samples.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// A gap-free contiguous span of one channel's raw samples.
///
/// Segments borrow from the owning trace; segmentation copies nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment<'a> {
    /// Timestamps of the samples in this span (seconds)
    pub times: &'a [f64],
    /// Sample values in this span
    pub values: &'a [i16],
}

impl<'a> Segment<'a> {
    /// Timestamp of the first sample.
    pub fn start(&self) -> f64 {
        self.times[0]
    }

    /// Timestamp of the last sample.
    pub fn stop(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    /// Number of samples in the span.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether the span holds no samples.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// A uniformly-sampled, multi-channel sample matrix covering one recording's
/// common time window.
///
/// Rows are time samples on the uniform grid, columns are channels in the
/// caller's fixed channel order. That order is an invariant: referencing
/// rewrites values but never reorders columns.
#[derive(Debug, Clone)]
pub struct AlignedBlock {
    /// Sample matrix, shape `[num_samples, num_channels]`
    pub data: Array2<i16>,
    /// Absolute time of row 0 (seconds)
    pub start_time: f64,
    /// Sampling rate of the uniform grid (Hz)
    pub sampling_rate: f64,
    /// Identifier of the originating file or segment
    pub source: String,
    /// Channel labels in column order
    pub channels: Vec<String>,
}

impl AlignedBlock {
    /// Number of time samples (rows) in the block.
    pub fn num_samples(&self) -> usize {
        self.data.nrows()
    }

    /// Number of channels (columns) in the block.
    pub fn num_channels(&self) -> usize {
        self.data.ncols()
    }

    /// Duration of the block in seconds.
    pub fn duration(&self) -> f64 {
        self.data.nrows() as f64 / self.sampling_rate
    }

    /// The block's absolute time window, for event remapping.
    pub fn window(&self, segment: usize) -> crate::events::RecordingWindow {
        crate::events::RecordingWindow {
            segment,
            start_time: self.start_time,
            sampling_rate: self.sampling_rate,
            samples: self.data.nrows() as u64,
        }
    }
}

/// Learned per-channel weights for the weighted-average reference.
///
/// Row `c` holds the regression coefficients predicting channel `c` from the
/// other channels, in ascending column order with column `c` removed. Fit
/// once from a bounded subsample pooled across all blocks, then reused for
/// every block.
#[derive(Debug, Clone)]
pub struct ReferenceWeights {
    /// Number of channels the weights were fit for
    pub channels: usize,
    /// Coefficient table, shape `[channels, channels - 1]`
    pub coef: Array2<f64>,
}
