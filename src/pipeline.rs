use tracing::info;

use crate::align::{align, Method};
use crate::error::AlignError;
use crate::offsets::OffsetTable;
use crate::reference::{
    apply_weights, apply_weights_in_place, fit_weights, remove_common_average, remove_dc_offset,
    DEFAULT_FIT_ROWS,
};
use crate::segment::segment_channels;
use crate::types::{AlignedBlock, ChannelTrace, ReferenceWeights};

/// Reference signal removal applied to every aligned block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceMode {
    /// Leave the aligned data unreferenced.
    #[default]
    None,
    /// Subtract the unweighted leave-one-out mean of the other channels.
    CommonAverage,
    /// Fit per-channel weights once across all blocks, then subtract each
    /// channel's learned combination of the other channels.
    Weighted,
}

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Uniform grid rate; defaults to the channels' declared rate.
    pub target_rate: Option<f64>,
    /// Realignment strategy.
    pub method: Method,
    /// Reference removal mode.
    pub reference: ReferenceMode,
    /// Cap on pooled rows for the weighted-reference fit.
    pub max_fit_rows: usize,
    /// Row-chunk size for weighted-reference application; `None` applies
    /// whole blocks at once. Bounds peak scratch memory on long recordings.
    pub chunk_size: Option<usize>,
    /// Seed for the fit subsample; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> PipelineConfig {
        PipelineConfig {
            target_rate: None,
            method: Method::Spline,
            reference: ReferenceMode::None,
            max_fit_rows: DEFAULT_FIT_ROWS,
            chunk_size: None,
            seed: None,
        }
    }
}

/// Everything one batch run produces.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Aligned (and, if requested, referenced) blocks in recording order
    pub blocks: Vec<AlignedBlock>,
    /// Sample-offset partition over the blocks, for spike/event remapping
    pub offsets: OffsetTable,
    /// Weights used for referencing, when the weighted mode ran
    pub weights: Option<ReferenceWeights>,
}

/// Runs the whole batch: validate, segment, align, center, reference, and
/// index.
///
/// Channel column order in every output block is the input trace order.
/// Each block's `source` is its segment ordinal. Any stage failure aborts
/// the batch with that stage's error; no partial output is returned.
///
/// # Errors
///
/// Every error of the underlying stages, plus [`AlignError::RateMismatch`]
/// if the traces do not declare one common sampling rate.
pub fn process(
    traces: &[ChannelTrace],
    config: &PipelineConfig,
) -> Result<ProcessOutput, AlignError> {
    let first = traces.first().ok_or_else(|| AlignError::Input {
        channel: "<none>".to_string(),
        reason: "no channels to process".to_string(),
    })?;
    for trace in traces {
        if trace.sampling_rate != first.sampling_rate {
            return Err(AlignError::RateMismatch {
                expected: first.sampling_rate,
                found: trace.sampling_rate,
                context: format!("channel {}", trace.label),
            });
        }
    }
    let target_rate = config.target_rate.unwrap_or(first.sampling_rate);
    let channels: Vec<String> = traces.iter().map(|t| t.label.clone()).collect();
    info!(
        channels = channels.len(),
        target_rate,
        method = ?config.method,
        reference = ?config.reference,
        "processing batch"
    );

    let by_segment = segment_channels(traces)?;
    let mut blocks = Vec::with_capacity(by_segment.len());
    for (index, segs) in by_segment.iter().enumerate() {
        let mut block = align(segs, &channels, target_rate, config.method, &index.to_string())?;
        remove_dc_offset(&mut block);
        blocks.push(block);
    }

    let weights = match config.reference {
        ReferenceMode::None => None,
        ReferenceMode::CommonAverage => {
            for block in &mut blocks {
                remove_common_average(block)?;
            }
            None
        }
        ReferenceMode::Weighted => {
            // Global serialization point: the fit consumes every block
            // before any block is rewritten.
            let weights = fit_weights(&blocks, config.max_fit_rows, config.seed)?;
            for block in &mut blocks {
                match config.chunk_size {
                    Some(chunk) => apply_weights_in_place(block, &weights, chunk)?,
                    None => apply_weights(block, &weights)?,
                }
            }
            Some(weights)
        }
    };

    let offsets = OffsetTable::from_blocks(&blocks);
    info!(
        blocks = blocks.len(),
        total_samples = offsets.total_samples(),
        "batch complete"
    );

    Ok(ProcessOutput {
        blocks,
        offsets,
        weights,
    })
}
