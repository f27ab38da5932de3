use ndarray::{s, Array2, ArrayViewMut2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::error::AlignError;
use crate::types::{AlignedBlock, ReferenceWeights};

/// Default cap on pooled sample rows for the weight fit.
pub const DEFAULT_FIT_ROWS: usize = 1_000_000;

/// Removes each channel's mean over the block (DC offset).
///
/// The mean is rounded to the nearest integer before subtraction, so the
/// shift is uniform across the column and the waveform shape survives
/// exactly; at most half an LSB of offset remains. Run before referencing
/// so that channel-to-channel offset differences do not leak into the
/// reference estimate.
///
/// Samples that leave the `i16` range after the shift saturate; a clipped
/// channel stays clipped rather than wrapping around.
pub fn remove_dc_offset(block: &mut AlignedBlock) {
    let rows = block.data.nrows();
    if rows == 0 {
        return;
    }
    for mut col in block.data.columns_mut() {
        let mean = col.iter().map(|&v| v as f64).sum::<f64>() / rows as f64;
        let shift = mean.round() as i32;
        for v in col.iter_mut() {
            *v = (*v as i32 - shift).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }
    }
}

/// Common-average reference: subtracts the leave-one-out mean of the other
/// channels from every sample of every channel.
///
/// The per-row mean is derived from a single row total,
/// `(total - self) / (C - 1)`, rather than summing the other channels per
/// channel. Applying this twice does not return the original data and is
/// not a no-op; the transform is deliberately not idempotent.
///
/// # Errors
///
/// [`AlignError::DegenerateReference`] if the block has fewer than two
/// channels.
pub fn remove_common_average(block: &mut AlignedBlock) -> Result<(), AlignError> {
    let ncols = block.data.ncols();
    if ncols < 2 {
        return Err(AlignError::DegenerateReference { channels: ncols });
    }
    let denom = (ncols - 1) as f64;
    for mut row in block.data.rows_mut() {
        let total: f64 = row.iter().map(|&v| v as f64).sum();
        for v in row.iter_mut() {
            let own = *v as f64;
            *v = (own - (total - own) / denom) as i16;
        }
    }
    Ok(())
}

/// Fits weighted-average reference coefficients from a bounded subsample
/// pooled across blocks.
///
/// At most `max_rows` rows are drawn (without replacement per block),
/// allocated across blocks in proportion to their row counts and capped at
/// each block's length. For each channel a least-squares regressor with
/// intercept predicts that channel's samples from the other channels in the
/// same rows; only the coefficients are kept, so application stays a plain
/// dot product. The fit happens once per batch and the weights are reused
/// for every block.
///
/// `seed` makes the subsample reproducible; `None` seeds from the OS.
///
/// # Errors
///
/// * [`AlignError::DegenerateReference`] on fewer than two channels.
/// * [`AlignError::RateMismatch`] if the blocks do not share one sampling
///   rate (pooling rows across rates is meaningless).
/// * [`AlignError::UnderdeterminedFit`] if fewer pooled rows than channels
///   are available, or the pooled rows are collinear.
pub fn fit_weights(
    blocks: &[AlignedBlock],
    max_rows: usize,
    seed: Option<u64>,
) -> Result<ReferenceWeights, AlignError> {
    let first = blocks.first().ok_or(AlignError::UnderdeterminedFit {
        rows: 0,
        channels: 0,
    })?;
    let nchans = first.data.ncols();
    if nchans < 2 {
        return Err(AlignError::DegenerateReference { channels: nchans });
    }
    for block in blocks {
        if block.sampling_rate != first.sampling_rate {
            return Err(AlignError::RateMismatch {
                expected: first.sampling_rate,
                found: block.sampling_rate,
                context: format!("block {}", block.source),
            });
        }
        if block.data.ncols() != nchans {
            return Err(AlignError::Input {
                channel: block.source.clone(),
                reason: format!(
                    "block has {} channels, expected {}",
                    block.data.ncols(),
                    nchans
                ),
            });
        }
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let pooled = pool_rows(blocks, max_rows, &mut rng);
    let total = pooled.nrows();
    if total < nchans {
        return Err(AlignError::UnderdeterminedFit {
            rows: total,
            channels: nchans,
        });
    }
    debug!(rows = total, channels = nchans, "pooled subsample for weight fit");

    // Center the pooled data so the regression carries an intercept without
    // an explicit bias column; the intercept itself is discarded.
    let means: Vec<f64> = (0..nchans)
        .map(|c| pooled.column(c).sum() / total as f64)
        .collect();

    let mut coef = Array2::<f64>::zeros((nchans, nchans - 1));
    for ch in 0..nchans {
        let others: Vec<usize> = (0..nchans).filter(|&c| c != ch).collect();

        // Normal equations on centered data: (X^T X) w = X^T y.
        let k = others.len();
        let mut xtx = vec![vec![0.0f64; k]; k];
        let mut xty = vec![0.0f64; k];
        for row in pooled.rows() {
            let y = row[ch] - means[ch];
            for (i, &a) in others.iter().enumerate() {
                let xa = row[a] - means[a];
                xty[i] += xa * y;
                for (j, &b) in others.iter().enumerate().skip(i) {
                    xtx[i][j] += xa * (row[b] - means[b]);
                }
            }
        }
        for i in 0..k {
            for j in 0..i {
                xtx[i][j] = xtx[j][i];
            }
        }

        let w = solve_symmetric(xtx, xty).ok_or(AlignError::UnderdeterminedFit {
            rows: total,
            channels: nchans,
        })?;
        for (i, wi) in w.into_iter().enumerate() {
            coef[[ch, i]] = wi;
        }
    }
    info!(channels = nchans, rows = total, "fit reference weights");

    Ok(ReferenceWeights {
        channels: nchans,
        coef,
    })
}

/// Draws up to `max_rows` rows across all blocks, proportionally to block
/// sizes and without replacement within a block, into one pooled matrix.
fn pool_rows(blocks: &[AlignedBlock], max_rows: usize, rng: &mut StdRng) -> Array2<f64> {
    let nchans = blocks[0].data.ncols();
    let lengths: Vec<usize> = blocks.iter().map(|b| b.data.nrows()).collect();
    let total: usize = lengths.iter().sum();

    let counts: Vec<usize> = if total <= max_rows {
        lengths.clone()
    } else {
        // Rounded shares can each round up; clamp against the remaining
        // budget so the cap holds exactly.
        let mut remaining = max_rows;
        lengths
            .iter()
            .map(|&len| {
                let share = (max_rows as f64 * len as f64 / total as f64).round() as usize;
                let take = share.min(len).min(remaining);
                remaining -= take;
                take
            })
            .collect()
    };

    let pooled_len: usize = counts.iter().sum();
    let mut pooled = Array2::<f64>::zeros((pooled_len, nchans));
    let mut out = 0usize;
    for (block, (&len, &count)) in blocks.iter().zip(lengths.iter().zip(&counts)) {
        if count == len {
            for row in block.data.rows() {
                for (c, &v) in row.iter().enumerate() {
                    pooled[[out, c]] = v as f64;
                }
                out += 1;
            }
        } else {
            for idx in rand::seq::index::sample(rng, len, count) {
                for c in 0..nchans {
                    pooled[[out, c]] = block.data[[idx, c]] as f64;
                }
                out += 1;
            }
        }
    }
    pooled
}

/// Solves a symmetric positive-definite system by Gaussian elimination with
/// partial pivoting. Returns `None` on a (near-)singular matrix.
fn solve_symmetric(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in row + 1..n {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    Some(x)
}

/// Weighted-average reference: subtracts each channel's learned linear
/// combination of the other channels from every sample.
///
/// Equivalent to [`apply_weights_in_place`] with a single whole-block chunk.
///
/// # Errors
///
/// [`AlignError::Input`] if the weights were fit for a different channel
/// count than the block carries.
pub fn apply_weights(
    block: &mut AlignedBlock,
    weights: &ReferenceWeights,
) -> Result<(), AlignError> {
    let rows = block.data.nrows().max(1);
    apply_weights_in_place(block, weights, rows)
}

/// Chunked in-place weighted-average reference.
///
/// Processes the block in row chunks of at most `chunk_size`, keeping peak
/// scratch memory at `O(chunk_size × channels)` instead of
/// `O(rows × channels)`. Each chunk reads and writes a disjoint row range,
/// and the output is bit-identical to [`apply_weights`] for any chunk size;
/// chunking changes the memory profile only, never the result.
///
/// # Errors
///
/// [`AlignError::Input`] on a channel-count mismatch with `weights` or a
/// zero `chunk_size`.
pub fn apply_weights_in_place(
    block: &mut AlignedBlock,
    weights: &ReferenceWeights,
    chunk_size: usize,
) -> Result<(), AlignError> {
    let nchans = block.data.ncols();
    if weights.channels != nchans {
        return Err(AlignError::Input {
            channel: block.source.clone(),
            reason: format!(
                "weights fit for {} channels, block has {}",
                weights.channels, nchans
            ),
        });
    }
    if chunk_size == 0 {
        return Err(AlignError::Input {
            channel: block.source.clone(),
            reason: "chunk size must be non-zero".to_string(),
        });
    }

    let rows = block.data.nrows();
    // Scratch buffer reused across chunks; each chunk must see the original
    // values of all channels, so corrections are staged before overwrite.
    let mut scratch = Array2::<f64>::zeros((chunk_size.min(rows.max(1)), nchans));
    let mut start = 0usize;
    while start < rows {
        let end = (start + chunk_size).min(rows);
        let chunk = block.data.slice_mut(s![start..end, ..]);
        apply_weights_chunk(chunk, weights, &mut scratch);
        start = end;
    }
    Ok(())
}

/// Applies the weighted reference to one self-contained row chunk.
///
/// Shared kernel of [`apply_weights`] and [`apply_weights_in_place`]; the
/// chunked/unchunked equivalence guarantee rests on both calling this.
fn apply_weights_chunk(
    mut chunk: ArrayViewMut2<'_, i16>,
    weights: &ReferenceWeights,
    scratch: &mut Array2<f64>,
) {
    let rows = chunk.nrows();
    let nchans = chunk.ncols();
    let mut corrected = scratch.slice_mut(s![..rows, ..]);

    for ch in 0..nchans {
        let w = weights.coef.row(ch);
        for (row_idx, row) in chunk.rows().into_iter().enumerate() {
            let mut dot = 0.0f64;
            let mut wi = 0usize;
            for (c, &v) in row.iter().enumerate() {
                if c != ch {
                    dot += v as f64 * w[wi];
                    wi += 1;
                }
            }
            corrected[[row_idx, ch]] = row[ch] as f64 - dot;
        }
    }
    for (out, &val) in chunk.iter_mut().zip(corrected.iter()) {
        *out = val as i16;
    }
}

/// Convenience dispatch mirroring the original export tool's flags: fit
/// once, then apply the weighted reference to every block in order.
pub fn apply_weights_all(
    blocks: &mut [AlignedBlock],
    weights: &ReferenceWeights,
    chunk_size: Option<usize>,
) -> Result<(), AlignError> {
    for block in blocks.iter_mut() {
        match chunk_size {
            Some(chunk) => apply_weights_in_place(block, weights, chunk)?,
            None => apply_weights(block, weights)?,
        }
    }
    Ok(())
}
