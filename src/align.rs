use ndarray::Array2;
use tracing::debug;

use crate::error::AlignError;
use crate::spline::CubicSpline;
use crate::types::{AlignedBlock, Segment};

/// Strategy for putting all channels of one segment onto a common grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// Fit an interpolating cubic spline per channel and evaluate it on the
    /// uniform grid. Corrects small per-channel clock drift and differing
    /// native sample times; needs at least
    /// [`CubicSpline::MIN_POINTS`] samples per channel.
    #[default]
    Spline,
    /// Take the first `min(len)` raw values of every channel verbatim.
    /// Assumes all channels already share one sample clock; timestamps are
    /// not consulted.
    Truncate,
}

/// Realigns one segment of every channel onto a uniform sample grid.
///
/// `segments[i]` is the segment of channel `channels[i]`; the output block's
/// columns follow that order. The common window is
/// `[max(starts), min(stops))`; the grid is `t_k = start + k / target_rate`
/// for every `t_k < stop`. Pure function of its inputs.
///
/// # Errors
///
/// * [`AlignError::Input`] if `segments` and `channels` differ in length or
///   are empty, or a segment is empty.
/// * [`AlignError::EmptyWindow`] if the channels share no time span.
/// * [`AlignError::InsufficientSamples`] if a channel has too few samples
///   for the spline method.
pub fn align(
    segments: &[Segment<'_>],
    channels: &[String],
    target_rate: f64,
    method: Method,
    source: &str,
) -> Result<AlignedBlock, AlignError> {
    if segments.is_empty() || segments.len() != channels.len() {
        return Err(AlignError::Input {
            channel: "<none>".to_string(),
            reason: format!(
                "{} segments for {} channels",
                segments.len(),
                channels.len()
            ),
        });
    }
    if !(target_rate > 0.0) {
        return Err(AlignError::Input {
            channel: "<none>".to_string(),
            reason: format!("target rate must be positive, got {target_rate}"),
        });
    }
    for (seg, label) in segments.iter().zip(channels) {
        if seg.is_empty() {
            return Err(AlignError::Input {
                channel: label.clone(),
                reason: "empty segment".to_string(),
            });
        }
    }

    let start = segments
        .iter()
        .map(Segment::start)
        .fold(f64::NEG_INFINITY, f64::max);
    let stop = segments
        .iter()
        .map(Segment::stop)
        .fold(f64::INFINITY, f64::min);
    if start >= stop {
        return Err(AlignError::EmptyWindow { start, stop });
    }

    let data = match method {
        Method::Spline => spline_realign(segments, channels, target_rate, start, stop)?,
        Method::Truncate => truncate_realign(segments),
    };
    debug!(
        source,
        rows = data.nrows(),
        channels = data.ncols(),
        start,
        ?method,
        "aligned segment"
    );

    Ok(AlignedBlock {
        data,
        start_time: start,
        sampling_rate: target_rate,
        source: source.to_string(),
        channels: channels.to_vec(),
    })
}

/// Evaluates a per-channel interpolating spline on the uniform grid.
fn spline_realign(
    segments: &[Segment<'_>],
    channels: &[String],
    target_rate: f64,
    start: f64,
    stop: f64,
) -> Result<Array2<i16>, AlignError> {
    let step = 1.0 / target_rate;
    let mut grid = Vec::new();
    let mut k = 0usize;
    loop {
        let t = start + k as f64 * step;
        if t >= stop {
            break;
        }
        grid.push(t);
        k += 1;
    }

    let mut data = Array2::<i16>::zeros((grid.len(), segments.len()));
    for (ch, (seg, label)) in segments.iter().zip(channels).enumerate() {
        if seg.len() < CubicSpline::MIN_POINTS {
            return Err(AlignError::InsufficientSamples {
                channel: label.clone(),
                have: seg.len(),
                need: CubicSpline::MIN_POINTS,
            });
        }
        let values: Vec<f64> = seg.values.iter().map(|&v| v as f64).collect();
        let spline =
            CubicSpline::fit(seg.times, &values).ok_or_else(|| AlignError::Input {
                channel: label.clone(),
                reason: "segment timestamps not strictly increasing".to_string(),
            })?;
        for (row, &t) in grid.iter().enumerate() {
            data[[row, ch]] = spline.eval(t) as i16;
        }
    }
    Ok(data)
}

/// Takes the first `min(len)` raw values per channel, unmodified.
fn truncate_realign(segments: &[Segment<'_>]) -> Array2<i16> {
    let rows = segments.iter().map(Segment::len).min().unwrap_or(0);
    let mut data = Array2::<i16>::zeros((rows, segments.len()));
    for (ch, seg) in segments.iter().enumerate() {
        for row in 0..rows {
            data[[row, ch]] = seg.values[row];
        }
    }
    data
}
