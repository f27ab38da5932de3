use tracing::debug;

use crate::error::AlignError;
use crate::types::{ChannelTrace, Segment};

/// Ratio of a consecutive timestamp delta to the nominal inter-sample period
/// above which the delta counts as a recording gap.
pub const GAP_THRESHOLD: f64 = 1.5;

/// Splits one channel's raw stream into gap-free segments.
///
/// The nominal inter-sample period is taken as the minimum consecutive
/// timestamp delta; any delta exceeding [`GAP_THRESHOLD`] times that period
/// is a gap. N gaps yield N+1 segments. Splits are inclusive on both sides:
/// a gap between samples `k` and `k+1` ends one segment at `k` and starts
/// the next at `k+1`, so no sample is ever dropped.
///
/// Returns a lazy, restartable ([`Clone`]) iterator borrowing the input
/// arrays. A trace with no gaps yields one segment equal to the whole input;
/// a single-sample trace yields one degenerate segment.
///
/// # Errors
///
/// [`AlignError::Input`] if the arrays are empty, have different lengths, or
/// the timestamps are not strictly increasing.
pub fn segments<'a>(
    label: &str,
    times: &'a [f64],
    values: &'a [i16],
) -> Result<SegmentIter<'a>, AlignError> {
    if times.is_empty() {
        return Err(AlignError::Input {
            channel: label.to_string(),
            reason: "no samples".to_string(),
        });
    }
    if times.len() != values.len() {
        return Err(AlignError::Input {
            channel: label.to_string(),
            reason: format!(
                "{} timestamps but {} values",
                times.len(),
                values.len()
            ),
        });
    }

    let mut interval = f64::INFINITY;
    for (i, pair) in times.windows(2).enumerate() {
        let dt = pair[1] - pair[0];
        if dt <= 0.0 {
            return Err(AlignError::Input {
                channel: label.to_string(),
                reason: format!("timestamps not strictly increasing at index {}", i + 1),
            });
        }
        if dt < interval {
            interval = dt;
        }
    }

    Ok(SegmentIter {
        times,
        values,
        max_step: GAP_THRESHOLD * interval,
        pos: 0,
    })
}

/// Lazy iterator over the gap-free segments of one channel.
///
/// Produced by [`segments`]. Cloning snapshots the iteration position, so a
/// clone taken before the first `next` call restarts the whole sequence.
#[derive(Debug, Clone)]
pub struct SegmentIter<'a> {
    times: &'a [f64],
    values: &'a [i16],
    max_step: f64,
    pos: usize,
}

impl<'a> Iterator for SegmentIter<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        if self.pos >= self.times.len() {
            return None;
        }
        let start = self.pos;
        let mut end = start + 1;
        while end < self.times.len() && self.times[end] - self.times[end - 1] <= self.max_step {
            end += 1;
        }
        self.pos = end;
        Some(Segment {
            times: &self.times[start..end],
            values: &self.values[start..end],
        })
    }
}

/// Segments every channel of one logical recording and groups the results
/// by position.
///
/// Segment correspondence across channels is positional: segment `i` of
/// channel A is assumed to cover the same recording episode as segment `i`
/// of channel B. That assumption only holds if every channel broke at the
/// same acquisition pauses, so differing per-channel segment counts are
/// rejected rather than silently misaligned.
///
/// The returned structure is indexed `out[segment][channel]`, with channels
/// in the input trace order.
///
/// # Errors
///
/// [`AlignError::Input`] if no traces are given or any trace is malformed,
/// [`AlignError::SegmentMismatch`] if per-channel segment counts disagree.
pub fn segment_channels(traces: &[ChannelTrace]) -> Result<Vec<Vec<Segment<'_>>>, AlignError> {
    let first = traces.first().ok_or_else(|| AlignError::Input {
        channel: "<none>".to_string(),
        reason: "no channels to segment".to_string(),
    })?;

    let mut by_channel = Vec::with_capacity(traces.len());
    for trace in traces {
        let segs: Vec<Segment<'_>> =
            segments(&trace.label, &trace.times, &trace.values)?.collect();
        debug!(channel = %trace.label, segments = segs.len(), "segmented channel");
        by_channel.push(segs);
    }

    let expected = by_channel[0].len();
    for (trace, segs) in traces.iter().zip(&by_channel) {
        if segs.len() != expected {
            return Err(AlignError::SegmentMismatch {
                channel: trace.label.clone(),
                expected,
                found: segs.len(),
            });
        }
    }
    debug!(
        channels = traces.len(),
        segments = expected,
        first_channel = %first.label,
        "positional segment correspondence validated"
    );

    // Transpose to [segment][channel] so each recording episode can be
    // aligned across channels in one step.
    let mut by_segment = vec![Vec::with_capacity(traces.len()); expected];
    for segs in by_channel {
        for (i, seg) in segs.into_iter().enumerate() {
            by_segment[i].push(seg);
        }
    }
    Ok(by_segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize, dt: f64) -> (Vec<f64>, Vec<i16>) {
        let times: Vec<f64> = (0..n).map(|i| i as f64 * dt).collect();
        let values: Vec<i16> = (0..n).map(|i| i as i16).collect();
        (times, values)
    }

    #[test]
    fn no_gaps_yields_single_segment() {
        let (times, values) = ramp(100, 0.001);
        let segs: Vec<_> = segments("ch", &times, &values).unwrap().collect();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].len(), 100);
        assert_eq!(segs[0].times, &times[..]);
        assert_eq!(segs[0].values, &values[..]);
    }

    #[test]
    fn single_gap_splits_after_gap_index() {
        // Insert a 2x-interval gap between indices 39 and 40.
        let k = 39;
        let (mut times, values) = ramp(100, 0.001);
        for t in times.iter_mut().skip(k + 1) {
            *t += 0.001;
        }
        let segs: Vec<_> = segments("ch", &times, &values).unwrap().collect();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].len(), k + 1);
        assert_eq!(segs[1].len(), 100 - (k + 1));
        // Both sides of the gap keep their boundary sample.
        assert_eq!(*segs[0].values.last().unwrap(), k as i16);
        assert_eq!(segs[1].values[0], (k + 1) as i16);
        // Each segment is internally gap-free.
        for seg in &segs {
            for pair in seg.times.windows(2) {
                assert!(pair[1] - pair[0] < 1.5 * 0.001);
            }
        }
    }

    #[test]
    fn multiple_gaps_yield_n_plus_one_segments() {
        let (mut times, values) = ramp(60, 0.001);
        for t in times.iter_mut().skip(20) {
            *t += 0.01;
        }
        for t in times.iter_mut().skip(45) {
            *t += 0.01;
        }
        let segs: Vec<_> = segments("ch", &times, &values).unwrap().collect();
        assert_eq!(segs.len(), 3);
        let total: usize = segs.iter().map(|s| s.len()).sum();
        assert_eq!(total, 60);
    }

    #[test]
    fn single_sample_yields_degenerate_segment() {
        let segs: Vec<_> = segments("ch", &[1.25], &[7]).unwrap().collect();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].len(), 1);
        assert_eq!(segs[0].start(), segs[0].stop());
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = segments("ch", &[], &[]).unwrap_err();
        assert!(matches!(err, AlignError::Input { .. }));
    }

    #[test]
    fn unsorted_input_is_rejected() {
        let err = segments("ch", &[0.0, 0.002, 0.001], &[0, 1, 2]).unwrap_err();
        assert!(matches!(err, AlignError::Input { .. }));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = segments("ch", &[0.0, 0.001], &[0]).unwrap_err();
        assert!(matches!(err, AlignError::Input { .. }));
    }

    #[test]
    fn iterator_is_restartable() {
        let (mut times, values) = ramp(20, 0.001);
        for t in times.iter_mut().skip(10) {
            *t += 0.01;
        }
        let iter = segments("ch", &times, &values).unwrap();
        let again = iter.clone();
        assert_eq!(iter.count(), 2);
        assert_eq!(again.count(), 2);
    }

    fn trace(label: &str, times: Vec<f64>, values: Vec<i16>) -> ChannelTrace {
        ChannelTrace {
            label: label.to_string(),
            sampling_rate: 1000.0,
            times,
            values,
        }
    }

    #[test]
    fn channels_group_by_position() {
        let (mut ta, va) = ramp(50, 0.001);
        for t in ta.iter_mut().skip(30) {
            *t += 0.01;
        }
        let (mut tb, vb) = ramp(48, 0.001);
        for t in tb.iter_mut().skip(29) {
            *t += 0.01;
        }
        let traces = vec![trace("a", ta, va), trace("b", tb, vb)];
        let grouped = segment_channels(&traces).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].len(), 2);
        assert_eq!(grouped[0][0].len(), 30);
        assert_eq!(grouped[0][1].len(), 29);
        assert_eq!(grouped[1][0].len(), 20);
        assert_eq!(grouped[1][1].len(), 19);
    }

    #[test]
    fn differing_segment_counts_are_rejected() {
        let (ta, va) = ramp(50, 0.001);
        let (mut tb, vb) = ramp(50, 0.001);
        for t in tb.iter_mut().skip(25) {
            *t += 0.01;
        }
        let traces = vec![trace("a", ta, va), trace("b", tb, vb)];
        let err = segment_channels(&traces).unwrap_err();
        match err {
            AlignError::SegmentMismatch {
                channel,
                expected,
                found,
            } => {
                assert_eq!(channel, "b");
                assert_eq!(expected, 1);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
