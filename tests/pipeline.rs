//! End-to-end batch test: raw gapped multi-channel traces through
//! segmentation, alignment, referencing, offset indexing, and event
//! remapping.

use ephys_align::{
    map_events_all, process, ChannelTrace, Event, Method, PipelineConfig, ReferenceMode,
};

const FS: f64 = 1000.0;

/// Four channels over two recording episodes separated by a one-second
/// acquisition pause after `gap_at` samples.
fn gapped_traces(n: usize, gap_at: usize) -> Vec<ChannelTrace> {
    let mut times: Vec<f64> = (0..n).map(|i| i as f64 / FS).collect();
    for t in times.iter_mut().skip(gap_at) {
        *t += 1.0;
    }
    (0..4)
        .map(|ch| ChannelTrace {
            label: format!("Port_{}", ch + 1),
            sampling_rate: FS,
            times: times.clone(),
            values: (0..n)
                .map(|i| (((i * (2 * ch + 3) + ch * 17) % 400) as i16) - 200)
                .collect(),
        })
        .collect()
}

#[test]
fn full_batch_with_common_average_reference() {
    let traces = gapped_traces(500, 300);
    let config = PipelineConfig {
        reference: ReferenceMode::CommonAverage,
        ..PipelineConfig::default()
    };
    let out = process(&traces, &config).unwrap();

    assert_eq!(out.blocks.len(), 2);
    for block in &out.blocks {
        assert_eq!(block.num_channels(), 4);
        assert_eq!(block.sampling_rate, FS);
        assert_eq!(
            block.channels,
            vec!["Port_1", "Port_2", "Port_3", "Port_4"]
        );
    }
    // The second block starts after the pause.
    assert!(out.blocks[1].start_time > out.blocks[0].start_time + 1.0);

    // Offsets partition the concatenated stream exactly.
    let sizes: Vec<u64> = out.blocks.iter().map(|b| b.num_samples() as u64).collect();
    assert_eq!(out.offsets.total_samples(), sizes.iter().sum::<u64>());
    let (seg, local) = out.offsets.to_local(sizes[0]).unwrap();
    assert_eq!((seg, local), (1, 0));
}

#[test]
fn truncation_batch_keeps_raw_values() {
    let traces = gapped_traces(400, 250);
    let config = PipelineConfig {
        method: Method::Truncate,
        ..PipelineConfig::default()
    };
    let out = process(&traces, &config).unwrap();
    assert_eq!(out.blocks.len(), 2);
    assert_eq!(out.blocks[0].num_samples(), 250);
    assert_eq!(out.blocks[1].num_samples(), 150);
    // DC centering is the only transform in this mode: per-channel values
    // keep their raw shape up to a constant shift.
    let block = &out.blocks[0];
    for ch in 0..4 {
        let shift = traces[ch].values[0] as i32 - block.data[[0, ch]] as i32;
        for row in 1..block.num_samples() {
            assert_eq!(
                traces[ch].values[row] as i32 - block.data[[row, ch]] as i32,
                shift,
                "channel {ch} row {row}"
            );
        }
    }
}

#[test]
fn weighted_batch_reuses_one_global_fit() {
    let traces = gapped_traces(600, 350);
    let config = PipelineConfig {
        reference: ReferenceMode::Weighted,
        chunk_size: Some(64),
        seed: Some(9),
        ..PipelineConfig::default()
    };
    let out = process(&traces, &config).unwrap();
    let weights = out.weights.expect("weighted mode returns the fit");
    assert_eq!(weights.channels, 4);
    assert_eq!(weights.coef.dim(), (4, 3));
    assert_eq!(out.blocks.len(), 2);
}

#[test]
fn full_scale_clipped_recording_is_processed() {
    // A channel pinned at both rails: the DC shift would push the MIN
    // samples outside i16 range, which must saturate rather than abort
    // the batch.
    let traces = vec![ChannelTrace {
        label: "Port_1".to_string(),
        sampling_rate: FS,
        times: (0..4).map(|i| i as f64 / FS).collect(),
        values: vec![i16::MIN, i16::MAX, i16::MAX, i16::MAX],
    }];
    let config = PipelineConfig {
        method: Method::Truncate,
        ..PipelineConfig::default()
    };
    let out = process(&traces, &config).unwrap();
    // mean = 16383; MAX - 16383 = 16384, MIN - 16383 saturates.
    assert_eq!(out.blocks[0].data[[0, 0]], i16::MIN);
    for row in 1..4 {
        assert_eq!(out.blocks[0].data[[row, 0]], 16384);
    }
}

#[test]
fn spike_and_event_remapping_round_trip() {
    let traces = gapped_traces(500, 300);
    let out = process(&traces, &PipelineConfig::default()).unwrap();

    // Spike indices from a sorter that saw the concatenated stream.
    let n0 = out.blocks[0].num_samples() as u64;
    let spikes = [5u64, n0 - 1, n0, n0 + 7];
    let mapped = out.offsets.remap(&spikes).unwrap();
    assert_eq!(mapped[0], (0, 5));
    assert_eq!(mapped[1], (0, n0 - 1));
    assert_eq!(mapped[2], (1, 0));
    assert_eq!(mapped[3], (1, 7));
    assert!(out.offsets.to_local(out.offsets.total_samples()).is_err());

    // Stimulus events on the acquisition clock: one per episode, one in
    // the pause between them.
    let windows: Vec<_> = out
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| b.window(i))
        .collect();
    let events = vec![
        Event {
            time: out.blocks[0].start_time + 0.050,
            code: 1,
            label: Some("stim_a".to_string()),
        },
        Event {
            time: out.blocks[0].start_time + 0.450,
            code: 2,
            label: None,
        },
        Event {
            time: out.blocks[1].start_time + 0.010,
            code: 3,
            label: Some("stim_b".to_string()),
        },
    ];
    let mapped = map_events_all(&events, &windows);
    assert_eq!(mapped.len(), 2);
    assert_eq!((mapped[0].segment, mapped[0].sample), (0, 50));
    assert_eq!(mapped[0].label.as_deref(), Some("stim_a"));
    assert_eq!((mapped[1].segment, mapped[1].sample), (1, 10));
    assert_eq!(mapped[1].code, 3);
}
