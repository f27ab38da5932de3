//! Temporal alignment and referencing of multi-channel electrophysiology
//! recordings, preparing them for spike sorting.
//!
//! Acquisition devices export each channel as its own `(timestamp, value)`
//! stream: channels start and stop at slightly different times, drift
//! against one another, and break at acquisition pauses. This crate merges
//! those streams into evenly-sampled multi-channel matrices without losing
//! or misaligning a sample, removes a cross-channel reference signal, and
//! maps sample indices produced by downstream spike sorters (which see all
//! recordings as one concatenated stream) back onto individual recordings.
//!
//! The stages, in data-flow order:
//!
//! 1. [`segment`] — split each channel's raw stream into gap-free segments
//!    (gap rule: any inter-sample step above 1.5× the nominal period).
//! 2. [`align`] — realign one segment of every channel onto a uniform
//!    sample grid over the channels' common time window, by cubic-spline
//!    interpolation or plain truncation.
//! 3. [`reference`] — subtract a common-average or regression-weighted
//!    reference from every channel, optionally chunked for bounded memory.
//! 4. [`offsets`] / [`events`] — map concatenated-stream sample indices and
//!    externally-recorded event times back onto recordings.
//!
//! [`pipeline::process`] runs the whole batch in one call.
//!
//! # Examples
//!
//! ```
//! use ephys_align::{ChannelTrace, PipelineConfig, ReferenceMode, process};
//!
//! let traces: Vec<ChannelTrace> = (0..4)
//!     .map(|ch| ChannelTrace {
//!         label: format!("Port_{}", ch + 1),
//!         sampling_rate: 1000.0,
//!         times: (0..100).map(|i| i as f64 * 0.001).collect(),
//!         values: (0..100).map(|i| ((i * (ch + 3)) % 40) as i16).collect(),
//!     })
//!     .collect();
//!
//! let config = PipelineConfig {
//!     reference: ReferenceMode::CommonAverage,
//!     ..PipelineConfig::default()
//! };
//! let out = process(&traces, &config).unwrap();
//! assert_eq!(out.blocks.len(), 1);
//! assert_eq!(out.blocks[0].num_channels(), 4);
//! ```
//!
//! File and container I/O are deliberately out of scope: callers decode
//! vendor formats into [`ChannelTrace`]s and persist the aligned blocks,
//! weights, and remapped events themselves.

pub mod align;
pub mod error;
pub mod events;
pub mod offsets;
pub mod pipeline;
pub mod reference;
pub mod segment;
pub mod spline;
pub mod types;

pub use align::{align, Method};
pub use error::AlignError;
pub use events::{map_events, map_events_all, Event, MappedEvent, RecordingWindow};
pub use offsets::OffsetTable;
pub use pipeline::{process, PipelineConfig, ProcessOutput, ReferenceMode};
pub use reference::{
    apply_weights, apply_weights_all, apply_weights_in_place, fit_weights,
    remove_common_average, remove_dc_offset, DEFAULT_FIT_ROWS,
};
pub use segment::{segment_channels, segments, SegmentIter, GAP_THRESHOLD};
pub use spline::CubicSpline;
pub use types::{AlignedBlock, ChannelTrace, ReferenceWeights, Segment};
