//! Remapping of externally-recorded event streams onto aligned recordings.
//!
//! Digital marks and stimulus annotations are timestamped on the
//! acquisition clock, not on any segment's sample grid. Once segments are
//! aligned, each event has to be attributed to the recording whose time
//! window contains it and expressed as a sample offset within that
//! recording. Events falling between recordings are dead time and are
//! dropped, not errored.

use tracing::debug;

/// One externally-recorded event: a digital mark or a stimulus annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Absolute event time on the acquisition clock (seconds)
    pub time: f64,
    /// Event code (digital mark character or stimulus code)
    pub code: u32,
    /// Stimulus label, if the source carries one
    pub label: Option<String>,
}

/// An event attributed to one recording and expressed in its sample grid.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedEvent {
    /// Index of the recording the event falls in
    pub segment: usize,
    /// Sample offset within that recording
    pub sample: u64,
    /// Event code, carried through unchanged
    pub code: u32,
    /// Stimulus label, carried through unchanged
    pub label: Option<String>,
}

/// The absolute time window covered by one aligned recording.
///
/// Usually obtained from [`crate::AlignedBlock::window`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingWindow {
    /// Index of the recording
    pub segment: usize,
    /// Absolute time of sample 0 (seconds)
    pub start_time: f64,
    /// Sampling rate of the recording (Hz)
    pub sampling_rate: f64,
    /// Number of samples in the recording
    pub samples: u64,
}

impl RecordingWindow {
    /// Duration of the window in seconds.
    pub fn duration(&self) -> f64 {
        self.samples as f64 / self.sampling_rate
    }

    /// Whether an absolute time falls inside the half-open window.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_time && time < self.start_time + self.duration()
    }
}

/// Maps the events falling inside one recording's window onto its sample
/// grid.
///
/// An event at absolute time `t` maps to sample
/// `round((t - start_time) × sampling_rate)`. Events outside the window are
/// dropped; they belong to a different recording or to inter-recording dead
/// time.
pub fn map_events(events: &[Event], window: &RecordingWindow) -> Vec<MappedEvent> {
    let mapped: Vec<MappedEvent> = events
        .iter()
        .filter(|event| window.contains(event.time))
        .map(|event| MappedEvent {
            segment: window.segment,
            sample: ((event.time - window.start_time) * window.sampling_rate).round() as u64,
            code: event.code,
            label: event.label.clone(),
        })
        .collect();
    debug!(
        segment = window.segment,
        total = events.len(),
        mapped = mapped.len(),
        "mapped events into recording window"
    );
    mapped
}

/// Maps events onto every given window, ordered by window then event.
///
/// Windows are expected to be non-overlapping; an event inside two
/// overlapping windows would be attributed to both.
pub fn map_events_all(events: &[Event], windows: &[RecordingWindow]) -> Vec<MappedEvent> {
    windows
        .iter()
        .flat_map(|window| map_events(events, window))
        .collect()
}
