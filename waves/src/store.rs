use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Location, Result, WaveError};
use crate::mask::{is_valid_width, mask_for_width};

// ===== DATA TYPES =====

/// One timestamped snapshot; `values[i]` belongs to the i-th signal of the
/// owning store's signal table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: f64,
    pub values: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    Rising,
    Falling,
}

impl EdgeKind {
    /// Classify the transition between two adjacent values. Equal values are
    /// never an edge.
    pub fn between(previous: u64, current: u64) -> Option<EdgeKind> {
        if previous < current {
            Some(EdgeKind::Rising)
        } else if previous > current {
            Some(EdgeKind::Falling)
        } else {
            None
        }
    }

    fn wanted(self, rising: bool, falling: bool) -> bool {
        match self {
            EdgeKind::Rising => rising,
            EdgeKind::Falling => falling,
        }
    }
}

/// A transition located by [`Waves::edges`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub index: usize,
    pub timestamp: f64,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalInfo {
    pub name: String,
    pub width: u32,
}

/// Compact description of a store, used for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveSummary {
    pub signals: Vec<SignalInfo>,
    pub samples: usize,
    pub time_span: Option<(f64, f64)>,
}

/// A collection of zero or more digital signals sampled at strictly
/// increasing timestamps.
///
/// The signal table and the timeline always describe the same waveform: both
/// are populated together by a decoder (or [`Waves::from_parts`]) and never
/// mutated piecemeal afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waves {
    signal_widths: IndexMap<String, u32>,
    timeline: Vec<Sample>,
}

// ===== CONSTRUCTION =====

impl Waves {
    /// An empty store with no signals and no samples.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an explicit signal table and timeline, enforcing
    /// the same invariants the decoders do.
    pub fn from_parts<I, S>(signals: I, timeline: Vec<Sample>) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut signal_widths = IndexMap::new();
        for (name, width) in signals {
            let name = name.into();
            if name.is_empty() {
                return Err(WaveError::MalformedHeader {
                    at: Location::Header,
                    message: "signal names cannot be empty".to_string(),
                });
            }
            if !is_valid_width(width) {
                return Err(WaveError::MalformedHeader {
                    at: Location::Header,
                    message: format!("signal '{}' has unsupported width {}", name, width),
                });
            }
            if signal_widths.insert(name.clone(), width).is_some() {
                return Err(WaveError::MalformedHeader {
                    at: Location::Header,
                    message: format!("signal '{}' is declared twice", name),
                });
            }
        }

        let mut previous: Option<f64> = None;
        for (index, sample) in timeline.iter().enumerate() {
            if sample.values.len() != signal_widths.len() {
                return Err(WaveError::FieldCountMismatch {
                    at: Location::Sample(index),
                    expected: signal_widths.len(),
                    found: sample.values.len(),
                });
            }
            if !(sample.timestamp.is_finite() && sample.timestamp >= 0.0) {
                return Err(WaveError::NegativeTimestamp {
                    at: Location::Sample(index),
                    token: sample.timestamp.to_string(),
                });
            }
            if previous.is_some_and(|prev| sample.timestamp <= prev) {
                return Err(WaveError::NonMonotonicTimestamp {
                    at: Location::Sample(index),
                    token: sample.timestamp.to_string(),
                });
            }
            previous = Some(sample.timestamp);
        }

        Ok(Self::from_validated(signal_widths, timeline))
    }

    /// Assemble a store whose invariants the caller has already checked.
    pub(crate) fn from_validated(signal_widths: IndexMap<String, u32>, timeline: Vec<Sample>) -> Self {
        Self {
            signal_widths,
            timeline,
        }
    }
}

// ===== SIGNAL TABLE =====

impl Waves {
    /// Signal names and widths in table order.
    pub fn signals(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.signal_widths
            .iter()
            .map(|(name, width)| (name.as_str(), *width))
    }

    pub fn signal_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.signal_widths.keys().map(String::as_str)
    }

    pub fn signal_count(&self) -> usize {
        self.signal_widths.len()
    }

    pub fn signal_index(&self, signal: &str) -> Option<usize> {
        self.signal_widths.get_index_of(signal)
    }

    pub fn signal_name(&self, index: usize) -> Option<&str> {
        self.signal_widths
            .get_index(index)
            .map(|(name, _)| name.as_str())
    }

    pub fn width(&self, signal: &str) -> Result<u32> {
        self.signal_widths
            .get(signal)
            .copied()
            .ok_or_else(|| WaveError::UnknownSignal(signal.to_string()))
    }

    /// Bit mask for the signal's declared width, e.g. `0xf` for width 4.
    pub fn mask(&self, signal: &str) -> Result<u64> {
        self.width(signal).map(mask_for_width)
    }

    fn lookup(&self, signal: &str) -> Result<(usize, u64)> {
        match self.signal_widths.get_full(signal) {
            Some((index, _, width)) => Ok((index, mask_for_width(*width))),
            None => Err(WaveError::UnknownSignal(signal.to_string())),
        }
    }
}

// ===== TIMELINE QUERIES =====

fn check_time(time: f64) -> Result<()> {
    // NaN fails the comparison and is rejected along with negatives
    if time >= 0.0 {
        Ok(())
    } else {
        Err(WaveError::NegativeTime(time))
    }
}

impl Waves {
    /// Number of recorded samples.
    pub fn samples(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    pub fn timeline(&self) -> &[Sample] {
        &self.timeline
    }

    pub fn time_at_index(&self, index: usize) -> Option<f64> {
        self.timeline.get(index).map(|sample| sample.timestamp)
    }

    /// First and last timestamps, if any samples exist.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        match (self.timeline.first(), self.timeline.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        }
    }

    /// Index of the sample current at `time`: the `i` with
    /// `timeline[i].timestamp <= time < timeline[i + 1].timestamp`.
    ///
    /// Clamps to 0 when `time` precedes the first sample and to the last
    /// index when `time` is at or after the last sample. Returns 0 for an
    /// empty timeline, which callers must not index.
    pub fn time_index(&self, time: f64) -> usize {
        self.timeline
            .partition_point(|sample| sample.timestamp <= time)
            .saturating_sub(1)
    }

    /// Value of `signal` at `time`, masked to the signal's width.
    ///
    /// Returns 0 when no samples are loaded.
    pub fn value_at(&self, signal: &str, time: f64) -> Result<u64> {
        let (column, mask) = self.lookup(signal)?;
        check_time(time)?;
        if self.timeline.is_empty() {
            return Ok(0);
        }
        Ok(mask & self.timeline[self.time_index(time)].values[column])
    }

    /// Masked value of `signal` at a sample index.
    pub fn value_at_index(&self, signal: &str, index: usize) -> Result<u64> {
        let (column, mask) = self.lookup(signal)?;
        self.timeline
            .get(index)
            .map(|sample| mask & sample.values[column])
            .ok_or(WaveError::SampleOutOfRange {
                index,
                samples: self.timeline.len(),
            })
    }

    /// Time of the first edge of `signal` strictly after `time`.
    ///
    /// Adjacent values are compared after masking to the signal's width, so
    /// bits above the width never produce an edge.
    ///
    /// Returns `(f64::INFINITY, false)` when no wanted edge follows `time` or
    /// when no samples are loaded.
    pub fn next_edge(&self, signal: &str, time: f64, rising: bool, falling: bool) -> Result<(f64, bool)> {
        self.lookup(signal)?;
        check_time(time)?;
        if self.timeline.is_empty() {
            return Ok((f64::INFINITY, false));
        }

        let after = self.time_index(time) + 1;
        match self.next_edge_index(signal, after, rising, falling)? {
            Some(index) => Ok((self.timeline[index].timestamp, true)),
            None => Ok((f64::INFINITY, false)),
        }
    }

    /// Index of the first edge of `signal` at or after sample `after`.
    ///
    /// Sample 0 has no predecessor, so the scan never starts before index 1.
    /// Values are masked before comparison, as in [`Waves::value_at`].
    pub fn next_edge_index(&self, signal: &str, after: usize, rising: bool, falling: bool) -> Result<Option<usize>> {
        let (column, mask) = self.lookup(signal)?;
        let start = after.max(1);
        if start >= self.timeline.len() {
            return Ok(None);
        }

        let found = self.timeline[start - 1..]
            .windows(2)
            .position(|pair| {
                EdgeKind::between(mask & pair[0].values[column], mask & pair[1].values[column])
                    .is_some_and(|kind| kind.wanted(rising, falling))
            })
            .map(|offset| start + offset);
        Ok(found)
    }

    /// Every wanted edge of `signal`, in time order, comparing masked values.
    pub fn edges(&self, signal: &str, rising: bool, falling: bool) -> Result<impl Iterator<Item = Edge> + '_> {
        let (column, mask) = self.lookup(signal)?;
        Ok(self
            .timeline
            .windows(2)
            .enumerate()
            .filter_map(move |(offset, pair)| {
                EdgeKind::between(mask & pair[0].values[column], mask & pair[1].values[column])
                    .filter(|kind| kind.wanted(rising, falling))
                    .map(|kind| Edge {
                        index: offset + 1,
                        timestamp: pair[1].timestamp,
                        kind,
                    })
            }))
    }

    pub fn summary(&self) -> WaveSummary {
        WaveSummary {
            signals: self
                .signals()
                .map(|(name, width)| SignalInfo {
                    name: name.to_string(),
                    width,
                })
                .collect(),
            samples: self.samples(),
            time_span: self.time_span(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: f64, values: &[u64]) -> Sample {
        Sample {
            timestamp,
            values: values.to_vec(),
        }
    }

    /// clk toggles every 1.0, data (4 bits) counts on rising edges.
    fn counter() -> Waves {
        Waves::from_parts(
            [("clk", 1), ("data", 4)],
            vec![
                sample(0.0, &[0, 0]),
                sample(1.0, &[1, 1]),
                sample(2.0, &[0, 1]),
                sample(3.0, &[1, 2]),
                sample(4.0, &[0, 2]),
                sample(5.0, &[1, 3]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_basic_scenario() {
        let waves = Waves::from_parts(
            [("A", 1), ("B", 1)],
            vec![sample(0.0, &[0, 0]), sample(1.0, &[1, 1])],
        )
        .unwrap();

        assert_eq!(waves.value_at("A", 0.5).unwrap(), 0);
        assert_eq!(waves.value_at("A", 1.5).unwrap(), 1);
        assert_eq!(waves.next_edge("A", 0.0, true, false).unwrap(), (1.0, true));
    }

    #[test]
    fn test_mask_strips_high_bits() {
        let waves = Waves::from_parts(
            [("A", 4), ("B", 1)],
            vec![sample(0.0, &[0x1f, 3])],
        )
        .unwrap();

        assert_eq!(waves.mask("A").unwrap(), 0xf);
        assert_eq!(waves.value_at("B", 0.0).unwrap(), 1);
        assert_eq!(waves.value_at("A", 7.0).unwrap(), 0xf);
        assert_eq!(
            waves.mask("C"),
            Err(WaveError::UnknownSignal("C".to_string()))
        );
    }

    #[test]
    fn test_time_index_boundaries() {
        let empty = Waves::new();
        assert_eq!(empty.time_index(3.0), 0);

        let single = Waves::from_parts([("A", 1)], vec![sample(2.0, &[1])]).unwrap();
        assert_eq!(single.time_index(0.0), 0);
        assert_eq!(single.time_index(2.0), 0);
        assert_eq!(single.time_index(9.0), 0);

        let pair = Waves::from_parts(
            [("A", 1)],
            vec![sample(1.0, &[0]), sample(2.0, &[1])],
        )
        .unwrap();
        assert_eq!(pair.time_index(0.5), 0);
        assert_eq!(pair.time_index(1.0), 0);
        assert_eq!(pair.time_index(1.999), 0);
        assert_eq!(pair.time_index(2.0), 1);
        assert_eq!(pair.time_index(100.0), 1);
    }

    #[test]
    fn test_time_index_brackets_and_is_monotonic() {
        let waves = counter();
        let mut previous = 0;
        for step in 0..=60 {
            let t = step as f64 * 0.1;
            let index = waves.time_index(t);
            assert!(index >= previous, "time_index went backwards at t={}", t);
            assert!(waves.timeline()[index].timestamp <= t + 1e-12);
            if index + 1 < waves.samples() {
                assert!(t < waves.timeline()[index + 1].timestamp);
            }
            previous = index;
        }
    }

    #[test]
    fn test_value_at_errors_and_empty() {
        let waves = counter();
        assert_eq!(
            waves.value_at("nope", 1.0),
            Err(WaveError::UnknownSignal("nope".to_string()))
        );
        assert_eq!(waves.value_at("clk", -1.0), Err(WaveError::NegativeTime(-1.0)));
        assert!(matches!(
            waves.value_at("clk", f64::NAN),
            Err(WaveError::NegativeTime(_))
        ));

        let empty = Waves::from_parts([("A", 8)], Vec::new()).unwrap();
        assert_eq!(empty.value_at("A", 3.0).unwrap(), 0);
        assert_eq!(
            empty.next_edge("A", 3.0, true, true).unwrap(),
            (f64::INFINITY, false)
        );
        assert!(empty.value_at("B", 3.0).is_err());
    }

    #[test]
    fn test_value_constant_between_transitions() {
        let waves = counter();
        for window in waves.timeline().windows(2) {
            let start = window[0].timestamp;
            let end = window[1].timestamp;
            let expected = waves.value_at("data", start).unwrap();
            for step in 1..10 {
                let t = start + (end - start) * step as f64 / 10.0;
                assert_eq!(waves.value_at("data", t).unwrap(), expected);
            }
        }
    }

    #[test]
    fn test_next_edge_directions() {
        let waves = counter();
        assert_eq!(waves.next_edge("clk", 0.0, true, false).unwrap(), (1.0, true));
        assert_eq!(waves.next_edge("clk", 0.0, false, true).unwrap(), (2.0, true));
        assert_eq!(waves.next_edge("clk", 1.0, true, true).unwrap(), (2.0, true));
        assert_eq!(waves.next_edge("clk", 1.5, true, false).unwrap(), (3.0, true));
        // the final sample is still a candidate
        assert_eq!(waves.next_edge("clk", 4.0, true, false).unwrap(), (5.0, true));
        assert_eq!(
            waves.next_edge("clk", 5.0, true, true).unwrap(),
            (f64::INFINITY, false)
        );
        assert_eq!(
            waves.next_edge("clk", 0.0, false, false).unwrap(),
            (f64::INFINITY, false)
        );
        assert_eq!(waves.next_edge("data", 1.0, true, true).unwrap(), (3.0, true));
        assert_eq!(waves.next_edge("data", 0.0, false, true).unwrap(), (f64::INFINITY, false));
        assert_eq!(waves.next_edge("clk", -0.5, true, true), Err(WaveError::NegativeTime(-0.5)));
    }

    #[test]
    fn test_next_edge_before_first_sample() {
        let waves = Waves::from_parts(
            [("A", 1)],
            vec![sample(2.0, &[0]), sample(3.0, &[1])],
        )
        .unwrap();
        assert_eq!(waves.next_edge("A", 0.0, true, true).unwrap(), (3.0, true));
    }

    #[test]
    fn test_next_edge_always_advances() {
        let waves = counter();
        let mut t = 0.0;
        let mut seen = Vec::new();
        loop {
            let (edge, found) = waves.next_edge("clk", t, true, true).unwrap();
            if !found {
                break;
            }
            assert!(edge > t);
            seen.push(edge);
            t = edge;
        }
        assert_eq!(seen, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_next_edge_compares_masked_values() {
        // 4 bits: 0x13 -> 0x03 only drops bit 4, then 0x03 -> 0x12 falls to 0x2
        let waves = Waves::from_parts(
            [("nib", 4)],
            vec![sample(0.0, &[0x13]), sample(1.0, &[0x03]), sample(2.0, &[0x12])],
        )
        .unwrap();
        assert_eq!(waves.next_edge("nib", 0.0, true, true).unwrap(), (2.0, true));
        assert_eq!(
            waves.next_edge("nib", 0.0, true, false).unwrap(),
            (f64::INFINITY, false)
        );
    }

    #[test]
    fn test_edges_ignore_masked_bits() {
        // 3 -> 1 only differs above bit 0, so a width-1 signal has no edge
        let waves = Waves::from_parts(
            [("A", 1)],
            vec![sample(0.0, &[3]), sample(1.0, &[1]), sample(2.0, &[0])],
        )
        .unwrap();
        let edges: Vec<Edge> = waves.edges("A", true, true).unwrap().collect();
        assert_eq!(
            edges,
            vec![Edge {
                index: 2,
                timestamp: 2.0,
                kind: EdgeKind::Falling,
            }]
        );
        assert_eq!(waves.next_edge_index("A", 0, true, true).unwrap(), Some(2));
        assert_eq!(waves.next_edge_index("A", 3, true, true).unwrap(), None);
    }

    #[test]
    fn test_index_accessors() {
        let waves = counter();
        assert_eq!(waves.signal_index("data"), Some(1));
        assert_eq!(waves.signal_name(0), Some("clk"));
        assert_eq!(waves.signal_name(2), None);
        assert_eq!(waves.time_at_index(3), Some(3.0));
        assert_eq!(waves.time_at_index(6), None);
        assert_eq!(waves.value_at_index("data", 5).unwrap(), 3);
        assert_eq!(
            waves.value_at_index("data", 6),
            Err(WaveError::SampleOutOfRange { index: 6, samples: 6 })
        );
        assert_eq!(waves.time_span(), Some((0.0, 5.0)));
        assert_eq!(waves.signal_names().collect::<Vec<_>>(), vec!["clk", "data"]);
    }

    #[test]
    fn test_from_parts_rejects_broken_invariants() {
        assert!(matches!(
            Waves::from_parts([("A", 0)], Vec::new()),
            Err(WaveError::MalformedHeader { .. })
        ));
        assert!(matches!(
            Waves::from_parts([("A", 65)], Vec::new()),
            Err(WaveError::MalformedHeader { .. })
        ));
        assert!(matches!(
            Waves::from_parts([("A", 1), ("A", 2)], Vec::new()),
            Err(WaveError::MalformedHeader { .. })
        ));
        assert_eq!(
            Waves::from_parts([("A", 1)], vec![sample(0.0, &[0, 1])]),
            Err(WaveError::FieldCountMismatch {
                at: Location::Sample(0),
                expected: 1,
                found: 2,
            })
        );
        assert!(matches!(
            Waves::from_parts([("A", 1)], vec![sample(1.0, &[0]), sample(1.0, &[1])]),
            Err(WaveError::NonMonotonicTimestamp {
                at: Location::Sample(1),
                ..
            })
        ));
        assert!(matches!(
            Waves::from_parts([("A", 1)], vec![sample(-1.0, &[0])]),
            Err(WaveError::NegativeTimestamp { .. })
        ));
    }

    #[test]
    fn test_independent_stores_coexist() {
        let first = counter();
        let second = Waves::from_parts([("x", 8)], vec![sample(0.0, &[200])]).unwrap();
        assert_eq!(first.value_at("data", 5.0).unwrap(), 3);
        assert_eq!(second.value_at("x", 5.0).unwrap(), 200);
        assert!(first.value_at("x", 0.0).is_err());
    }

    #[test]
    fn test_summary_serializes() {
        let summary = counter().summary();
        assert_eq!(summary.samples, 6);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["signals"][1]["name"], "data");
        assert_eq!(json["signals"][1]["width"], 4);
        assert_eq!(json["time_span"][1], 5.0);
    }
}
