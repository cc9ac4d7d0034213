use std::fmt;

pub type Result<T> = std::result::Result<T, WaveError>;

/// Where in the input a decode (or encode) failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// 1-based source line, counting comments and blank lines.
    Line(usize),
    /// 0-based index into the timeline.
    Sample(usize),
    /// The signal table as a whole (VCD declarations, or a store being written).
    Header,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Line(line) => write!(f, "line {}", line),
            Location::Sample(index) => write!(f, "sample {}", index),
            Location::Header => write!(f, "signal declarations"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WaveError {
    #[error("unknown signal '{0}'")]
    UnknownSignal(String),

    #[error("time cannot be negative, got {0}")]
    NegativeTime(f64),

    #[error("{at}: {message}")]
    MalformedHeader { at: Location, message: String },

    #[error("{at}: expected {expected} fields, found {found}")]
    FieldCountMismatch {
        at: Location,
        expected: usize,
        found: usize,
    },

    #[error("{at}: could not parse {what} '{token}'")]
    UnparsableNumber {
        at: Location,
        what: String,
        token: String,
    },

    #[error("{at}: timestamp '{token}' is negative")]
    NegativeTimestamp { at: Location, token: String },

    #[error("{at}: timestamp '{token}' moves backwards - timestamps must be strictly increasing")]
    NonMonotonicTimestamp { at: Location, token: String },

    #[error("sample index {index} is out of range for {samples} samples")]
    SampleOutOfRange { index: usize, samples: usize },

    #[error("timescale must be finite and positive, got {0}")]
    InvalidTimescale(f64),

    #[error("VCD parse failed: {0}")]
    Vcd(String),

    #[error("failed to format output: {0}")]
    Format(#[from] fmt::Error),
}
