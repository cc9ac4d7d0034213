//! Digital waveform store for course test-case waves.
//!
//! A [`Waves`] holds a fixed table of named signals (1 to 64 bits wide) and a
//! timeline of samples, each carrying a value for every signal. It answers
//! point-in-time value queries and edge searches, and converts to and from
//! two on-disk shapes:
//!
//! - the dense tab-separated text format ([`text`]), one row per sample;
//! - the sparse Value Change Dump format ([`vcd`]), read through `wellen`.
//!
//! ```ignore
//! let waves = waves::text::decode("2\nA\tB\n1\t1\n0\t0\t0\n1\t1\t1")?;
//! assert_eq!(waves.value_at("A", 1.5)?, 1);
//! let vcd = waves::vcd::encode(&waves, waves::vcd::DEFAULT_ENCODE_TIMESCALE)?;
//! ```

pub mod error;
pub mod mask;
pub mod store;
pub mod text;
pub mod vcd;

pub use error::{Location, Result, WaveError};
pub use mask::{mask_for_width, MAX_WIDTH};
pub use store::{Edge, EdgeKind, Sample, WaveSummary, Waves};
