//! Dense tab-separated text format used for test-case inputs and outputs.
//!
//! ```text
//! 2           <- sample count (informational)
//! A	B       <- signal names
//! 1	1       <- signal widths
//! 0	0	0   <- timestamp, then one value per signal
//! 1	1	1
//! ```
//!
//! Blank lines and lines starting with `#` are ignored anywhere in the file.

use std::fmt::Write;

use indexmap::IndexMap;
use log::debug;

use crate::error::{Location, Result, WaveError};
use crate::mask::{is_valid_width, MAX_WIDTH};
use crate::store::{Sample, Waves};

/// Parse the text format into a new store.
///
/// Every failure reports the 1-based source line (comments and blank lines
/// included) and the offending token. No partial store is ever returned.
pub fn decode(text: &str) -> Result<Waves> {
    let mut header_line = 0;
    let mut last_line = 0;
    let mut names: Vec<String> = Vec::new();
    let mut signal_widths: IndexMap<String, u32> = IndexMap::new();
    let mut timeline: Vec<Sample> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        last_line = line;
        let content = raw.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        header_line += 1;

        match header_line {
            // sample count, not needed to parse the body
            1 => {}
            2 => names = parse_names(content, line)?,
            3 => signal_widths = parse_widths(&names, content, line)?,
            _ => timeline.push(parse_row(&signal_widths, timeline.last(), content, line)?),
        }
    }

    if header_line < 3 {
        let missing = match header_line {
            0 => "sample count",
            1 => "signal names",
            _ => "signal widths",
        };
        return Err(WaveError::MalformedHeader {
            at: Location::Line(last_line.max(1)),
            message: format!("input ended before the {} line", missing),
        });
    }

    debug!(
        "Decoded text waves: {} signals, {} samples",
        signal_widths.len(),
        timeline.len()
    );
    Ok(Waves::from_validated(signal_widths, timeline))
}

fn parse_names(content: &str, line: usize) -> Result<Vec<String>> {
    let names: Vec<String> = content.split('\t').map(|name| name.trim().to_string()).collect();
    for (index, name) in names.iter().enumerate() {
        if name.is_empty() {
            return Err(WaveError::MalformedHeader {
                at: Location::Line(line),
                message: format!("signal name {} is empty", index + 1),
            });
        }
        if names[..index].contains(name) {
            return Err(WaveError::MalformedHeader {
                at: Location::Line(line),
                message: format!("signal '{}' is declared twice", name),
            });
        }
    }
    Ok(names)
}

fn parse_widths(names: &[String], content: &str, line: usize) -> Result<IndexMap<String, u32>> {
    let tokens: Vec<&str> = content.split('\t').map(str::trim).collect();
    if tokens.len() != names.len() {
        return Err(WaveError::MalformedHeader {
            at: Location::Line(line),
            message: format!(
                "number of signals ({}) must match number of signal widths ({})",
                names.len(),
                tokens.len()
            ),
        });
    }

    let mut signal_widths = IndexMap::with_capacity(names.len());
    for (name, token) in names.iter().zip(tokens) {
        let width: u32 = token.parse().map_err(|_| WaveError::UnparsableNumber {
            at: Location::Line(line),
            what: format!("width for signal '{}'", name),
            token: token.to_string(),
        })?;
        if !is_valid_width(width) {
            return Err(WaveError::MalformedHeader {
                at: Location::Line(line),
                message: format!(
                    "signal '{}' has width {}, widths must be between 1 and {}",
                    name, width, MAX_WIDTH
                ),
            });
        }
        signal_widths.insert(name.clone(), width);
    }
    Ok(signal_widths)
}

fn parse_row(
    signal_widths: &IndexMap<String, u32>,
    previous: Option<&Sample>,
    content: &str,
    line: usize,
) -> Result<Sample> {
    let fields: Vec<&str> = content.split('\t').map(str::trim).collect();
    if fields.len() != 1 + signal_widths.len() {
        return Err(WaveError::FieldCountMismatch {
            at: Location::Line(line),
            expected: 1 + signal_widths.len(),
            found: fields.len(),
        });
    }

    let token = fields[0];
    let timestamp: f64 = token
        .parse()
        .ok()
        .filter(|t: &f64| t.is_finite())
        .ok_or_else(|| WaveError::UnparsableNumber {
            at: Location::Line(line),
            what: "timestamp".to_string(),
            token: token.to_string(),
        })?;
    if timestamp < 0.0 {
        return Err(WaveError::NegativeTimestamp {
            at: Location::Line(line),
            token: token.to_string(),
        });
    }
    if previous.is_some_and(|prev| timestamp <= prev.timestamp) {
        return Err(WaveError::NonMonotonicTimestamp {
            at: Location::Line(line),
            token: token.to_string(),
        });
    }

    let values = signal_widths
        .keys()
        .zip(&fields[1..])
        .map(|(name, token)| {
            token.parse::<u64>().map_err(|_| WaveError::UnparsableNumber {
                at: Location::Line(line),
                what: format!("value for signal '{}'", name),
                token: token.to_string(),
            })
        })
        .collect::<Result<Vec<u64>>>()?;

    Ok(Sample { timestamp, values })
}

/// Render a store in the text format.
///
/// Values are written exactly as stored; timestamps use the shortest
/// representation that parses back to the same `f64`. A store without
/// signals has no header to write and is rejected.
pub fn encode(waves: &Waves) -> Result<String> {
    if waves.signal_count() == 0 {
        return Err(WaveError::MalformedHeader {
            at: Location::Header,
            message: "no signals to write".to_string(),
        });
    }

    let mut out = String::new();
    writeln!(out, "{}", waves.samples())?;
    writeln!(out, "{}", waves.signal_names().collect::<Vec<_>>().join("\t"))?;
    let widths: Vec<String> = waves.signals().map(|(_, width)| width.to_string()).collect();
    write!(out, "{}", widths.join("\t"))?;

    for sample in waves.timeline() {
        write!(out, "\n{}", sample.timestamp)?;
        for value in &sample.values {
            write!(out, "\t{}", value)?;
        }
    }
    Ok(out)
}

impl Waves {
    /// Replace this store with the contents of a text-format file.
    ///
    /// On failure the store is left untouched.
    pub fn load_text(&mut self, text: &str) -> Result<()> {
        *self = decode(text)?;
        Ok(())
    }

    pub fn to_text(&self) -> Result<String> {
        encode(self)
    }
}
