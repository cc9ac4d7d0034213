//! Value Change Dump (VCD) import and export.
//!
//! Import goes through `wellen`, flattens nested scopes into dotted names and
//! keeps only `wire` variables. The sparse change log is expanded into total
//! samples: a sample is stored only at steps where some signal changes.
//!
//! Export writes a single flat `root` scope. A scope named `root` adds no
//! prefix on import, so exported names come back unchanged. The original
//! scope nesting is never reconstructed.

use std::collections::HashMap;
use std::fmt::Write;
use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::debug;
use wellen::{viewers, Hierarchy, LoadOptions, ScopeOrVar, SignalEncoding, SignalRef, VarType};

use crate::error::{Location, Result, WaveError};
use crate::mask::{mask_for_width, MAX_WIDTH};
use crate::store::{Sample, Waves};

/// VCD step to store timestamp multiplier used on import.
pub const DEFAULT_DECODE_TIMESCALE: f64 = 0.0001;

/// Store timestamp to VCD step multiplier used on export.
pub const DEFAULT_ENCODE_TIMESCALE: f64 = 10000.0;

/// Scope that holds every variable of an exported file.
pub const ROOT_SCOPE: &str = "root";

fn check_timescale(timescale: f64) -> Result<()> {
    if timescale.is_finite() && timescale > 0.0 {
        Ok(())
    } else {
        Err(WaveError::InvalidTimescale(timescale))
    }
}

// ===== DECODE =====

/// A `wire` kept from the declaration section.
struct Wire {
    name: String,
    width: u32,
    signal: SignalRef,
}

#[derive(Default)]
struct Declarations {
    wires: Vec<Wire>,
    skipped: usize,
}

fn join_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Prefix for the children of `scope`. A `root` scope is transparent.
fn scope_prefix(parent: &str, scope: &str) -> String {
    if scope == ROOT_SCOPE {
        parent.to_string()
    } else {
        join_name(parent, scope)
    }
}

fn collect_wires(hierarchy: &Hierarchy) -> Result<Declarations> {
    let mut declarations = Declarations::default();
    for item_ref in hierarchy.items() {
        match item_ref.deref(hierarchy) {
            ScopeOrVar::Scope(scope) => {
                let prefix = scope_prefix("", scope.name(hierarchy));
                collect_wires_from_scope(hierarchy, scope, &prefix, &mut declarations)?;
            }
            ScopeOrVar::Var(var) => {
                add_var(var, var.name(hierarchy).to_string(), &mut declarations)?;
            }
        }
    }
    Ok(declarations)
}

fn collect_wires_from_scope(
    hierarchy: &Hierarchy,
    scope: &wellen::Scope,
    prefix: &str,
    declarations: &mut Declarations,
) -> Result<()> {
    for item_ref in scope.items(hierarchy) {
        match item_ref.deref(hierarchy) {
            ScopeOrVar::Scope(child_scope) => {
                let child_prefix = scope_prefix(prefix, child_scope.name(hierarchy));
                collect_wires_from_scope(hierarchy, child_scope, &child_prefix, declarations)?;
            }
            ScopeOrVar::Var(var) => {
                add_var(var, join_name(prefix, var.name(hierarchy)), declarations)?;
            }
        }
    }
    Ok(())
}

fn add_var(var: &wellen::Var, name: String, declarations: &mut Declarations) -> Result<()> {
    if !matches!(var.var_type(), VarType::Wire) {
        debug!("Skipping non-wire variable '{}' ({:?})", name, var.var_type());
        declarations.skipped += 1;
        return Ok(());
    }
    let width = match var.signal_encoding() {
        SignalEncoding::BitVector(width) => width.get(),
        _ => {
            debug!("Skipping wire '{}' without a bit-vector encoding", name);
            declarations.skipped += 1;
            return Ok(());
        }
    };
    if width > MAX_WIDTH {
        return Err(WaveError::MalformedHeader {
            at: Location::Header,
            message: format!("wire '{}' is {} bits wide, at most {} are supported", name, width, MAX_WIDTH),
        });
    }
    if declarations.wires.iter().any(|wire| wire.name == name) {
        return Err(WaveError::MalformedHeader {
            at: Location::Header,
            message: format!("flattened signal name '{}' is declared twice", name),
        });
    }
    declarations.wires.push(Wire {
        name,
        width,
        signal: var.signal_ref(),
    });
    Ok(())
}

/// Two-state reading of a VCD bit string, most significant bit first.
///
/// `1` and weak-high `h`/`H` read as one; every other level (`0`, `x`, `z`,
/// `u`, `w`, `l`, `-`) reads as zero.
pub fn collapse_bits(bits: &str) -> u64 {
    bits.chars()
        .fold(0u64, |acc, bit| (acc << 1) | u64::from(matches!(bit, '1' | 'h' | 'H')))
}

fn wellen_error(stage: &str, error: impl std::fmt::Display) -> WaveError {
    WaveError::Vcd(format!("{}: {}", stage, error))
}

/// Parse a VCD file into a new store.
///
/// Signals take, at every integer step, the value of their latest change at
/// or before that step (0 before their first change). A sample is stored at
/// step `s` with timestamp `s * timescale` only when some signal differs
/// from the previously stored sample.
pub fn decode(bytes: &[u8], timescale: f64) -> Result<Waves> {
    check_timescale(timescale)?;

    let options = LoadOptions::default();
    let input = Cursor::new(bytes.to_vec());
    let header = match catch_unwind(AssertUnwindSafe(|| viewers::read_header(input, &options))) {
        Ok(Ok(header)) => header,
        Ok(Err(e)) => return Err(wellen_error("header", e)),
        Err(_panic) => return Err(WaveError::Vcd("header parser panicked".to_string())),
    };
    let hierarchy = header.hierarchy;

    let declarations = collect_wires(&hierarchy)?;
    debug!(
        "VCD declares {} wires ({} other variables skipped)",
        declarations.wires.len(),
        declarations.skipped
    );

    let body = match catch_unwind(AssertUnwindSafe(|| viewers::read_body(header.body, &hierarchy, None))) {
        Ok(Ok(body)) => body,
        Ok(Err(e)) => return Err(wellen_error("body", e)),
        Err(_panic) => return Err(WaveError::Vcd("body parser panicked".to_string())),
    };
    let mut source = body.source;
    let time_table = body.time_table;

    // several variables may alias one signal
    let mut signal_refs: Vec<SignalRef> = Vec::new();
    for wire in &declarations.wires {
        if !signal_refs.contains(&wire.signal) {
            signal_refs.push(wire.signal);
        }
    }
    let loaded: HashMap<SignalRef, wellen::Signal> = source
        .load_signals(&signal_refs, &hierarchy, false)
        .into_iter()
        .collect();

    let read_values = |time_idx: Option<u32>| -> Vec<u64> {
        declarations
            .wires
            .iter()
            .map(|wire| {
                let bits = time_idx
                    .zip(loaded.get(&wire.signal))
                    .and_then(|(idx, signal)| {
                        let offset = signal.get_offset(idx)?;
                        signal
                            .get_value_at(&offset, offset.elements.saturating_sub(1))
                            .to_bit_string()
                    });
                bits.map_or(0, |bits| collapse_bits(&bits)) & mask_for_width(wire.width)
            })
            .collect()
    };

    // Values only change at recorded times, so visiting step 0 plus every
    // time-table entry is the same as walking each integer step.
    let mut steps: Vec<(u64, Option<u32>)> = Vec::with_capacity(time_table.len() + 1);
    if time_table.first() != Some(&0) {
        steps.push((0, None));
    }
    steps.extend(
        time_table
            .iter()
            .enumerate()
            .map(|(idx, &time)| (time, Some(idx as u32))),
    );

    let mut timeline: Vec<Sample> = Vec::new();
    for (step, time_idx) in steps {
        let values = read_values(time_idx);
        let changed = match timeline.last() {
            Some(previous) => previous.values != values,
            None => !declarations.wires.is_empty(),
        };
        if changed {
            timeline.push(Sample {
                timestamp: step as f64 * timescale,
                values,
            });
        }
    }

    debug!(
        "Decoded VCD: {} signals, {} change times, {} samples",
        declarations.wires.len(),
        time_table.len(),
        timeline.len()
    );

    let signal_widths = declarations
        .wires
        .into_iter()
        .map(|wire| (wire.name, wire.width))
        .collect();
    Ok(Waves::from_validated(signal_widths, timeline))
}

// ===== ENCODE =====

/// Short printable identifier code for the `index`-th variable: `!`, `"`,
/// ... `~`, then two characters and so on.
pub fn identifier(mut index: usize) -> String {
    const FIRST: u8 = b'!';
    const RADIX: usize = 94;
    let mut id = String::new();
    loop {
        id.push(char::from(FIRST + (index % RADIX) as u8));
        index /= RADIX;
        if index == 0 {
            return id;
        }
    }
}

/// Render a store as a VCD file.
///
/// Every sample becomes a `#<time>` record, with time `timestamp *
/// timescale` rounded to an integer, followed by the masked value of every
/// signal.
pub fn encode(waves: &Waves, timescale: f64) -> Result<String> {
    check_timescale(timescale)?;

    let ids: Vec<String> = (0..waves.signal_count()).map(identifier).collect();
    let masks: Vec<u64> = waves.signals().map(|(_, width)| mask_for_width(width)).collect();

    let mut out = String::new();
    writeln!(out, "$version\n   waves {}\n$end", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "$timescale 1ps $end")?;
    writeln!(out, "$scope module {} $end", ROOT_SCOPE)?;
    for ((name, width), id) in waves.signals().zip(&ids) {
        if name.chars().any(char::is_whitespace) {
            return Err(WaveError::MalformedHeader {
                at: Location::Header,
                message: format!("signal name '{}' contains whitespace", name),
            });
        }
        writeln!(out, "$var wire {} {} {} $end", width, id, name)?;
    }
    writeln!(out, "$upscope $end")?;
    writeln!(out, "$enddefinitions $end")?;

    let widths: Vec<u32> = waves.signals().map(|(_, width)| width).collect();
    let mut previous: Option<u64> = None;
    for (index, sample) in waves.timeline().iter().enumerate() {
        let time = (sample.timestamp * timescale).round() as u64;
        if previous.is_some_and(|prev| time <= prev) {
            return Err(WaveError::NonMonotonicTimestamp {
                at: Location::Sample(index),
                token: time.to_string(),
            });
        }
        previous = Some(time);

        writeln!(out, "#{}", time)?;
        for (column, value) in sample.values.iter().enumerate() {
            let value = value & masks[column];
            if widths[column] == 1 {
                writeln!(out, "{}{}", value, ids[column])?;
            } else {
                writeln!(out, "b{:b} {}", value, ids[column])?;
            }
        }
    }

    debug!(
        "Encoded VCD: {} signals, {} samples",
        waves.signal_count(),
        waves.samples()
    );
    Ok(out)
}

impl Waves {
    /// Replace this store with the contents of a VCD file.
    ///
    /// On failure the store is left untouched.
    pub fn load_vcd(&mut self, bytes: &[u8], timescale: f64) -> Result<()> {
        *self = decode(bytes, timescale)?;
        Ok(())
    }

    pub fn to_vcd(&self, timescale: f64) -> Result<String> {
        encode(self, timescale)
    }
}
