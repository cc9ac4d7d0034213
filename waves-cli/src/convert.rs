use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::path::Path;

use waves::{WaveSummary, Waves};

use crate::config::WavesConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Tab-separated course text format
    Text,
    /// Value Change Dump
    Vcd,
}

impl InputFormat {
    /// `.vcd` files are VCD, everything else is treated as text.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .as_deref()
        {
            Some("vcd") => InputFormat::Vcd,
            _ => InputFormat::Text,
        }
    }
}

/// Decode a waveform file in the given (or inferred) format.
pub fn read_waves(path: &Path, format: Option<InputFormat>, config: &WavesConfig) -> Result<Waves> {
    let format = format.unwrap_or_else(|| InputFormat::from_path(path));
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    let waves = match format {
        InputFormat::Text => {
            let text = String::from_utf8(bytes)
                .with_context(|| format!("Input file is not UTF-8 text: {}", path.display()))?;
            waves::text::decode(&text)
        }
        InputFormat::Vcd => waves::vcd::decode(&bytes, config.timescale.vcd_decode),
    }
    .with_context(|| format!("Failed to decode {:?} waves from {}", format, path.display()))?;

    log::debug!(
        "Loaded {} signals and {} samples from {}",
        waves.signal_count(),
        waves.samples(),
        path.display()
    );
    Ok(waves)
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output file: {}", path.display()))
}

pub fn text_to_vcd(input: &Path, output: &Path, config: &WavesConfig) -> Result<()> {
    let waves = read_waves(input, Some(InputFormat::Text), config)?;
    let vcd = waves::vcd::encode(&waves, config.timescale.vcd_encode)
        .with_context(|| format!("Failed to encode {} as VCD", input.display()))?;
    write_output(output, &vcd)?;
    log::info!(
        "Wrote {} samples of {} signals to {}",
        waves.samples(),
        waves.signal_count(),
        output.display()
    );
    Ok(())
}

pub fn vcd_to_text(input: &Path, output: &Path, config: &WavesConfig) -> Result<()> {
    let waves = read_waves(input, Some(InputFormat::Vcd), config)?;
    let text = waves::text::encode(&waves)
        .with_context(|| format!("Failed to encode {} as text", input.display()))?;
    write_output(output, &text)?;
    log::info!(
        "Wrote {} samples of {} signals to {}",
        waves.samples(),
        waves.signal_count(),
        output.display()
    );
    Ok(())
}

/// What `waves inspect` reports about a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspection {
    pub path: String,
    pub format: String,
    #[serde(flatten)]
    pub summary: WaveSummary,
}

pub fn inspect(input: &Path, format: Option<InputFormat>, config: &WavesConfig) -> Result<Inspection> {
    let format = format.unwrap_or_else(|| InputFormat::from_path(input));
    let waves = read_waves(input, Some(format), config)?;
    Ok(Inspection {
        path: input.display().to_string(),
        format: format!("{:?}", format).to_lowercase(),
        summary: waves.summary(),
    })
}

impl Inspection {
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("File:    {}", self.path),
            format!("Format:  {}", self.format),
            format!("Samples: {}", self.summary.samples),
        ];
        if let Some((start, end)) = self.summary.time_span {
            lines.push(format!("Time:    {} - {}", start, end));
        }
        lines.push(format!("Signals: {}", self.summary.signals.len()));
        for signal in &self.summary.signals {
            lines.push(format!("  {:<24} {:>2} bit{}", signal.name, signal.width, if signal.width == 1 { "" } else { "s" }));
        }
        lines.join("\n")
    }
}
