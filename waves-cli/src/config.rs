use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use waves::vcd::{DEFAULT_DECODE_TIMESCALE, DEFAULT_ENCODE_TIMESCALE};

/// Config file picked up from the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "waves.toml";

pub const DECODE_TIMESCALE_ENV: &str = "WAVES_VCD_DECODE_TIMESCALE";
pub const ENCODE_TIMESCALE_ENV: &str = "WAVES_VCD_ENCODE_TIMESCALE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WavesConfig {
    #[serde(default)]
    pub timescale: TimescaleSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimescaleSection {
    /// VCD step -> store timestamp multiplier.
    pub vcd_decode: f64,
    /// Store timestamp -> VCD step multiplier.
    pub vcd_encode: f64,
}

impl Default for TimescaleSection {
    fn default() -> Self {
        Self {
            vcd_decode: DEFAULT_DECODE_TIMESCALE,
            vcd_encode: DEFAULT_ENCODE_TIMESCALE,
        }
    }
}

impl WavesConfig {
    /// Override timescales from `lookup`, normally `std::env::var`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(DECODE_TIMESCALE_ENV) {
            self.timescale.vcd_decode = parse_env_float(DECODE_TIMESCALE_ENV, &raw)?;
        }
        if let Some(raw) = lookup(ENCODE_TIMESCALE_ENV) {
            self.timescale.vcd_encode = parse_env_float(ENCODE_TIMESCALE_ENV, &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("timescale.vcd_decode", self.timescale.vcd_decode),
            ("timescale.vcd_encode", self.timescale.vcd_encode),
        ] {
            if !value.is_finite() || value <= 0.0 {
                bail!("{} must be a finite positive number, got {}", key, value);
            }
        }
        Ok(())
    }
}

fn parse_env_float(name: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .with_context(|| format!("Failed to parse {}='{}' as a number", name, raw))
}

pub fn load_config_file(path: &Path) -> Result<WavesConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: WavesConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Defaults, then the config file (explicit path, or `waves.toml` in the
/// working directory if present), then environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<WavesConfig> {
    let mut config = match path {
        Some(path) => load_config_file(path)?,
        None if Path::new(CONFIG_FILE_NAME).exists() => load_config_file(Path::new(CONFIG_FILE_NAME))?,
        None => WavesConfig::default(),
    };

    config.apply_env_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;
    log::debug!("Using configuration: {:?}", config);
    Ok(config)
}
