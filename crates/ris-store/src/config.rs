//! Load-time configuration, read from TOML.
//!
//! Every field has a built-in default, so an empty file (or no file at all)
//! yields the reference board: 4 elements × 16 columns, {0°, 180°} states,
//! 0.6 threshold, 30° steering, QPSK modulation.

use std::path::{Path, PathBuf};
use std::{env, fs};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Deserialize;

use ris_core::{
    BitPolicy, CodebookKey, CodebookSource, DITHER_CORRECTION, DitherTable, DriverConfig, ELEMENT_COUNT, ELEMENT_SPACING,
    FrameEncoder, FrameFormat, HEX_FRAME_BYTES, PHASE_STATES, POSITION_COUNT, PhaseStateSet,
    QPSK_PHASES, STEERING_ANGLE, Schedule, SincWeighting, THRESHOLD,
};

use crate::error::{Result, StoreError};

pub const CONFIG_FILE_NAME: &str = "ris.toml";

/// Offsets drawn by a seeded dithering table.
const DITHER_LEVELS: [f64; 2] = [0.0, 90.0];

/// Default base directory for all ris storage.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".ris-steer")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// `RIS_DATA_DIR` if set, otherwise `~/.ris-steer`.
pub fn data_dir() -> PathBuf {
    env::var("RIS_DATA_DIR")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(default_base_dir)
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RisConfig {
    pub element_count: usize,
    pub position_count: usize,
    pub phase_states: Vec<f64>,
    pub threshold: f64,
    pub weighting: SincWeighting,
    pub steering_angle: f64,
    pub element_spacing: f64,
    pub modulation_phases: Vec<f64>,
    /// Non-empty selects the continuous-steering schedule.
    pub sweep_angles: Vec<f64>,
    pub use_prephase: bool,
    pub dither_correction: Vec<f64>,
    /// Replaces `dither_correction` with a seeded random table.
    pub dither_seed: Option<u64>,
    pub bit_policy: BitPolicy,
    pub frame_format: FrameFormat,
    pub frame_bytes: usize,
    pub codebook: CodebookConfig,
    pub transport: TransportConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodebookConfig {
    /// Precomputed table to load instead of generating.
    pub table: Option<PathBuf>,
    /// Memoize generated codebooks in the SQLite cache.
    pub cache: bool,
    /// Drive from the table previously stored with `ris import` for
    /// these parameters.
    pub imported: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Listen address for the pull endpoint.
    pub bind: String,
    /// Push destination.
    pub url: Option<String>,
    pub interval_secs: u64,
    pub timeout_ms: u64,
}

impl Default for RisConfig {
    fn default() -> Self {
        Self {
            element_count: ELEMENT_COUNT,
            position_count: POSITION_COUNT,
            phase_states: PHASE_STATES.to_vec(),
            threshold: THRESHOLD,
            weighting: SincWeighting::Unit,
            steering_angle: STEERING_ANGLE,
            element_spacing: ELEMENT_SPACING,
            modulation_phases: QPSK_PHASES.to_vec(),
            sweep_angles: Vec::new(),
            use_prephase: false,
            dither_correction: DITHER_CORRECTION.to_vec(),
            dither_seed: None,
            bit_policy: BitPolicy::Midpoint,
            frame_format: FrameFormat::Decimal,
            frame_bytes: HEX_FRAME_BYTES,
            codebook: CodebookConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl Default for CodebookConfig {
    fn default() -> Self {
        Self {
            table: None,
            cache: true,
            imported: false,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7878".to_string(),
            url: None,
            interval_secs: 3,
            timeout_ms: 2000,
        }
    }
}

impl RisConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read a config file. A relative table path is resolved against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&content)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        if let Some(table) = &config.codebook.table
            && table.is_relative()
            && let Some(dir) = path.parent()
        {
            config.codebook.table = Some(dir.join(table));
        }
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Lookup order: explicit path, `RIS_CONFIG`, `<base_dir>/ris.toml`, defaults.
    pub fn discover(explicit: Option<&Path>, base_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = env::var("RIS_CONFIG") {
            return Self::load(Path::new(&path));
        }
        let candidate = base_dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Self::load(&candidate);
        }
        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    pub fn phase_state_set(&self) -> Result<PhaseStateSet> {
        Ok(PhaseStateSet::new(self.phase_states.clone())?)
    }

    /// Cache key of the codebook these parameters describe.
    pub fn codebook_key(&self, source: CodebookSource) -> CodebookKey {
        CodebookKey {
            phase_states: self.phase_states.clone(),
            element_count: self.element_count,
            threshold: self.threshold,
            weighting: self.weighting,
            source,
        }
    }

    /// Pre-phasing table, or `None` when pre-phasing is disabled.
    pub fn dither_table(&self) -> Result<Option<DitherTable>> {
        if !self.use_prephase {
            return Ok(None);
        }
        let table = match self.dither_seed {
            Some(seed) => DitherTable::random(
                self.position_count,
                &DITHER_LEVELS,
                &mut SmallRng::seed_from_u64(seed),
            )?,
            None => DitherTable::new(self.dither_correction.clone())?,
        };
        Ok(Some(table))
    }

    pub fn schedule(&self) -> Schedule {
        if self.sweep_angles.is_empty() {
            Schedule::Qpsk {
                phases: self.modulation_phases.clone(),
            }
        } else {
            Schedule::Sweep {
                angles: self.sweep_angles.clone(),
            }
        }
    }

    pub fn driver_config(&self) -> Result<DriverConfig> {
        Ok(DriverConfig {
            position_count: self.position_count,
            steering_angle_deg: self.steering_angle,
            element_spacing: self.element_spacing,
            schedule: self.schedule(),
            dither: self.dither_table()?,
            bit_policy: self.bit_policy,
            encoder: FrameEncoder::new(self.frame_format, self.frame_bytes),
        })
    }
}
