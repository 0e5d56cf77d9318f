//! Captured register dumps and the files the replay tool reads.

use std::fs;
use std::path::{Path, PathBuf};

use ber_engine::{
    BusError, FixtureConfig, PinMapError, RegisterFile, SignalMap, FAILSAFE_REGISTER_COUNT,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One snapshot of the tester's register file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegisterDump {
    /// Firmware version register.
    pub version: u32,
    /// Capability word.
    pub capability: u32,
    /// Failsafe status bank, in register order.
    pub failsafe: [u32; FAILSAFE_REGISTER_COUNT],
    /// Test registers from index 0 upward.
    pub test_registers: Vec<u32>,
}

impl RegisterDump {
    /// Places the dump at the addresses `config` names.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::WriteFailed`] when a register block of the dump
    /// would run past `u32::MAX` at the configured base.
    pub fn to_register_file(&self, config: &FixtureConfig) -> Result<RegisterFile, BusError> {
        let mut registers = RegisterFile::new();
        registers.set(config.version_register, self.version);
        registers.set(config.capability_register, self.capability);
        registers.set_block(config.failsafe_register_base, &self.failsafe)?;
        registers.set_block(config.test_register_base, &self.test_registers)?;
        Ok(registers)
    }
}

/// Failure to load one of the replay inputs.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// File is not valid JSON for the expected shape.
    #[error("{}: {source}", path.display())]
    Json {
        /// File that failed.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },
    /// Pin map could not be parsed.
    #[error("{}: {source}", path.display())]
    PinMap {
        /// File that failed.
        path: PathBuf,
        /// Underlying parse error.
        source: PinMapError,
    },
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a JSON register dump.
///
/// # Errors
///
/// Returns [`LoadError::Io`] or [`LoadError::Json`].
pub fn load_dump(path: &Path) -> Result<RegisterDump, LoadError> {
    let text = read(path)?;
    serde_json::from_str(&text).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a JSON fixture configuration; missing fields take their defaults.
///
/// # Errors
///
/// Returns [`LoadError::Io`] or [`LoadError::Json`].
pub fn load_config(path: &Path) -> Result<FixtureConfig, LoadError> {
    let text = read(path)?;
    let config = serde_json::from_str(&text).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("loaded fixture config from {}: {config:?}", path.display());
    Ok(config)
}

/// Reads and groups a whitespace-separated pin map.
///
/// # Errors
///
/// Returns [`LoadError::Io`] or [`LoadError::PinMap`].
pub fn load_signal_map(path: &Path) -> Result<SignalMap, LoadError> {
    let text = read(path)?;
    let map = SignalMap::from_pin_map(&text).map_err(|source| LoadError::PinMap {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!(
        "loaded {} signals on {} connectors from {}",
        map.len(),
        map.connectors().count(),
        path.display()
    );
    Ok(map)
}
