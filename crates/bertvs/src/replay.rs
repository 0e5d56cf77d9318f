//! Offline replay of a register dump through a tester session.

use ber_engine::{
    AddressLayout, Aggregation, EngineError, FailsafeReport, FixtureConfig, Measurement,
    SignalMap, TesterSession,
};

use crate::RegisterDump;

/// Everything one replayed snapshot yields.
#[derive(Debug, Clone, PartialEq)]
pub struct Replay {
    /// Firmware version register.
    pub version: u32,
    /// Layout planned from the dump's capability word.
    pub layout: AddressLayout,
    /// Failsafe findings.
    pub failsafe: FailsafeReport,
    /// Decoded test registers.
    pub measurements: Vec<Measurement>,
    /// Per-connector progress and global pass flag.
    pub aggregation: Aggregation,
}

/// Connects to the dump as if it were a live tester, then scans and polls once.
///
/// # Errors
///
/// Returns [`EngineError::Bus`] when the dump lacks a register the layout
/// needs or does not fit at the configured addresses,
/// [`EngineError::AddressOverflow`] when the planned layout runs past
/// `u32::MAX`, and [`EngineError::IndexOutOfLayout`] when `map` references a test
/// index past the layout.
pub fn replay(
    dump: &RegisterDump,
    map: &SignalMap,
    config: FixtureConfig,
) -> Result<Replay, EngineError> {
    let registers = dump.to_register_file(&config)?;
    let mut session = TesterSession::connect(registers, config)?;

    let version = session.version()?;
    let failsafe = session.failsafe_status()?;
    let aggregation = session.progress(map)?;
    log::info!(
        "firmware 0x{version:08x}: {}/{} signals successful",
        aggregation.successful(),
        aggregation.total()
    );

    Ok(Replay {
        version,
        layout: *session.layout(),
        failsafe,
        measurements: session.measurements().to_vec(),
        aggregation,
    })
}
