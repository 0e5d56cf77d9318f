//! Register protocol and signal classification engine for the BER loopback
//! test fixture.
//!
//! The pipeline is pure: [`plan`] fixes the layout once per reset, then each
//! poll snapshot flows through [`decode_snapshot`], [`aggregate`] and
//! [`verdicts`]. [`TesterSession`] drives a [`RegisterBus`] to capture those
//! snapshots.

/// Test-register address-space planning.
pub mod layout;
pub use layout::{
    capability_count, offset_address, plan, plan_at, AddressLayout, GroupKind, GroupRange,
    CAPABILITY_FIELD_BITS, CAPABILITY_FIELD_MASK, CAPABILITY_REGISTER, FAILSAFE_REGISTER_BASE,
    FAILSAFE_REGISTER_COUNT, TEST_REGISTER_BASE, VERSION_REGISTER,
};

/// Raw test-register decode.
pub mod decoder;
pub use decoder::{
    decode, decode_snapshot, decode_snapshot_into, ClockProfile, Measurement, TestRegisterWord,
    CONNECTED_BIT, DELAY_COUNT_MASK, DELAY_COUNT_SHIFT, DIFFERENTIAL_PROFILE, ERROR_COUNT_MASK,
    EXTENDED_DIFFERENTIAL_PROFILE, SINGLE_ENDED_PROFILE,
};

/// Delay-based transceiver classification.
pub mod classify;
pub use classify::{
    classify, try_classify, InterfaceType, ParseInterfaceTypeError, CLASSIFICATION_THRESHOLDS,
};

/// Failsafe status bank scan.
pub mod failsafe;
pub use failsafe::{scan, FailsafeReport, FAILSAFE_BITS};

/// Static signal map and pin-map parsing.
pub mod signal_map;
pub use signal_map::{parse_pin_map, ConnectorId, DebugInfo, SignalMap, SignalRecord};

/// Per-connector completion and global pass/fail.
pub mod aggregate;
pub use aggregate::{aggregate, state_mask, Aggregation, CompletionLevel, ConnectorProgress};

/// Per-signal verdicts.
pub mod verdict;
pub use verdict::{verdicts, Outcome, SignalVerdict};

/// Register transport contract.
pub mod bus;
pub use bus::{RegisterBus, RegisterFile};

/// Fixture register map and cadence.
pub mod config;
pub use config::{FixtureConfig, DEFAULT_POLL_INTERVAL_MS};

/// Device session over a register bus.
pub mod session;
pub use session::TesterSession;

/// Error taxonomy.
pub mod error;
pub use error::{BusError, EngineError, PinMapError};
