use thiserror::Error;

use crate::ConnectorId;

/// Failure taxonomy for the decode, classification and aggregation pipeline.
///
/// A malformed capability word has no variant: every 32-bit value plans to a
/// valid layout, unused high bits are ignored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A measurement index fell outside `[0, total)` of the active layout.
    #[error("index {index} is outside the test address space of {total} registers")]
    IndexOutOfLayout {
        /// Offending index.
        index: usize,
        /// Total size of the active layout.
        total: usize,
    },
    /// A poll snapshot did not carry exactly one word per test register.
    #[error("poll snapshot holds {actual} words, layout expects {expected}")]
    SnapshotLengthMismatch {
        /// Total size of the active layout.
        expected: usize,
        /// Number of raw words supplied.
        actual: usize,
    },
    /// A register block runs past the top of the 32-bit address space.
    #[error("register 0x{base:08x} + {offset} is past the end of the address space")]
    AddressOverflow {
        /// First address of the block.
        base: u32,
        /// Offset that overflowed.
        offset: usize,
    },
    /// A connector in the signal map has no signals mapped to it.
    #[error("connector {0} has no mapped signals")]
    EmptyConnectorGroup(ConnectorId),
    /// A delay could not be placed under the classifier thresholds.
    #[error("delay {0} ns cannot be classified")]
    UnclassifiedDelay(f64),
    /// Register transport failure surfaced through a device session.
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Register transport failure categories reported by a [`crate::RegisterBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum BusError {
    /// Transport reported a failure reading a register.
    #[error("register read failed at 0x{address:04x}")]
    ReadFailed {
        /// Register address.
        address: u32,
    },
    /// Transport reported a failure writing a register.
    #[error("register write failed at 0x{address:04x}")]
    WriteFailed {
        /// Register address.
        address: u32,
    },
    /// No device is attached to the transport.
    #[error("tester is not connected")]
    NotConnected,
}

/// Pin-map parse failure with the 1-indexed source line it was found on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinMapError {
    /// No header row starting with `Index` was found.
    #[error("pin map has no header row")]
    MissingHeader,
    /// A required column is absent from the header row.
    #[error("line {line}: header is missing column `{column}`")]
    MissingColumn {
        /// Header line.
        line: usize,
        /// Column name.
        column: &'static str,
    },
    /// A data row is shorter than the header.
    #[error("line {line}: row has no value for column `{column}`")]
    MissingField {
        /// Row line.
        line: usize,
        /// Column name.
        column: &'static str,
    },
    /// The `Test` column is not a non-negative integer.
    #[error("line {line}: invalid test index `{value}`")]
    InvalidTestIndex {
        /// Row line.
        line: usize,
        /// Raw value.
        value: String,
    },
    /// Two records claim the same test index.
    #[error("test index {0} is mapped more than once")]
    DuplicateTestIndex(usize),
    /// The `Standard` column names no known transceiver type.
    #[error("line {line}: unknown signal standard `{value}`")]
    UnknownStandard {
        /// Row line.
        line: usize,
        /// Raw value.
        value: String,
    },
    /// The `Info` column is not a bracketed `|`-separated list.
    #[error("line {line}: malformed debug info `{value}`")]
    MalformedInfo {
        /// Row line.
        line: usize,
        /// Raw value.
        value: String,
    },
    /// The connector label has no numeric suffix.
    #[error("invalid connector id `{0}`")]
    InvalidConnectorId(String),
}
