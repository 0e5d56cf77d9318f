//! Transceiver-type classification from measured loopback delay.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::EngineError;

/// Logical interface type inferred from a loopback delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InterfaceType {
    /// Low-voltage differential signalling.
    Lvds,
    /// RS-422 differential line driver.
    Rs422,
    /// Single-ended TTL.
    Ttl,
    /// Delay fell outside every threshold (negative or NaN).
    Unclassified,
}

impl InterfaceType {
    /// Canonical upper-case name used in pin maps and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lvds => "LVDS",
            Self::Rs422 => "RS422",
            Self::Ttl => "TTL",
            Self::Unclassified => "none",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Name that matches no classifiable interface type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown interface type `{0}`")]
pub struct ParseInterfaceTypeError(pub String);

impl FromStr for InterfaceType {
    type Err = ParseInterfaceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LVDS" => Ok(Self::Lvds),
            "RS422" => Ok(Self::Rs422),
            "TTL" => Ok(Self::Ttl),
            _ => Err(ParseInterfaceTypeError(s.to_string())),
        }
    }
}

/// Lower delay bounds in nanoseconds, ascending. The highest bound that the
/// delay reaches wins.
pub const CLASSIFICATION_THRESHOLDS: &[(f64, InterfaceType)] = &[
    (0.0, InterfaceType::Lvds),
    (30.0, InterfaceType::Rs422),
    (100.0, InterfaceType::Ttl),
];

/// Classifies a delay in nanoseconds.
///
/// `TTL` at or above 100 ns, else `RS422` at or above 30 ns, else `LVDS`.
/// Negative and NaN delays are [`InterfaceType::Unclassified`].
#[must_use]
pub fn classify(delay_ns: f64) -> InterfaceType {
    CLASSIFICATION_THRESHOLDS
        .iter()
        .rev()
        .find_map(|(bound, kind)| (delay_ns >= *bound).then_some(*kind))
        .unwrap_or(InterfaceType::Unclassified)
}

/// Classifies a delay, reporting unplaceable values as errors.
///
/// # Errors
///
/// Returns [`EngineError::UnclassifiedDelay`] for negative or NaN delays.
pub fn try_classify(delay_ns: f64) -> Result<InterfaceType, EngineError> {
    match classify(delay_ns) {
        InterfaceType::Unclassified => Err(EngineError::UnclassifiedDelay(delay_ns)),
        kind => Ok(kind),
    }
}
