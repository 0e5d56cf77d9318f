//! Failsafe status bank scan.
//!
//! Each of the four status registers carries 32 guard bits. Bit `b` of
//! register `i` is guard index `32 * i + b`, so the most significant bit of
//! register 0 is index 31 and the least significant bit of register 3 is 96.
//! A clear bit means the failsafe is not asserted.

use crate::{SignalMap, SignalRecord, FAILSAFE_REGISTER_COUNT};

/// Total guard bits in the status bank.
pub const FAILSAFE_BITS: usize = FAILSAFE_REGISTER_COUNT * 32;

/// Returns every unasserted guard index in ascending order.
#[must_use]
pub fn scan(status: &[u32; FAILSAFE_REGISTER_COUNT]) -> Vec<u32> {
    let mut unasserted = Vec::new();
    for (register, word) in (0u32..).zip(status) {
        for bit in 0..32 {
            if word & (1u32 << bit) == 0 {
                unasserted.push(register * 32 + bit);
            }
        }
    }
    unasserted
}

/// Outcome of one failsafe precondition check.
///
/// Findings are warnings for the operator and never block polling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FailsafeReport {
    /// Unasserted guard indices, strictly ascending.
    pub unasserted: Vec<u32>,
}

impl FailsafeReport {
    /// Scans a captured status bank and logs any findings.
    #[must_use]
    pub fn from_status(status: &[u32; FAILSAFE_REGISTER_COUNT]) -> Self {
        let unasserted = scan(status);
        if unasserted.is_empty() {
            log::debug!("failsafe bank fully asserted");
        } else {
            log::warn!(
                "{} failsafe signal(s) not asserted: {:?}",
                unasserted.len(),
                unasserted
            );
        }
        Self { unasserted }
    }

    /// `true` when every guard bit is asserted.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.unasserted.is_empty()
    }

    /// Signal records whose test index matches an unasserted guard bit.
    ///
    /// Guard bits with no mapped signal are skipped.
    #[must_use]
    pub fn signals<'a>(&self, map: &'a SignalMap) -> Vec<&'a SignalRecord> {
        self.unasserted
            .iter()
            .filter_map(|index| map.record(*index as usize))
            .collect()
    }
}
