//! Fixture register map and polling cadence.

use std::time::Duration;

use crate::{
    offset_address, EngineError, CAPABILITY_REGISTER, FAILSAFE_REGISTER_BASE,
    FAILSAFE_REGISTER_COUNT, TEST_REGISTER_BASE, VERSION_REGISTER,
};

/// Default interval between progress polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Register addresses and cadence for one fixture revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FixtureConfig {
    /// Firmware version register.
    pub version_register: u32,
    /// Capability word register.
    pub capability_register: u32,
    /// First of the four failsafe status registers.
    pub failsafe_register_base: u32,
    /// Address of test index 0.
    pub test_register_base: u32,
    /// Interval between progress polls while a test runs.
    pub poll_interval_ms: u64,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            version_register: VERSION_REGISTER,
            capability_register: CAPABILITY_REGISTER,
            failsafe_register_base: FAILSAFE_REGISTER_BASE,
            test_register_base: TEST_REGISTER_BASE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl FixtureConfig {
    /// Addresses of the failsafe status bank, in register order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AddressOverflow`] when the bank runs past
    /// `u32::MAX`.
    pub fn failsafe_addresses(&self) -> Result<[u32; FAILSAFE_REGISTER_COUNT], EngineError> {
        let mut addresses = [0; FAILSAFE_REGISTER_COUNT];
        for (offset, address) in addresses.iter_mut().enumerate() {
            *address = offset_address(self.failsafe_register_base, offset)?;
        }
        Ok(addresses)
    }

    /// Polling cadence while a test runs.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
