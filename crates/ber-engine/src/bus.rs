//! Register transport contract and an in-memory implementation.

use std::collections::BTreeMap;

use crate::BusError;

/// Fixed-width register access to the tester.
///
/// The engine never performs I/O itself; a [`crate::TesterSession`] drives a
/// bus and hands the captured words to the pure decode pipeline.
pub trait RegisterBus {
    /// Reads one 32-bit register.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ReadFailed`] when the transport cannot complete the
    /// read and [`BusError::NotConnected`] when no device is attached.
    fn read_register(&mut self, address: u32) -> Result<u32, BusError>;

    /// Reads several registers as one consistent snapshot, in `addresses` order.
    ///
    /// Transports with a batched read must override this so that every word
    /// comes from the same device update.
    ///
    /// # Errors
    ///
    /// Returns the first failure from [`RegisterBus::read_register`].
    fn read_registers(&mut self, addresses: &[u32]) -> Result<Vec<u32>, BusError> {
        addresses
            .iter()
            .map(|address| self.read_register(*address))
            .collect()
    }

    /// Pulses the tester's BER logic reset, clearing every counter.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::WriteFailed`] when the reset cannot be issued.
    fn reset_counters(&mut self) -> Result<(), BusError> {
        Ok(())
    }
}

/// Register bank held in memory, used for replaying captured dumps and in tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterFile {
    registers: BTreeMap<u32, u32>,
    counter_resets: usize,
}

impl RegisterFile {
    /// Creates an empty register file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one register.
    pub fn set(&mut self, address: u32, value: u32) {
        self.registers.insert(address, value);
    }

    /// Sets consecutive registers starting at `base`.
    ///
    /// Nothing is written when the block would run past `u32::MAX`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::WriteFailed`] naming `base` when the block does not
    /// fit in the address space.
    pub fn set_block(&mut self, base: u32, values: &[u32]) -> Result<(), BusError> {
        let last = u32::try_from(values.len().saturating_sub(1))
            .ok()
            .and_then(|offset| base.checked_add(offset));
        if last.is_none() {
            return Err(BusError::WriteFailed { address: base });
        }
        for (address, value) in (base..=u32::MAX).zip(values) {
            self.registers.insert(address, *value);
        }
        Ok(())
    }

    /// Number of counter resets issued so far.
    #[must_use]
    pub const fn counter_resets(&self) -> usize {
        self.counter_resets
    }
}

impl RegisterBus for RegisterFile {
    fn read_register(&mut self, address: u32) -> Result<u32, BusError> {
        self.registers
            .get(&address)
            .copied()
            .ok_or(BusError::ReadFailed { address })
    }

    fn reset_counters(&mut self) -> Result<(), BusError> {
        self.counter_resets += 1;
        Ok(())
    }
}
