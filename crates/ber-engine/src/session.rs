//! Device session: owns the bus and the layout fixed at connect/reset.

use std::ops::ControlFlow;
use std::thread;

use crate::{
    aggregate, decode_snapshot_into, plan_at, AddressLayout, Aggregation, EngineError,
    FailsafeReport, FixtureConfig, Measurement, RegisterBus, SignalMap, FAILSAFE_REGISTER_COUNT,
};

/// One connection to a tester.
///
/// The layout is planned from the capability register on connect and on every
/// [`TesterSession::reset`], and stays fixed in between. Each poll overwrites
/// the measurement table in place; no history is kept.
#[derive(Debug)]
pub struct TesterSession<B: RegisterBus> {
    bus: B,
    config: FixtureConfig,
    layout: AddressLayout,
    addresses: Vec<u32>,
    measurements: Vec<Measurement>,
}

impl<B: RegisterBus> TesterSession<B> {
    /// Attaches to `bus` and plans the layout.
    ///
    /// # Errors
    ///
    /// Returns any [`TesterSession::reset`] error.
    pub fn connect(bus: B, config: FixtureConfig) -> Result<Self, EngineError> {
        let layout = plan_at(0, config.test_register_base);
        let mut session = Self {
            bus,
            config,
            layout,
            addresses: Vec::new(),
            measurements: Vec::new(),
        };
        session.reset()?;
        Ok(session)
    }

    /// Clears the tester counters and re-plans the layout.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Bus`] if the counter reset or capability read
    /// fails and [`EngineError::AddressOverflow`] if the planned block runs
    /// past `u32::MAX`; the previous layout is kept in either case.
    pub fn reset(&mut self) -> Result<&AddressLayout, EngineError> {
        self.bus.reset_counters()?;
        let word = self.bus.read_register(self.config.capability_register)?;
        let layout = plan_at(word, self.config.test_register_base);
        let addresses = layout.addresses()?;

        self.layout = layout;
        self.addresses = addresses;
        self.measurements = vec![Measurement::default(); self.layout.total_size()];

        log::info!(
            "capability 0x{word:08x}: {} test registers at 0x{:04x}",
            self.layout.total_size(),
            self.layout.base_offset
        );
        for range in &self.layout.groups {
            log::debug!(
                "{:?} ({}) indices {}..{}",
                range.kind,
                range.kind.bank_label(),
                range.start,
                range.end()
            );
        }
        Ok(&self.layout)
    }

    /// Reads the firmware version register.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Bus`] on transport failure.
    pub fn version(&mut self) -> Result<u32, EngineError> {
        Ok(self.bus.read_register(self.config.version_register)?)
    }

    /// Clears the counters and scans the failsafe status bank.
    ///
    /// Findings are warnings; polling may continue regardless.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Bus`] on transport failure,
    /// [`EngineError::AddressOverflow`] if the bank runs past `u32::MAX` and
    /// [`EngineError::SnapshotLengthMismatch`] if the bus returns the wrong
    /// number of words.
    pub fn failsafe_status(&mut self) -> Result<FailsafeReport, EngineError> {
        self.bus.reset_counters()?;
        let addresses = self.config.failsafe_addresses()?;
        let words = self.bus.read_registers(&addresses)?;
        let status: [u32; FAILSAFE_REGISTER_COUNT] =
            words
                .try_into()
                .map_err(|words: Vec<u32>| EngineError::SnapshotLengthMismatch {
                    expected: FAILSAFE_REGISTER_COUNT,
                    actual: words.len(),
                })?;
        Ok(FailsafeReport::from_status(&status))
    }

    /// Captures every test register in one snapshot and decodes it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Bus`] on transport failure and
    /// [`EngineError::SnapshotLengthMismatch`] if the bus returns the wrong
    /// number of words.
    pub fn poll(&mut self) -> Result<&[Measurement], EngineError> {
        let raw = self.bus.read_registers(&self.addresses)?;
        decode_snapshot_into(&raw, &self.layout, &mut self.measurements)?;
        Ok(&self.measurements)
    }

    /// Polls and aggregates against `map` in one step.
    ///
    /// # Errors
    ///
    /// Returns any [`TesterSession::poll`] or [`aggregate`] error.
    pub fn progress(&mut self, map: &SignalMap) -> Result<Aggregation, EngineError> {
        self.poll()?;
        aggregate(&self.measurements, map)
    }

    /// Polls at the configured cadence until every mapped signal passes.
    ///
    /// `observe` sees each aggregation, the final one included, and cancels the
    /// run by returning [`ControlFlow::Break`]. Returns the last aggregation.
    ///
    /// # Errors
    ///
    /// Returns the first [`TesterSession::progress`] error.
    pub fn monitor<F>(
        &mut self,
        map: &SignalMap,
        mut observe: F,
    ) -> Result<Aggregation, EngineError>
    where
        F: FnMut(&Aggregation) -> ControlFlow<()>,
    {
        let interval = self.config.poll_interval();
        let mut polls = 0usize;
        loop {
            let aggregation = self.progress(map)?;
            polls += 1;
            let flow = observe(&aggregation);
            if aggregation.passed || flow.is_break() {
                log::info!(
                    "monitor stopped after {polls} poll(s): {}/{} signals successful",
                    aggregation.successful(),
                    aggregation.total()
                );
                return Ok(aggregation);
            }
            thread::sleep(interval);
        }
    }

    /// Layout fixed at the last connect/reset.
    #[must_use]
    pub const fn layout(&self) -> &AddressLayout {
        &self.layout
    }

    /// Measurement table from the last poll; zeroed after a reset.
    #[must_use]
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Active fixture configuration.
    #[must_use]
    pub const fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// Releases the bus.
    pub fn into_bus(self) -> B {
        self.bus
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use std::cell::RefCell;
    use std::ops::ControlFlow;
    use std::rc::Rc;

    use super::TesterSession;
    use crate::{
        BusError, EngineError, FixtureConfig, GroupKind, RegisterBus, RegisterFile, SignalMap,
        TestRegisterWord,
    };

    // diffA=1, diffB=1, diffC=0, single=1
    const CAPABILITY: u32 = 1 | (1 << 6) | (1 << 18);

    const PIN_MAP: &str = "\
Index Test Connector Signal_Pair Standard Info
0 0 J1 CLK RS422 [U1|1|U2|2|1->2]
1 1 J1 TXD RS422 [U1|3|U2|4|3->4]
2 2 J2 STB TTL [U3|5|U4|6|5->6]
";

    fn connected_word(error_count: u32, delay_count: u8) -> u32 {
        TestRegisterWord {
            error_count,
            delay_count,
            connected: true,
        }
        .to_raw()
    }

    fn fixture() -> RegisterFile {
        let mut bus = RegisterFile::new();
        bus.set(0x0000, 0x0000_0104);
        bus.set(0x0001, CAPABILITY);
        bus.set_block(0x0004, &[u32::MAX, u32::MAX, 0xFFFF_FFFE, u32::MAX])
            .expect("fits");
        bus.set_block(
            0x0008,
            &[connected_word(0, 5), connected_word(150, 1), connected_word(0, 1)],
        )
        .expect("fits");
        bus
    }

    fn fast_config() -> FixtureConfig {
        FixtureConfig {
            poll_interval_ms: 0,
            ..FixtureConfig::default()
        }
    }

    /// Bus whose registers stay reachable from the test after `connect`.
    #[derive(Debug, Clone)]
    struct SharedBus(Rc<RefCell<RegisterFile>>);

    impl SharedBus {
        fn new(registers: RegisterFile) -> Self {
            Self(Rc::new(RefCell::new(registers)))
        }
    }

    impl RegisterBus for SharedBus {
        fn read_register(&mut self, address: u32) -> Result<u32, BusError> {
            self.0.borrow_mut().read_register(address)
        }

        fn reset_counters(&mut self) -> Result<(), BusError> {
            self.0.borrow_mut().reset_counters()
        }
    }

    #[test]
    fn connect_plans_layout_from_capability_register() {
        let session = TesterSession::connect(fixture(), FixtureConfig::default()).expect("connects");
        let layout = session.layout();
        assert_eq!(layout.total_size(), 3);
        assert_eq!(layout.group(GroupKind::Single).start, 2);
        assert_eq!(session.measurements().len(), 3);
        assert_eq!(session.into_bus().counter_resets(), 1);
    }

    #[test]
    fn poll_decodes_all_test_registers() {
        let mut session =
            TesterSession::connect(fixture(), FixtureConfig::default()).expect("connects");
        let measurements = session.poll().expect("polls").to_vec();

        assert_eq!(measurements[0].ber, 0.0);
        assert_eq!(measurements[0].delay_ns, 5.0 * 6.666);
        assert_eq!(measurements[1].ber, 150.0 / 1_500_000.0);
        assert_eq!(measurements[2].delay_ns, 200.0);
        assert!(measurements.iter().all(|m| m.connected));
    }

    #[test]
    fn failsafe_status_reports_unasserted_bits() {
        let mut session =
            TesterSession::connect(fixture(), FixtureConfig::default()).expect("connects");
        let report = session.failsafe_status().expect("scans");
        assert_eq!(report.unasserted, vec![64]);
        assert_eq!(session.version(), Ok(0x0000_0104));
    }

    #[test]
    fn reset_replans_after_capability_change() {
        let mut registers = RegisterFile::new();
        registers.set(0x0001, 1);
        registers
            .set_block(0x0008, &[connected_word(0, 5); 5])
            .expect("fits");
        let bus = SharedBus::new(registers);
        let mut session =
            TesterSession::connect(bus.clone(), FixtureConfig::default()).expect("connects");
        assert_eq!(session.layout().total_size(), 1);
        assert_eq!(session.measurements().len(), 1);

        bus.0.borrow_mut().set(0x0001, 5);
        assert_eq!(session.poll().map(<[_]>::len), Ok(1));

        let layout = *session.reset().expect("resets");
        assert_eq!(layout.group(GroupKind::DiffA).len, 5);
        assert_eq!(session.layout().total_size(), 5);
        assert_eq!(session.measurements().len(), 5);
        assert_eq!(session.poll().map(<[_]>::len), Ok(5));
        assert_eq!(bus.0.borrow().counter_resets(), 2);
    }

    #[test]
    fn failed_reset_keeps_previous_layout() {
        let bus = SharedBus::new(fixture());
        let mut session =
            TesterSession::connect(bus.clone(), FixtureConfig::default()).expect("connects");

        *bus.0.borrow_mut() = RegisterFile::new();
        assert_eq!(
            session.reset().map(|layout| layout.total_size()),
            Err(EngineError::Bus(BusError::ReadFailed { address: 0x0001 }))
        );
        assert_eq!(session.layout().total_size(), 3);
        assert_eq!(session.measurements().len(), 3);
    }

    #[test]
    fn register_blocks_past_top_of_address_space_are_rejected() {
        let mut bus = RegisterFile::new();
        bus.set(0x0001, 3);
        let config = FixtureConfig {
            test_register_base: u32::MAX - 1,
            ..FixtureConfig::default()
        };
        assert_eq!(
            TesterSession::connect(bus.clone(), config).map(|session| session.layout().total_size()),
            Err(EngineError::AddressOverflow {
                base: u32::MAX - 1,
                offset: 2
            })
        );

        let config = FixtureConfig {
            failsafe_register_base: u32::MAX - 1,
            ..FixtureConfig::default()
        };
        let mut session = TesterSession::connect(bus, config).expect("connects");
        assert_eq!(
            session.failsafe_status(),
            Err(EngineError::AddressOverflow {
                base: u32::MAX - 1,
                offset: 2
            })
        );
    }

    struct DetachedBus;

    impl RegisterBus for DetachedBus {
        fn read_register(&mut self, _address: u32) -> Result<u32, BusError> {
            Err(BusError::NotConnected)
        }

        fn reset_counters(&mut self) -> Result<(), BusError> {
            Err(BusError::NotConnected)
        }
    }

    #[test]
    fn detached_bus_fails_connect() {
        assert_eq!(
            TesterSession::connect(DetachedBus, FixtureConfig::default())
                .map(|session| session.layout().total_size()),
            Err(EngineError::Bus(BusError::NotConnected))
        );
    }

    #[test]
    fn missing_test_register_surfaces_bus_error() {
        let mut bus = fixture();
        bus.set(0x0001, CAPABILITY | (1 << 12));
        let mut session = TesterSession::connect(bus, FixtureConfig::default()).expect("connects");
        assert_eq!(
            session.poll().map(<[_]>::len),
            Err(EngineError::Bus(BusError::ReadFailed { address: 0x000B }))
        );
    }

    #[test]
    fn monitor_polls_until_every_signal_passes() {
        let map = SignalMap::from_pin_map(PIN_MAP).expect("pin map");
        let bus = SharedBus::new(fixture());
        let mut session = TesterSession::connect(bus.clone(), fast_config()).expect("connects");

        let mut polls = 0;
        let aggregation = session
            .monitor(&map, |progress| {
                polls += 1;
                if polls == 2 {
                    assert!(!progress.passed);
                    bus.0.borrow_mut().set(0x0009, connected_word(0, 5));
                }
                ControlFlow::Continue(())
            })
            .expect("monitors");

        assert!(aggregation.passed);
        assert_eq!(polls, 3);
    }

    #[test]
    fn monitor_stops_when_observer_breaks() {
        let map = SignalMap::from_pin_map(PIN_MAP).expect("pin map");
        let mut session = TesterSession::connect(fixture(), fast_config()).expect("connects");

        let mut polls = 0;
        let aggregation = session
            .monitor(&map, |_| {
                polls += 1;
                if polls == 4 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .expect("monitors");

        assert!(!aggregation.passed);
        assert_eq!(aggregation.successful(), 2);
        assert_eq!(polls, 4);
    }

    struct ShortBus(RegisterFile);

    impl RegisterBus for ShortBus {
        fn read_register(&mut self, address: u32) -> Result<u32, BusError> {
            self.0.read_register(address)
        }

        fn read_registers(&mut self, addresses: &[u32]) -> Result<Vec<u32>, BusError> {
            let mut words = self.0.read_registers(addresses)?;
            words.pop();
            Ok(words)
        }
    }

    #[test]
    fn short_snapshot_is_rejected() {
        let mut session =
            TesterSession::connect(ShortBus(fixture()), FixtureConfig::default()).expect("connects");
        assert_eq!(
            session.failsafe_status(),
            Err(EngineError::SnapshotLengthMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(
            session.poll().map(<[_]>::len),
            Err(EngineError::SnapshotLengthMismatch {
                expected: 3,
                actual: 2
            })
        );
    }
}
