//! Test-register word decode into error, delay and connection measurements.

use crate::{AddressLayout, EngineError, GroupKind};

/// Mask of the error counter field, bits 0..26.
pub const ERROR_COUNT_MASK: u32 = 0x03FF_FFFF;
/// Shift of the delay counter field.
pub const DELAY_COUNT_SHIFT: u32 = 26;
/// Mask of the delay counter field after shifting, 5 bits.
pub const DELAY_COUNT_MASK: u32 = 0x1F;
/// Bit position of the connection flag.
pub const CONNECTED_BIT: u32 = 31;

/// Counting window and delay-tick period for one signal group.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ClockProfile {
    /// Bits counted per BER window; the error count is divided by this.
    pub divisor: u32,
    /// Nanoseconds per delay tick.
    pub period_ns: f64,
}

/// Profile for the `diffA` and `diffB` groups.
pub const DIFFERENTIAL_PROFILE: ClockProfile = ClockProfile {
    divisor: 1_500_000,
    period_ns: 6.666,
};
/// Profile for the `diffC` group.
pub const EXTENDED_DIFFERENTIAL_PROFILE: ClockProfile = ClockProfile {
    divisor: 7_500_000,
    period_ns: 6.666,
};
/// Profile for the single-ended group.
pub const SINGLE_ENDED_PROFILE: ClockProfile = ClockProfile {
    divisor: 100_000,
    period_ns: 200.0,
};

impl ClockProfile {
    /// Returns the tester clock profile for `kind`.
    #[must_use]
    pub const fn for_group(kind: GroupKind) -> Self {
        match kind {
            GroupKind::DiffA | GroupKind::DiffB => DIFFERENTIAL_PROFILE,
            GroupKind::DiffC => EXTENDED_DIFFERENTIAL_PROFILE,
            GroupKind::Single => SINGLE_ENDED_PROFILE,
        }
    }
}

/// Raw fields of one test register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TestRegisterWord {
    /// Observed bit errors, 26 bits.
    pub error_count: u32,
    /// Loopback delay in clock ticks, 5 bits.
    pub delay_count: u8,
    /// Connection flag.
    pub connected: bool,
}

impl TestRegisterWord {
    /// Splits a raw register value into its fields.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            error_count: raw & ERROR_COUNT_MASK,
            delay_count: ((raw >> DELAY_COUNT_SHIFT) & DELAY_COUNT_MASK) as u8,
            connected: (raw >> CONNECTED_BIT) & 1 == 1,
        }
    }

    /// Packs the fields back into a register value, masking each to its width.
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        let mut raw = self.error_count & ERROR_COUNT_MASK;
        raw |= (self.delay_count as u32 & DELAY_COUNT_MASK) << DELAY_COUNT_SHIFT;
        if self.connected {
            raw |= 1 << CONNECTED_BIT;
        }
        raw
    }
}

/// Physical measurement for one test index in the current poll.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Measurement {
    /// Bit-error rate in `[0, 1]`.
    pub ber: f64,
    /// Loopback delay in nanoseconds.
    pub delay_ns: f64,
    /// Connection flag from the same register read.
    pub connected: bool,
}

impl Measurement {
    /// Converts raw fields using `profile`.
    ///
    /// The error count is unsigned by field width, so only the upper bound of
    /// the BER is clamped.
    #[must_use]
    pub fn from_word(word: TestRegisterWord, profile: ClockProfile) -> Self {
        let ber = f64::from(word.error_count) / f64::from(profile.divisor);
        Self {
            ber: ber.min(1.0),
            delay_ns: f64::from(word.delay_count) * profile.period_ns,
            connected: word.connected,
        }
    }

    /// Zero errors with the connection flag set.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_successful(&self) -> bool {
        self.ber == 0.0 && self.connected
    }
}

/// Decodes the raw word read for test index `index`.
///
/// # Errors
///
/// Returns [`EngineError::IndexOutOfLayout`] when `index` is outside `layout`.
pub fn decode(raw: u32, index: usize, layout: &AddressLayout) -> Result<Measurement, EngineError> {
    let kind = layout.group_of(index)?;
    Ok(Measurement::from_word(
        TestRegisterWord::from_raw(raw),
        ClockProfile::for_group(kind),
    ))
}

/// Decodes one poll snapshot, one raw word per test index.
///
/// # Errors
///
/// Returns [`EngineError::SnapshotLengthMismatch`] when `raw` does not hold
/// exactly `layout.total_size()` words.
pub fn decode_snapshot(raw: &[u32], layout: &AddressLayout) -> Result<Vec<Measurement>, EngineError> {
    let mut table = vec![Measurement::default(); layout.total_size()];
    decode_snapshot_into(raw, layout, &mut table)?;
    Ok(table)
}

/// Decodes one poll snapshot into an existing measurement table.
///
/// `table` is resized to the layout and every entry is overwritten.
///
/// # Errors
///
/// Returns [`EngineError::SnapshotLengthMismatch`] when `raw` does not hold
/// exactly `layout.total_size()` words.
pub fn decode_snapshot_into(
    raw: &[u32],
    layout: &AddressLayout,
    table: &mut Vec<Measurement>,
) -> Result<(), EngineError> {
    let expected = layout.total_size();
    if raw.len() != expected {
        return Err(EngineError::SnapshotLengthMismatch {
            expected,
            actual: raw.len(),
        });
    }

    table.resize(expected, Measurement::default());
    for range in &layout.groups {
        let profile = ClockProfile::for_group(range.kind);
        let span = range.start..range.end();
        for (slot, word) in table[span.clone()].iter_mut().zip(&raw[span]) {
            *slot = Measurement::from_word(TestRegisterWord::from_raw(*word), profile);
        }
    }
    log::debug!("decoded {expected} test registers");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::{
        decode, decode_snapshot, ClockProfile, Measurement, TestRegisterWord,
        DIFFERENTIAL_PROFILE, EXTENDED_DIFFERENTIAL_PROFILE, SINGLE_ENDED_PROFILE,
    };
    use crate::{plan, EngineError, GroupKind};

    // diffA=2, diffB=2, diffC=2, single=2
    const CAPABILITY: u32 = 2 | (2 << 6) | (2 << 12) | (2 << 18);

    #[test]
    fn field_extraction_matches_bit_layout() {
        let word = TestRegisterWord::from_raw(0b1_10101_00_0000_0000_0000_0000_0000_0111);
        assert_eq!(word.error_count, 7);
        assert_eq!(word.delay_count, 0b10101);
        assert!(word.connected);

        let word = TestRegisterWord::from_raw(0x7FFF_FFFF);
        assert_eq!(word.error_count, 0x03FF_FFFF);
        assert_eq!(word.delay_count, 0x1F);
        assert!(!word.connected);
    }

    #[rstest]
    #[case(0, GroupKind::DiffA, DIFFERENTIAL_PROFILE)]
    #[case(3, GroupKind::DiffB, DIFFERENTIAL_PROFILE)]
    #[case(4, GroupKind::DiffC, EXTENDED_DIFFERENTIAL_PROFILE)]
    #[case(7, GroupKind::Single, SINGLE_ENDED_PROFILE)]
    fn profile_selected_by_group(
        #[case] index: usize,
        #[case] kind: GroupKind,
        #[case] profile: ClockProfile,
    ) {
        let layout = plan(CAPABILITY);
        assert_eq!(layout.group_of(index), Ok(kind));
        assert_eq!(ClockProfile::for_group(kind), profile);

        let raw = TestRegisterWord {
            error_count: 1_000,
            delay_count: 3,
            connected: true,
        }
        .to_raw();
        let measurement = decode(raw, index, &layout).expect("index inside layout");
        assert_eq!(measurement.ber, 1_000.0 / f64::from(profile.divisor));
        assert_eq!(measurement.delay_ns, 3.0 * profile.period_ns);
        assert!(measurement.connected);
    }

    #[test]
    fn single_ended_delay_ticks_are_200ns() {
        let layout = plan(CAPABILITY);
        let raw = TestRegisterWord {
            error_count: 0,
            delay_count: 1,
            connected: true,
        }
        .to_raw();
        let measurement = decode(raw, 6, &layout).expect("single-ended index");
        assert_eq!(measurement.delay_ns, 200.0);
        assert_eq!(measurement.ber, 0.0);
        assert!(measurement.is_successful());
    }

    #[test]
    fn ber_saturates_at_divisor() {
        let layout = plan(CAPABILITY);
        let at_divisor = TestRegisterWord {
            error_count: 100_000,
            delay_count: 0,
            connected: true,
        };
        let measurement = decode(at_divisor.to_raw(), 6, &layout).expect("single-ended index");
        assert_eq!(measurement.ber, 1.0);

        let saturated = decode(0x03FF_FFFF, 0, &layout).expect("diffA index");
        assert_eq!(saturated.ber, 1.0);
        assert!(!saturated.is_successful());
    }

    #[test]
    fn disconnected_zero_error_signal_is_not_successful() {
        let measurement = Measurement {
            ber: 0.0,
            delay_ns: 0.0,
            connected: false,
        };
        assert!(!measurement.is_successful());
    }

    #[test]
    fn decode_rejects_index_outside_layout() {
        let layout = plan(CAPABILITY);
        assert_eq!(
            decode(0, 8, &layout),
            Err(EngineError::IndexOutOfLayout { index: 8, total: 8 })
        );
    }

    #[test]
    fn snapshot_length_must_match_layout() {
        let layout = plan(CAPABILITY);
        assert_eq!(
            decode_snapshot(&[0; 7], &layout),
            Err(EngineError::SnapshotLengthMismatch {
                expected: 8,
                actual: 7
            })
        );
    }

    #[test]
    fn snapshot_matches_per_index_decode() {
        let layout = plan(CAPABILITY);
        let raw: Vec<u32> = (0..8u32)
            .map(|index| {
                TestRegisterWord {
                    error_count: index * 50_000,
                    delay_count: 4,
                    connected: index % 2 == 0,
                }
                .to_raw()
            })
            .collect();

        let table = decode_snapshot(&raw, &layout).expect("full snapshot");
        for (index, word) in raw.iter().enumerate() {
            assert_eq!(table[index], decode(*word, index, &layout).expect("in layout"));
        }
    }

    proptest! {
        #[test]
        fn fields_roundtrip_through_raw_word(
            error_count in 0u32..=0x03FF_FFFF,
            delay_count in 0u8..=0x1F,
            connected in any::<bool>(),
        ) {
            let word = TestRegisterWord { error_count, delay_count, connected };
            prop_assert_eq!(TestRegisterWord::from_raw(word.to_raw()), word);
        }

        #[test]
        fn decode_is_pure_and_ber_is_bounded(raw in any::<u32>(), index in 0usize..8) {
            let layout = plan(CAPABILITY);
            let first = decode(raw, index, &layout).expect("in layout");
            let second = decode(raw, index, &layout).expect("in layout");
            prop_assert_eq!(first.ber.to_bits(), second.ber.to_bits());
            prop_assert_eq!(first.delay_ns.to_bits(), second.delay_ns.to_bits());
            prop_assert_eq!(first.connected, second.connected);
            prop_assert!((0.0..=1.0).contains(&first.ber));

            let profile = ClockProfile::for_group(layout.group_of(index).expect("in layout"));
            if raw & 0x03FF_FFFF >= profile.divisor {
                prop_assert_eq!(first.ber, 1.0);
            }
        }
    }
}
