//! Test-register address-space planning from the capability register.

use crate::EngineError;

/// Register holding the tester firmware version.
pub const VERSION_REGISTER: u32 = 0x0000;
/// Register holding the capability word.
pub const CAPABILITY_REGISTER: u32 = 0x0001;
/// First register of the failsafe status bank.
pub const FAILSAFE_REGISTER_BASE: u32 = 0x0004;
/// Number of registers in the failsafe status bank.
pub const FAILSAFE_REGISTER_COUNT: usize = 4;
/// First test register; index 0 of the layout lives here.
pub const TEST_REGISTER_BASE: u32 = 0x0008;

/// Width in bits of each group count in the capability word.
pub const CAPABILITY_FIELD_BITS: u32 = 6;
/// Mask applied to each capability field after shifting.
pub const CAPABILITY_FIELD_MASK: u32 = 0x3F;

const _: () = assert!(
    FAILSAFE_REGISTER_BASE + FAILSAFE_REGISTER_COUNT as u32 <= TEST_REGISTER_BASE,
    "failsafe bank must end before the test registers"
);
const _: () = assert!(
    CAPABILITY_REGISTER < FAILSAFE_REGISTER_BASE,
    "capability register must precede the failsafe bank"
);

/// Signal group, in address-space order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum GroupKind {
    /// First differential group.
    DiffA,
    /// Second differential group.
    DiffB,
    /// Third differential group, counted against a longer window.
    DiffC,
    /// Single-ended group.
    Single,
}

impl GroupKind {
    /// All groups in the order they are laid out.
    pub const ALL: [Self; 4] = [Self::DiffA, Self::DiffB, Self::DiffC, Self::Single];

    /// Bit offset of this group's count inside the capability word.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn capability_shift(self) -> u32 {
        self.position() as u32 * CAPABILITY_FIELD_BITS
    }

    /// Position of this group in [`GroupKind::ALL`].
    #[must_use]
    pub const fn position(self) -> usize {
        match self {
            Self::DiffA => 0,
            Self::DiffB => 1,
            Self::DiffC => 2,
            Self::Single => 3,
        }
    }

    /// Label the bench uses for this register bank.
    #[must_use]
    pub const fn bank_label(self) -> &'static str {
        match self {
            Self::DiffA => "RS422",
            Self::DiffB => "UART",
            Self::DiffC => "LVDS",
            Self::Single => "TTL",
        }
    }
}

/// One contiguous group of test indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct GroupRange {
    /// Group classification.
    pub kind: GroupKind,
    /// First index of the group.
    pub start: usize,
    /// Number of indices in the group.
    pub len: usize,
}

impl GroupRange {
    /// One past the last index of the group.
    #[must_use]
    pub const fn end(self) -> usize {
        self.start + self.len
    }

    /// Returns `true` when `index` belongs to this group.
    #[must_use]
    pub const fn contains(self, index: usize) -> bool {
        index >= self.start && index < self.end()
    }
}

/// Register layout for one connection session.
///
/// Fixed when the device is reset and immutable until the next reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AddressLayout {
    /// Address of test index 0.
    pub base_offset: u32,
    /// Groups in address order; contiguous from index 0.
    pub groups: [GroupRange; 4],
}

impl AddressLayout {
    /// Number of test registers across all groups.
    #[must_use]
    pub const fn total_size(&self) -> usize {
        self.groups[3].end()
    }

    /// Returns the range for `kind`.
    #[must_use]
    pub const fn group(&self, kind: GroupKind) -> GroupRange {
        self.groups[kind.position()]
    }

    /// Resolves which group `index` falls into.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IndexOutOfLayout`] when `index >= total_size()`.
    pub fn group_of(&self, index: usize) -> Result<GroupKind, EngineError> {
        self.groups
            .iter()
            .find(|range| range.contains(index))
            .map(|range| range.kind)
            .ok_or(EngineError::IndexOutOfLayout {
                index,
                total: self.total_size(),
            })
    }

    /// Register address for test index `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IndexOutOfLayout`] when `index >= total_size()`
    /// and [`EngineError::AddressOverflow`] when the address is past `u32::MAX`.
    pub fn register_address(&self, index: usize) -> Result<u32, EngineError> {
        let total = self.total_size();
        if index >= total {
            return Err(EngineError::IndexOutOfLayout { index, total });
        }
        offset_address(self.base_offset, index)
    }

    /// Every test register address in index order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AddressOverflow`] when the block runs past
    /// `u32::MAX`.
    pub fn addresses(&self) -> Result<Vec<u32>, EngineError> {
        (0..self.total_size())
            .map(|index| offset_address(self.base_offset, index))
            .collect()
    }
}

/// Address `offset` registers past `base`.
///
/// # Errors
///
/// Returns [`EngineError::AddressOverflow`] when the result does not fit in
/// 32 bits.
pub fn offset_address(base: u32, offset: usize) -> Result<u32, EngineError> {
    u32::try_from(offset)
        .ok()
        .and_then(|step| base.checked_add(step))
        .ok_or(EngineError::AddressOverflow { base, offset })
}

/// Extracts the signal count of `kind` from a capability word.
#[must_use]
pub const fn capability_count(word: u32, kind: GroupKind) -> usize {
    ((word >> kind.capability_shift()) & CAPABILITY_FIELD_MASK) as usize
}

/// Plans the layout for `word` at the standard [`TEST_REGISTER_BASE`].
#[must_use]
pub const fn plan(word: u32) -> AddressLayout {
    plan_at(word, TEST_REGISTER_BASE)
}

/// Plans the layout for `word` with index 0 at `base_offset`.
///
/// Never fails: each field is masked to six bits and bits above 23 are ignored.
#[must_use]
pub const fn plan_at(word: u32, base_offset: u32) -> AddressLayout {
    let diff_a = capability_count(word, GroupKind::DiffA);
    let diff_b = capability_count(word, GroupKind::DiffB);
    let diff_c = capability_count(word, GroupKind::DiffC);
    let single = capability_count(word, GroupKind::Single);

    AddressLayout {
        base_offset,
        groups: [
            GroupRange {
                kind: GroupKind::DiffA,
                start: 0,
                len: diff_a,
            },
            GroupRange {
                kind: GroupKind::DiffB,
                start: diff_a,
                len: diff_b,
            },
            GroupRange {
                kind: GroupKind::DiffC,
                start: diff_a + diff_b,
                len: diff_c,
            },
            GroupRange {
                kind: GroupKind::Single,
                start: diff_a + diff_b + diff_c,
                len: single,
            },
        ],
    }
}
