//! Static signal-to-connector map and its pin-map text format.
//!
//! The pin map is a whitespace-delimited table. Lines before the header row
//! (the first row whose first token is `Index`) are preamble. Columns are
//! located by name, so extra columns and column order do not matter:
//!
//! ```text
//! Index Test Connector Loopback Signal_Pair Standard Info
//! 0     0    J1        A        RS422[0,2]  RS422    [U600|9,10,11|U601|3,2,1|9p->17p|10n->4n]
//! ```

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;

use crate::{InterfaceType, PinMapError};

/// Physical connector label such as `J12`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ConnectorId(String);

impl ConnectorId {
    /// Wraps a connector label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The label as written in the pin map.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric suffix after the alphabetic prefix, used for display order.
    ///
    /// # Errors
    ///
    /// Returns [`PinMapError::InvalidConnectorId`] when the label has no
    /// numeric suffix.
    pub fn ordinal(&self) -> Result<u32, PinMapError> {
        self.0
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .parse()
            .map_err(|_| PinMapError::InvalidConnectorId(self.0.clone()))
    }
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Driver/receiver details carried through to reports verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DebugInfo {
    /// Driver reference designator.
    pub driver: String,
    /// Driver pins.
    pub driver_pins: Vec<String>,
    /// Receiver reference designator.
    pub receiver: String,
    /// Receiver pins.
    pub receiver_pins: Vec<String>,
    /// Loopback routes, `driver[polarity]->receiver[polarity]`.
    pub loopbacks: Vec<String>,
}

/// One tested signal.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SignalRecord {
    /// Index into the measurement table.
    pub test_index: usize,
    /// Connector the signal is routed through.
    pub connector: ConnectorId,
    /// Loopback plug label.
    pub loopback: String,
    /// Human-readable signal pair name.
    pub signal_pair: String,
    /// Transceiver type the signal must classify as.
    pub expected_type: InterfaceType,
    /// Driver/receiver details.
    pub debug: DebugInfo,
}

/// Signal records grouped by connector in display order.
///
/// Built once per session; lookups never rescan the record list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMap {
    records: Vec<SignalRecord>,
    groups: IndexMap<ConnectorId, Vec<usize>>,
    by_test_index: BTreeMap<usize, usize>,
}

impl SignalMap {
    /// Groups `records` by the connectors they reference.
    ///
    /// # Errors
    ///
    /// Returns [`PinMapError::InvalidConnectorId`] for a connector label without
    /// a numeric suffix and [`PinMapError::DuplicateTestIndex`] when two records
    /// share a test index.
    pub fn new(records: Vec<SignalRecord>) -> Result<Self, PinMapError> {
        Self::with_connectors(Vec::new(), records)
    }

    /// Groups `records` under a declared connector list.
    ///
    /// Declared connectors keep a (possibly empty) group even when no record
    /// references them; connectors only referenced by records are appended.
    ///
    /// # Errors
    ///
    /// Same as [`SignalMap::new`].
    pub fn with_connectors(
        connectors: Vec<ConnectorId>,
        records: Vec<SignalRecord>,
    ) -> Result<Self, PinMapError> {
        let mut groups: IndexMap<ConnectorId, Vec<usize>> = connectors
            .into_iter()
            .map(|connector| (connector, Vec::new()))
            .collect();
        let mut by_test_index = BTreeMap::new();

        for (position, record) in records.iter().enumerate() {
            if by_test_index.insert(record.test_index, position).is_some() {
                return Err(PinMapError::DuplicateTestIndex(record.test_index));
            }
            groups
                .entry(record.connector.clone())
                .or_default()
                .push(position);
        }

        let mut ordinals = BTreeMap::new();
        for connector in groups.keys() {
            ordinals.insert(connector.clone(), connector.ordinal()?);
        }
        // Stable sort: equal ordinals keep first-appearance order.
        groups.sort_by(|a, _, b, _| ordinals[a].cmp(&ordinals[b]));

        Ok(Self {
            records,
            groups,
            by_test_index,
        })
    }

    /// Parses pin-map text and groups the result.
    ///
    /// # Errors
    ///
    /// Returns any [`parse_pin_map`] or [`SignalMap::new`] error.
    pub fn from_pin_map(text: &str) -> Result<Self, PinMapError> {
        Self::new(parse_pin_map(text)?)
    }

    /// All records in pin-map order.
    #[must_use]
    pub fn records(&self) -> &[SignalRecord] {
        &self.records
    }

    /// Record mapped to `test_index`, if any.
    #[must_use]
    pub fn record(&self, test_index: usize) -> Option<&SignalRecord> {
        self.by_test_index
            .get(&test_index)
            .map(|position| &self.records[*position])
    }

    /// Connectors in display order.
    pub fn connectors(&self) -> impl Iterator<Item = &ConnectorId> {
        self.groups.keys()
    }

    /// Records on `connector` in pin-map order.
    pub fn connector_records<'a>(
        &'a self,
        connector: &ConnectorId,
    ) -> impl Iterator<Item = &'a SignalRecord> + 'a {
        self.groups
            .get(connector)
            .into_iter()
            .flatten()
            .map(|position| &self.records[*position])
    }

    /// Every connector with its records, in display order.
    pub fn groups(&self) -> impl Iterator<Item = (&ConnectorId, Vec<&SignalRecord>)> {
        self.groups.iter().map(|(connector, positions)| {
            (
                connector,
                positions
                    .iter()
                    .map(|position| &self.records[*position])
                    .collect(),
            )
        })
    }

    /// Signal count per connector, in display order.
    pub fn signals_per_connector(&self) -> impl Iterator<Item = (&ConnectorId, usize)> {
        self.groups
            .iter()
            .map(|(connector, positions)| (connector, positions.len()))
    }

    /// Number of mapped signals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when no signals are mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

const HEADER_MARKER: &str = "Index";
const TEST_COLUMN: &str = "Test";
const CONNECTOR_COLUMN: &str = "Connector";
const LOOPBACK_COLUMN: &str = "Loopback";
const SIGNAL_PAIR_COLUMN: &str = "Signal_Pair";
const STANDARD_COLUMN: &str = "Standard";
const INFO_COLUMN: &str = "Info";

struct Columns {
    test: usize,
    connector: usize,
    loopback: Option<usize>,
    signal_pair: usize,
    standard: usize,
    info: usize,
}

impl Columns {
    fn from_header(header: &[&str], line: usize) -> Result<Self, PinMapError> {
        let find = |column: &'static str| header.iter().position(|name| *name == column);
        let require =
            |column: &'static str| find(column).ok_or(PinMapError::MissingColumn { line, column });

        Ok(Self {
            test: require(TEST_COLUMN)?,
            connector: require(CONNECTOR_COLUMN)?,
            loopback: find(LOOPBACK_COLUMN),
            signal_pair: require(SIGNAL_PAIR_COLUMN)?,
            standard: require(STANDARD_COLUMN)?,
            info: require(INFO_COLUMN)?,
        })
    }
}

/// Parses pin-map text into signal records in row order.
///
/// Blank rows and rows starting with `#` after the header are skipped.
///
/// # Errors
///
/// Returns a [`PinMapError`] naming the first offending line.
pub fn parse_pin_map(text: &str) -> Result<Vec<SignalRecord>, PinMapError> {
    let mut lines = text.lines().enumerate().map(|(idx, line)| (idx + 1, line));

    let (header_line, header) = lines
        .by_ref()
        .map(|(line, content)| (line, content.split_whitespace().collect::<Vec<_>>()))
        .find(|(_, tokens)| tokens.first() == Some(&HEADER_MARKER))
        .ok_or(PinMapError::MissingHeader)?;
    let columns = Columns::from_header(&header, header_line)?;

    let mut records = Vec::new();
    for (line, content) in lines {
        let trimmed = content.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        records.push(parse_row(&fields, &columns, line)?);
    }

    log::debug!("parsed {} pin-map rows", records.len());
    Ok(records)
}

fn parse_row(fields: &[&str], columns: &Columns, line: usize) -> Result<SignalRecord, PinMapError> {
    let field = |index: usize, column: &'static str| {
        fields
            .get(index)
            .copied()
            .ok_or(PinMapError::MissingField { line, column })
    };

    let test = field(columns.test, TEST_COLUMN)?;
    let test_index: usize = test.parse().map_err(|_| PinMapError::InvalidTestIndex {
        line,
        value: test.to_string(),
    })?;

    let connector = ConnectorId::new(field(columns.connector, CONNECTOR_COLUMN)?);
    connector.ordinal()?;

    let loopback = match columns.loopback {
        Some(index) => field(index, LOOPBACK_COLUMN)?.to_string(),
        None => String::new(),
    };

    let standard = field(columns.standard, STANDARD_COLUMN)?;
    let expected_type: InterfaceType = standard
        .parse()
        .map_err(|_| PinMapError::UnknownStandard {
            line,
            value: standard.to_string(),
        })?;

    Ok(SignalRecord {
        test_index,
        connector,
        loopback,
        signal_pair: field(columns.signal_pair, SIGNAL_PAIR_COLUMN)?.to_string(),
        expected_type,
        debug: parse_debug_info(field(columns.info, INFO_COLUMN)?, line)?,
    })
}

fn parse_debug_info(raw: &str, line: usize) -> Result<DebugInfo, PinMapError> {
    let malformed = || PinMapError::MalformedInfo {
        line,
        value: raw.to_string(),
    };

    let inner = raw
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(malformed)?;
    let parts: Vec<&str> = inner.split('|').collect();
    if parts.len() < 4 {
        return Err(malformed());
    }

    let pins = |list: &str| -> Vec<String> {
        list.split(',')
            .filter(|pin| !pin.is_empty())
            .map(str::to_string)
            .collect()
    };

    Ok(DebugInfo {
        driver: parts[0].to_string(),
        driver_pins: pins(parts[1]),
        receiver: parts[2].to_string(),
        receiver_pins: pins(parts[3]),
        loopbacks: parts[4..].iter().map(|route| (*route).to_string()).collect(),
    })
}
