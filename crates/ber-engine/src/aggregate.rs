//! Per-connector completion and global pass/fail over one poll snapshot.

use indexmap::IndexMap;

use crate::{ConnectorId, EngineError, Measurement, SignalMap};

/// Successful/total signal counts for one connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ConnectorProgress {
    /// Signals with zero errors and an asserted connection bit.
    pub successful: usize,
    /// Signals mapped to the connector; never zero.
    pub total: usize,
}

impl ConnectorProgress {
    /// Completion ratio in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> f64 {
        self.successful as f64 / self.total as f64
    }

    /// Display band for the current ratio.
    #[must_use]
    pub fn level(&self) -> CompletionLevel {
        CompletionLevel::from_ratio(self.ratio())
    }

    /// `true` when every signal on the connector is successful.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.successful == self.total
    }
}

/// Coarse completion band shown per connector while a test runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CompletionLevel {
    /// No signal successful yet.
    Idle,
    /// At least one signal successful, at most half.
    Started,
    /// More than half of the signals successful.
    Majority,
    /// Every signal successful.
    Complete,
}

impl CompletionLevel {
    /// Maps a completion ratio onto its band.
    #[must_use]
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 1.0 {
            Self::Complete
        } else if ratio > 0.5 {
            Self::Majority
        } else if ratio > 0.0 {
            Self::Started
        } else {
            Self::Idle
        }
    }
}

/// Result of aggregating one poll snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Aggregation {
    /// Progress per connector, in display order.
    pub connectors: IndexMap<ConnectorId, ConnectorProgress>,
    /// Every mapped signal successful.
    pub passed: bool,
    /// Per measurement index: zero errors and connected.
    pub state_mask: Vec<bool>,
}

impl Aggregation {
    /// Completion ratio of `connector`, if it is mapped.
    #[must_use]
    pub fn ratio(&self, connector: &ConnectorId) -> Option<f64> {
        self.connectors.get(connector).map(ConnectorProgress::ratio)
    }

    /// Completion ratio per connector, in display order.
    pub fn ratios(&self) -> impl Iterator<Item = (&ConnectorId, f64)> {
        self.connectors
            .iter()
            .map(|(connector, progress)| (connector, progress.ratio()))
    }

    /// Successful signals across all connectors.
    #[must_use]
    pub fn successful(&self) -> usize {
        self.connectors.values().map(|progress| progress.successful).sum()
    }

    /// Mapped signals across all connectors.
    #[must_use]
    pub fn total(&self) -> usize {
        self.connectors.values().map(|progress| progress.total).sum()
    }
}

/// Success flag per measurement: zero BER and connected in the same read.
#[must_use]
pub fn state_mask(measurements: &[Measurement]) -> Vec<bool> {
    measurements.iter().map(Measurement::is_successful).collect()
}

/// Aggregates one poll snapshot against the signal map.
///
/// Stateless; safe to call on every poll tick.
///
/// # Errors
///
/// Returns [`EngineError::EmptyConnectorGroup`] for a connector with no
/// mapped signals and [`EngineError::IndexOutOfLayout`] for a record whose
/// test index has no measurement.
pub fn aggregate(measurements: &[Measurement], map: &SignalMap) -> Result<Aggregation, EngineError> {
    let state_mask = state_mask(measurements);
    let mut connectors = IndexMap::new();

    for (connector, records) in map.groups() {
        if records.is_empty() {
            return Err(EngineError::EmptyConnectorGroup(connector.clone()));
        }

        let mut successful = 0;
        for record in &records {
            let ok = state_mask
                .get(record.test_index)
                .copied()
                .ok_or(EngineError::IndexOutOfLayout {
                    index: record.test_index,
                    total: measurements.len(),
                })?;
            if ok {
                successful += 1;
            }
        }

        connectors.insert(
            connector.clone(),
            ConnectorProgress {
                successful,
                total: records.len(),
            },
        );
    }

    let aggregation = Aggregation {
        passed: connectors.values().all(ConnectorProgress::is_complete),
        connectors,
        state_mask,
    };
    log::debug!(
        "{}/{} signals successful, passed={}",
        aggregation.successful(),
        aggregation.total(),
        aggregation.passed
    );
    Ok(aggregation)
}
