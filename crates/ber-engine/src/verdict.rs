//! Per-signal outcome combining classification with the aggregation mask.

use crate::{classify, Aggregation, EngineError, InterfaceType, Measurement, SignalMap, SignalRecord};

/// Outcome for one mapped signal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Outcome {
    /// Connection bit clear; the loopback was never observed.
    NoTest,
    /// Expected transceiver type observed with zero errors.
    Passed {
        /// Classified transceiver type.
        observed: InterfaceType,
        /// Bit-error rate.
        ber: f64,
    },
    /// Observed type differs from the expected one, or errors were counted.
    Mismatch {
        /// Type from the signal map.
        expected: InterfaceType,
        /// Classified transceiver type.
        observed: InterfaceType,
        /// Bit-error rate.
        ber: f64,
    },
}

impl Outcome {
    /// `true` only for [`Outcome::Passed`].
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }
}

/// A signal record paired with its outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalVerdict<'a> {
    /// The mapped signal.
    pub record: &'a SignalRecord,
    /// Its outcome in this snapshot.
    pub outcome: Outcome,
}

/// Judges every mapped signal, connector by connector in display order.
///
/// # Errors
///
/// Returns [`EngineError::IndexOutOfLayout`] for a record whose test index has
/// no measurement or no state-mask entry.
pub fn verdicts<'a>(
    measurements: &[Measurement],
    map: &'a SignalMap,
    aggregation: &Aggregation,
) -> Result<Vec<SignalVerdict<'a>>, EngineError> {
    let mut out = Vec::with_capacity(map.len());
    for (_, records) in map.groups() {
        for record in records {
            let index = record.test_index;
            let out_of_layout = EngineError::IndexOutOfLayout {
                index,
                total: measurements.len(),
            };
            let measurement = measurements.get(index).ok_or_else(|| out_of_layout.clone())?;
            let successful = *aggregation.state_mask.get(index).ok_or(out_of_layout)?;

            out.push(SignalVerdict {
                record,
                outcome: judge(record.expected_type, measurement, successful),
            });
        }
    }
    Ok(out)
}

fn judge(expected: InterfaceType, measurement: &Measurement, successful: bool) -> Outcome {
    if !measurement.connected {
        return Outcome::NoTest;
    }

    let observed = classify(measurement.delay_ns);
    if observed == expected && successful {
        Outcome::Passed {
            observed,
            ber: measurement.ber,
        }
    } else {
        Outcome::Mismatch {
            expected,
            observed,
            ber: measurement.ber,
        }
    }
}
