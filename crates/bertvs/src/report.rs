//! Plain-text report lines for the terminal.

use ber_engine::{
    AddressLayout, CompletionLevel, ConnectorId, ConnectorProgress, FailsafeReport, GroupKind,
    Outcome, SignalMap, SignalVerdict,
};

const fn group_label(kind: GroupKind) -> &'static str {
    match kind {
        GroupKind::DiffA => "DiffA",
        GroupKind::DiffB => "DiffB",
        GroupKind::DiffC => "DiffC",
        GroupKind::Single => "Single",
    }
}

/// One line per signal group plus a total.
#[must_use]
pub fn layout_lines(layout: &AddressLayout) -> Vec<String> {
    let mut lines: Vec<String> = layout
        .groups
        .iter()
        .map(|range| {
            let first = layout.base_offset as usize + range.start;
            format!(
                "{:<6} {:<6} {:>3} register(s)  indices {:>3}..{:<3} addresses 0x{first:04x}..0x{:04x}",
                group_label(range.kind),
                range.kind.bank_label(),
                range.len,
                range.start,
                range.end(),
                first + range.len
            )
        })
        .collect();
    lines.push(format!(
        "total {} test register(s) from 0x{:04x}",
        layout.total_size(),
        layout.base_offset
    ));
    lines
}

/// Failsafe findings, naming the mapped signal where one exists.
#[must_use]
pub fn failsafe_lines(report: &FailsafeReport, map: Option<&SignalMap>) -> Vec<String> {
    report
        .unasserted
        .iter()
        .map(|index| {
            let record = map.and_then(|map| map.record(*index as usize));
            match record {
                Some(record) => format!(
                    "failsafe {index} not asserted: {} {} ({})",
                    record.connector, record.signal_pair, record.expected_type
                ),
                None => format!("failsafe {index} not asserted"),
            }
        })
        .collect()
}

const fn level_label(level: CompletionLevel) -> &'static str {
    match level {
        CompletionLevel::Idle => "idle",
        CompletionLevel::Started => "started",
        CompletionLevel::Majority => "majority",
        CompletionLevel::Complete => "complete",
    }
}

/// Completion summary for one connector.
#[must_use]
pub fn progress_line(connector: &ConnectorId, progress: &ConnectorProgress) -> String {
    format!(
        "{connector:<6} {:>3}/{:<3} {:>5.1}%  {}",
        progress.successful,
        progress.total,
        progress.ratio() * 100.0,
        level_label(progress.level())
    )
}

/// Outcome for one signal, with debug routing on failure.
#[must_use]
pub fn verdict_line(verdict: &SignalVerdict<'_>) -> String {
    let record = verdict.record;
    let prefix = format!(
        "[{:>3}] {} {:<16}",
        record.test_index, record.connector, record.signal_pair
    );
    match verdict.outcome {
        Outcome::NoTest => format!("{prefix} NO TEST  loopback {} not detected", record.loopback),
        Outcome::Passed { observed, ber } => format!("{prefix} PASS     {observed} ber={ber:e}"),
        Outcome::Mismatch {
            expected,
            observed,
            ber,
        } => format!(
            "{prefix} FAIL     expected {expected}, observed {observed}, ber={ber:e}  {} -> {} via {}",
            record.debug.driver,
            record.debug.receiver,
            record.debug.loopbacks.join(",")
        ),
    }
}
