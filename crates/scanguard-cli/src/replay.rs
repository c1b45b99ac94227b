//! Offline replay of recorded rosbridge traffic.
//!
//! Input is one rosbridge JSON frame per line (as captured from the socket).
//! Scan and tuning frames drive a local [`Pipeline`]; every completed cycle
//! is written to `out` as the `/collision` publish frame the live node would
//! have sent.  Unparseable lines are logged and skipped.

use std::io::{BufRead, Write};

use scanguard_middleware::rosbridge::{self, Inbound, RosTopics};
use scanguard_runtime::Pipeline;
use scanguard_types::ScanError;
use tracing::{debug, warn};

/// Counters reported at the end of a replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub lines: usize,
    pub scans: usize,
    pub tunings: usize,
    /// Tuning requests refused because the width would go negative.
    pub rejected_tunings: usize,
    pub cycles: usize,
    pub skipped: usize,
}

pub fn replay(
    input: impl BufRead,
    mut out: impl Write,
    topics: &RosTopics,
    pipeline: &mut Pipeline,
) -> Result<ReplaySummary, ScanError> {
    let mut summary = ReplaySummary::default();

    for (n, line) in input.lines().enumerate() {
        let line = line.map_err(|e| ScanError::Parsing(format!("read error at line {}: {e}", n + 1)))?;
        if line.trim().is_empty() {
            continue;
        }
        summary.lines += 1;

        match rosbridge::parse_inbound(&line, topics) {
            Ok(Some(Inbound::Scan(scan))) => {
                summary.scans += 1;
                if let Some(output) = pipeline.process_scan(&scan) {
                    summary.cycles += 1;
                    writeln!(out, "{}", rosbridge::collision_frame(&topics.collision, &output.collision))
                        .map_err(|e| ScanError::Serialization(e.to_string()))?;
                }
            }
            Ok(Some(Inbound::Tuning(delta))) => {
                summary.tunings += 1;
                match pipeline.apply_tuning(delta) {
                    Ok(_) => {}
                    // Logged by the pipeline; the window is unchanged.
                    Err(ScanError::TuningRejected { .. }) => summary.rejected_tunings += 1,
                    Err(e) => return Err(e),
                }
            }
            Ok(None) => debug!(line = n + 1, "ignoring frame"),
            Err(e) => {
                summary.skipped += 1;
                warn!(line = n + 1, error = %e, "skipping frame");
            }
        }
    }

    Ok(summary)
}
