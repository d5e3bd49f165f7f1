//! Linear sweep of the output offset.

use crate::config::SweepConfig;
use crate::error::Result;
use crate::trial::TrialOutcome;
use std::fmt::Write as _;
use tracing::{info, warn};

/// One sweep point.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepEntry {
    pub offset_us: i64,
    pub outcome: TrialOutcome<u32>,
}

/// Offsets tried so far and what each trial measured, in sweep order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepRecord {
    entries: Vec<SweepEntry>,
}

impl SweepRecord {
    pub fn push(&mut self, offset_us: i64, outcome: TrialOutcome<u32>) {
        self.entries.push(SweepEntry { offset_us, outcome });
    }

    pub fn entries(&self) -> &[SweepEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the sweep stopped on a failed trial.
    pub fn halted(&self) -> bool {
        self.entries.last().is_some_and(|e| e.outcome.is_failed())
    }

    /// Two-column `offsetUs, glitches` table. Failed trials print as `-1`.
    pub fn to_table(&self) -> String {
        let mut table = String::from("offsetUs, glitches\n");
        for entry in &self.entries {
            let glitches = match &entry.outcome {
                TrialOutcome::Measured(count) => i64::from(*count),
                TrialOutcome::Failed(_) => -1,
            };
            let _ = writeln!(table, "  {}, {}", entry.offset_us, glitches);
        }
        table
    }
}

/// Run `trial` at every offset in `range`, stopping at the first failure.
///
/// The table is printed whether the sweep finished or halted. Transport
/// errors from `trial` propagate immediately.
pub fn run_sweep<F>(range: &SweepConfig, mut trial: F) -> Result<SweepRecord>
where
    F: FnMut(i64) -> Result<TrialOutcome<u32>>,
{
    let mut record = SweepRecord::default();
    info!(
        min = range.offset_min_us,
        max = range.offset_max_us,
        step = range.offset_step_us,
        "starting offset sweep"
    );

    for offset_us in range.offsets() {
        let outcome = trial(offset_us)?;
        let failed = outcome.is_failed();
        if let TrialOutcome::Measured(count) = &outcome {
            println!("offset = {offset_us}, glitches = {count}");
        }
        record.push(offset_us, outcome);
        if failed {
            warn!(offset_us, "trial failed, halting sweep");
            break;
        }
    }

    print!("{}", record.to_table());
    Ok(record)
}
