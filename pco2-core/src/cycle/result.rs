//! Per-phase statistics and the end-of-run report.

use heapless::Vec;

use crate::calendar::Timestamp;
use crate::cycle::{CyclePhase, PhaseAbort};
use crate::hal::stats::StatsAccumulator;

/// Sampling phases that produce statistics in one run
/// (ZPON/ZPOFF/ZPPCAL, SPON/SPOFF/SPPCAL, EPON/EPOFF, APON/APOFF).
pub const MAX_PHASE_RECORDS: usize = 10;

/// Sampling cadence the run was started under.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleMode {
    Normal,
    Fast,
}

/// Summary of one measured channel over a sampling window.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ChannelStats {
    pub mean: f32,
    pub std_dev: f32,
    pub count: u32,
}

impl ChannelStats {
    /// Snapshots an accumulator into a summary.
    #[must_use]
    pub fn from_accumulator<A: StatsAccumulator>(accumulator: &A) -> Self {
        Self {
            mean: accumulator.mean(),
            std_dev: accumulator.std_dev(),
            count: accumulator.count(),
        }
    }
}

/// Statistics for every channel sampled during one phase.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PhaseStats {
    pub phase: CyclePhase,
    pub started_at: Timestamp,
    pub co2: ChannelStats,
    pub cell_temperature: ChannelStats,
    pub cell_pressure: ChannelStats,
    pub raw_detector: ChannelStats,
    pub raw_reference: ChannelStats,
    pub oxygen: ChannelStats,
    pub humidity: ChannelStats,
    pub humidity_temperature: ChannelStats,
}

/// How the run ended.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RunOutcome {
    Completed,
    Aborted(PhaseAbort),
}

/// Aggregate report for one measurement cycle, handed to the run sink.
#[derive(Clone, Debug, PartialEq)]
pub struct RunResult {
    pub mode: SampleMode,
    pub started_at: Timestamp,
    pub phases: Vec<PhaseStats, MAX_PHASE_RECORDS>,
    /// Whether the analyzer zero calibration actually ran.
    pub zero_calibrated: bool,
    /// Whether the analyzer span calibration actually ran.
    pub span_calibrated: bool,
    /// Set when the span pressure gate rejected the calibration; the dry
    /// mole fractions are withheld in that case.
    pub span_skipped: bool,
    /// Purge sub-phases whose valve transition failed.
    pub purge_failures: u8,
    /// Dry CO2 mole fraction for the seawater side, ppm.
    pub dry_seawater_co2_ppm: Option<f32>,
    /// Dry CO2 mole fraction for the atmosphere side, ppm.
    pub dry_air_co2_ppm: Option<f32>,
    pub outcome: RunOutcome,
}

impl RunResult {
    /// `true` when the cycle walked every phase without aborting.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed)
    }

    /// Statistics recorded for the given phase, if it was reached.
    #[must_use]
    pub fn phase(&self, phase: CyclePhase) -> Option<&PhaseStats> {
        self.phases.iter().find(|stats| stats.phase == phase)
    }
}
