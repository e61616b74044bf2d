//! Measurement cycle configuration.
//!
//! Every value here is operator-tunable through the excluded CLI and handed
//! to the controller at run start. Derived waits are recomputed from the
//! current values rather than stored, so an edit to one knob cannot leave a
//! stale companion behind.

use crate::calendar::CalDuration;

/// Settle time after the vent valve closes, before sampling resumes.
pub const VENT_CLOSE_STABILIZE_SECS: u32 = 2;

/// Floor for the derived waits; a pump never settles in under two seconds.
pub const MIN_DERIVED_WAIT_SECS: u32 = 2;

/// Atmospheric oxygen reference used for O2 sensor self-calibration.
pub const O2_REFERENCE_PERCENT: f32 = 20.947;

/// Operator-facing cycle configuration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Configuration {
    /// Analyzer warm-up time after power is applied, seconds.
    pub warmup_secs: u32,
    /// Pump-on flush before each sampling window, seconds.
    pub pump_on_secs: u32,
    /// Total pump-off settle budget, seconds. The vent and stabilize waits
    /// are carved out of this; see [`Configuration::pump_wait_secs`].
    pub pump_off_secs: u32,
    /// Vent-open wait during pump-off, seconds.
    pub vent_secs: u32,
    /// Span gas flush before the span sampling window, seconds.
    pub span_flow_on_secs: u32,
    /// Seawater equilibration budget, seconds; the analyzer warm-up is
    /// carved out of this, see [`Configuration::pre_equil_secs`].
    pub equil_secs: u32,
    /// Length of each sampling window, seconds.
    pub sample_secs: u32,
    /// Sampling rate within a window, Hz.
    pub sample_rate_hz: u32,
    /// Purge flow wait used by the long purge sub-phases, seconds.
    pub purge_secs: u32,
    /// Span gas concentration, ppm.
    pub span_ppm: f32,
    /// Minimum pump-on minus pump-off cell pressure difference (kPa) that
    /// proves span gas actually flowed; below this the span calibration is
    /// skipped.
    pub span_pressure_threshold_kpa: f32,
    /// Whether the zero calibration runs at all.
    pub zero_cal_enabled: bool,
    /// Cycle cadence in normal mode.
    pub normal_interval: CalDuration,
    /// Cycle cadence in fast mode, used right after deployment.
    pub fast_interval: CalDuration,
    /// How long after deployment fast mode keeps running.
    pub fast_change: CalDuration,
    /// Cadence of the standalone O2 self-calibration task.
    pub o2_interval: CalDuration,
}

impl Configuration {
    /// Deployment defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            warmup_secs: 120,
            pump_on_secs: 30,
            pump_off_secs: 30,
            vent_secs: 15,
            span_flow_on_secs: 30,
            equil_secs: 240,
            sample_secs: 60,
            sample_rate_hz: 1,
            purge_secs: 30,
            span_ppm: 502.0,
            span_pressure_threshold_kpa: 1.0,
            zero_cal_enabled: true,
            normal_interval: CalDuration::hours(3),
            fast_interval: CalDuration::hours(1),
            fast_change: CalDuration::days(1),
            o2_interval: CalDuration::days(7),
        }
    }

    /// Pump-off settle wait: the configured budget minus the vent and
    /// stabilize carve-outs, floored at [`MIN_DERIVED_WAIT_SECS`].
    #[must_use]
    pub const fn pump_wait_secs(&self) -> u32 {
        let carved = self.vent_secs + VENT_CLOSE_STABILIZE_SECS;
        if self.pump_off_secs > carved + MIN_DERIVED_WAIT_SECS {
            self.pump_off_secs - carved
        } else {
            MIN_DERIVED_WAIT_SECS
        }
    }

    /// Equilibration wait before the analyzer powers back up: the configured
    /// budget minus the warm-up, floored at [`MIN_DERIVED_WAIT_SECS`].
    #[must_use]
    pub const fn pre_equil_secs(&self) -> u32 {
        if self.equil_secs > self.warmup_secs + MIN_DERIVED_WAIT_SECS {
            self.equil_secs - self.warmup_secs
        } else {
            MIN_DERIVED_WAIT_SECS
        }
    }

    /// Nominal sample count for one sampling window.
    #[must_use]
    pub const fn nominal_sample_count(&self) -> u32 {
        self.sample_secs * self.sample_rate_hz
    }

    /// Pacing interval between samples, milliseconds.
    #[must_use]
    pub const fn sample_interval_millis(&self) -> u32 {
        if self.sample_rate_hz == 0 {
            1_000
        } else {
            1_000 / self.sample_rate_hz
        }
    }

    /// Wall-clock estimate for one full cycle, used when sanity-checking a
    /// requested cadence against what a run actually takes.
    #[must_use]
    pub const fn estimated_run_secs(&self) -> u32 {
        let sampling = self.sample_secs;
        let pump_off = self.pump_wait_secs() + self.vent_secs + VENT_CLOSE_STABILIZE_SECS;
        let zero = self.pump_on_secs + sampling + pump_off + sampling
            + VENT_CLOSE_STABILIZE_SECS + sampling;
        let span = self.span_flow_on_secs + sampling + pump_off + sampling
            + VENT_CLOSE_STABILIZE_SECS + sampling;
        let equil = self.pre_equil_secs() + self.warmup_secs + sampling + pump_off + sampling;
        let air = self.pump_on_secs + sampling + pump_off + sampling;
        self.warmup_secs + zero + span + equil + air
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
