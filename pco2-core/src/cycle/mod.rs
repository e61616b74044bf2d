//! Measurement cycle state machine.
//!
//! One run walks a fixed linear phase sequence: analyzer configuration,
//! zero gas, span gas, seawater equilibration, atmospheric air, and an
//! optional moisture purge, ending at rest. Every pump-on phase is followed
//! by a bounded sampling window; every pump-off is a settle/vent/stabilize
//! dance before its own window. Any phase failure aborts the whole run to
//! rest; only the purge tolerates partial failure, by design.

pub mod config;
pub mod result;

use heapless::Vec;

use crate::calendar::Timestamp;
use crate::cycle::config::{
    Configuration, O2_REFERENCE_PERCENT, VENT_CLOSE_STABILIZE_SECS,
};
use crate::cycle::result::{
    ChannelStats, MAX_PHASE_RECORDS, PhaseStats, RunOutcome, RunResult, SampleMode,
};
use crate::hal::stats::{RunningStats, StatsAccumulator};
use crate::hal::{
    Clock, FlowController, GasAnalyzer, GasSample, HumiditySensor, OxygenSensor, Pauser,
    RhReading, ValvePosition, Watchdog,
};
use crate::telemetry::{CalKind, EventKind, TelemetryRecorder};

/// Every state the cycle can occupy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CyclePhase {
    Config,
    ZeroPumpOn,
    ZeroPumpOff,
    ZeroPostCal,
    SpanPumpOn,
    SpanPumpOff,
    SpanPostCal,
    EquilPumpOn,
    EquilPumpOff,
    AirPumpOn,
    AirPumpOff,
    Purge1,
    Purge2,
    Purge3,
    Purge4,
    Purge5,
    Purge6,
    Purge7,
    Purge8,
    Rest,
    Deploy,
}

impl CyclePhase {
    /// Short label used in reports and diagnostics output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            CyclePhase::Config => "CFG",
            CyclePhase::ZeroPumpOn => "ZPON",
            CyclePhase::ZeroPumpOff => "ZPOFF",
            CyclePhase::ZeroPostCal => "ZPPCAL",
            CyclePhase::SpanPumpOn => "SPON",
            CyclePhase::SpanPumpOff => "SPOFF",
            CyclePhase::SpanPostCal => "SPPCAL",
            CyclePhase::EquilPumpOn => "EPON",
            CyclePhase::EquilPumpOff => "EPOFF",
            CyclePhase::AirPumpOn => "APON",
            CyclePhase::AirPumpOff => "APOFF",
            CyclePhase::Purge1 => "PRG1",
            CyclePhase::Purge2 => "PRG2",
            CyclePhase::Purge3 => "PRG3",
            CyclePhase::Purge4 => "PRG4",
            CyclePhase::Purge5 => "PRG5",
            CyclePhase::Purge6 => "PRG6",
            CyclePhase::Purge7 => "PRG7",
            CyclePhase::Purge8 => "PRG8",
            CyclePhase::Rest => "REST",
            CyclePhase::Deploy => "DEPLOY",
        }
    }

    /// Deterministic index for compact telemetry codes.
    #[must_use]
    pub const fn as_index(self) -> u16 {
        match self {
            CyclePhase::Config => 0,
            CyclePhase::ZeroPumpOn => 1,
            CyclePhase::ZeroPumpOff => 2,
            CyclePhase::ZeroPostCal => 3,
            CyclePhase::SpanPumpOn => 4,
            CyclePhase::SpanPumpOff => 5,
            CyclePhase::SpanPostCal => 6,
            CyclePhase::EquilPumpOn => 7,
            CyclePhase::EquilPumpOff => 8,
            CyclePhase::AirPumpOn => 9,
            CyclePhase::AirPumpOff => 10,
            CyclePhase::Purge1 => 11,
            CyclePhase::Purge2 => 12,
            CyclePhase::Purge3 => 13,
            CyclePhase::Purge4 => 14,
            CyclePhase::Purge5 => 15,
            CyclePhase::Purge6 => 16,
            CyclePhase::Purge7 => 17,
            CyclePhase::Purge8 => 18,
            CyclePhase::Rest => 19,
            CyclePhase::Deploy => 20,
        }
    }

    /// Attempts to construct a phase from a raw telemetry index.
    #[must_use]
    pub const fn from_index(index: u16) -> Option<Self> {
        match index {
            0 => Some(CyclePhase::Config),
            1 => Some(CyclePhase::ZeroPumpOn),
            2 => Some(CyclePhase::ZeroPumpOff),
            3 => Some(CyclePhase::ZeroPostCal),
            4 => Some(CyclePhase::SpanPumpOn),
            5 => Some(CyclePhase::SpanPumpOff),
            6 => Some(CyclePhase::SpanPostCal),
            7 => Some(CyclePhase::EquilPumpOn),
            8 => Some(CyclePhase::EquilPumpOff),
            9 => Some(CyclePhase::AirPumpOn),
            10 => Some(CyclePhase::AirPumpOff),
            11 => Some(CyclePhase::Purge1),
            12 => Some(CyclePhase::Purge2),
            13 => Some(CyclePhase::Purge3),
            14 => Some(CyclePhase::Purge4),
            15 => Some(CyclePhase::Purge5),
            16 => Some(CyclePhase::Purge6),
            17 => Some(CyclePhase::Purge7),
            18 => Some(CyclePhase::Purge8),
            19 => Some(CyclePhase::Rest),
            20 => Some(CyclePhase::Deploy),
            _ => None,
        }
    }
}

/// Why a phase gave up.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AbortCause {
    /// The flow controller refused the valve transition.
    ModeChangeFailed,
    /// The analyzer rejected its operating configuration.
    AnalyzerConfigFailed,
    /// A sampling window lost too many readings.
    SampleCountOutOfTolerance { realized: u32, expected: u32 },
    /// A zero, span, or oxygen calibration call failed outright.
    CalibrationFailed,
}

/// A phase failure, fatal to the current run only.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseAbort {
    pub phase: CyclePhase,
    pub cause: AbortCause,
}

impl PhaseAbort {
    #[must_use]
    pub const fn new(phase: CyclePhase, cause: AbortCause) -> Self {
        Self { phase, cause }
    }
}

/// Realized sample counts must land within 90..110 % of nominal.
#[must_use]
pub const fn count_within_tolerance(realized: u32, nominal: u32) -> bool {
    realized * 10 >= nominal * 9 && realized * 10 <= nominal * 11
}

/// Dry CO2 mole fraction for one phase, corrected against the span
/// reference humidity: `svp = 0.61365 * exp(17.502 T / (240.97 + T))`,
/// `vapor = (RH - RH_span) * svp / 100`, `xCO2 = CO2 / ((P - vapor) / P)`.
#[must_use]
pub fn dry_mole_fraction(phase: &PhaseStats, span_rh_percent: f32) -> f32 {
    let temperature = phase.cell_temperature.mean;
    let svp_kpa = 0.613_65 * libm::expf(17.502 * temperature / (240.97 + temperature));
    let vapor_kpa = (phase.humidity.mean - span_rh_percent) * svp_kpa / 100.0;
    let pressure = phase.cell_pressure.mean;
    phase.co2.mean / ((pressure - vapor_kpa) / pressure)
}

const PURGE_STEPS: [(CyclePhase, ValvePosition); 8] = [
    (CyclePhase::Purge1, ValvePosition::Purge1),
    (CyclePhase::Purge2, ValvePosition::Purge2),
    (CyclePhase::Purge3, ValvePosition::Purge3),
    (CyclePhase::Purge4, ValvePosition::Purge4),
    (CyclePhase::Purge5, ValvePosition::Purge5),
    (CyclePhase::Purge6, ValvePosition::Purge6),
    (CyclePhase::Purge7, ValvePosition::Purge7),
    (CyclePhase::Purge8, ValvePosition::Purge8),
];

/// Drives one measurement cycle through its collaborators.
pub struct CycleController<Gas, Oxy, Rh, Flow, Dog, Sleep> {
    config: Configuration,
    analyzer: Gas,
    oxygen: Oxy,
    humidity: Rh,
    flow: Flow,
    watchdog: Dog,
    pauser: Sleep,
    telemetry: TelemetryRecorder,
}

impl<Gas, Oxy, Rh, Flow, Dog, Sleep> CycleController<Gas, Oxy, Rh, Flow, Dog, Sleep>
where
    Gas: GasAnalyzer,
    Oxy: OxygenSensor,
    Rh: HumiditySensor,
    Flow: FlowController,
    Dog: Watchdog,
    Sleep: Pauser,
{
    /// Assembles a controller from its collaborators.
    pub const fn with_components(
        config: Configuration,
        analyzer: Gas,
        oxygen: Oxy,
        humidity: Rh,
        flow: Flow,
        watchdog: Dog,
        pauser: Sleep,
    ) -> Self {
        Self {
            config,
            analyzer,
            oxygen,
            humidity,
            flow,
            watchdog,
            pauser,
            telemetry: TelemetryRecorder::new(),
        }
    }

    /// Current cycle configuration.
    pub const fn config(&self) -> &Configuration {
        &self.config
    }

    /// Replaces the cycle configuration before the next run.
    pub fn set_config(&mut self, config: Configuration) {
        self.config = config;
    }

    /// Recorded telemetry.
    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    /// Mutable telemetry access for the supervisor's own events.
    pub fn telemetry_mut(&mut self) -> &mut TelemetryRecorder {
        &mut self.telemetry
    }

    /// Runs one complete measurement cycle and always produces a report.
    ///
    /// A phase failure aborts to rest and is fatal to this run only; the
    /// report still carries everything measured up to the failing phase.
    pub fn run_cycle<Clk: Clock>(
        &mut self,
        clock: &mut Clk,
        mode: SampleMode,
        with_purge: bool,
    ) -> RunResult {
        let started_at = clock.now();
        let mut run = RunData::new(mode, started_at);

        let outcome = match self.execute(clock, &mut run, with_purge) {
            Ok(()) => RunOutcome::Completed,
            Err(abort) => {
                self.telemetry
                    .record(EventKind::RunAborted(abort.phase), clock.now());
                self.force_rest();
                RunOutcome::Aborted(abort)
            }
        };

        let (dry_seawater, dry_air) = self.dry_corrections(&run, &outcome);
        run.into_result(outcome, dry_seawater, dry_air)
    }

    /// Parks the flow path for deployment.
    ///
    /// # Errors
    /// [`PhaseAbort`] when the valve transition fails.
    pub fn park_for_deployment<Clk: Clock>(&mut self, clock: &mut Clk) -> Result<(), PhaseAbort> {
        self.begin_phase(clock, CyclePhase::Deploy);
        self.set_flow(CyclePhase::Deploy, ValvePosition::Deploy)?;
        self.analyzer.power_off();
        Ok(())
    }

    /// Standalone O2 self-calibration with ambient air flowing.
    ///
    /// # Errors
    /// [`PhaseAbort`] when a valve transition or the calibration fails.
    pub fn calibrate_oxygen<Clk: Clock>(&mut self, clock: &mut Clk) -> Result<(), PhaseAbort> {
        self.begin_phase(clock, CyclePhase::AirPumpOn);
        self.set_flow(CyclePhase::AirPumpOn, ValvePosition::AirPumpOn)?;
        self.wait_secs(self.config.pump_on_secs);
        let outcome = self
            .oxygen
            .self_calibrate(O2_REFERENCE_PERCENT)
            .map_err(|_| PhaseAbort::new(CyclePhase::AirPumpOn, AbortCause::CalibrationFailed));
        self.telemetry.record(
            match outcome {
                Ok(()) => EventKind::CalibrationApplied(CalKind::Oxygen),
                Err(_) => EventKind::CalibrationSkipped(CalKind::Oxygen),
            },
            clock.now(),
        );
        self.set_flow(CyclePhase::Rest, ValvePosition::Rest)?;
        outcome
    }

    fn execute<Clk: Clock>(
        &mut self,
        clock: &mut Clk,
        run: &mut RunData,
        with_purge: bool,
    ) -> Result<(), PhaseAbort> {
        self.run_config(clock)?;
        self.run_zero(clock, run)?;
        self.run_span(clock, run)?;
        self.run_equilibrate(clock, run)?;
        self.run_air(clock, run)?;
        if with_purge {
            self.run_purge(clock, run);
        }

        self.begin_phase(clock, CyclePhase::Rest);
        self.set_flow(CyclePhase::Rest, ValvePosition::Rest)?;
        self.analyzer.power_off();
        Ok(())
    }

    fn run_config<Clk: Clock>(&mut self, clock: &mut Clk) -> Result<(), PhaseAbort> {
        self.begin_phase(clock, CyclePhase::Config);
        self.analyzer.power_on();
        self.wait_secs(self.config.warmup_secs);
        self.analyzer
            .configure()
            .map_err(|_| PhaseAbort::new(CyclePhase::Config, AbortCause::AnalyzerConfigFailed))
    }

    fn run_zero<Clk: Clock>(&mut self, clock: &mut Clk, run: &mut RunData) -> Result<(), PhaseAbort> {
        self.pump_on_sample(
            clock,
            run,
            CyclePhase::ZeroPumpOn,
            ValvePosition::ZeroPumpOn,
            self.config.pump_on_secs,
        )?;
        self.settled_pump_off_sample(
            clock,
            run,
            CyclePhase::ZeroPumpOff,
            ValvePosition::ZeroPumpOff,
            ValvePosition::ZeroVent,
        )?;

        if self.config.zero_cal_enabled {
            self.analyzer.calibrate_zero().map_err(|_| {
                PhaseAbort::new(CyclePhase::ZeroPostCal, AbortCause::CalibrationFailed)
            })?;
            run.zero_calibrated = true;
            self.telemetry
                .record(EventKind::CalibrationApplied(CalKind::Zero), clock.now());

            self.begin_phase(clock, CyclePhase::ZeroPostCal);
            self.set_flow(CyclePhase::ZeroPostCal, ValvePosition::ZeroPostCal)?;
            self.wait_secs(VENT_CLOSE_STABILIZE_SECS);
            let stats = self.sample(clock, CyclePhase::ZeroPostCal)?;
            run.push(stats);
        } else {
            self.telemetry
                .record(EventKind::CalibrationSkipped(CalKind::Zero), clock.now());
        }
        Ok(())
    }

    fn run_span<Clk: Clock>(&mut self, clock: &mut Clk, run: &mut RunData) -> Result<(), PhaseAbort> {
        self.pump_on_sample(
            clock,
            run,
            CyclePhase::SpanPumpOn,
            ValvePosition::SpanPumpOn,
            self.config.span_flow_on_secs,
        )?;
        self.settled_pump_off_sample(
            clock,
            run,
            CyclePhase::SpanPumpOff,
            ValvePosition::SpanPumpOff,
            ValvePosition::SpanVent,
        )?;

        // The pressure drop from pump-on to pump-off proves span gas
        // actually flowed; without it a calibration would train the
        // analyzer on stale cell contents.
        let pressure_drop = run.pressure_mean(CyclePhase::SpanPumpOn)
            - run.pressure_mean(CyclePhase::SpanPumpOff);
        if pressure_drop > self.config.span_pressure_threshold_kpa {
            self.analyzer
                .calibrate_span(self.config.span_ppm)
                .map_err(|_| {
                    PhaseAbort::new(CyclePhase::SpanPostCal, AbortCause::CalibrationFailed)
                })?;
            run.span_calibrated = true;
            self.telemetry
                .record(EventKind::CalibrationApplied(CalKind::Span), clock.now());

            self.begin_phase(clock, CyclePhase::SpanPostCal);
            self.set_flow(CyclePhase::SpanPostCal, ValvePosition::SpanPostCal)?;
            self.wait_secs(VENT_CLOSE_STABILIZE_SECS);
            let stats = self.sample(clock, CyclePhase::SpanPostCal)?;
            run.push(stats);
        } else {
            run.span_skipped = true;
            self.telemetry
                .record(EventKind::CalibrationSkipped(CalKind::Span), clock.now());
        }
        Ok(())
    }

    fn run_equilibrate<Clk: Clock>(
        &mut self,
        clock: &mut Clk,
        run: &mut RunData,
    ) -> Result<(), PhaseAbort> {
        // Equilibration follows a potentially long idle gap, so the
        // analyzer gets a full power cycle and warm-up.
        self.analyzer.power_off();
        self.begin_phase(clock, CyclePhase::EquilPumpOn);
        self.set_flow(CyclePhase::EquilPumpOn, ValvePosition::EquilPumpOn)?;
        self.wait_secs(self.config.pre_equil_secs());
        self.analyzer.power_on();
        self.wait_secs(self.config.warmup_secs);
        self.analyzer.configure().map_err(|_| {
            PhaseAbort::new(CyclePhase::EquilPumpOn, AbortCause::AnalyzerConfigFailed)
        })?;

        let stats = self.sample(clock, CyclePhase::EquilPumpOn)?;
        run.push(stats);
        self.settled_pump_off_sample(
            clock,
            run,
            CyclePhase::EquilPumpOff,
            ValvePosition::EquilPumpOff,
            ValvePosition::EquilVent,
        )
    }

    fn run_air<Clk: Clock>(&mut self, clock: &mut Clk, run: &mut RunData) -> Result<(), PhaseAbort> {
        self.pump_on_sample(
            clock,
            run,
            CyclePhase::AirPumpOn,
            ValvePosition::AirPumpOn,
            self.config.pump_on_secs,
        )?;
        self.settled_pump_off_sample(
            clock,
            run,
            CyclePhase::AirPumpOff,
            ValvePosition::AirPumpOff,
            ValvePosition::AirVent,
        )?;

        // Re-reference the O2 sensor against the ambient air it just saw.
        self.oxygen
            .self_calibrate(O2_REFERENCE_PERCENT)
            .map_err(|_| PhaseAbort::new(CyclePhase::AirPumpOff, AbortCause::CalibrationFailed))?;
        self.telemetry
            .record(EventKind::CalibrationApplied(CalKind::Oxygen), clock.now());
        Ok(())
    }

    // A failed purge sub-phase is counted, not fatal; the remaining
    // sub-phases still get their chance to dry the loop out, and the
    // measurements already taken stay valid. The wait runs either way so
    // the downstream sub-phases keep their drying timing.
    fn run_purge<Clk: Clock>(&mut self, clock: &mut Clk, run: &mut RunData) {
        let waits = self.purge_waits();
        let mut failures: u8 = 0;

        for ((phase, position), wait) in PURGE_STEPS.iter().zip(waits) {
            self.begin_phase(clock, *phase);
            if self.flow.set_mode(*position).is_err() {
                failures = failures.saturating_add(1);
            }
            self.wait_secs(wait);
        }

        run.purge_failures = failures;
    }

    const fn purge_waits(&self) -> [u32; 8] {
        [
            40,
            self.config.purge_secs,
            20,
            self.config.vent_secs,
            self.config.vent_secs,
            60,
            self.config.purge_secs,
            self.config.vent_secs,
        ]
    }

    fn pump_on_sample<Clk: Clock>(
        &mut self,
        clock: &mut Clk,
        run: &mut RunData,
        phase: CyclePhase,
        position: ValvePosition,
        flush_secs: u32,
    ) -> Result<(), PhaseAbort> {
        self.begin_phase(clock, phase);
        self.set_flow(phase, position)?;
        self.wait_secs(flush_secs);
        let stats = self.sample(clock, phase)?;
        run.push(stats);
        Ok(())
    }

    fn settled_pump_off_sample<Clk: Clock>(
        &mut self,
        clock: &mut Clk,
        run: &mut RunData,
        phase: CyclePhase,
        off: ValvePosition,
        vent: ValvePosition,
    ) -> Result<(), PhaseAbort> {
        self.begin_phase(clock, phase);
        self.set_flow(phase, off)?;
        self.wait_secs(self.config.pump_wait_secs());
        self.set_flow(phase, vent)?;
        self.wait_secs(self.config.vent_secs);
        self.set_flow(phase, off)?;
        self.wait_secs(VENT_CLOSE_STABILIZE_SECS);
        let stats = self.sample(clock, phase)?;
        run.push(stats);
        Ok(())
    }

    fn sample<Clk: Clock>(
        &mut self,
        clock: &mut Clk,
        phase: CyclePhase,
    ) -> Result<PhaseStats, PhaseAbort> {
        let nominal = self.config.nominal_sample_count();
        let interval = self.config.sample_interval_millis();
        let started_at = clock.now();
        let mut window = SampleWindow::new();

        for _ in 0..nominal {
            self.watchdog.pet();
            self.analyzer.query();
            self.pauser.pause_millis(interval);
            let Ok(gas) = self.analyzer.read() else {
                continue;
            };
            let oxygen = self.oxygen.read().ok();
            let humidity = self.humidity.read().ok();
            window.add(gas, oxygen, humidity);
        }

        let realized = window.realized_count();
        if !count_within_tolerance(realized, nominal) {
            return Err(PhaseAbort::new(
                phase,
                AbortCause::SampleCountOutOfTolerance {
                    realized,
                    expected: nominal,
                },
            ));
        }
        Ok(window.into_stats(phase, started_at))
    }

    fn dry_corrections(&self, run: &RunData, outcome: &RunOutcome) -> (Option<f32>, Option<f32>) {
        if !matches!(outcome, RunOutcome::Completed) || run.span_skipped || !run.span_calibrated {
            return (None, None);
        }
        let (Some(equil), Some(air), Some(span)) = (
            run.phase(CyclePhase::EquilPumpOff),
            run.phase(CyclePhase::AirPumpOff),
            run.phase(CyclePhase::SpanPostCal),
        ) else {
            return (None, None);
        };

        let span_rh = span.humidity.mean;
        (
            Some(dry_mole_fraction(equil, span_rh)),
            Some(dry_mole_fraction(air, span_rh)),
        )
    }

    fn begin_phase<Clk: Clock>(&mut self, clock: &mut Clk, phase: CyclePhase) {
        self.telemetry
            .record(EventKind::PhaseStarted(phase), clock.now());
    }

    fn set_flow(&mut self, phase: CyclePhase, position: ValvePosition) -> Result<(), PhaseAbort> {
        self.flow
            .set_mode(position)
            .map_err(|_| PhaseAbort::new(phase, AbortCause::ModeChangeFailed))
    }

    // Pets the watchdog once per one-second slice so a long wait can never
    // starve it.
    fn wait_secs(&mut self, seconds: u32) {
        for _ in 0..seconds {
            self.watchdog.pet();
            self.pauser.pause_millis(1_000);
        }
    }

    fn force_rest(&mut self) {
        // The valve driver may itself be the failing collaborator.
        let _ = self.flow.set_mode(ValvePosition::Rest);
        self.analyzer.power_off();
    }
}

/// Accumulators for the eight channels of one sampling window.
struct SampleWindow {
    co2: RunningStats,
    cell_temperature: RunningStats,
    cell_pressure: RunningStats,
    raw_detector: RunningStats,
    raw_reference: RunningStats,
    oxygen: RunningStats,
    humidity: RunningStats,
    humidity_temperature: RunningStats,
}

impl SampleWindow {
    const fn new() -> Self {
        Self {
            co2: RunningStats::new(),
            cell_temperature: RunningStats::new(),
            cell_pressure: RunningStats::new(),
            raw_detector: RunningStats::new(),
            raw_reference: RunningStats::new(),
            oxygen: RunningStats::new(),
            humidity: RunningStats::new(),
            humidity_temperature: RunningStats::new(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn add(&mut self, gas: GasSample, oxygen: Option<f32>, humidity: Option<RhReading>) {
        self.co2.add(gas.co2_ppm);
        self.cell_temperature.add(gas.cell_temperature_c);
        self.cell_pressure.add(gas.cell_pressure_kpa);
        self.raw_detector.add(gas.raw_detector as f32);
        self.raw_reference.add(gas.raw_reference as f32);
        if let Some(percent) = oxygen {
            self.oxygen.add(percent);
        }
        if let Some(reading) = humidity {
            self.humidity.add(reading.rh_percent);
            self.humidity_temperature.add(reading.temperature_c);
        }
    }

    fn realized_count(&self) -> u32 {
        self.co2.count()
    }

    fn into_stats(self, phase: CyclePhase, started_at: Timestamp) -> PhaseStats {
        PhaseStats {
            phase,
            started_at,
            co2: ChannelStats::from_accumulator(&self.co2),
            cell_temperature: ChannelStats::from_accumulator(&self.cell_temperature),
            cell_pressure: ChannelStats::from_accumulator(&self.cell_pressure),
            raw_detector: ChannelStats::from_accumulator(&self.raw_detector),
            raw_reference: ChannelStats::from_accumulator(&self.raw_reference),
            oxygen: ChannelStats::from_accumulator(&self.oxygen),
            humidity: ChannelStats::from_accumulator(&self.humidity),
            humidity_temperature: ChannelStats::from_accumulator(&self.humidity_temperature),
        }
    }
}

/// Mutable run state while the cycle executes.
struct RunData {
    mode: SampleMode,
    started_at: Timestamp,
    phases: Vec<PhaseStats, MAX_PHASE_RECORDS>,
    zero_calibrated: bool,
    span_calibrated: bool,
    span_skipped: bool,
    purge_failures: u8,
}

impl RunData {
    const fn new(mode: SampleMode, started_at: Timestamp) -> Self {
        Self {
            mode,
            started_at,
            phases: Vec::new(),
            zero_calibrated: false,
            span_calibrated: false,
            span_skipped: false,
            purge_failures: 0,
        }
    }

    fn push(&mut self, stats: PhaseStats) {
        // Capacity equals the number of sampling phases in a run.
        let _ = self.phases.push(stats);
    }

    fn phase(&self, phase: CyclePhase) -> Option<&PhaseStats> {
        self.phases.iter().find(|stats| stats.phase == phase)
    }

    fn pressure_mean(&self, phase: CyclePhase) -> f32 {
        self.phase(phase)
            .map_or(0.0, |stats| stats.cell_pressure.mean)
    }

    fn into_result(
        self,
        outcome: RunOutcome,
        dry_seawater_co2_ppm: Option<f32>,
        dry_air_co2_ppm: Option<f32>,
    ) -> RunResult {
        RunResult {
            mode: self.mode,
            started_at: self.started_at,
            phases: self.phases,
            zero_calibrated: self.zero_calibrated,
            span_calibrated: self.span_calibrated,
            span_skipped: self.span_skipped,
            purge_failures: self.purge_failures,
            dry_seawater_co2_ppm,
            dry_air_co2_ppm,
            outcome,
        }
    }
}
