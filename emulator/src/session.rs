use std::cell::RefCell;
use std::rc::Rc;

use pco2_core::calendar::{CalDuration, Timestamp};
use pco2_core::calendar::text::format_timestamp;
use pco2_core::cycle::CycleController;
use pco2_core::cycle::config::Configuration;
use pco2_core::cycle::result::{RunOutcome, RunResult, SampleMode};
use pco2_core::hal::{
    Clock, DeviceError, FlowController, GasAnalyzer, GasSample, HumiditySensor, OxygenSensor,
    Pauser, RhReading, RunSink, ValvePosition, Watchdog,
};
use pco2_core::sched::AlarmOutcome;
use pco2_core::supervisor::Supervisor;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "run",
        "run          - run one measurement cycle immediately",
    ),
    (
        "advance",
        "advance      - jump the clock to the next alarm and service it",
    ),
    (
        "tasks",
        "tasks        - list the scheduled tasks",
    ),
    (
        "report",
        "report       - reprint the last run report",
    ),
    (
        "telemetry",
        "telemetry    - dump the telemetry ring, oldest first",
    ),
    (
        "help",
        "help [topic] - show help for a command",
    ),
];

/// Which fault script the simulated instrument follows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EmulationProfile {
    /// Every device behaves; `run` samples without purging.
    Normal,
    /// Every device behaves; `run` appends the purge sequence.
    Purge,
    /// The analyzer stops answering during seawater equilibration.
    Abort,
}

impl EmulationProfile {
    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("normal") {
            Ok(Self::Normal)
        } else if tag.eq_ignore_ascii_case("purge") {
            Ok(Self::Purge)
        } else if tag.eq_ignore_ascii_case("abort") {
            Ok(Self::Abort)
        } else {
            Err(format!("Unknown emulation profile `{tag}`"))
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Purge => "purge",
            Self::Abort => "abort",
        }
    }

    fn with_purge(self) -> bool {
        self == Self::Purge
    }

    fn failing_position(self) -> Option<ValvePosition> {
        match self {
            Self::Abort => Some(ValvePosition::EquilPumpOn),
            Self::Normal | Self::Purge => None,
        }
    }
}

/// Shared state of the simulated instrument. The valve position selects
/// which gas stream the analyzer and the humidity sensor see, and the
/// pauser advances the shared clock instead of sleeping.
struct SimState {
    now: Timestamp,
    armed: Option<Timestamp>,
    position: Option<ValvePosition>,
    fail_reads_at: Option<ValvePosition>,
}

impl SimState {
    fn gas_sample(&self) -> GasSample {
        let position = self.position.unwrap_or(ValvePosition::Rest);
        let pumping = matches!(
            position,
            ValvePosition::ZeroPumpOn
                | ValvePosition::SpanPumpOn
                | ValvePosition::EquilPumpOn
                | ValvePosition::AirPumpOn
        );
        let pressure = if pumping { 102.5 } else { 101.3 };
        let (co2, temperature) = match position {
            ValvePosition::ZeroPumpOn | ValvePosition::ZeroPumpOff | ValvePosition::ZeroPostCal => {
                (0.5, 20.0)
            }
            ValvePosition::SpanPumpOn | ValvePosition::SpanPumpOff | ValvePosition::SpanPostCal => {
                (502.0, 20.0)
            }
            ValvePosition::EquilPumpOn | ValvePosition::EquilPumpOff => (415.0, 20.0),
            ValvePosition::AirPumpOn | ValvePosition::AirPumpOff => (418.0, 22.0),
            _ => (400.0, 20.0),
        };
        GasSample {
            co2_ppm: co2,
            cell_temperature_c: temperature,
            cell_pressure_kpa: pressure,
            raw_detector: 52_000,
            raw_reference: 51_000,
        }
    }

    fn rh_reading(&self) -> RhReading {
        let position = self.position.unwrap_or(ValvePosition::Rest);
        let rh = match position {
            ValvePosition::SpanPumpOn | ValvePosition::SpanPumpOff | ValvePosition::SpanPostCal => {
                5.0
            }
            ValvePosition::EquilPumpOn | ValvePosition::EquilPumpOff => 95.0,
            ValvePosition::AirPumpOn | ValvePosition::AirPumpOff => 40.0,
            _ => 10.0,
        };
        RhReading {
            rh_percent: rh,
            temperature_c: 21.0,
        }
    }
}

struct SimClock {
    state: Rc<RefCell<SimState>>,
}

impl Clock for SimClock {
    fn now(&mut self) -> Timestamp {
        self.state.borrow().now
    }

    fn set_alarm(&mut self, at: Timestamp) -> Result<(), DeviceError> {
        self.state.borrow_mut().armed = Some(at);
        Ok(())
    }

    fn clear_alarm(&mut self) {
        self.state.borrow_mut().armed = None;
    }
}

/// Advances the shared clock instead of blocking, so a full cycle runs in
/// host time while its report carries instrument time.
struct SimPauser {
    state: Rc<RefCell<SimState>>,
}

impl Pauser for SimPauser {
    fn pause_millis(&mut self, millis: u32) {
        let step = CalDuration {
            seconds: millis / 1_000,
            hundredths: (millis % 1_000) / 10,
            ..CalDuration::ZERO
        };
        let mut state = self.state.borrow_mut();
        state.now = state.now + step;
    }
}

struct SimAnalyzer {
    state: Rc<RefCell<SimState>>,
    powered: bool,
}

impl GasAnalyzer for SimAnalyzer {
    fn power_on(&mut self) {
        self.powered = true;
    }

    fn power_off(&mut self) {
        self.powered = false;
    }

    fn is_powered(&self) -> bool {
        self.powered
    }

    fn configure(&mut self) -> Result<(), DeviceError> {
        if self.powered {
            Ok(())
        } else {
            Err(DeviceError::Timeout)
        }
    }

    fn query(&mut self) {}

    fn read(&mut self) -> Result<GasSample, DeviceError> {
        let state = self.state.borrow();
        if state.fail_reads_at.is_some() && state.fail_reads_at == state.position {
            return Err(DeviceError::Timeout);
        }
        Ok(state.gas_sample())
    }

    fn calibrate_zero(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn calibrate_span(&mut self, _ppm: f32) -> Result<(), DeviceError> {
        Ok(())
    }
}

struct SimOxygen;

impl OxygenSensor for SimOxygen {
    fn read(&mut self) -> Result<f32, DeviceError> {
        Ok(20.9)
    }

    fn self_calibrate(&mut self, _reference_percent: f32) -> Result<(), DeviceError> {
        Ok(())
    }
}

struct SimHumidity {
    state: Rc<RefCell<SimState>>,
}

impl HumiditySensor for SimHumidity {
    fn read(&mut self) -> Result<RhReading, DeviceError> {
        Ok(self.state.borrow().rh_reading())
    }
}

struct SimFlow {
    state: Rc<RefCell<SimState>>,
}

impl FlowController for SimFlow {
    fn set_mode(&mut self, position: ValvePosition) -> Result<(), DeviceError> {
        self.state.borrow_mut().position = Some(position);
        Ok(())
    }
}

struct SimWatchdog;

impl Watchdog for SimWatchdog {
    fn pet(&mut self) {}
}

#[derive(Default)]
struct RunLog {
    last: Option<RunResult>,
    runs: u32,
}

struct ReportSink {
    log: Rc<RefCell<RunLog>>,
}

impl RunSink for ReportSink {
    fn record_run(&mut self, result: &RunResult) {
        let mut log = self.log.borrow_mut();
        log.last = Some(result.clone());
        log.runs += 1;
    }
}

type EmuSupervisor = Supervisor<
    SimClock,
    SimAnalyzer,
    SimOxygen,
    SimHumidity,
    SimFlow,
    SimWatchdog,
    SimPauser,
    ReportSink,
>;

pub struct Session {
    supervisor: EmuSupervisor,
    state: Rc<RefCell<SimState>>,
    log: Rc<RefCell<RunLog>>,
    profile: EmulationProfile,
}

impl Session {
    pub fn new(profile: EmulationProfile) -> Self {
        let start = Timestamp::new(2024, 6, 10, 8, 0, 0).expect("valid session start");
        let state = Rc::new(RefCell::new(SimState {
            now: start,
            armed: None,
            position: None,
            fail_reads_at: profile.failing_position(),
        }));
        let log = Rc::new(RefCell::new(RunLog::default()));

        let controller = CycleController::with_components(
            Configuration::new(),
            SimAnalyzer {
                state: Rc::clone(&state),
                powered: false,
            },
            SimOxygen,
            SimHumidity {
                state: Rc::clone(&state),
            },
            SimFlow {
                state: Rc::clone(&state),
            },
            SimWatchdog,
            SimPauser {
                state: Rc::clone(&state),
            },
        );
        let mut supervisor = Supervisor::with_components(
            SimClock {
                state: Rc::clone(&state),
            },
            controller,
            ReportSink {
                log: Rc::clone(&log),
            },
        );
        supervisor.prime_schedule().expect("seed the schedule");
        supervisor.resume().expect("arm the first alarm");

        Self {
            supervisor,
            state,
            log,
            profile,
        }
    }

    pub fn handle_command(&mut self, line: &str) -> Vec<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        if trimmed.eq_ignore_ascii_case("help") {
            return help_lines(None);
        }
        if let Some(rest) = trimmed.strip_prefix("help ") {
            return help_lines(Some(rest.trim()));
        }
        if trimmed.eq_ignore_ascii_case("run") {
            return self.handle_run();
        }
        if trimmed.eq_ignore_ascii_case("advance") {
            return self.handle_advance();
        }
        if trimmed.eq_ignore_ascii_case("tasks") {
            return self.handle_tasks();
        }
        if trimmed.eq_ignore_ascii_case("report") {
            return self.handle_report();
        }
        if trimmed.eq_ignore_ascii_case("telemetry") {
            return self.handle_telemetry();
        }

        vec![format!("ERR unknown command `{trimmed}` (try `help`)")]
    }

    fn handle_run(&mut self) -> Vec<String> {
        self.supervisor.run_now(self.profile.with_purge());
        self.handle_report()
    }

    fn handle_advance(&mut self) -> Vec<String> {
        let Some(armed) = self.state.borrow().armed else {
            return vec!["No alarm armed; the schedule is empty.".to_string()];
        };
        {
            let mut state = self.state.borrow_mut();
            if armed > state.now {
                state.now = armed;
            }
        }

        let runs_before = self.log.borrow().runs;
        let mut serviced = 0_u32;
        let outcome = loop {
            serviced += 1;
            match self.supervisor.service_alarm() {
                Ok(AlarmOutcome::Late) => {}
                Ok(outcome) => break outcome,
                Err(error) => return vec![format!("ERR rtc {error:?}")],
            }
        };

        let mut lines = vec![format!(
            "Serviced {serviced} task(s); clock is now {}.",
            format_timestamp(&self.state.borrow().now)
        )];
        if self.log.borrow().runs > runs_before {
            if let Some(result) = self.log.borrow().last.as_ref() {
                lines.extend(describe_report(result));
            }
        }
        match outcome {
            AlarmOutcome::Armed(at) => {
                lines.push(format!("Next alarm {}.", format_timestamp(&at)));
            }
            AlarmOutcome::Idle => lines.push("Schedule idle; nothing left to arm.".to_string()),
            AlarmOutcome::Late => {}
        }
        lines
    }

    fn handle_tasks(&mut self) -> Vec<String> {
        let tasks = self.supervisor.scheduler().tasks();
        if tasks.is_empty() {
            return vec!["Schedule is empty.".to_string()];
        }

        let mut lines = Vec::with_capacity(tasks.len());
        for task in tasks {
            lines.push(format!(
                "{:>3}  {:<6} due {}  period {:>6}s  repeat {}",
                task.id(),
                task.name,
                format_timestamp(&task.due_at),
                task.period.total_seconds(),
                describe_repeat(task.repeat),
            ));
        }
        lines
    }

    fn handle_report(&mut self) -> Vec<String> {
        match self.log.borrow().last.as_ref() {
            Some(result) => describe_report(result),
            None => vec!["No run recorded yet; try `run` or `advance`.".to_string()],
        }
    }

    fn handle_telemetry(&mut self) -> Vec<String> {
        let telemetry = self.supervisor.controller().telemetry();
        if telemetry.is_empty() {
            return vec!["Telemetry ring is empty.".to_string()];
        }

        let mut lines = Vec::with_capacity(telemetry.len());
        for record in telemetry.oldest_first() {
            lines.push(format!(
                "{:>5}  {:>3}  {}  {:?}",
                record.id.value(),
                record.event.to_raw(),
                format_timestamp(&record.at),
                record.event,
            ));
        }
        lines
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) if !target.is_empty() => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        _ => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    let mut buffer = String::new();
    for (index, (name, _)) in HELP_TOPICS.iter().enumerate() {
        if index > 0 {
            buffer.push_str(", ");
        }
        buffer.push_str(name);
    }
    buffer
}

fn describe_repeat(repeat: i16) -> String {
    if repeat < 0 {
        "forever".to_string()
    } else {
        format!("{repeat}")
    }
}

fn describe_report(result: &RunResult) -> Vec<String> {
    let mode = match result.mode {
        SampleMode::Normal => "normal",
        SampleMode::Fast => "fast",
    };
    let mut lines = Vec::new();
    match result.outcome {
        RunOutcome::Completed => lines.push(format!(
            "Run {} mode={mode} completed.",
            format_timestamp(&result.started_at)
        )),
        RunOutcome::Aborted(abort) => lines.push(format!(
            "Run {} mode={mode} ABORTED in {} ({:?}).",
            format_timestamp(&result.started_at),
            abort.phase.label(),
            abort.cause,
        )),
    }

    for stats in &result.phases {
        lines.push(format!(
            "  {:<6} n={:<3} co2 {:7.1} ppm sd {:5.2}  cell {:4.1} C {:5.1} kPa  rh {:4.1} %  o2 {:5.2} %",
            stats.phase.label(),
            stats.co2.count,
            stats.co2.mean,
            stats.co2.std_dev,
            stats.cell_temperature.mean,
            stats.cell_pressure.mean,
            stats.humidity.mean,
            stats.oxygen.mean,
        ));
    }

    lines.push(format!(
        "  zero cal {}  span cal {}{}",
        applied_label(result.zero_calibrated),
        applied_label(result.span_calibrated),
        if result.span_skipped {
            " (pressure gate rejected the span window)"
        } else {
            ""
        },
    ));
    if result.purge_failures > 0 {
        lines.push(format!("  purge failures {}", result.purge_failures));
    }
    match (result.dry_seawater_co2_ppm, result.dry_air_co2_ppm) {
        (Some(sea), Some(air)) => lines.push(format!(
            "  dry co2: seawater {sea:.2} ppm, air {air:.2} ppm"
        )),
        _ => lines.push("  dry co2: withheld".to_string()),
    }
    lines
}

fn applied_label(applied: bool) -> &'static str {
    if applied { "applied" } else { "skipped" }
}
