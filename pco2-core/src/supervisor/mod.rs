//! Top-level instrument supervisor.
//!
//! Owns the clock, the schedule, and the cycle controller. The hardware
//! alarm wakes the platform, the platform calls [`Supervisor::service_alarm`],
//! and everything else follows from the task that fires.

use crate::calendar::{CalDuration, Timestamp};
use crate::cycle::CycleController;
use crate::cycle::config::Configuration;
use crate::cycle::result::SampleMode;
use crate::hal::{
    Clock, DeviceError, FlowController, GasAnalyzer, HumiditySensor, OxygenSensor, Pauser,
    RunSink, Watchdog,
};
use crate::sched::{
    AlarmOutcome, CreatedTask, Scheduler, SchedulerError, TaskAction, TaskId,
};
use crate::telemetry::EventKind;

/// Fast-mode occurrences after the first, so the fast window covers
/// `fast_change` at the `fast_interval` cadence.
#[must_use]
pub fn fast_mode_repeats(config: &Configuration) -> i16 {
    let interval = config.fast_interval.total_seconds();
    if interval == 0 {
        return 0;
    }
    let occurrences = config.fast_change.total_seconds() / interval;
    let repeats = occurrences.saturating_sub(1);
    i16::try_from(repeats).unwrap_or(i16::MAX)
}

/// Drives the instrument from hardware alarms to finished run reports.
pub struct Supervisor<Clk, Gas, Oxy, Rh, Flow, Dog, Sleep, Sink> {
    clock: Clk,
    scheduler: Scheduler,
    controller: CycleController<Gas, Oxy, Rh, Flow, Dog, Sleep>,
    sink: Sink,
}

impl<Clk, Gas, Oxy, Rh, Flow, Dog, Sleep, Sink>
    Supervisor<Clk, Gas, Oxy, Rh, Flow, Dog, Sleep, Sink>
where
    Clk: Clock,
    Gas: GasAnalyzer,
    Oxy: OxygenSensor,
    Rh: HumiditySensor,
    Flow: FlowController,
    Dog: Watchdog,
    Sleep: Pauser,
    Sink: RunSink,
{
    /// Assembles a supervisor around an empty schedule.
    pub const fn with_components(
        clock: Clk,
        controller: CycleController<Gas, Oxy, Rh, Flow, Dog, Sleep>,
        sink: Sink,
    ) -> Self {
        Self {
            clock,
            scheduler: Scheduler::new(),
            controller,
            sink,
        }
    }

    /// The cycle controller, for configuration edits and telemetry reads.
    pub const fn controller(&self) -> &CycleController<Gas, Oxy, Rh, Flow, Dog, Sleep> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut CycleController<Gas, Oxy, Rh, Flow, Dog, Sleep> {
        &mut self.controller
    }

    /// The schedule as it currently stands.
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Seeds the post-deployment schedule: fast-mode cycles starting at the
    /// next whole hour, and the standalone O2 self-calibration one
    /// `o2_interval` later.
    ///
    /// # Errors
    /// Propagates scheduler rejection.
    pub fn prime_schedule(&mut self) -> Result<(), SchedulerError> {
        let now = self.clock.now();
        let config = *self.controller.config();
        let first_run = now.next_whole_hour();

        self.scheduler.create_task(
            TaskAction::FastMode,
            first_run,
            config.fast_interval,
            fast_mode_repeats(&config),
            "FAST",
            now,
        )?;
        self.scheduler.create_task(
            TaskAction::OxygenCal,
            first_run + config.o2_interval,
            config.o2_interval,
            -1,
            "O2CAL",
            now,
        )?;
        self.controller
            .telemetry_mut()
            .record(EventKind::TaskQueued, now);
        Ok(())
    }

    /// Queues an operator-requested task at the given due time.
    ///
    /// # Errors
    /// Propagates scheduler rejection.
    pub fn queue_action(
        &mut self,
        action: TaskAction,
        due_at: Timestamp,
        period: CalDuration,
        repeat: i16,
        name: &'static str,
    ) -> Result<CreatedTask, SchedulerError> {
        let now = self.clock.now();
        let created = self
            .scheduler
            .create_task(action, due_at, period, repeat, name, now)?;
        self.controller.telemetry_mut().record(
            if created.deferred {
                EventKind::TaskDeferred
            } else {
                EventKind::TaskQueued
            },
            now,
        );
        Ok(created)
    }

    /// Removes a queued task.
    ///
    /// # Errors
    /// [`SchedulerError::TaskNotFound`] when no queued task matches.
    pub fn delete_task(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        self.scheduler.delete_task(id)
    }

    /// Reconciles the schedule after a reboot and re-arms the hardware
    /// alarm. Tasks the device slept through are re-anchored or dropped by
    /// [`Scheduler::reconcile`].
    ///
    /// # Errors
    /// Propagates an RTC failure while arming the alarm.
    pub fn resume(&mut self) -> Result<AlarmOutcome, DeviceError> {
        let now = self.clock.now();
        self.scheduler.reconcile(now);
        let outcome = self.scheduler.arm_next_alarm(now);
        if let AlarmOutcome::Armed(at) = outcome {
            self.clock.set_alarm(at)?;
            self.controller
                .telemetry_mut()
                .record(EventKind::AlarmArmed, now);
        }
        Ok(outcome)
    }

    /// Runs one alarm service pass: fire the due task, dispatch it, and
    /// re-arm the hardware alarm.
    ///
    /// [`AlarmOutcome::Late`] means another task is already due; the caller
    /// services again instead of sleeping.
    ///
    /// # Errors
    /// Propagates an RTC failure while arming the alarm.
    pub fn service_alarm(&mut self) -> Result<AlarmOutcome, DeviceError> {
        self.clock.clear_alarm();

        if let Some(fired) = self.scheduler.tick() {
            let now = self.clock.now();
            self.controller
                .telemetry_mut()
                .record(EventKind::TaskFired, now);
            self.dispatch(fired.action);
        }

        self.rearm()
    }

    /// Re-arms the hardware alarm without firing anything.
    ///
    /// For wake-ups that cannot be trusted (a backup timer rather than the
    /// RTC interrupt): nothing is ticked and nothing is reconciled, so a
    /// head task that is still in the future keeps its due time.
    /// [`AlarmOutcome::Late`] means the head really is due and the caller
    /// should service it.
    ///
    /// # Errors
    /// Propagates an RTC failure while arming the alarm.
    pub fn rearm(&mut self) -> Result<AlarmOutcome, DeviceError> {
        let now = self.clock.now();
        let outcome = self.scheduler.arm_next_alarm(now);
        match outcome {
            AlarmOutcome::Armed(at) => {
                self.clock.set_alarm(at)?;
                self.controller
                    .telemetry_mut()
                    .record(EventKind::AlarmArmed, now);
            }
            AlarmOutcome::Late => {
                self.controller
                    .telemetry_mut()
                    .record(EventKind::AlarmLate, now);
            }
            AlarmOutcome::Idle => {
                self.controller
                    .telemetry_mut()
                    .record(EventKind::AlarmIdle, now);
            }
        }
        Ok(outcome)
    }

    /// Runs a measurement cycle immediately, outside the schedule.
    pub fn run_now(&mut self, with_purge: bool) {
        self.run_cycle(SampleMode::Normal, with_purge);
    }

    fn dispatch(&mut self, action: TaskAction) {
        match action {
            TaskAction::FastMode => {
                self.run_cycle(SampleMode::Fast, false);
                self.roll_over_to_normal_mode();
            }
            TaskAction::NormalMode => self.run_cycle(SampleMode::Normal, false),
            TaskAction::InstantRun => self.run_cycle(SampleMode::Normal, false),
            TaskAction::InstantRunWithPurge => self.run_cycle(SampleMode::Normal, true),
            TaskAction::OxygenCal => {
                // Failure is already recorded as a skipped calibration.
                let _ = self.controller.calibrate_oxygen(&mut self.clock);
            }
            TaskAction::Deploy => self.deploy(),
        }
    }

    fn run_cycle(&mut self, mode: SampleMode, with_purge: bool) {
        let result = self.controller.run_cycle(&mut self.clock, mode, with_purge);
        self.sink.record_run(&result);
    }

    // Once the fast-mode chain exhausts, the schedule continues on the
    // normal cadence, anchored at the next whole hour.
    fn roll_over_to_normal_mode(&mut self) {
        let has_fast = self
            .scheduler
            .tasks()
            .iter()
            .any(|task| task.action == TaskAction::FastMode);
        if has_fast {
            return;
        }
        let now = self.clock.now();
        let interval = self.controller.config().normal_interval;
        let queued = self.scheduler.create_task(
            TaskAction::NormalMode,
            now.next_whole_hour(),
            interval,
            -1,
            "NORMAL",
            now,
        );
        if queued.is_ok() {
            self.controller
                .telemetry_mut()
                .record(EventKind::TaskQueued, now);
        }
    }

    fn deploy(&mut self) {
        // A deployment wipes the schedule and re-primes it; the park itself
        // is best effort, the new schedule must land either way.
        let _ = self.controller.park_for_deployment(&mut self.clock);
        self.scheduler.delete_all();
        let _ = self.prime_schedule();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Timestamp;
    use crate::cycle::result::RunResult;
    use crate::hal::{GasSample, RhReading, ValvePosition};

    struct FixedClock {
        now: Timestamp,
        armed: Option<Timestamp>,
    }

    impl Clock for FixedClock {
        fn now(&mut self) -> Timestamp {
            self.now
        }

        fn set_alarm(&mut self, at: Timestamp) -> Result<(), DeviceError> {
            self.armed = Some(at);
            Ok(())
        }

        fn clear_alarm(&mut self) {
            self.armed = None;
        }
    }

    struct GoodAnalyzer {
        powered: bool,
    }

    impl GasAnalyzer for GoodAnalyzer {
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
            Ok(())
        }

        fn query(&mut self) {}

        fn read(&mut self) -> Result<GasSample, DeviceError> {
            Ok(GasSample {
                co2_ppm: 412.0,
                cell_temperature_c: 20.0,
                cell_pressure_kpa: 101.3,
                raw_detector: 52_000,
                raw_reference: 51_000,
            })
        }

        fn calibrate_zero(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }

        fn calibrate_span(&mut self, _ppm: f32) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    struct GoodOxygen;

    impl OxygenSensor for GoodOxygen {
        fn read(&mut self) -> Result<f32, DeviceError> {
            Ok(20.9)
        }

        fn self_calibrate(&mut self, _reference_percent: f32) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    struct GoodHumidity;

    impl HumiditySensor for GoodHumidity {
        fn read(&mut self) -> Result<RhReading, DeviceError> {
            Ok(RhReading {
                rh_percent: 45.0,
                temperature_c: 21.0,
            })
        }
    }

    struct GoodFlow;

    impl FlowController for GoodFlow {
        fn set_mode(&mut self, _position: ValvePosition) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    struct NoopWatchdog;

    impl Watchdog for NoopWatchdog {
        fn pet(&mut self) {}
    }

    struct NoopPauser;

    impl Pauser for NoopPauser {
        fn pause_millis(&mut self, _millis: u32) {}
    }

    struct CountingSink {
        runs: usize,
    }

    impl RunSink for CountingSink {
        fn record_run(&mut self, _result: &RunResult) {
            self.runs += 1;
        }
    }

    type TestSupervisor = Supervisor<
        FixedClock,
        GoodAnalyzer,
        GoodOxygen,
        GoodHumidity,
        GoodFlow,
        NoopWatchdog,
        NoopPauser,
        CountingSink,
    >;

    fn supervisor_at(now: Timestamp, config: Configuration) -> TestSupervisor {
        let controller = CycleController::with_components(
            config,
            GoodAnalyzer { powered: false },
            GoodOxygen,
            GoodHumidity,
            GoodFlow,
            NoopWatchdog,
            NoopPauser,
        );
        Supervisor::with_components(
            FixedClock { now, armed: None },
            controller,
            CountingSink { runs: 0 },
        )
    }

    fn ts(hour: u8, minute: u8) -> Timestamp {
        Timestamp::new(2024, 6, 10, hour, minute, 0).expect("valid timestamp")
    }

    #[test]
    fn fast_repeats_cover_the_fast_change_window() {
        let config = Configuration::new();
        // One day at one-hour cadence: 24 occurrences, 23 repeats.
        assert_eq!(fast_mode_repeats(&config), 23);

        let shorter = Configuration {
            fast_change: CalDuration::hours(2),
            ..Configuration::new()
        };
        assert_eq!(fast_mode_repeats(&shorter), 1);

        let degenerate = Configuration {
            fast_interval: CalDuration::ZERO,
            ..Configuration::new()
        };
        assert_eq!(fast_mode_repeats(&degenerate), 0);
    }

    #[test]
    fn prime_schedule_starts_at_the_next_whole_hour() {
        let mut supervisor = supervisor_at(ts(8, 17), Configuration::new());
        supervisor.prime_schedule().expect("prime should succeed");

        let tasks = supervisor.scheduler().tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].action, TaskAction::FastMode);
        assert_eq!(tasks[0].due_at, ts(9, 0));
        assert_eq!(tasks[0].repeat, 23);
        assert_eq!(tasks[1].action, TaskAction::OxygenCal);
        assert_eq!(
            tasks[1].due_at,
            Timestamp::new(2024, 6, 17, 9, 0, 0).expect("valid timestamp")
        );
    }

    #[test]
    fn service_alarm_runs_the_due_cycle_and_rearms() {
        let mut supervisor = supervisor_at(ts(8, 17), Configuration::new());
        supervisor.prime_schedule().expect("prime should succeed");

        supervisor.clock.now = ts(9, 0);
        let outcome = supervisor.service_alarm().expect("alarm service");

        assert_eq!(supervisor.sink.runs, 1);
        assert_eq!(outcome, AlarmOutcome::Armed(ts(10, 0)));
        assert_eq!(supervisor.clock.armed, Some(ts(10, 0)));
    }

    #[test]
    fn exhausted_fast_mode_rolls_over_to_normal() {
        let config = Configuration {
            fast_change: CalDuration::hours(2),
            ..Configuration::new()
        };
        let mut supervisor = supervisor_at(ts(8, 17), config);
        supervisor.prime_schedule().expect("prime should succeed");

        supervisor.clock.now = ts(9, 0);
        supervisor.service_alarm().expect("alarm service");
        supervisor.clock.now = ts(10, 0);
        supervisor.service_alarm().expect("alarm service");

        assert_eq!(supervisor.sink.runs, 2);
        let normal = supervisor
            .scheduler()
            .tasks()
            .iter()
            .find(|task| task.action == TaskAction::NormalMode)
            .expect("normal-mode task queued");
        assert_eq!(normal.repeat, -1);
        assert_eq!(normal.due_at, ts(11, 0));
        assert_eq!(normal.period, CalDuration::hours(3));
    }

    #[test]
    fn normal_mode_rollover_anchors_on_the_next_whole_hour() {
        // A one-entry fast chain: fast_change equals the cadence.
        let config = Configuration {
            fast_change: CalDuration::hours(1),
            ..Configuration::new()
        };
        let mut supervisor = supervisor_at(ts(8, 17), config);
        supervisor.prime_schedule().expect("prime should succeed");

        // The wake-up drifted past the whole hour before the chain ended.
        supervisor.clock.now = ts(9, 17);
        supervisor.service_alarm().expect("alarm service");

        let normal = supervisor
            .scheduler()
            .tasks()
            .iter()
            .find(|task| task.action == TaskAction::NormalMode)
            .expect("normal-mode task queued");
        assert_eq!(normal.due_at, ts(10, 0));
    }

    #[test]
    fn deploy_wipes_and_reprimes_the_schedule() {
        let mut supervisor = supervisor_at(ts(8, 17), Configuration::new());
        supervisor
            .queue_action(
                TaskAction::Deploy,
                ts(8, 30),
                CalDuration::ZERO,
                0,
                "DEPLOY",
            )
            .expect("queue should succeed");

        supervisor.clock.now = ts(8, 30);
        supervisor.service_alarm().expect("alarm service");

        let tasks = supervisor.scheduler().tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].action, TaskAction::FastMode);
        assert_eq!(tasks[0].due_at, ts(9, 0));
        assert_eq!(supervisor.sink.runs, 0);
    }

    #[test]
    fn resume_rebases_a_schedule_the_device_slept_through() {
        let mut supervisor = supervisor_at(ts(8, 17), Configuration::new());
        supervisor.prime_schedule().expect("prime should succeed");

        // The board browned out and came back hours after the first run.
        supervisor.clock.now = ts(11, 40);
        let outcome = supervisor.resume().expect("resume should succeed");

        assert_eq!(outcome, AlarmOutcome::Armed(ts(12, 40)));
        assert_eq!(supervisor.clock.armed, Some(ts(12, 40)));
        assert_eq!(supervisor.sink.runs, 0);
    }

    #[test]
    fn rearm_after_a_spurious_wake_fires_nothing() {
        let mut supervisor = supervisor_at(ts(8, 17), Configuration::new());
        supervisor.prime_schedule().expect("prime should succeed");

        // Woken well before the head task is due.
        supervisor.clock.now = ts(8, 45);
        let outcome = supervisor.rearm().expect("rearm");

        assert_eq!(outcome, AlarmOutcome::Armed(ts(9, 0)));
        assert_eq!(supervisor.clock.armed, Some(ts(9, 0)));
        assert_eq!(supervisor.sink.runs, 0);
        // The head task keeps its due time.
        assert_eq!(supervisor.scheduler().tasks()[0].due_at, ts(9, 0));
    }

    #[test]
    fn rearm_reports_late_when_the_head_is_due() {
        let mut supervisor = supervisor_at(ts(8, 17), Configuration::new());
        supervisor.prime_schedule().expect("prime should succeed");

        supervisor.clock.now = ts(9, 5);
        let outcome = supervisor.rearm().expect("rearm");

        assert_eq!(outcome, AlarmOutcome::Late);
        assert_eq!(supervisor.sink.runs, 0);
    }

    #[test]
    fn instant_run_with_purge_records_one_report() {
        let mut supervisor = supervisor_at(ts(8, 17), Configuration::new());
        supervisor.run_now(true);
        assert_eq!(supervisor.sink.runs, 1);
    }
}
