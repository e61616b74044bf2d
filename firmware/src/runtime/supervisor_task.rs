use embassy_futures::select::{Either, select};
use embassy_stm32::exti::ExtiInput;
use embassy_time::{Duration, Timer};
use portable_atomic::Ordering;

use pco2_core::sched::AlarmOutcome;
use pco2_core::supervisor::Supervisor;

use super::IDLE;
use super::devices::{
    BlockingPauser, CycleWatchdog, DefmtRunSink, ExternalRtc, HumidityProbe, InfraredAnalyzer,
    OxygenCell, ValveBank,
};

pub type InstrumentSupervisor = Supervisor<
    ExternalRtc<'static>,
    InfraredAnalyzer<'static>,
    OxygenCell<'static>,
    HumidityProbe<'static>,
    ValveBank<'static>,
    CycleWatchdog,
    BlockingPauser,
    DefmtRunSink,
>;

/// Backup wake-up in case the RTC interrupt line is ever missed.
const ALARM_WAIT_CEILING: Duration = Duration::from_secs(6 * 3_600);

/// Retry delay after an RTC failure while arming the alarm.
const ALARM_RETRY: Duration = Duration::from_secs(60);

/// Idle poll period while the schedule is empty.
const IDLE_POLL: Duration = Duration::from_secs(600);

#[embassy_executor::task]
pub async fn run(mut supervisor: InstrumentSupervisor, mut alarm_line: ExtiInput<'static>) -> ! {
    if let Err(error) = supervisor.prime_schedule() {
        defmt::warn!("schedule priming failed: {}", error);
    }
    let mut outcome = supervisor.resume();

    loop {
        match outcome {
            Ok(AlarmOutcome::Armed(at)) => {
                defmt::info!("sleeping until {}", at);
                IDLE.store(true, Ordering::Relaxed);
                let wake = select(
                    alarm_line.wait_for_falling_edge(),
                    Timer::after(ALARM_WAIT_CEILING),
                )
                .await;
                IDLE.store(false, Ordering::Relaxed);
                outcome = match wake {
                    Either::First(()) => supervisor.service_alarm(),
                    Either::Second(()) => {
                        // The ceiling fired without an interrupt. The head
                        // task may still be hours out (a long period with
                        // nothing else queued), so re-arm instead of firing
                        // it early. Late means it really is due, and the
                        // next loop pass services it.
                        defmt::warn!("alarm interrupt never arrived; re-arming");
                        supervisor.rearm()
                    }
                };
            }
            Ok(AlarmOutcome::Late) => {
                // Another task shared the same wake-up.
                outcome = supervisor.service_alarm();
            }
            Ok(AlarmOutcome::Idle) => {
                defmt::info!("schedule empty, re-priming");
                IDLE.store(true, Ordering::Relaxed);
                Timer::after(IDLE_POLL).await;
                IDLE.store(false, Ordering::Relaxed);
                if let Err(error) = supervisor.prime_schedule() {
                    defmt::warn!("schedule priming failed: {}", error);
                }
                outcome = supervisor.resume();
            }
            Err(error) => {
                defmt::warn!("alarm arming failed: {}", error);
                IDLE.store(true, Ordering::Relaxed);
                Timer::after(ALARM_RETRY).await;
                IDLE.store(false, Ordering::Relaxed);
                outcome = supervisor.resume();
            }
        }
    }
}
