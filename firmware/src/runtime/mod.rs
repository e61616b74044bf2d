use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::Adc;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::time::Hertz;
use embassy_stm32::usart::{self, Uart};
use embassy_stm32::wdg::IndependentWatchdog;
use portable_atomic::AtomicBool;

use pco2_core::cycle::CycleController;
use pco2_core::cycle::config::Configuration;
use pco2_core::supervisor::Supervisor;

mod devices;
mod supervisor_task;
mod watchdog_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Set while the supervisor waits for the next alarm; the watchdog task
/// pets unconditionally in that state.
pub(super) static IDLE: AtomicBool = AtomicBool::new(false);

/// IWDG timeout. Generous against the four-second petting cadence.
const WATCHDOG_TIMEOUT_US: u32 = 20_000_000;

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let p = hal::init(hal::Config::default());

    let rtc_bus = I2c::new_blocking(p.I2C1, p.PB6, p.PB7, Hertz(100_000), Default::default());
    let clock = devices::ExternalRtc::new(rtc_bus);

    let rh_bus = I2c::new_blocking(p.I2C2, p.PA11, p.PA12, Hertz(100_000), Default::default());
    let humidity = devices::HumidityProbe::new(rh_bus);

    let analyzer_port = Uart::new_blocking(p.USART2, p.PA3, p.PA2, usart::Config::default())
        .expect("analyzer usart init");
    let analyzer_power = Output::new(p.PB2, Level::Low, Speed::Low);
    let analyzer = devices::InfraredAnalyzer::new(analyzer_port, analyzer_power);

    let oxygen = devices::OxygenCell::new(Adc::new(p.ADC1), p.PA1);

    let flow = devices::ValveBank::new([
        Output::new(p.PA4, Level::Low, Speed::Low),
        Output::new(p.PA5, Level::Low, Speed::Low),
        Output::new(p.PA6, Level::Low, Speed::Low),
        Output::new(p.PA7, Level::Low, Speed::Low),
        Output::new(p.PA8, Level::Low, Speed::Low),
        Output::new(p.PB0, Level::Low, Speed::Low),
        Output::new(p.PB1, Level::Low, Speed::Low),
    ]);

    let controller = CycleController::with_components(
        Configuration::new(),
        analyzer,
        oxygen,
        humidity,
        flow,
        devices::CycleWatchdog,
        devices::BlockingPauser,
    );
    let supervisor = Supervisor::with_components(clock, controller, devices::DefmtRunSink);

    // RTC interrupt line, open drain on the module, active low.
    let alarm_line = ExtiInput::new(p.PA0, p.EXTI0, Pull::Up);

    let watchdog = IndependentWatchdog::new(p.IWDG, WATCHDOG_TIMEOUT_US);

    spawner
        .spawn(watchdog_task::run(watchdog))
        .expect("failed to spawn watchdog task");
    spawner
        .spawn(supervisor_task::run(supervisor, alarm_line))
        .expect("failed to spawn supervisor task");

    core::future::pending::<()>().await;
}
