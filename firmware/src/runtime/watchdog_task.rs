use embassy_stm32::peripherals::IWDG;
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_time::{Duration, Timer};
use portable_atomic::Ordering;

use super::IDLE;
use super::devices::HEARTBEAT;

const PET_PERIOD: Duration = Duration::from_secs(4);

/// Pets the hardware watchdog while either the supervisor is idle or a
/// running cycle keeps advancing [`HEARTBEAT`]. A cycle that stalls stops
/// the petting and resets the board.
#[embassy_executor::task]
pub async fn run(mut watchdog: IndependentWatchdog<'static, IWDG>) -> ! {
    watchdog.unleash();
    let mut last_beat = HEARTBEAT.load(Ordering::Relaxed);

    loop {
        Timer::after(PET_PERIOD).await;
        let beat = HEARTBEAT.load(Ordering::Relaxed);
        if beat != last_beat || IDLE.load(Ordering::Relaxed) {
            watchdog.pet();
        }
        last_beat = beat;
    }
}
