//! Concrete device adapters behind the core's hardware seams.
//!
//! Each adapter owns its bus or pins outright; the split keeps register
//! traffic out of the core and lets the codecs in [`crate::hw`] stay pure.

use core::fmt::Write as _;
use core::str;

use embassy_stm32::adc::Adc;
use embassy_stm32::gpio::{Level, Output};
use embassy_stm32::i2c::I2c;
use embassy_stm32::mode::Blocking;
use embassy_stm32::peripherals::{ADC1, PA1};
use embassy_stm32::usart::Uart;
use embassy_time::{Duration, block_for};
use heapless::{String, Vec};
use portable_atomic::{AtomicU32, Ordering};

use pco2_core::calendar::Timestamp;
use pco2_core::cycle::result::{RunOutcome, RunResult};
use pco2_core::hal::{
    Clock, DeviceError, FlowController, GasAnalyzer, GasSample, HumiditySensor, OxygenSensor,
    Pauser, RhReading, RunSink, ValvePosition, Watchdog,
};

use crate::hw::{rtc, valves};

/// Bumped by every watchdog pet from inside a running cycle; the watchdog
/// task forwards progress to the hardware.
pub static HEARTBEAT: AtomicU32 = AtomicU32::new(0);

const RTC_ADDR: u8 = 0x69;
const REG_COUNTERS: u8 = 0x00;
const REG_ALARM: u8 = 0x08;
const REG_INT_MASK: u8 = 0x12;
const ALARM_INTERRUPT_ENABLE: u8 = 0b0000_0100;

const FALLBACK_TIME: Timestamp = match Timestamp::new(2000, 1, 1, 0, 0, 0) {
    Ok(stamp) => stamp,
    Err(_) => panic!("fallback time is valid"),
};

/// External I2C RTC with a hardware alarm output.
pub struct ExternalRtc<'d> {
    bus: I2c<'d, Blocking>,
    last_known: Timestamp,
}

impl<'d> ExternalRtc<'d> {
    pub const fn new(bus: I2c<'d, Blocking>) -> Self {
        Self {
            bus,
            last_known: FALLBACK_TIME,
        }
    }

    fn read_counters(&mut self) -> Result<Timestamp, DeviceError> {
        let mut raw = [0_u8; 8];
        self.bus
            .blocking_write_read(RTC_ADDR, &[REG_COUNTERS], &mut raw)
            .map_err(|_| DeviceError::Link)?;

        let regs = rtc::CalendarRegs {
            hundredths: raw[0],
            seconds: raw[1],
            minutes: raw[2],
            hours: raw[3],
            date: raw[4],
            month: raw[5],
            year: raw[6],
            weekday: raw[7],
        };
        rtc::decode_calendar(&regs).map_err(|_| DeviceError::Rejected)
    }
}

impl Clock for ExternalRtc<'_> {
    fn now(&mut self) -> Timestamp {
        // A transient bus fault must not hand the scheduler a bogus time;
        // the last good reading is the best available answer.
        match self.read_counters() {
            Ok(stamp) => {
                self.last_known = stamp;
                stamp
            }
            Err(_) => self.last_known,
        }
    }

    fn set_alarm(&mut self, at: Timestamp) -> Result<(), DeviceError> {
        let regs = rtc::encode_alarm(&at).map_err(|_| DeviceError::Rejected)?;
        let block = [
            REG_ALARM,
            regs.hundredths,
            regs.seconds,
            regs.minutes,
            regs.hours,
            regs.date,
            regs.month,
            regs.weekday,
        ];
        self.bus
            .blocking_write(RTC_ADDR, &block)
            .map_err(|_| DeviceError::Link)?;
        self.bus
            .blocking_write(RTC_ADDR, &[REG_INT_MASK, ALARM_INTERRUPT_ENABLE])
            .map_err(|_| DeviceError::Link)
    }

    fn clear_alarm(&mut self) {
        let _ = self.bus.blocking_write(RTC_ADDR, &[REG_INT_MASK, 0]);
    }
}

/// Gas loop valve and pump bank, one push-pull line per solenoid.
///
/// Line order matches the bit order of [`valves::drive_pattern`].
pub struct ValveBank<'d> {
    lines: [Output<'d>; 7],
}

impl<'d> ValveBank<'d> {
    pub const fn new(lines: [Output<'d>; 7]) -> Self {
        Self { lines }
    }
}

impl FlowController for ValveBank<'_> {
    fn set_mode(&mut self, position: ValvePosition) -> Result<(), DeviceError> {
        let pattern = valves::drive_pattern(position);
        for (bit, line) in self.lines.iter_mut().enumerate() {
            let level = if pattern & (1 << bit) == 0 {
                Level::Low
            } else {
                Level::High
            };
            line.set_level(level);
        }
        Ok(())
    }
}

const ANALYZER_LINE_CAP: usize = 64;

/// NDIR gas analyzer on a blocking UART, with a switched power rail.
pub struct InfraredAnalyzer<'d> {
    port: Uart<'d, Blocking>,
    power: Output<'d>,
    powered: bool,
}

impl<'d> InfraredAnalyzer<'d> {
    pub const fn new(port: Uart<'d, Blocking>, power: Output<'d>) -> Self {
        Self {
            port,
            power,
            powered: false,
        }
    }

    fn send_line(&mut self, line: &str) -> Result<(), DeviceError> {
        self.port
            .blocking_write(line.as_bytes())
            .map_err(|_| DeviceError::Link)?;
        self.port
            .blocking_write(b"\r\n")
            .map_err(|_| DeviceError::Link)
    }

    fn read_line(&mut self) -> Result<Vec<u8, ANALYZER_LINE_CAP>, DeviceError> {
        let mut line = Vec::new();
        loop {
            let mut byte = [0_u8; 1];
            self.port
                .blocking_read(&mut byte)
                .map_err(|_| DeviceError::Link)?;
            match byte[0] {
                b'\n' => return Ok(line),
                b'\r' => {}
                other => {
                    if line.push(other).is_err() {
                        return Err(DeviceError::Rejected);
                    }
                }
            }
        }
    }

    fn expect_ack(&mut self) -> Result<(), DeviceError> {
        let line = self.read_line()?;
        if line.as_slice() == b"OK" {
            Ok(())
        } else {
            Err(DeviceError::Rejected)
        }
    }
}

impl GasAnalyzer for InfraredAnalyzer<'_> {
    fn power_on(&mut self) {
        self.power.set_high();
        self.powered = true;
    }

    fn power_off(&mut self) {
        self.power.set_low();
        self.powered = false;
    }

    fn is_powered(&self) -> bool {
        self.powered
    }

    fn configure(&mut self) -> Result<(), DeviceError> {
        if !self.powered {
            return Err(DeviceError::Timeout);
        }
        // Streaming off, pump control external, raw counts enabled.
        self.send_line("*C,0,1")?;
        self.expect_ack()
    }

    fn query(&mut self) {
        let _ = self.send_line("*Q");
    }

    fn read(&mut self) -> Result<GasSample, DeviceError> {
        let line = self.read_line()?;
        let text = str::from_utf8(&line).map_err(|_| DeviceError::Rejected)?;
        parse_measurement(text).ok_or(DeviceError::Rejected)
    }

    fn calibrate_zero(&mut self) -> Result<(), DeviceError> {
        self.send_line("*Z")?;
        self.expect_ack()
    }

    fn calibrate_span(&mut self, ppm: f32) -> Result<(), DeviceError> {
        let mut command: String<24> = String::new();
        // Capacity covers the longest span concentration rendering.
        let _ = write!(command, "*S,{ppm:.1}");
        self.send_line(&command)?;
        self.expect_ack()
    }
}

/// Parses the analyzer's `W,<co2>,<temp>,<press>,<raw>,<ref>` record.
fn parse_measurement(text: &str) -> Option<GasSample> {
    let mut fields = text.split(',');
    if fields.next() != Some("W") {
        return None;
    }
    let co2_ppm: f32 = fields.next()?.parse().ok()?;
    let cell_temperature_c: f32 = fields.next()?.parse().ok()?;
    let cell_pressure_kpa: f32 = fields.next()?.parse().ok()?;
    let raw_detector: u32 = fields.next()?.parse().ok()?;
    let raw_reference: u32 = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(GasSample {
        co2_ppm,
        cell_temperature_c,
        cell_pressure_kpa,
        raw_detector,
        raw_reference,
    })
}

/// Galvanic oxygen cell on an ADC channel. The scale factor maps raw counts
/// to percent and is re-anchored by self-calibration.
pub struct OxygenCell<'d> {
    adc: Adc<'d, ADC1>,
    channel: PA1,
    scale: f32,
}

/// Nominal counts-to-percent scale for a fresh cell.
const O2_DEFAULT_SCALE: f32 = 0.006_4;

impl<'d> OxygenCell<'d> {
    pub fn new(adc: Adc<'d, ADC1>, channel: PA1) -> Self {
        Self {
            adc,
            channel,
            scale: O2_DEFAULT_SCALE,
        }
    }

    fn read_counts(&mut self) -> u16 {
        self.adc.blocking_read(&mut self.channel)
    }
}

impl OxygenSensor for OxygenCell<'_> {
    fn read(&mut self) -> Result<f32, DeviceError> {
        let counts = self.read_counts();
        if counts == 0 {
            return Err(DeviceError::Link);
        }
        Ok(f32::from(counts) * self.scale)
    }

    fn self_calibrate(&mut self, reference_percent: f32) -> Result<(), DeviceError> {
        let counts = self.read_counts();
        if counts == 0 {
            return Err(DeviceError::Link);
        }
        self.scale = reference_percent / f32::from(counts);
        Ok(())
    }
}

const RH_ADDR: u8 = 0x44;

/// I2C humidity probe, single-shot high-repeatability conversions.
pub struct HumidityProbe<'d> {
    bus: I2c<'d, Blocking>,
}

impl<'d> HumidityProbe<'d> {
    pub const fn new(bus: I2c<'d, Blocking>) -> Self {
        Self { bus }
    }
}

impl HumiditySensor for HumidityProbe<'_> {
    fn read(&mut self) -> Result<RhReading, DeviceError> {
        self.bus
            .blocking_write(RH_ADDR, &[0x2C, 0x06])
            .map_err(|_| DeviceError::Link)?;
        block_for(Duration::from_millis(20));

        let mut raw = [0_u8; 6];
        self.bus
            .blocking_read(RH_ADDR, &mut raw)
            .map_err(|_| DeviceError::Link)?;

        let t_counts = f32::from(u16::from_be_bytes([raw[0], raw[1]]));
        let rh_counts = f32::from(u16::from_be_bytes([raw[3], raw[4]]));
        Ok(RhReading {
            rh_percent: 100.0 * rh_counts / 65_535.0,
            temperature_c: -45.0 + 175.0 * t_counts / 65_535.0,
        })
    }
}

/// Forwards cycle progress to the watchdog task through [`HEARTBEAT`].
pub struct CycleWatchdog;

impl Watchdog for CycleWatchdog {
    fn pet(&mut self) {
        HEARTBEAT.fetch_add(1, Ordering::Relaxed);
    }
}

/// Busy wait on the embassy time driver. The supervisor runs one cycle at a
/// time, so blocking the executor for the sampling cadence is acceptable.
pub struct BlockingPauser;

impl Pauser for BlockingPauser {
    fn pause_millis(&mut self, millis: u32) {
        block_for(Duration::from_millis(u64::from(millis)));
    }
}

/// Logs finished runs over RTT until the storage backend lands.
pub struct DefmtRunSink;

impl RunSink for DefmtRunSink {
    fn record_run(&mut self, result: &RunResult) {
        match result.outcome {
            RunOutcome::Completed => defmt::info!(
                "run complete: started {} phases {} zero {} span {} purge faults {}",
                result.started_at,
                result.phases.len(),
                result.zero_calibrated,
                result.span_calibrated,
                result.purge_failures,
            ),
            RunOutcome::Aborted(abort) => defmt::warn!(
                "run aborted in {}: {}",
                abort.phase,
                abort.cause,
            ),
        }

        for stats in &result.phases {
            defmt::info!(
                "{=str}: co2 {} ppm (sd {}, n {}) cell {} C {} kPa o2 {} % rh {} %",
                stats.phase.label(),
                stats.co2.mean,
                stats.co2.std_dev,
                stats.co2.count,
                stats.cell_temperature.mean,
                stats.cell_pressure.mean,
                stats.oxygen.mean,
                stats.humidity.mean,
            );
        }
        if let (Some(sea), Some(air)) = (result.dry_seawater_co2_ppm, result.dry_air_co2_ppm) {
            defmt::info!("dry xCO2: seawater {} ppm, air {} ppm", sea, air);
        }
    }
}
