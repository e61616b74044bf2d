//! Capability traits for the hardware collaborators the core consumes.
//!
//! Register-level drivers (RTC, analyzer line protocol, sensor buses, valve
//! hardware, storage media) live outside this crate; firmware and the host
//! emulator supply concrete implementations of these narrow seams.

pub mod stats;

pub use stats::{RunningStats, StatsAccumulator};

use crate::calendar::Timestamp;
use crate::cycle::result::RunResult;

/// Failure reported by a hardware collaborator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError {
    /// The device did not respond within its protocol timeout.
    Timeout,
    /// The transport to the device failed.
    Link,
    /// The device answered but refused the request.
    Rejected,
}

/// Wall-clock time source with a hardware wake alarm.
pub trait Clock {
    /// Current wall-clock time.
    fn now(&mut self) -> Timestamp;

    /// Arms the hardware alarm for the given wall-clock time.
    ///
    /// # Errors
    /// Propagates the RTC driver failure.
    fn set_alarm(&mut self, at: Timestamp) -> Result<(), DeviceError>;

    /// Disarms any pending hardware alarm.
    fn clear_alarm(&mut self);
}

/// Cooperative wait. The single execution context blocks until the
/// requested number of seconds has elapsed; the mechanism (timer tick,
/// executor sleep, simulated clock) is supplied by the host platform.
pub trait Pauser {
    fn pause_millis(&mut self, millis: u32);
}

/// Hardware watchdog. Long phases must keep petting it; starvation resets
/// the board.
pub trait Watchdog {
    fn pet(&mut self);
}

/// One reading from the gas analyzer.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GasSample {
    /// CO2 mole fraction in ppm, wet.
    pub co2_ppm: f32,
    /// Optical cell temperature in degrees C.
    pub cell_temperature_c: f32,
    /// Optical cell pressure in kPa.
    pub cell_pressure_kpa: f32,
    /// Raw detector count.
    pub raw_detector: u32,
    /// Raw reference count.
    pub raw_reference: u32,
}

/// Gas analyzer power, configuration, sampling, and calibration surface.
pub trait GasAnalyzer {
    /// Applies power to the analyzer. Warm-up is the caller's concern.
    fn power_on(&mut self);

    /// Removes power from the analyzer.
    fn power_off(&mut self);

    /// Reports whether the analyzer is currently powered.
    fn is_powered(&self) -> bool;

    /// Pushes the operating configuration to the analyzer.
    ///
    /// # Errors
    /// Propagates the analyzer protocol failure.
    fn configure(&mut self) -> Result<(), DeviceError>;

    /// Requests a measurement; the result is collected by [`Self::read`].
    fn query(&mut self);

    /// Collects the measurement requested by the preceding [`Self::query`].
    ///
    /// # Errors
    /// Propagates the analyzer protocol failure.
    fn read(&mut self) -> Result<GasSample, DeviceError>;

    /// Runs the analyzer's zero-gas calibration.
    ///
    /// # Errors
    /// Propagates the analyzer protocol failure.
    fn calibrate_zero(&mut self) -> Result<(), DeviceError>;

    /// Runs the analyzer's span-gas calibration at the given concentration.
    ///
    /// # Errors
    /// Propagates the analyzer protocol failure.
    fn calibrate_span(&mut self, ppm: f32) -> Result<(), DeviceError>;
}

/// Oxygen sensor with a self-calibration hook.
pub trait OxygenSensor {
    /// Current O2 concentration in percent.
    ///
    /// # Errors
    /// Propagates the sensor failure.
    fn read(&mut self) -> Result<f32, DeviceError>;

    /// Re-references the sensor against a known concentration.
    ///
    /// # Errors
    /// Propagates the sensor failure.
    fn self_calibrate(&mut self, reference_percent: f32) -> Result<(), DeviceError>;
}

/// Relative humidity reading with its sensor temperature.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RhReading {
    pub rh_percent: f32,
    pub temperature_c: f32,
}

/// Relative humidity sensor.
pub trait HumiditySensor {
    /// Current relative humidity and sensor temperature.
    ///
    /// # Errors
    /// Propagates the sensor failure.
    fn read(&mut self) -> Result<RhReading, DeviceError>;
}

/// Flow path selection for the valve and pump bank.
///
/// Each position is one complete valve/pump configuration; the cycle
/// controller never drives individual valves.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValvePosition {
    ZeroPumpOn,
    ZeroPumpOff,
    ZeroVent,
    ZeroPostCal,
    SpanPumpOn,
    SpanPumpOff,
    SpanVent,
    SpanPostCal,
    EquilPumpOn,
    EquilPumpOff,
    EquilVent,
    EquilPost,
    AirPumpOn,
    AirPumpOff,
    AirVent,
    AirPost,
    Rest,
    Deploy,
    Purge1,
    Purge2,
    Purge3,
    Purge4,
    Purge5,
    Purge6,
    Purge7,
    Purge8,
}

/// Valve and pump bank.
pub trait FlowController {
    /// Moves the flow path to the requested position.
    ///
    /// # Errors
    /// Propagates the valve driver failure.
    fn set_mode(&mut self, position: ValvePosition) -> Result<(), DeviceError>;
}

/// Sink the finished run report is handed to.
pub trait RunSink {
    fn record_run(&mut self, result: &RunResult);
}
