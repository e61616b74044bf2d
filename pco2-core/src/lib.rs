#![no_std]

// Shared logic for the pCO2 buoy instrument.
//
// This crate stays portable across MCU firmware and host tooling by avoiding
// the Rust standard library and exposing the measurement cycle, scheduler,
// and calendar arithmetic behind capability traits the other crates adopt.

pub mod calendar;
pub mod cycle;
pub mod hal;
pub mod sched;
pub mod supervisor;
pub mod telemetry;
