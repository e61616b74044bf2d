//! Select-line patterns for the valve and pump bank.
//!
//! One byte drives the whole bank through the port expander: one bit per
//! solenoid plus the sample pump. Every flow position resolves to exactly
//! one pattern, so the runtime never sequences individual valves.

#![allow(dead_code)]

use pco2_core::hal::ValvePosition;

pub const PUMP: u8 = 1 << 0;
pub const ZERO_SELECT: u8 = 1 << 1;
pub const SPAN_SELECT: u8 = 1 << 2;
pub const EQUIL_SELECT: u8 = 1 << 3;
pub const AIR_SELECT: u8 = 1 << 4;
pub const VENT: u8 = 1 << 5;
/// Routes flow through the desiccant loop during the purge.
pub const DRY_LOOP: u8 = 1 << 6;

/// Drive pattern for one flow position.
#[must_use]
pub const fn drive_pattern(position: ValvePosition) -> u8 {
    match position {
        ValvePosition::ZeroPumpOn => PUMP | ZERO_SELECT,
        ValvePosition::ZeroPumpOff | ValvePosition::ZeroPostCal => ZERO_SELECT,
        ValvePosition::ZeroVent => ZERO_SELECT | VENT,
        ValvePosition::SpanPumpOn => PUMP | SPAN_SELECT,
        ValvePosition::SpanPumpOff | ValvePosition::SpanPostCal => SPAN_SELECT,
        ValvePosition::SpanVent => SPAN_SELECT | VENT,
        ValvePosition::EquilPumpOn => PUMP | EQUIL_SELECT,
        ValvePosition::EquilPumpOff | ValvePosition::EquilPost => EQUIL_SELECT,
        ValvePosition::EquilVent => EQUIL_SELECT | VENT,
        ValvePosition::AirPumpOn => PUMP | AIR_SELECT,
        ValvePosition::AirPumpOff | ValvePosition::AirPost => AIR_SELECT,
        ValvePosition::AirVent => AIR_SELECT | VENT,
        ValvePosition::Rest => 0,
        // Parked for descent: loop vented, everything else closed.
        ValvePosition::Deploy => VENT,
        ValvePosition::Purge1 => DRY_LOOP | PUMP | AIR_SELECT,
        ValvePosition::Purge2 => DRY_LOOP | PUMP,
        ValvePosition::Purge3 => DRY_LOOP | PUMP | EQUIL_SELECT,
        ValvePosition::Purge4 => DRY_LOOP | VENT,
        ValvePosition::Purge5 => VENT,
        ValvePosition::Purge6 => DRY_LOOP | PUMP | AIR_SELECT,
        ValvePosition::Purge7 => DRY_LOOP | PUMP,
        ValvePosition::Purge8 => VENT,
    }
}
