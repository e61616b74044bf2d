//! Register-level codecs for the instrument's peripherals.
//!
//! Everything here is pure data transformation so it can be exercised by
//! host tests; the runtime owns the actual bus traffic.

pub mod rtc;
pub mod valves;
