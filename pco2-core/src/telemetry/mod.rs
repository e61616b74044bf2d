//! In-memory event telemetry.
//!
//! A bounded ring of timestamped events. Old events are overwritten once
//! the ring fills; readers walk oldest-first. Events carry a compact raw
//! code so the firmware can ship them over a byte-oriented link without
//! re-encoding.

use heapless::HistoryBuf;

use crate::calendar::Timestamp;
use crate::cycle::CyclePhase;

/// Events kept in the ring.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Monotonic id assigned to each recorded event.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventId(u32);

impl EventId {
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

/// Which calibration an event refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalKind {
    Zero,
    Span,
    Oxygen,
}

impl CalKind {
    const fn as_index(self) -> u16 {
        match self {
            CalKind::Zero => 0,
            CalKind::Span => 1,
            CalKind::Oxygen => 2,
        }
    }

    const fn from_index(index: u16) -> Option<Self> {
        match index {
            0 => Some(CalKind::Zero),
            1 => Some(CalKind::Span),
            2 => Some(CalKind::Oxygen),
            _ => None,
        }
    }
}

/// Everything the instrument reports about itself.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    /// The cycle entered the given phase.
    PhaseStarted(CyclePhase),
    /// The run aborted in the given phase.
    RunAborted(CyclePhase),
    CalibrationApplied(CalKind),
    CalibrationSkipped(CalKind),
    /// A task was accepted into the schedule.
    TaskQueued,
    /// A due task was dispatched.
    TaskFired,
    /// A past-due request was deferred to the next hour.
    TaskDeferred,
    AlarmArmed,
    AlarmLate,
    AlarmIdle,
}

const RAW_PHASE_STARTED: u16 = 0;
const RAW_RUN_ABORTED: u16 = 100;
const RAW_CAL_APPLIED: u16 = 200;
const RAW_CAL_SKIPPED: u16 = 210;
const RAW_TASK_QUEUED: u16 = 220;
const RAW_TASK_FIRED: u16 = 221;
const RAW_TASK_DEFERRED: u16 = 222;
const RAW_ALARM_ARMED: u16 = 230;
const RAW_ALARM_LATE: u16 = 231;
const RAW_ALARM_IDLE: u16 = 232;

impl EventKind {
    /// Compact wire code: a base per event family plus the phase or
    /// calibration index.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            EventKind::PhaseStarted(phase) => RAW_PHASE_STARTED + phase.as_index(),
            EventKind::RunAborted(phase) => RAW_RUN_ABORTED + phase.as_index(),
            EventKind::CalibrationApplied(kind) => RAW_CAL_APPLIED + kind.as_index(),
            EventKind::CalibrationSkipped(kind) => RAW_CAL_SKIPPED + kind.as_index(),
            EventKind::TaskQueued => RAW_TASK_QUEUED,
            EventKind::TaskFired => RAW_TASK_FIRED,
            EventKind::TaskDeferred => RAW_TASK_DEFERRED,
            EventKind::AlarmArmed => RAW_ALARM_ARMED,
            EventKind::AlarmLate => RAW_ALARM_LATE,
            EventKind::AlarmIdle => RAW_ALARM_IDLE,
        }
    }

    /// Inverse of [`Self::to_raw`].
    #[must_use]
    pub const fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            RAW_PHASE_STARTED..RAW_RUN_ABORTED => match CyclePhase::from_index(raw) {
                Some(phase) => Some(EventKind::PhaseStarted(phase)),
                None => None,
            },
            RAW_RUN_ABORTED..RAW_CAL_APPLIED => {
                match CyclePhase::from_index(raw - RAW_RUN_ABORTED) {
                    Some(phase) => Some(EventKind::RunAborted(phase)),
                    None => None,
                }
            }
            RAW_CAL_APPLIED..RAW_CAL_SKIPPED => {
                match CalKind::from_index(raw - RAW_CAL_APPLIED) {
                    Some(kind) => Some(EventKind::CalibrationApplied(kind)),
                    None => None,
                }
            }
            RAW_CAL_SKIPPED..RAW_TASK_QUEUED => {
                match CalKind::from_index(raw - RAW_CAL_SKIPPED) {
                    Some(kind) => Some(EventKind::CalibrationSkipped(kind)),
                    None => None,
                }
            }
            RAW_TASK_QUEUED => Some(EventKind::TaskQueued),
            RAW_TASK_FIRED => Some(EventKind::TaskFired),
            RAW_TASK_DEFERRED => Some(EventKind::TaskDeferred),
            RAW_ALARM_ARMED => Some(EventKind::AlarmArmed),
            RAW_ALARM_LATE => Some(EventKind::AlarmLate),
            RAW_ALARM_IDLE => Some(EventKind::AlarmIdle),
            _ => None,
        }
    }
}

/// One recorded event.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryRecord {
    pub id: EventId,
    pub at: Timestamp,
    pub event: EventKind,
}

/// Bounded event ring with monotonic ids.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_id: u32,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_id: 0,
        }
    }

    /// Records an event and returns its id.
    pub fn record(&mut self, event: EventKind, at: Timestamp) -> EventId {
        let id = EventId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.ring.write(TelemetryRecord { id, at, event });
        id
    }

    /// Events still in the ring, oldest first.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Most recently recorded event, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u8, minute: u8) -> Timestamp {
        Timestamp::new(2024, 6, 10, hour, minute, 0).expect("valid timestamp")
    }

    #[test]
    fn records_carry_monotonic_ids() {
        let mut recorder: TelemetryRecorder<8> = TelemetryRecorder::new();
        let first = recorder.record(EventKind::TaskQueued, at(9, 0));
        let second = recorder.record(EventKind::TaskFired, at(9, 1));
        assert!(second > first);
        assert_eq!(recorder.len(), 2);
        assert_eq!(
            recorder.latest().expect("latest record").event,
            EventKind::TaskFired
        );
    }

    #[test]
    fn ring_overwrites_oldest_when_full() {
        let mut recorder: TelemetryRecorder<4> = TelemetryRecorder::new();
        for index in 0..6u16 {
            recorder.record(
                EventKind::PhaseStarted(CyclePhase::from_index(index).expect("phase")),
                at(9, 0),
            );
        }
        assert_eq!(recorder.len(), 4);
        let oldest = recorder.oldest_first().next().expect("oldest record");
        assert_eq!(oldest.id.value(), 2);
    }

    #[test]
    fn raw_codes_round_trip() {
        let events = [
            EventKind::PhaseStarted(CyclePhase::EquilPumpOff),
            EventKind::RunAborted(CyclePhase::SpanPumpOn),
            EventKind::CalibrationApplied(CalKind::Span),
            EventKind::CalibrationSkipped(CalKind::Oxygen),
            EventKind::TaskQueued,
            EventKind::TaskFired,
            EventKind::TaskDeferred,
            EventKind::AlarmArmed,
            EventKind::AlarmLate,
            EventKind::AlarmIdle,
        ];
        for event in events {
            assert_eq!(EventKind::from_raw(event.to_raw()), Some(event));
        }
        assert_eq!(EventKind::from_raw(999), None);
        assert_eq!(EventKind::from_raw(25), None);
    }
}
