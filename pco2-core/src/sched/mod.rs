//! Wall-clock task scheduler.
//!
//! A bounded queue of deferred work ordered by due time. The supervisor
//! creates tasks, the alarm interrupt drives [`Scheduler::tick`], and
//! [`Scheduler::arm_next_alarm`] decides what the hardware alarm should be
//! armed to after a run drains.

use heapless::Vec;

use crate::calendar::{CalDuration, Timestamp};

/// Default queue capacity. A configuration limit, not an architectural one;
/// hosts may instantiate the scheduler with a different capacity.
pub const MAX_TASKS: usize = 8;

/// Identifier handed back when a task is created.
pub type TaskId = u32;

/// Supervisor entry point a task dispatches to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskAction {
    /// Measurement cycle on the accelerated post-deployment cadence.
    FastMode,
    /// Measurement cycle on the normal cadence.
    NormalMode,
    /// Operator-requested one-shot cycle.
    InstantRun,
    /// Operator-requested one-shot cycle followed by the moisture purge.
    InstantRunWithPurge,
    /// Standalone oxygen sensor self-calibration.
    OxygenCal,
    /// Park the instrument for deployment.
    Deploy,
}

/// What to do when a task is created with a due time that is not strictly
/// in the future.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PastDuePolicy {
    /// Re-base the due time to one hour after now. Protects a reboot that
    /// lands mid-schedule from queueing immediately-due work.
    #[default]
    DeferOneHour,
    /// Reject the task with [`SchedulerError::DueInPast`].
    Reject,
}

/// Scheduler operation failures.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerError {
    /// The queue is at capacity. Non-fatal; the caller retries later.
    QueueFull,
    /// No queued task carries the requested identifier.
    TaskNotFound,
    /// Repeat counts below -1 are meaningless.
    InvalidRepeat,
    /// The due time was not in the future and the policy is [`PastDuePolicy::Reject`].
    DueInPast,
}

/// Outcome of [`Scheduler::arm_next_alarm`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmOutcome {
    /// Arm the hardware alarm for this wall-clock time.
    Armed(Timestamp),
    /// The earliest task is already due; run it instead of sleeping.
    Late,
    /// The queue is empty; nothing to arm.
    Idle,
}

/// A queued unit of deferred work.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Task {
    id: TaskId,
    /// Entry point to dispatch when the task fires.
    pub action: TaskAction,
    /// Wall-clock time the task becomes due.
    pub due_at: Timestamp,
    /// Interval between recurrences; ignored when `repeat == 0`.
    pub period: CalDuration,
    /// -1 repeats forever, 0 fires once, N > 0 fires N + 1 times total.
    pub repeat: i16,
    /// Short display name.
    pub name: &'static str,
}

impl Task {
    /// Identifier assigned at creation.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    const fn is_repeating(&self) -> bool {
        self.repeat != 0
    }
}

/// Receipt for a newly created task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CreatedTask {
    pub id: TaskId,
    /// Due time actually queued, after any past-due re-basing.
    pub due_at: Timestamp,
    /// `true` when the past-due policy moved the requested due time.
    pub deferred: bool,
}

/// A task that just fired, handed to the supervisor for dispatch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FiredTask {
    pub id: TaskId,
    pub action: TaskAction,
    pub name: &'static str,
}

/// Bounded, ordered task queue.
pub struct Scheduler<const CAPACITY: usize = MAX_TASKS> {
    queue: Vec<Task, CAPACITY>,
    next_id: TaskId,
    policy: PastDuePolicy,
}

impl<const CAPACITY: usize> Scheduler<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_policy(PastDuePolicy::DeferOneHour)
    }

    #[must_use]
    pub const fn with_policy(policy: PastDuePolicy) -> Self {
        Self {
            queue: Vec::new(),
            next_id: 0,
            policy,
        }
    }

    /// Queues a new task.
    ///
    /// A `due_at` that is not strictly after `now` is handled by the
    /// configured [`PastDuePolicy`].
    ///
    /// # Errors
    /// [`SchedulerError::QueueFull`] at capacity,
    /// [`SchedulerError::InvalidRepeat`] for repeat counts below -1, and
    /// [`SchedulerError::DueInPast`] under the rejecting policy.
    pub fn create_task(
        &mut self,
        action: TaskAction,
        due_at: Timestamp,
        period: CalDuration,
        repeat: i16,
        name: &'static str,
        now: Timestamp,
    ) -> Result<CreatedTask, SchedulerError> {
        if repeat < -1 {
            return Err(SchedulerError::InvalidRepeat);
        }
        if self.queue.is_full() {
            return Err(SchedulerError::QueueFull);
        }

        let deferred = due_at <= now;
        let due_at = if deferred {
            match self.policy {
                PastDuePolicy::DeferOneHour => now + CalDuration::hours(1),
                PastDuePolicy::Reject => return Err(SchedulerError::DueInPast),
            }
        } else {
            due_at
        };

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let task = Task {
            id,
            action,
            due_at,
            period,
            repeat,
            name,
        };
        // Capacity was checked above.
        let _ = self.queue.push(task);

        Ok(CreatedTask {
            id,
            due_at,
            deferred,
        })
    }

    /// Removes the task with the given identifier, preserving queue order.
    ///
    /// # Errors
    /// [`SchedulerError::TaskNotFound`] when no queued task matches.
    pub fn delete_task(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        let index = self
            .queue
            .iter()
            .position(|task| task.id == id)
            .ok_or(SchedulerError::TaskNotFound)?;
        self.queue.remove(index);
        Ok(())
    }

    /// Removes every queued task.
    pub fn delete_all(&mut self) {
        self.queue.clear();
    }

    /// Fires the earliest task exactly once.
    ///
    /// The fired entry is always removed. A repeating task's successor is
    /// queued at `due_at + period` with the repeat count decremented when
    /// positive; the successor bypasses the past-due policy so a long run
    /// cannot silently push its own next occurrence out by an hour.
    pub fn tick(&mut self) -> Option<FiredTask> {
        self.sort_queue();
        if self.queue.is_empty() {
            return None;
        }
        let task = self.queue.remove(0);

        if task.is_repeating() {
            let successor = Task {
                id: self.next_id,
                due_at: task.due_at + task.period,
                repeat: if task.repeat > 0 {
                    task.repeat - 1
                } else {
                    task.repeat
                },
                ..task
            };
            self.next_id = self.next_id.wrapping_add(1);
            // The fired entry just freed a slot.
            let _ = self.queue.push(successor);
        }

        Some(FiredTask {
            id: task.id,
            action: task.action,
            name: task.name,
        })
    }

    /// Reconciles stale entries after a reboot or a deep sleep.
    ///
    /// A task whose due time has already passed is re-anchored at
    /// `now + period` when it repeats and dropped otherwise. The repeat
    /// count is untouched: the task never fired, so a finite chain keeps
    /// every remaining occurrence.
    pub fn reconcile(&mut self, now: Timestamp) {
        let mut index = 0;
        while index < self.queue.len() {
            let task = self.queue[index];
            if task.due_at > now {
                index += 1;
                continue;
            }
            if task.is_repeating() {
                self.queue[index] = Task {
                    due_at: now + task.period,
                    ..task
                };
                index += 1;
            } else {
                self.queue.remove(index);
            }
        }
        self.sort_queue();
    }

    /// Decides what the next hardware alarm should be.
    ///
    /// [`AlarmOutcome::Late`] means the earliest task is already due, which
    /// happens when several tasks share one alarm wake-up; the caller
    /// services again instead of sleeping.
    pub fn arm_next_alarm(&mut self, now: Timestamp) -> AlarmOutcome {
        self.sort_queue();
        match self.queue.first() {
            None => AlarmOutcome::Idle,
            Some(task) if task.due_at > now => AlarmOutcome::Armed(task.due_at),
            Some(_) => AlarmOutcome::Late,
        }
    }

    /// Queued tasks in their current order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.queue
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    // Insertion sort: stable (ties keep insertion order) and cheap for the
    // short queues this scheduler holds.
    fn sort_queue(&mut self) {
        for sorted_end in 1..self.queue.len() {
            let mut slot = sorted_end;
            while slot > 0 && self.queue[slot - 1].due_at > self.queue[slot].due_at {
                self.queue.swap(slot - 1, slot);
                slot -= 1;
            }
        }
    }
}

impl<const CAPACITY: usize> Default for Scheduler<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
