//! Static task configuration: identity, priority and the stack-frame entry
//! point, decided entirely at compile time (no dynamic task creation).

use crate::event::{EventVector, DELAY_TIMER_BIT};
use core::num::NonZeroU16;

/// Type of a task's entry function. Never returns; a task that falls off
/// the end of its function is a configuration error.
#[cfg(not(feature = "c-library"))]
pub type TaskEntry = fn(param: usize) -> !;
#[cfg(feature = "c-library")]
pub type TaskEntry = extern "C" fn(param: usize) -> !;

/// Index into the static task table. `IDLE_TASK_ID` never appears as a row
/// of that table: the idle task is the scheduler's fallback, not a
/// schedulable entry.
pub type TaskId = u8;

/// Sentinel identifying the idle task, which has no table row, no stack
/// frame and no events.
pub const IDLE_TASK_ID: TaskId = TaskId::MAX;

/// Compile-time description of one task, supplied by the application and
/// consumed once at kernel construction to prepare the initial stack frame
/// and seed the task table.
#[derive(Clone, Copy)]
pub struct TaskConfig {
    pub entry: TaskEntry,
    pub param: usize,
    pub priority_class: u8,
    /// `Some(n)` enables round-robin time slicing within the task's
    /// priority class, preempting after `n` tics even without a higher
    /// priority task becoming due. `None` runs until it suspends or is
    /// preempted by a higher class.
    pub round_robin_slice: Option<NonZeroU16>,
    pub stack_size: usize,
    /// Tics after boot before this task's delay-timer bit fires, staggering
    /// startup across tasks the way a static configuration table would.
    /// `0` means the delay-timer bit is already due on the very first tic.
    /// Always part of the startup wake condition, alongside
    /// `initial_event_mask` below (the union of both, under
    /// `initial_wait_for_all`), so a task configured to wait only on an
    /// application event still has a deterministic fallback tic at which it
    /// is examined rather than silently depending on `initial_event_mask`
    /// being satisfiable at all.
    pub initial_delay: u32,
    /// Application-event bits (broadcast/mutex/semaphore) the task also
    /// waits on from boot, in addition to its delay-timer bit. `0` if the
    /// task's only startup wake condition is the delay timer.
    pub initial_event_mask: EventVector,
    /// `wait_for_all` flag for the combined startup wait condition
    /// (`initial_event_mask | DELAY_TIMER_BIT`). Per
    /// [`TaskRuntime::is_woken`], the delay-timer bit wakes the task
    /// unconditionally regardless of this flag — it only governs whether
    /// every bit of `initial_event_mask` must also be posted.
    pub initial_wait_for_all: bool,
}

/// Runtime state of one task row, independent of the static configuration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TaskState {
    /// In a due list, eligible to run.
    Due,
    /// In the suspended list, waiting on events/time.
    Suspended,
    /// Currently loaded into the machine registers.
    Running,
}

/// Per-task bookkeeping the engine mutates at runtime: posted events, wait
/// condition while suspended, and wake-time bookkeeping for the timer
/// classes.
#[derive(Clone, Copy)]
pub struct TaskRuntime {
    pub state: TaskState,
    /// Events posted since the task last read its event vector; injected
    /// into the suspend call's return value on first wake.
    pub posted_events: EventVector,
    /// Mask of bits the task is waiting for while suspended.
    pub wait_mask: EventVector,
    /// `true` if all bits in `wait_mask` must be set to wake (AND),
    /// `false` if any is enough (OR).
    pub wait_for_all: bool,
    /// Absolute wake time for the timer event bits, meaningful only while
    /// `state == Suspended` and one of the timer bits is in `wait_mask`.
    pub wake_time: u32,
    /// Configured period for `suspend_till_time`; `0` for a one-shot delay.
    pub period: u32,
    /// Number of times the task's timer event fired late (its previous
    /// deadline had already passed when the engine caught up to it).
    pub overrun_count: u32,
    /// Remaining tics in the current round-robin slice; unused if the
    /// task's `round_robin_slice` is `None`.
    pub slice_remaining: u16,
}

impl TaskRuntime {
    pub const fn new() -> Self {
        TaskRuntime {
            state: TaskState::Suspended,
            posted_events: 0,
            wait_mask: 0,
            wait_for_all: false,
            wake_time: 0,
            period: 0,
            overrun_count: 0,
            slice_remaining: 0,
        }
    }

    /// Whether this task's wake condition is currently satisfied: the
    /// delay-timer bit wakes a wait unconditionally (the timeout is an OR
    /// clause on top of whatever wait-for-all/wait-for-any condition was
    /// requested), otherwise the ordinary `wait_for_all`/`wait_for_any` rule
    /// over `posted_events & wait_mask` applies.
    pub fn is_woken(&self) -> bool {
        if self.posted_events & DELAY_TIMER_BIT != 0 {
            return true;
        }
        let satisfied = self.posted_events & self.wait_mask;
        if self.wait_for_all {
            self.wait_mask != 0 && satisfied == self.wait_mask
        } else {
            satisfied != 0
        }
    }
}
