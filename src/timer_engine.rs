//! Event/Timer Engine: the tic handler and the two event-posting entry
//! points (`post_from_isr`, `post_from_task`), plus the bookkeeping
//! `wait_for_event` needs to block and unblock a task.
//!
//! System time is kept as a `u32` masked down to `TICK_BITS` (8, 16 or 32)
//! so the wraparound behaviour of narrow hardware counters is reproduced
//! exactly: a wake time more than half the masked range in the past is
//! indistinguishable from one still in the future, and must be treated as
//! overrun rather than "not yet due".
//!
//! Overrun policy is a compile-time choice, `ADVANCE_ON_OVERRUN`: `true`
//! advances a missed deadline by whole periods (drift-free, and the only
//! option compatible with narrow wraparound, since a deadline can never lag
//! by more than one period before being caught), `false` makes a missed
//! deadline immediately due again. `true` is the default.

use crate::context_switch::CriticalSection;
use crate::event::{EventClass, EventLayout, EventVector, ABS_TIMER_BIT, DELAY_TIMER_BIT};
use crate::queues::Queues;
use crate::task::{TaskId, TaskRuntime};

/// Masked wrapping arithmetic over a `u32` confined to the low `BITS` bits,
/// the Rust analogue of an 8/16/32-bit hardware tic counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SysTime<const BITS: u32>(u32);

impl<const BITS: u32> SysTime<BITS> {
    const MASK: u32 = if BITS >= 32 { u32::MAX } else { (1u32 << BITS) - 1 };
    const HALF: u32 = (Self::MASK >> 1) + 1;

    pub const fn zero() -> Self {
        SysTime(0)
    }

    pub fn from_raw(v: u32) -> Self {
        SysTime(v & Self::MASK)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn tic(self) -> Self {
        SysTime(self.0.wrapping_add(1) & Self::MASK)
    }

    pub fn add_period(self, period: u32) -> Self {
        SysTime(self.0.wrapping_add(period) & Self::MASK)
    }

    /// `true` if `self` is still strictly before `other`, i.e. `other` has
    /// not yet been reached and is not so far in the past that it wrapped
    /// around to look like the future.
    pub fn is_before(self, other: Self) -> bool {
        let diff = other.0.wrapping_sub(self.0) & Self::MASK;
        diff != 0 && diff < Self::HALF
    }
}

pub struct TimerEngine<const TICK_BITS: u32, const ADVANCE_ON_OVERRUN: bool> {
    pub now: SysTime<TICK_BITS>,
}

impl<const TICK_BITS: u32, const ADVANCE_ON_OVERRUN: bool> TimerEngine<TICK_BITS, ADVANCE_ON_OVERRUN> {
    pub const fn new() -> Self {
        TimerEngine { now: SysTime::zero() }
    }

    /// Called once per hardware tic from the timer ISR. Advances the
    /// clock, then scans the suspended list waking every task whose timer
    /// event is now due, rearming periodic ones per the overrun policy.
    pub fn tic<const NT: usize, const NP: usize, const NPC: usize, const NS: usize>(
        &mut self,
        queues: &mut Queues<NT, NP, NPC, NS>,
        cs: CriticalSection<'_>,
    ) {
        self.now = self.now.tic();
        let mut due = [0u8; NT];
        let mut due_len = 0;
        for id in queues.suspended_ids() {
            let rt = &queues.runtime[id as usize];
            if timer_is_due::<TICK_BITS>(rt, self.now) {
                due[due_len] = id;
                due_len += 1;
            }
        }
        for &id in &due[..due_len] {
            self.fire_timer(queues, id, cs);
        }
    }

    fn fire_timer<const NT: usize, const NP: usize, const NPC: usize, const NS: usize>(
        &mut self,
        queues: &mut Queues<NT, NP, NPC, NS>,
        id: TaskId,
        cs: CriticalSection<'_>,
    ) {
        let should_wake = {
            let rt = &mut queues.runtime[id as usize];
            let bit = rt.wait_mask & (DELAY_TIMER_BIT | ABS_TIMER_BIT);
            rt.posted_events |= bit;
            if rt.period != 0 {
                let advanced = SysTime::<TICK_BITS>::from_raw(rt.wake_time).add_period(rt.period);
                if ADVANCE_ON_OVERRUN && self.now.is_before(advanced) {
                    rt.wake_time = advanced.raw();
                } else {
                    rt.overrun_count = rt.overrun_count.saturating_add(1);
                    rt.wake_time = self.now.raw();
                    crate::log::println!("task {} missed its periodic deadline (overrun)", id);
                }
            }
            rt.is_woken()
        };
        if should_wake {
            queues.move_to_due(id, cs);
        }
    }

    /// Application-posted event from interrupt context: wakes matching
    /// waiters and updates mutex/semaphore bookkeeping. No rescheduling
    /// decision is made here; the scheduler runs on the ISR's own
    /// return-from-interrupt path.
    pub fn post_from_isr<const NT: usize, const NP: usize, const NPC: usize, const NS: usize, const NM: usize, const NSEM: usize>(
        &mut self,
        queues: &mut Queues<NT, NP, NPC, NS>,
        bits: EventVector,
        cs: CriticalSection<'_>,
    ) {
        self.post::<NT, NP, NPC, NS, NM, NSEM>(queues, bits, cs);
    }

    /// Application-posted event from task context (`set_event`); behaves
    /// identically to `post_from_isr`. If the posted bit makes a
    /// higher-priority task due, that task preempts the poster on the next
    /// reschedule point; the kernel layer triggers that yield after this
    /// call returns.
    pub fn post_from_task<const NT: usize, const NP: usize, const NPC: usize, const NS: usize, const NM: usize, const NSEM: usize>(
        &mut self,
        queues: &mut Queues<NT, NP, NPC, NS>,
        bits: EventVector,
        cs: CriticalSection<'_>,
    ) {
        self.post::<NT, NP, NPC, NS, NM, NSEM>(queues, bits, cs);
    }

    fn post<const NT: usize, const NP: usize, const NPC: usize, const NS: usize, const NM: usize, const NSEM: usize>(
        &mut self,
        queues: &mut Queues<NT, NP, NPC, NS>,
        bits: EventVector,
        cs: CriticalSection<'_>,
    ) {
        // First pass: decide, bit by bit, which suspended tasks receive
        // which bits. Broadcast bits reach every matching waiter; mutex and
        // semaphore bits reach at most one (highest priority, then earliest
        // inserted). Accumulated per task so a task matched by more than one
        // bit in this call is only ever considered once below.
        let mut newly_posted = [0u16; NT];
        for single_bit in bit_iter(bits) {
            match EventLayout::<NM, NSEM>::class_of(single_bit) {
                EventClass::Broadcast => {
                    for id in queues.suspended_ids() {
                        if matches(&queues.runtime[id as usize], single_bit) {
                            newly_posted[id as usize] |= single_bit;
                        }
                    }
                }
                EventClass::Mutex => {
                    if let Some(id) = best_waiter(queues, single_bit) {
                        newly_posted[id as usize] |= single_bit;
                    }
                    // No waiter: the bit is simply dropped, matching a post
                    // with nobody blocked on it. Mutex ownership tracking
                    // outside the wait path is an application concern.
                }
                EventClass::Semaphore => {
                    if let Some(id) = best_waiter(queues, single_bit) {
                        newly_posted[id as usize] |= single_bit;
                    } else if let Some(idx) = EventLayout::<NM, NSEM>::semaphore_index(single_bit) {
                        queues.semaphore_counters[idx] = queues.semaphore_counters[idx].saturating_add(1);
                    }
                }
            }
        }

        // Snapshot the suspended list before mutating any task's state: the
        // final loop below may move tasks out of it.
        let mut suspended_snapshot = [0u8; NT];
        let mut snapshot_len = 0;
        for id in queues.suspended_ids() {
            suspended_snapshot[snapshot_len] = id;
            snapshot_len += 1;
        }

        let mut to_wake = [0u8; NT];
        let mut wake_len = 0;
        for &id in &suspended_snapshot[..snapshot_len] {
            let add = newly_posted[id as usize];
            if add == 0 {
                continue;
            }
            let rt = &mut queues.runtime[id as usize];
            rt.posted_events |= add;
            if rt.is_woken() {
                to_wake[wake_len] = id;
                wake_len += 1;
            }
        }

        for &id in &to_wake[..wake_len] {
            queues.move_to_due(id, cs);
        }
    }
}

fn timer_is_due<const TICK_BITS: u32>(rt: &TaskRuntime, now: SysTime<TICK_BITS>) -> bool {
    if rt.wait_mask & (DELAY_TIMER_BIT | ABS_TIMER_BIT) == 0 {
        return false;
    }
    !now.is_before(SysTime::<TICK_BITS>::from_raw(rt.wake_time))
}

fn matches(rt: &TaskRuntime, bit: EventVector) -> bool {
    rt.wait_mask & bit != 0
}

fn best_waiter<const NT: usize, const NP: usize, const NPC: usize, const NS: usize>(
    queues: &Queues<NT, NP, NPC, NS>,
    bit: EventVector,
) -> Option<TaskId> {
    let mut best: Option<TaskId> = None;
    let mut best_prio = 0u8;
    for id in queues.suspended_ids() {
        if matches(&queues.runtime[id as usize], bit) {
            let prio = queues.priority_class_of(id);
            if best.is_none() || prio > best_prio {
                best = Some(id);
                best_prio = prio;
            }
        }
    }
    best
}

fn bit_iter(mut bits: EventVector) -> impl Iterator<Item = EventVector> {
    core::iter::from_fn(move || {
        if bits == 0 {
            None
        } else {
            let lowest = bits & bits.wrapping_neg();
            bits &= !lowest;
            Some(lowest)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn systime_wraps_at_configured_width() {
        let t = SysTime::<8>::from_raw(254).tic().tic();
        assert_eq!(t.raw(), 0);
    }

    #[test]
    fn systime_is_before_handles_wraparound() {
        let now = SysTime::<8>::from_raw(250);
        let due = SysTime::<8>::from_raw(10);
        assert!(now.is_before(due));
        assert!(!due.is_before(now));
    }

    #[test]
    fn eight_bit_period_200_wraps_as_documented() {
        // period 200 on an 8-bit counter: 0, 200, 144 (400 mod 256), 88, 32...
        let mut t = SysTime::<8>::zero();
        let mut wakes = [0u32; 5];
        for w in wakes.iter_mut() {
            *w = t.raw();
            t = t.add_period(200);
        }
        assert_eq!(wakes, [0, 200, 144, 88, 32]);
    }
}
