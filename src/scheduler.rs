//! Scheduler: picks which task runs next. Highest non-empty priority
//! class, the task at the front of that class's due list, or idle if
//! nothing is due. Preemption is unconditional: a newly-due higher class
//! always wins on the next reschedule point, there is no priority
//! inheritance or deferred preemption.

use crate::queues::Queues;
use crate::task::{TaskId, IDLE_TASK_ID};

/// Returns the task id that should run next, or [`IDLE_TASK_ID`] if no
/// task is due.
pub fn pick_active<const NT: usize, const NP: usize, const NPC: usize, const NS: usize>(
    queues: &Queues<NT, NP, NPC, NS>,
) -> TaskId {
    match queues.highest_due() {
        Some((_class, id)) => id,
        None => IDLE_TASK_ID,
    }
}
