//! Task Table & Queues: the due-list matrix and suspended list, sized
//! entirely at compile time. No `Vec`, no heap — every class's due list and
//! the suspended list are plain fixed-size arrays with a length counter.
//!
//! Every mutator here requires a [`CriticalSection`] token, so the
//! scheduling-capable interrupts are statically guaranteed masked whenever
//! these lists change shape.

use crate::context_switch::CriticalSection;
use crate::task::{TaskId, TaskRuntime};

/// One priority class's due list: task ids ready to run, ordered by
/// arrival (FIFO within the class; round robin only reorders inside this
/// list, never across classes).
struct DueList<const MAX_TASKS_PER_CLASS: usize> {
    ids: [TaskId; MAX_TASKS_PER_CLASS],
    len: usize,
}

impl<const MAX_TASKS_PER_CLASS: usize> DueList<MAX_TASKS_PER_CLASS> {
    const fn new() -> Self {
        DueList { ids: [0; MAX_TASKS_PER_CLASS], len: 0 }
    }

    fn push_back(&mut self, id: TaskId) {
        assert!(self.len < MAX_TASKS_PER_CLASS, "priority class due-list capacity exceeded");
        self.ids[self.len] = id;
        self.len += 1;
    }

    fn remove(&mut self, id: TaskId) -> bool {
        match self.ids[..self.len].iter().position(|&x| x == id) {
            Some(pos) => {
                for i in pos..self.len - 1 {
                    self.ids[i] = self.ids[i + 1];
                }
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    fn front(&self) -> Option<TaskId> {
        if self.len == 0 { None } else { Some(self.ids[0]) }
    }

    /// Moves the current front task to the back, the round-robin rotation
    /// within a class.
    fn rotate_front_to_back(&mut self) {
        if self.len > 1 {
            let front = self.ids[0];
            for i in 0..self.len - 1 {
                self.ids[i] = self.ids[i + 1];
            }
            self.ids[self.len - 1] = front;
        }
    }
}

/// The suspended list: every task currently waiting on events and/or time,
/// kept in insertion order (the engine scans it in that order on every tic
/// and on every `set_event`/`set_event_from_isr`, and FIFO order among
/// equal-priority waiters on the same mutex/semaphore bit depends on it).
struct SuspendedList<const NUM_TASKS: usize> {
    ids: [TaskId; NUM_TASKS],
    len: usize,
}

impl<const NUM_TASKS: usize> SuspendedList<NUM_TASKS> {
    const fn new() -> Self {
        SuspendedList { ids: [0; NUM_TASKS], len: 0 }
    }

    fn push(&mut self, id: TaskId) {
        assert!(self.len < NUM_TASKS, "suspended list capacity exceeded");
        self.ids[self.len] = id;
        self.len += 1;
    }

    fn remove(&mut self, id: TaskId) -> bool {
        match self.ids[..self.len].iter().position(|&x| x == id) {
            Some(pos) => {
                for i in pos..self.len - 1 {
                    self.ids[i] = self.ids[i + 1];
                }
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.ids[..self.len].iter().copied()
    }
}

/// Task Table & Queues: per-task runtime state plus the due-list matrix and
/// suspended list that index it.
///
/// - `NUM_TASKS`: number of schedulable tasks (excludes idle).
/// - `NUM_PRIO_CLASSES`: number of distinct priority classes.
/// - `MAX_TASKS_PER_CLASS`: capacity of a single class's due list.
/// - `NUM_SEMAPHORES`: number of semaphore-class event bits with counters.
pub struct Queues<
    const NUM_TASKS: usize,
    const NUM_PRIO_CLASSES: usize,
    const MAX_TASKS_PER_CLASS: usize,
    const NUM_SEMAPHORES: usize,
> {
    pub runtime: [TaskRuntime; NUM_TASKS],
    due: [DueList<MAX_TASKS_PER_CLASS>; NUM_PRIO_CLASSES],
    suspended: SuspendedList<NUM_TASKS>,
    /// Priority class of each task, looked up once at construction from
    /// the static `TaskConfig` table.
    priority_class: [u8; NUM_TASKS],
    pub semaphore_counters: [u32; NUM_SEMAPHORES],
}

impl<
        const NUM_TASKS: usize,
        const NUM_PRIO_CLASSES: usize,
        const MAX_TASKS_PER_CLASS: usize,
        const NUM_SEMAPHORES: usize,
    > Queues<NUM_TASKS, NUM_PRIO_CLASSES, MAX_TASKS_PER_CLASS, NUM_SEMAPHORES>
{
    pub const fn new(priority_class: [u8; NUM_TASKS]) -> Self {
        Queues {
            runtime: [TaskRuntime::new(); NUM_TASKS],
            due: [const { DueList::new() }; NUM_PRIO_CLASSES],
            suspended: SuspendedList::new(),
            priority_class,
            semaphore_counters: [0; NUM_SEMAPHORES],
        }
    }

    /// Places every task in the suspended list with its configured initial
    /// wait condition, the startup-sequence precondition before the first
    /// tic is ever delivered.
    pub fn init_all_suspended(&mut self, _cs: CriticalSection<'_>) {
        for id in 0..NUM_TASKS as TaskId {
            self.suspended.push(id);
        }
    }

    pub fn move_to_due(&mut self, id: TaskId, _cs: CriticalSection<'_>) {
        self.suspended.remove(id);
        let class = self.priority_class[id as usize] as usize;
        self.due[class].push_back(id);
        self.runtime[id as usize].state = crate::task::TaskState::Due;
    }

    pub fn move_to_suspended(&mut self, id: TaskId, _cs: CriticalSection<'_>) {
        let class = self.priority_class[id as usize] as usize;
        self.due[class].remove(id);
        self.suspended.push(id);
        self.runtime[id as usize].state = crate::task::TaskState::Suspended;
    }

    pub fn remove_from_due(&mut self, id: TaskId, _cs: CriticalSection<'_>) -> bool {
        let class = self.priority_class[id as usize] as usize;
        self.due[class].remove(id)
    }

    pub fn remove_from_suspended(&mut self, id: TaskId, _cs: CriticalSection<'_>) -> bool {
        self.suspended.remove(id)
    }

    /// Highest non-empty class and the id at its front, if any task is due.
    pub fn highest_due(&self) -> Option<(u8, TaskId)> {
        for class in (0..NUM_PRIO_CLASSES).rev() {
            if let Some(id) = self.due[class].front() {
                return Some((class as u8, id));
            }
        }
        None
    }

    pub fn rotate_class(&mut self, class: u8, _cs: CriticalSection<'_>) {
        self.due[class as usize].rotate_front_to_back();
    }

    pub fn suspended_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.suspended.iter()
    }

    pub fn priority_class_of(&self, id: TaskId) -> u8 {
        self.priority_class[id as usize]
    }
}
