//! The kernel object: ties the Task Table & Queues, the Event/Timer Engine
//! and the Context-Switch Protocol together behind the scheduling API
//! application code and the `ffi`/`runtime` layers call into.
//!
//! Every primitive that can block (`wait_for_event`, `suspend_till_time`,
//! `delay`, and `set_event` on the rare path where it must yield) follows
//! the same shape: an architecture-specific naked entry shell (in
//! `ports::*`) pushes the calling task's registers onto its own stack and
//! calls one of the ordinary functions here with a pointer to that pushed
//! frame. All of the actual logic lives in the ordinary function; the
//! naked shell only pushes, calls, and on return pops whatever frame the
//! scheduler decided should run.

use crate::context_switch::{critical_section, Port, TrapFrame};
use crate::event::{EventVector, ABS_TIMER_BIT, DELAY_TIMER_BIT};
use crate::queues::Queues;
use crate::scheduler::pick_active;
use crate::stack::{stack_high_water_mark, write_stack_image};
use crate::task::{TaskConfig, TaskId, TaskState, IDLE_TASK_ID};
use crate::timer_engine::TimerEngine;

/// A statically configured kernel instance.
///
/// - `NUM_TASKS`/`NUM_PRIO_CLASSES`/`MAX_TASKS_PER_CLASS`/`NUM_SEMAPHORES`:
///   Task Table & Queues sizing.
/// - `NUM_MUTEX_BITS`/`NUM_SEMAPHORE_BITS`: application-event bit-class
///   partition (the rest of the 14 bits are broadcast).
/// - `TICK_BITS`: native width of the hardware tic counter (8, 16 or 32).
/// - `ADVANCE_ON_OVERRUN`: overrun policy, see [`crate::timer_engine`].
/// - `STACK_SIZE`: per-task stack area size in bytes (uniform across tasks;
///   a task needing more configures a priority class of its own).
pub struct Kernel<
    P: Port,
    const NUM_TASKS: usize,
    const NUM_PRIO_CLASSES: usize,
    const MAX_TASKS_PER_CLASS: usize,
    const NUM_SEMAPHORES: usize,
    const NUM_MUTEX_BITS: usize,
    const NUM_SEMAPHORE_BITS: usize,
    const TICK_BITS: u32,
    const ADVANCE_ON_OVERRUN: bool,
    const STACK_SIZE: usize,
> {
    queues: Queues<NUM_TASKS, NUM_PRIO_CLASSES, MAX_TASKS_PER_CLASS, NUM_SEMAPHORES>,
    engine: TimerEngine<TICK_BITS, ADVANCE_ON_OVERRUN>,
    configs: [TaskConfig; NUM_TASKS],
    frames: [P::Frame; NUM_TASKS],
    stacks: [[u8; STACK_SIZE]; NUM_TASKS],
    current_task: TaskId,
}

impl<
        P: Port,
        const NUM_TASKS: usize,
        const NUM_PRIO_CLASSES: usize,
        const MAX_TASKS_PER_CLASS: usize,
        const NUM_SEMAPHORES: usize,
        const NUM_MUTEX_BITS: usize,
        const NUM_SEMAPHORE_BITS: usize,
        const TICK_BITS: u32,
        const ADVANCE_ON_OVERRUN: bool,
        const STACK_SIZE: usize,
    >
    Kernel<
        P,
        NUM_TASKS,
        NUM_PRIO_CLASSES,
        MAX_TASKS_PER_CLASS,
        NUM_SEMAPHORES,
        NUM_MUTEX_BITS,
        NUM_SEMAPHORE_BITS,
        TICK_BITS,
        ADVANCE_ON_OVERRUN,
        STACK_SIZE,
    >
{
    /// Writes every configured task's stack image (sentinel fill, guard and
    /// entry words) and seeds the task table. No task runs yet; call
    /// [`Self::start`] to bring up the timer and hand off to the scheduler.
    ///
    /// Deliberately does not build register frames yet: a `Kernel` built
    /// here is typically moved once more before anything runs (into the
    /// `static` slot [`crate::runtime`] holds it in), and a frame's stack
    /// pointer is only valid once resolved against the task's stack area at
    /// its final, non-moving address. [`Self::seed_initial_due`] resolves
    /// and builds the frames once that address is settled.
    pub fn new(configs: [TaskConfig; NUM_TASKS]) -> Self {
        let priority_class = core::array::from_fn(|i| configs[i].priority_class);
        let mut stacks = [[0u8; STACK_SIZE]; NUM_TASKS];
        for i in 0..NUM_TASKS {
            assert!(configs[i].stack_size <= STACK_SIZE, "task stack_size exceeds kernel STACK_SIZE");
            write_stack_image(&mut stacks[i], configs[i].entry as usize);
            crate::log::println!(
                "task {} registered: priority class {}, prepared stack pointer {:#x}",
                i,
                configs[i].priority_class,
                crate::stack::stack_top(&stacks[i]),
            );
        }
        Kernel {
            queues: Queues::new(priority_class),
            engine: TimerEngine::new(),
            configs,
            frames: [P::Frame::default(); NUM_TASKS],
            stacks,
            current_task: IDLE_TASK_ID,
        }
    }

    /// Resolves every task's initial register frame against its stack
    /// area's now-settled address and places every task in the suspended
    /// list with its configured initial wake condition, without touching
    /// any hardware. Split out of [`Self::start`] so tests can drive the
    /// scheduler without a real timer interrupt, and so callers that need
    /// to release any lock guarding the kernel instance before arming
    /// hardware and entering the idle loop (see [`crate::runtime::start`])
    /// can do so.
    ///
    /// Callers must only invoke this once the `Kernel` instance is at the
    /// address it will occupy for the rest of its life — calling it before
    /// a subsequent move (e.g. into a `static`) bakes dangling stack
    /// pointers into the frames it builds.
    pub fn seed_initial_due(&mut self) {
        for i in 0..NUM_TASKS {
            let entry_pc = self.configs[i].entry as usize;
            self.frames[i] = P::setup_stack(&mut self.stacks[i], entry_pc, self.configs[i].param);
        }
        critical_section(|cs| {
            self.queues.init_all_suspended(cs);
            for id in 0..NUM_TASKS as TaskId {
                let cfg = &self.configs[id as usize];
                let rt = &mut self.queues.runtime[id as usize];
                rt.wait_mask = DELAY_TIMER_BIT | cfg.initial_event_mask;
                rt.wait_for_all = cfg.initial_wait_for_all;
                rt.wake_time = cfg.initial_delay;
                rt.period = 0;
                rt.slice_remaining = cfg.round_robin_slice.map_or(0, |n| n.get());
                if cfg.initial_delay == 0 && cfg.initial_event_mask == 0 {
                    self.queues.move_to_due(id, cs);
                }
            }
        });
    }

    /// Startup sequence: seed the due/suspended lists, install the hardware
    /// tic timer, enable scheduling interrupts, and fall through to idle,
    /// repeatedly invoking the application-supplied idle body. Interrupts
    /// must already be enabled when this runs, since configuration itself
    /// may take timer interrupts.
    ///
    /// Seeding is the only step that needs `&mut self`; hardware setup and
    /// the idle loop that follows run without it, so a caller guarding the
    /// kernel instance behind a lock (as [`crate::runtime`] does behind a
    /// `critical_section::Mutex`) must not hold that lock across this whole
    /// call — see [`Self::seed_initial_due`].
    pub fn start(&mut self, period_ticks: u32, idle_body: fn()) -> ! {
        self.seed_initial_due();
        P::setup_hardware_timer(period_ticks);
        P::setup_interrupt();
        loop {
            idle_body();
        }
    }

    /// Test-only entry point mirroring the non-hardware half of
    /// [`Self::start`], so scheduling behavior can be exercised without an
    /// interrupt-driven event loop.
    #[cfg(feature = "kernel_tests")]
    pub fn init_for_test(&mut self) {
        self.seed_initial_due();
    }

    /// Timer ISR entry point. Advances the clock, wakes due tasks, and
    /// reschedules. `ctx` is the register image the trap entry already
    /// pushed onto the interrupted task's own stack.
    pub fn on_tic(&mut self, ctx: &mut P::Frame) {
        critical_section(|cs| {
            self.engine.tic(&mut self.queues, cs);
            self.tick_round_robin(cs);
        });
        self.reschedule(ctx);
    }

    /// Consumes one tic of the running task's round-robin slice, if it has
    /// one configured. On expiry the slice is reloaded and the task is
    /// rotated to the back of its priority class's due list, so a
    /// lower-priority-within-the-class sibling gets a turn even though
    /// nothing suspended and no higher class became due.
    fn tick_round_robin(&mut self, cs: crate::context_switch::CriticalSection<'_>) {
        let id = self.current_task;
        if id == IDLE_TASK_ID {
            return;
        }
        let Some(slice) = self.configs[id as usize].round_robin_slice else {
            return;
        };
        let expired = {
            let rt = &mut self.queues.runtime[id as usize];
            if rt.slice_remaining <= 1 {
                rt.slice_remaining = slice.get();
                true
            } else {
                rt.slice_remaining -= 1;
                false
            }
        };
        if expired {
            let class = self.queues.priority_class_of(id);
            self.queues.rotate_class(class, cs);
        }
    }

    /// User ISR entry point for an interrupt source configured to post
    /// events (`set_event_from_isr`). `ctx` is the interrupted context;
    /// reschedule runs because posting an event can make a higher-priority
    /// task due.
    pub fn set_event_from_isr(&mut self, bits: EventVector, ctx: &mut P::Frame) {
        critical_section(|cs| {
            self.engine
                .post_from_isr::<NUM_TASKS, NUM_PRIO_CLASSES, MAX_TASKS_PER_CLASS, NUM_SEMAPHORES, NUM_MUTEX_BITS, NUM_SEMAPHORE_BITS>(
                    &mut self.queues, bits, cs,
                )
        });
        self.reschedule(ctx);
    }

    /// `wait_for_event`: the ordinary inner function behind the
    /// voluntary-suspend naked shell that `suspend_till_time` and `delay`
    /// also funnel through. Marks the calling task suspended with the
    /// requested wait condition, reschedules, and on resume returns the
    /// events that were posted while it slept (per the return-value-
    /// injection rule, only read here — the actual ABI overwrite happens in
    /// `reschedule`/`TrapFrame::inject_return_value`).
    ///
    /// Combining `wait_for_all` with a timeout is legal but easy to misuse:
    /// the delay-timer bit still wakes the task unconditionally (per
    /// [`crate::task::TaskRuntime::is_woken`]), so it effectively becomes
    /// one more mandatory bit only in the sense that its absence from the
    /// returned vector is how the caller tells a real wake from a timeout.
    pub fn wait_for_event(
        &mut self,
        ctx: &mut P::Frame,
        wait_mask: EventVector,
        wait_for_all: bool,
        timeout: Option<u32>,
    ) -> EventVector {
        let id = self.current_task;

        // A semaphore bit already carrying a non-zero count is acquired
        // immediately, the same as `wait_for_event` finding an
        // already-posted event: no suspension, no reschedule.
        if !wait_for_all {
            if let Some(bit) = self.try_acquire_semaphore(wait_mask) {
                return bit;
            }
        }

        critical_section(|cs| {
            let mut mask = wait_mask;
            let now = self.engine.now.raw();
            if let Some(t) = timeout {
                mask |= DELAY_TIMER_BIT;
                let rt = &mut self.queues.runtime[id as usize];
                rt.wake_time = now.wrapping_add(t.max(1));
                rt.period = 0;
            }
            let rt = &mut self.queues.runtime[id as usize];
            rt.wait_mask = mask;
            rt.wait_for_all = wait_for_all;
            rt.posted_events = 0;
            self.queues.move_to_suspended(id, cs);
        });
        self.reschedule(ctx);
        let rt = &mut self.queues.runtime[id as usize];
        let events = rt.posted_events;
        rt.posted_events = 0;
        events
    }

    /// Non-blocking semaphore acquire: if any semaphore-class bit in
    /// `mask` has a non-zero counter, decrement it and return that single
    /// bit. Mirrors `wait_for_event`'s rule that acquiring a semaphore
    /// event decrements the counter on success.
    fn try_acquire_semaphore(&mut self, mask: EventVector) -> Option<EventVector> {
        use crate::event::{EventClass, EventLayout};
        type Layout = EventLayout<NUM_MUTEX_BITS, NUM_SEMAPHORE_BITS>;
        for bit in (0..14u16).map(|i| 1u16 << i).filter(|&b| mask & b != 0) {
            if Layout::class_of(bit) == EventClass::Semaphore {
                if let Some(idx) = Layout::semaphore_index(bit) {
                    if self.queues.semaphore_counters[idx] > 0 {
                        self.queues.semaphore_counters[idx] -= 1;
                        return Some(bit);
                    }
                }
            }
        }
        None
    }

    /// `suspend_till_time`: suspend until the absolute tic `time`,
    /// rearming every `period` tics thereafter (`period == 0` for a
    /// one-shot wake).
    pub fn suspend_till_time(&mut self, ctx: &mut P::Frame, time: u32, period: u32) -> EventVector {
        let id = self.current_task;
        critical_section(|_cs| {
            let rt = &mut self.queues.runtime[id as usize];
            rt.wake_time = time;
            rt.period = period;
        });
        self.wait_for_event(ctx, ABS_TIMER_BIT, false, None)
    }

    /// `delay`: suspend for `ticks` tics relative to now.
    pub fn delay(&mut self, ctx: &mut P::Frame, ticks: u32) -> EventVector {
        self.wait_for_event(ctx, 0, false, Some(ticks))
    }

    /// `set_event`: post `bits` from task context. If posting makes a
    /// higher-priority task due than the caller, the caller yields
    /// immediately: posting an event is a potential reschedule point.
    pub fn set_event(&mut self, ctx: &mut P::Frame, bits: EventVector) -> EventVector {
        critical_section(|cs| {
            self.engine
                .post_from_task::<NUM_TASKS, NUM_PRIO_CLASSES, MAX_TASKS_PER_CLASS, NUM_SEMAPHORES, NUM_MUTEX_BITS, NUM_SEMAPHORE_BITS>(
                    &mut self.queues, bits, cs,
                )
        });
        if pick_active(&self.queues) != self.current_task {
            self.reschedule(ctx);
        }
        let rt = &mut self.queues.runtime[self.current_task as usize];
        let events = rt.posted_events;
        rt.posted_events = 0;
        events
    }

    /// Shared context-switch logic: save the outgoing task's register
    /// image, pick the next active task, load its image, and apply the
    /// return-value injection rule if it has events waiting to be
    /// delivered. Used by the timer ISR, user ISRs and every suspend
    /// primitive alike.
    fn reschedule(&mut self, ctx: &mut P::Frame) {
        critical_section(|_cs| {
            if self.current_task != IDLE_TASK_ID {
                // A still-runnable task was never removed from its due
                // list's front in the first place (only suspending does
                // that), so there is nothing to requeue here; slice-expiry
                // rotation already happened in `tick_round_robin`.
                self.frames[self.current_task as usize] = *ctx;
            }
            let next = pick_active(&self.queues);
            self.current_task = next;
            if next == IDLE_TASK_ID {
                return;
            }
            self.queues.runtime[next as usize].state = TaskState::Running;
            *ctx = self.frames[next as usize];
            let posted = self.queues.runtime[next as usize].posted_events;
            if posted != 0 {
                ctx.inject_return_value(posted);
            }
        });
    }

    /// `overrun_count`: read a task's timer-overrun counter, optionally
    /// resetting it to zero in the same critical section.
    pub fn overrun_count(&mut self, id: TaskId, clear: bool) -> u32 {
        critical_section(|_cs| {
            let rt = &mut self.queues.runtime[id as usize];
            let count = rt.overrun_count;
            if clear {
                rt.overrun_count = 0;
            }
            count
        })
    }

    /// `stack_reserve`: bytes of a task's stack area never touched since
    /// boot, read by scanning down from the sentinel fill.
    pub fn stack_reserve(&self, id: TaskId) -> usize {
        stack_high_water_mark(&self.stacks[id as usize])
    }

    pub fn enter_critical_section() -> critical_section::RawRestoreState {
        unsafe { critical_section::acquire() }
    }

    pub fn leave_critical_section(token: critical_section::RawRestoreState) {
        unsafe { critical_section::release(token) }
    }

    #[cfg(feature = "kernel_tests")]
    pub fn queues(&self) -> &Queues<NUM_TASKS, NUM_PRIO_CLASSES, MAX_TASKS_PER_CLASS, NUM_SEMAPHORES> {
        &self.queues
    }

    #[cfg(feature = "kernel_tests")]
    pub fn queues_mut(&mut self) -> &mut Queues<NUM_TASKS, NUM_PRIO_CLASSES, MAX_TASKS_PER_CLASS, NUM_SEMAPHORES> {
        &mut self.queues
    }

    #[cfg(feature = "kernel_tests")]
    pub fn now(&self) -> u32 {
        self.engine.now.raw()
    }

    #[cfg(feature = "kernel_tests")]
    pub fn current_task(&self) -> TaskId {
        self.current_task
    }

    #[cfg(feature = "kernel_tests")]
    pub fn set_current_task_for_test(&mut self, id: TaskId) {
        self.current_task = id;
        if id != IDLE_TASK_ID {
            self.queues.runtime[id as usize].state = TaskState::Running;
        }
    }
}
