//! The single global kernel instance: this is a statically configured
//! kernel (no dynamic task creation, single core), so exactly one instance
//! exists per binary, sized by the constants below. An application with
//! different sizing needs can still use [`crate::kernel::Kernel`] directly
//! and wire its own ISR trampolines the way this module does.

use crate::context_switch::Port;
use crate::kernel::Kernel;
use crate::ports::HardwarePort;
use crate::task::{TaskConfig, TaskId};
use core::cell::RefCell;
use critical_section::Mutex;

pub const NUM_TASKS: usize = 8;
pub const NUM_PRIO_CLASSES: usize = 4;
pub const MAX_TASKS_PER_CLASS: usize = 8;
pub const NUM_SEMAPHORES: usize = 4;
pub const NUM_MUTEX_BITS: usize = 4;
pub const NUM_SEMAPHORE_BITS: usize = 4;
pub const TICK_BITS: u32 = 32;
pub const ADVANCE_ON_OVERRUN: bool = true;
pub const STACK_SIZE: usize = 1024;

pub type DefaultKernel = Kernel<
    HardwarePort,
    NUM_TASKS,
    NUM_PRIO_CLASSES,
    MAX_TASKS_PER_CLASS,
    NUM_SEMAPHORES,
    NUM_MUTEX_BITS,
    NUM_SEMAPHORE_BITS,
    TICK_BITS,
    ADVANCE_ON_OVERRUN,
    STACK_SIZE,
>;

static KERNEL: Mutex<RefCell<Option<DefaultKernel>>> = Mutex::new(RefCell::new(None));

/// Builds the global kernel from the application's task table. Must run
/// before [`start`] and before any interrupt that could call `on_tic`/
/// `on_user_isr` is enabled.
pub fn configure(configs: [TaskConfig; NUM_TASKS]) {
    critical_section::with(|cs| {
        *KERNEL.borrow(cs).borrow_mut() = Some(DefaultKernel::new(configs));
    });
}

/// Runs the startup sequence and falls through to idle, repeatedly calling
/// `idle_body`. Never returns.
///
/// Only the seeding step runs with the global kernel borrowed: holding that
/// borrow (and, transitively, `critical_section::with`'s interrupt mask)
/// across the hardware-arming step and the infinite idle loop would disable
/// the tic interrupt forever, since neither of those ever hands control
/// back. So the lock is dropped before `setup_hardware_timer`/
/// `setup_interrupt` run and before the idle loop starts.
pub fn start(period_ticks: u32, idle_body: fn()) -> ! {
    critical_section::with(|cs| {
        let mut slot = KERNEL.borrow(cs).borrow_mut();
        let kernel = slot.as_mut().expect("runtime::configure was not called before runtime::start");
        kernel.seed_initial_due();
    });
    HardwarePort::setup_hardware_timer(period_ticks);
    HardwarePort::setup_interrupt();
    loop {
        idle_body();
    }
}

/// Called from the hardware port's tic interrupt trampoline.
pub fn on_tic(ctx: &mut <HardwarePort as Port>::Frame) {
    critical_section::with(|cs| {
        let mut slot = KERNEL.borrow(cs).borrow_mut();
        if let Some(kernel) = slot.as_mut() {
            kernel.on_tic(ctx);
        }
    });
}

/// Called from a user ISR's trampoline to post `bits` and reschedule.
pub fn on_user_isr(bits: crate::event::EventVector, ctx: &mut <HardwarePort as Port>::Frame) {
    critical_section::with(|cs| {
        let mut slot = KERNEL.borrow(cs).borrow_mut();
        if let Some(kernel) = slot.as_mut() {
            kernel.set_event_from_isr(bits, ctx);
        }
    });
}

pub fn stack_reserve(task_id: TaskId) -> usize {
    critical_section::with(|cs| {
        let slot = KERNEL.borrow(cs).borrow();
        slot.as_ref().expect("runtime::configure was not called").stack_reserve(task_id)
    })
}

pub fn overrun_count(task_id: TaskId, clear: bool) -> u32 {
    critical_section::with(|cs| {
        let mut slot = KERNEL.borrow(cs).borrow_mut();
        slot.as_mut().expect("runtime::configure was not called").overrun_count(task_id, clear)
    })
}
