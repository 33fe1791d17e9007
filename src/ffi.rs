//! C-ABI surface (`c-library` feature): lets an application written in C
//! configure and start the kernel and read back its two on-request
//! diagnostics. This is the subset of the runtime API that needs no
//! trap-frame argument (`configure`, `start`, `stack_reserve`,
//! `overrun_count`); primitives tied to an interrupt's own register image
//! (`set_event_from_isr`, the suspend primitives) have no C-ABI wrapper and
//! stay Rust-side, the same boundary the hardware port already draws around
//! architecture specifics.
//!
//! C has no array-literal equivalent of `runtime::configure`'s
//! `[TaskConfig; NUM_TASKS]`, so task slots are filled in one at a time by
//! repeated calls to [`configure_task`], one per index, before
//! [`start_kernel`] drains the table and hands off to the scheduler.

use crate::runtime::{self, NUM_TASKS};
use crate::task::{TaskConfig, TaskEntry, TaskId};
use core::cell::RefCell;
use core::num::NonZeroU16;
use critical_section::Mutex;

static PENDING: Mutex<RefCell<[Option<TaskConfig>; NUM_TASKS]>> =
    Mutex::new(RefCell::new([None; NUM_TASKS]));

static IDLE_BODY: Mutex<RefCell<Option<extern "C" fn()>>> = Mutex::new(RefCell::new(None));

/// Fills one task slot of the pending configuration table. Must be called
/// once for every index in `0..NUM_TASKS` before [`start_kernel`].
///
/// `round_robin_slice_ticks == 0` means no round-robin slicing for this
/// task (`TaskConfig::round_robin_slice == None`).
#[no_mangle]
pub extern "C" fn configure_task(
    index: u8,
    entry: TaskEntry,
    param: usize,
    priority_class: u8,
    round_robin_slice_ticks: u16,
    stack_size: usize,
    initial_delay: u32,
    initial_event_mask: u16,
    initial_wait_for_all: bool,
) {
    let round_robin_slice = NonZeroU16::new(round_robin_slice_ticks);
    critical_section::with(|cs| {
        PENDING.borrow(cs).borrow_mut()[index as usize] = Some(TaskConfig {
            entry,
            param,
            priority_class,
            round_robin_slice,
            stack_size,
            initial_delay,
            initial_event_mask,
            initial_wait_for_all,
        });
    });
}

/// Drains the pending configuration table into the global kernel, arms the
/// hardware tic timer and transfers control to idle, which repeatedly calls
/// `idle_body`. Never returns.
///
/// # Panics
///
/// Panics if any of the `NUM_TASKS` slots was never filled by
/// [`configure_task`].
#[no_mangle]
pub extern "C" fn start_kernel(period_ticks: u32, idle_body: extern "C" fn()) -> ! {
    let configs = critical_section::with(|cs| {
        let pending = PENDING.borrow(cs).borrow();
        core::array::from_fn(|i| {
            pending[i].expect("configure_task was not called for every task slot")
        })
    });
    critical_section::with(|cs| {
        *IDLE_BODY.borrow(cs).borrow_mut() = Some(idle_body);
    });
    runtime::configure(configs);
    runtime::start(period_ticks, idle_trampoline)
}

/// Rust-ABI shim satisfying [`crate::runtime::start`]'s `fn()` idle body,
/// forwarding to the C callback registered by [`start_kernel`].
fn idle_trampoline() {
    let callback = critical_section::with(|cs| *IDLE_BODY.borrow(cs).borrow());
    if let Some(body) = callback {
        body();
    }
}

/// `get_stack_reserve`: bytes of `task_id`'s stack area never touched
/// since boot.
#[no_mangle]
pub extern "C" fn stack_reserve(task_id: TaskId) -> usize {
    runtime::stack_reserve(task_id)
}

/// `get_overrun_count`: reads `task_id`'s overrun counter, optionally
/// clearing it in the same critical section.
#[no_mangle]
pub extern "C" fn overrun_count(task_id: TaskId, clear: bool) -> u32 {
    runtime::overrun_count(task_id, clear)
}
