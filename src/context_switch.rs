//! The context-switch protocol: a single `Port` trait implemented once per
//! architecture, shared unchanged by the timer ISR, user ISRs and the
//! voluntary suspend primitives (`save_ctx`/`load_ctx` over a `TrapFrame`,
//! plus stack, hardware timer and interrupt setup).

/// One architecture's register image, saved and restored as a single copy
/// rather than field by field, mirroring how the hardware port already
/// treats `esp_hal::trapframe::TrapFrame`.
pub trait TrapFrame: Copy + Default {
    /// Installs the entry point, argument and initial stack pointer into a
    /// freshly zeroed frame, as the Stack Frame Builder's register image.
    fn for_entry(entry_pc: usize, arg: usize, initial_sp: usize) -> Self;

    /// Overwrites the ABI return-value slot(s) with the posted-events
    /// snapshot. Called only when posted events is non-empty, i.e. only on
    /// first wake from suspension, never on a mere preemption resume.
    fn inject_return_value(&mut self, value: u16);
}

/// Per-architecture glue: hardware timer, interrupt line, and whole-frame
/// save/restore. Implemented once for the hardware port and once for the
/// host test port.
pub trait Port {
    type Frame: TrapFrame;

    /// Programs the hardware tic timer to the kernel's configured period
    /// and leaves it running.
    fn setup_hardware_timer(period_ticks: u32);

    /// Installs the tic timer and any configured user-ISR interrupt lines,
    /// routed to the kernel's dispatch entry points.
    fn setup_interrupt();

    /// Whole-frame copy: the running task's register image becomes the
    /// value previously held by the interrupted context.
    fn save_ctx(task_ctx: &mut Self::Frame, isr_ctx: &Self::Frame) {
        *task_ctx = *isr_ctx;
    }

    /// Whole-frame copy in the opposite direction, switching execution to
    /// `task_ctx` on return from the interrupt/trap handler.
    fn load_ctx(task_ctx: &Self::Frame, isr_ctx: &mut Self::Frame) {
        *isr_ctx = *task_ctx;
    }

    /// Monotonic hardware tic counter, used only for diagnostics; the
    /// kernel keeps its own wrapping system time independently.
    fn get_tick_counter() -> u32;

    /// Builds a task's initial register image over `area`, an untouched
    /// stack area. Must only be called once `area` is at the address it
    /// will occupy for the task's whole life — the stack pointer baked into
    /// the returned frame is resolved from `area`'s address at the moment
    /// of this call, and does not follow if `area` is moved afterward.
    fn setup_stack(area: &mut [u8], entry_pc: usize, arg: usize) -> Self::Frame {
        crate::stack::write_stack_image(area, entry_pc);
        let sp = crate::stack::stack_top(area);
        Self::Frame::for_entry(entry_pc, arg, sp)
    }
}

/// A token proving interrupts affecting scheduling (the tic timer and any
/// configured user-ISR lines) are currently masked. Obtained only through
/// [`critical_section`], so the compiler statically prevents
/// `Queues`/`Scheduler` mutation from happening outside one. `Copy` like the
/// underlying `critical_section::CriticalSection` token it wraps, so a
/// single proof of mutual exclusion can be threaded through several queue
/// calls in the same critical section without re-entering `with`.
#[derive(Clone, Copy)]
pub struct CriticalSection<'cs>(critical_section::CriticalSection<'cs>);

/// Runs `f` with scheduling-capable interrupts masked, not every interrupt
/// line. The hardware port's `critical-section` impl masks only the tic
/// timer and configured user-ISR lines; the host port's default impl is a
/// plain global-interrupt-disable, adequate for single-threaded test runs.
pub fn critical_section<R>(f: impl FnOnce(CriticalSection<'_>) -> R) -> R {
    critical_section::with(|cs| f(CriticalSection(cs)))
}
