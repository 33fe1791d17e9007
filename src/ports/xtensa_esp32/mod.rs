pub mod hardware_timer;
mod preempt;

use crate::context_switch::Port;

/// Port implementation for the Xtensa/RISC-V ESP32 family, the one
/// hardware target this crate ships for.
pub struct XtensaEsp32;

impl Port for XtensaEsp32 {
    type Frame = esp_hal::trapframe::TrapFrame;

    fn setup_hardware_timer(period_ticks: u32) {
        hardware_timer::setup_hardware_timer(period_ticks);
    }

    fn setup_interrupt() {
        preempt::setup_interrupt();
    }

    fn get_tick_counter() -> u32 {
        hardware_timer::get_tick_counter()
    }
}
