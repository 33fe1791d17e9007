use crate::context_switch::TrapFrame as TrapFrameTrait;
use crate::log::println;
use crate::ports::xtensa_esp32::hardware_timer::TIMER00;
use esp_hal::interrupt::{self, InterruptHandler, Priority};
use esp_hal::peripherals::Interrupt;
use esp_hal::trapframe::TrapFrame;

impl TrapFrameTrait for TrapFrame {
    fn for_entry(entry_pc: usize, arg: usize, initial_sp: usize) -> Self {
        let mut frame = TrapFrame::default();
        frame.PC = entry_pc as u32;
        frame.A0 = 0; // guard return address; a task returning faults here
        frame.A1 = initial_sp as u32;
        frame.A2 = arg as u32;
        frame
    }

    fn inject_return_value(&mut self, value: u16) {
        self.A2 = value as u32;
    }
}

pub fn setup_interrupt() {
    println!("tic timer interrupt configured");

    let timer0 = unsafe { TIMER00.take().expect("tic timer not initialized") };
    timer0.set_interrupt_handler(InterruptHandler::new(
        unsafe { core::mem::transmute::<*const (), extern "C" fn()>(tic_handler as *const ()) },
        Priority::Priority1,
    ));
    timer0.enable_interrupt(true);
    timer0.enable_auto_reload(true);
    interrupt::enable(Interrupt::TG0_T0_LEVEL, Priority::Priority1).unwrap();
    timer0.start();
    timer0.listen();

    unsafe {
        TIMER00 = Some(timer0);
    }
}

/// Naked-in-spirit entry shell for the tic interrupt: `esp-hal`'s trap
/// entry has already pushed the interrupted task's full register image
/// into `ctx` by the time this runs, so all that is left to do here is
/// clear the hardware interrupt and delegate every scheduling decision to
/// the ordinary kernel function.
extern "C" fn tic_handler(ctx: &mut TrapFrame) {
    let mut timer00 = unsafe { TIMER00.take().expect("tic timer not initialized") };
    timer00.clear_interrupt();
    unsafe {
        TIMER00 = Some(timer00);
    }

    crate::runtime::on_tic(ctx);
}
