use esp_hal::timer::timg::{Timer, Timer0, TimerGroup};
use esp_hal::peripherals::TIMG0;
use esp_hal::prelude::*;

pub static mut TIMER00: Option<Timer<Timer0<TIMG0>, esp_hal::Blocking>> = None;

/// Brings up the peripheral clocks and the tic timer's timer group. Called
/// once at kernel startup, before [`crate::context_switch::Port::setup_interrupt`].
pub fn setup_hardware_timer(period_ticks: u32) {
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    let mut timer00 = timer_group0.timer0;
    timer00.load_value((period_ticks as u64).millis()).unwrap();

    unsafe {
        TIMER00 = Some(timer00);
    }
}

/// Current hardware tic counter, used only for diagnostics; the kernel's
/// own wrapping system time is authoritative for scheduling.
pub fn get_tick_counter() -> u32 {
    unsafe {
        let timer00 = TIMER00.take().expect("tic timer not initialized");
        let ticks = timer00.now().ticks();
        TIMER00 = Some(timer00);
        ticks as u32
    }
}
