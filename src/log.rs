//! Diagnostics funnel. The hardware port prints boot/overrun diagnostics
//! with `esp_println::println!` unconditionally; this module gives host
//! builds (and any future non-ESP target) the same call sites against a
//! no-op so `kernel.rs`/`timer_engine.rs`/`ports::*` don't need per-target
//! `cfg` at each call site.

#[cfg(any(target_arch = "riscv32", target_arch = "xtensa"))]
pub use esp_println::println;

#[cfg(not(any(target_arch = "riscv32", target_arch = "xtensa")))]
#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {{
        let _ = core::format_args!($($arg)*);
    }};
}
#[cfg(not(any(target_arch = "riscv32", target_arch = "xtensa")))]
pub use println;
