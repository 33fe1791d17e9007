//! Architecture selection: exactly one hardware port plus the host port
//! used by tests and any build targeting neither.

cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "riscv32", target_arch = "xtensa"))] {
        pub mod xtensa_esp32;
        pub use xtensa_esp32::XtensaEsp32 as HardwarePort;
    } else {
        pub mod host;
        pub use host::HostPort as HardwarePort;
    }
}
