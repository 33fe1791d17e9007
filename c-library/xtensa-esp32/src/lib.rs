#![no_std]

// Pulls in the panic handler, exception handler and `println!` wiring for
// this target; the actual kernel surface is `tinytick::ffi`'s `#[no_mangle]`
// functions, re-exported here unchanged so they end up in this staticlib.
use esp_backtrace as _;
use tinytick::ffi as _;
