#![cfg(feature = "kernel_tests")]

use sequential_test::sequential;
use tinytick::runtime;
use tinytick::task::TaskConfig;

fn dummy_entry(_param: usize) -> ! {
    loop {}
}

fn config(priority_class: u8, initial_delay: u32) -> TaskConfig {
    TaskConfig {
        entry: dummy_entry,
        param: 0,
        priority_class,
        round_robin_slice: None,
        stack_size: 32,
        initial_delay,
        initial_event_mask: 0,
        initial_wait_for_all: false,
    }
}

// The global kernel is one process-wide `static`, so these tests run
// `#[sequential]` to avoid racing each other.

#[test]
#[sequential]
fn overrun_count_reads_back_zero_before_any_timer_event() {
    let mut configs = core::array::from_fn(|_| config(0, 1));
    configs[0] = config(0, 0);
    runtime::configure(configs);
    assert_eq!(runtime::overrun_count(0, false), 0);
}

#[test]
#[sequential]
fn stack_reserve_is_positive_for_a_freshly_configured_task() {
    let configs = core::array::from_fn(|_| config(0, 1));
    runtime::configure(configs);
    assert!(runtime::stack_reserve(0) > 0);
}
