//! Event vectors: the 16-bit per-task word used for both timers and
//! application-posted events.

/// A task's event vector. Bit 15 is the delay-timer event, bit 14 is the
/// absolute-timer event. The remaining 14 bits are application events,
/// partitioned at compile time into broadcast, mutex and semaphore classes
/// by [`EventLayout`].
pub type EventVector = u16;

/// Bit of the delay-timer event (relative suspend, `delay`/`wait_for_event`
/// timeout).
pub const DELAY_TIMER_BIT: EventVector = 1 << 15;
/// Bit of the absolute-timer event (`suspend_till_time`).
pub const ABS_TIMER_BIT: EventVector = 1 << 14;
/// Mask of the 14 application-event bits.
pub const APP_EVENT_MASK: EventVector = !(DELAY_TIMER_BIT | ABS_TIMER_BIT);

/// The semantic class of an application event bit. Determined entirely by
/// [`EventLayout`] at compile time; never changes at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// Posted to every waiter whose wait mask includes the bit.
    Broadcast,
    /// Ownership transfers to exactly one waiter (highest priority, FIFO
    /// among equal priority). Never broadcast.
    Mutex,
    /// Either wakes one waiter or increments a counter if nobody is
    /// waiting; `wait_for_event` decrements the counter on acquire.
    Semaphore,
}

/// Compile-time partition of the 14 application-event bits into broadcast,
/// mutex and semaphore classes. `NUM_MUTEX` mutex bits occupy the low end of
/// the application range, followed by `NUM_SEMAPHORE` semaphore bits; the
/// rest are broadcast. The partition is fixed by configuration and
/// invariant at runtime.
pub struct EventLayout<const NUM_MUTEX: usize, const NUM_SEMAPHORE: usize>;

impl<const NUM_MUTEX: usize, const NUM_SEMAPHORE: usize> EventLayout<NUM_MUTEX, NUM_SEMAPHORE> {
    const _ASSERT_FITS: () = assert!(NUM_MUTEX + NUM_SEMAPHORE <= 14);

    /// Classifies a single event bit (must have exactly one bit set).
    pub fn class_of(bit: EventVector) -> EventClass {
        let () = Self::_ASSERT_FITS;
        let index = bit.trailing_zeros() as usize;
        if index < NUM_MUTEX {
            EventClass::Mutex
        } else if index < NUM_MUTEX + NUM_SEMAPHORE {
            EventClass::Semaphore
        } else {
            EventClass::Broadcast
        }
    }

    /// Index of a semaphore bit into the semaphore counter table, or `None`
    /// if the bit does not belong to the semaphore class.
    pub fn semaphore_index(bit: EventVector) -> Option<usize> {
        let index = bit.trailing_zeros() as usize;
        if index >= NUM_MUTEX && index < NUM_MUTEX + NUM_SEMAPHORE {
            Some(index - NUM_MUTEX)
        } else {
            None
        }
    }
}
