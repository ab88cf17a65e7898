use thiserror::Error;

use crate::timer::TimerHandle;

pub type Result<T> = std::result::Result<T, TimerError>;

/// Errors reported by [`crate::TimerArrayControl`].
///
/// Every error is returned to the immediate caller and leaves the scheduling state exactly as
/// it was before the rejected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("timer {0} is already attached")]
    AlreadyAttached(TimerHandle),

    #[error("timer {0} is not attached")]
    NotAttached(TimerHandle),

    #[error("reference timer {0} is not attached")]
    ReferenceNotAttached(TimerHandle),

    /// `start()` was called with a frequency division that yields no usable tick rate.
    #[error("invalid frequency division {division} for input frequency {input_hz} Hz")]
    Unconfigured { division: u32, input_hz: u32 },

    #[error("delay of {delay} ticks is outside 1..={max}")]
    DelayOutOfRange { delay: u32, max: u32 },

    /// The reference is being dispatched late and `delay` does not reach past the ticks it is
    /// overdue by, so the synchronized expiry has already gone by.
    #[error("synchronized expiry already passed: delay of {delay} ticks, reference is {lag} ticks late")]
    ExpiryPassed { delay: u32, lag: u32 },

    #[error("unsupported counter width: {0} bits (expected 16 or 32)")]
    InvalidCounterWidth(u32),

    /// The handle does not name a registered timer (never issued, or the timer was removed).
    #[error("unknown timer {0}")]
    UnknownTimer(TimerHandle),

    #[error("timer array is full ({capacity} timers)")]
    CapacityExhausted { capacity: usize },

    /// A scheduled timer cannot be removed; detach it first.
    #[error("timer {0} is still attached")]
    TimerAttached(TimerHandle),
}
