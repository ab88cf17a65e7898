//! Many logical timers multiplexed onto one hardware counter/compare peripheral.
//!
//! A single free-running counter and a single compare-match interrupt are enough to drive any
//! number (up to a compile-time capacity) of independent one-shot or periodic timers:
//!
//! - [`CounterPeripheral`]: the hardware contract (counter, compare register, interrupt line)
//! - [`Timer`]: a delay, a one-shot/periodic flag and a notification callback
//! - [`TimerArrayControl`]: owns the timers and the pending set, programs the peripheral and
//!   dispatches compare-match interrupts ([`TimerArrayControl::on_compare_match`])
//! - [`SimTimer`]: a deterministic in-memory peripheral used by tests and the demo binary
//!
//! The pending set and the timer arena are fixed-capacity, so neither the foreground critical
//! section nor the dispatcher allocates.

#![forbid(unsafe_code)]

mod config;
mod control;
mod dispatch;
mod error;
mod pending;
mod peripheral;
mod sim;
mod table;
mod timer;

pub use config::{TimerArrayConfig, SUPPORTED_COUNTER_BITS};
pub use control::TimerArrayControl;
pub use dispatch::ExpiryContext;
pub use error::{Result, TimerError};
pub use pending::{PendingEntry, PendingSet};
pub use peripheral::{CounterPeripheral, TickClock};
pub use sim::SimTimer;
pub use timer::{Timer, TimerHandle};
