//! Deterministic in-memory counter peripheral.
//!
//! Time only moves when [`TimerArrayControl::run_for`] (or [`SimTimer::advance`]) says so,
//! which lets tests and the demo reproduce exact tick sequences. Clones share state, so a
//! test can keep one handle to inspect the counter while the control owns another.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::control::TimerArrayControl;
use crate::peripheral::{CounterPeripheral, TickClock};

#[derive(Debug, Default)]
struct SimState {
    mask: u32,
    clock: Option<TickClock>,
    counter: u32,
    compare: u32,
    irq_enabled: bool,
    irq_pending: bool,
    elapsed_ticks: u64,
    compare_writes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SimTimer {
    state: Arc<Mutex<SimState>>,
}

impl SimTimer {
    /// Creates a stopped counter of the given width (16 or 32 bits).
    pub fn new(counter_bits: u32) -> Self {
        let mask = if counter_bits >= 32 {
            u32::MAX
        } else {
            (1u32 << counter_bits) - 1
        };
        Self {
            state: Arc::new(Mutex::new(SimState {
                mask,
                ..SimState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A panicking test callback must not hide the counter state from the next assertion.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn counter(&self) -> u32 {
        self.lock().counter
    }

    pub fn compare(&self) -> u32 {
        self.lock().compare
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.lock().irq_enabled
    }

    pub fn interrupt_pending(&self) -> bool {
        self.lock().irq_pending
    }

    /// Clock settings from the last `start`, or `None` if never started.
    pub fn clock(&self) -> Option<TickClock> {
        self.lock().clock
    }

    /// Ticks counted since the last `start`, without wrapping.
    pub fn elapsed_ticks(&self) -> u64 {
        self.lock().elapsed_ticks
    }

    pub fn compare_writes(&self) -> u64 {
        self.lock().compare_writes
    }

    /// Ticks until the counter next equals the compare register, counting a full wrap when
    /// they are already equal.
    fn ticks_to_compare(state: &SimState) -> u64 {
        match state.compare.wrapping_sub(state.counter) & state.mask {
            0 => state.mask as u64 + 1,
            ticks => ticks as u64,
        }
    }

    /// Advances a running counter by `ticks`, latching the interrupt if it lands on the
    /// compare value. Stopped counters do not move.
    ///
    /// Steps longer than the distance to the compare value would skip a match; the control's
    /// [`run_for`](TimerArrayControl::run_for) splits time at every match.
    pub fn advance(&self, ticks: u64) {
        let mut state = self.lock();
        if state.clock.is_none() {
            return;
        }
        let modulus = state.mask as u64 + 1;
        state.counter = ((state.counter as u64 + ticks % modulus) % modulus) as u32;
        state.elapsed_ticks += ticks;
        if state.irq_enabled && state.counter == state.compare {
            state.irq_pending = true;
        }
    }

    /// Takes the latched interrupt if it is pending and enabled.
    fn take_interrupt(&self) -> bool {
        let mut state = self.lock();
        if state.irq_enabled && state.irq_pending {
            state.irq_pending = false;
            return true;
        }
        false
    }

    /// Ticks the counter may move before something needs handling, capped at `limit`.
    fn next_step(&self, limit: u64) -> u64 {
        let state = self.lock();
        if state.irq_enabled {
            Self::ticks_to_compare(&state).min(limit)
        } else {
            limit
        }
    }
}

impl CounterPeripheral for SimTimer {
    fn start(&mut self, clock: TickClock) {
        let mut state = self.lock();
        state.clock = Some(clock);
        state.counter = 0;
        state.elapsed_ticks = 0;
        state.irq_pending = false;
    }

    fn read_counter(&self) -> u32 {
        self.lock().counter
    }

    fn write_compare(&mut self, value: u32) {
        let mut state = self.lock();
        state.compare = value & state.mask;
        state.compare_writes += 1;
    }

    fn enable_interrupt(&mut self) {
        self.lock().irq_enabled = true;
    }

    fn disable_interrupt(&mut self) {
        self.lock().irq_enabled = false;
    }

    fn pend_interrupt(&mut self) {
        self.lock().irq_pending = true;
    }
}

impl<const N: usize> TimerArrayControl<SimTimer, N> {
    /// Lets `ticks` ticks pass on the simulated counter, dispatching every compare match on
    /// the way, including one that lands exactly on the last tick. Returns the number of
    /// callbacks invoked.
    pub fn run_for(&mut self, ticks: u64) -> usize {
        let sim = self.peripheral.clone();
        let mut remaining = ticks;
        let mut fired = 0;
        loop {
            if sim.take_interrupt() {
                fired += self.on_compare_match();
                continue;
            }
            if remaining == 0 || sim.clock().is_none() {
                break;
            }
            let step = sim.next_step(remaining);
            sim.advance(step);
            remaining -= step;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> TickClock {
        TickClock {
            input_frequency_hz: 1_000,
            prescaler: 1,
            tick_frequency_hz: 1_000,
        }
    }

    #[test]
    fn stopped_counter_does_not_move() {
        let sim = SimTimer::new(16);
        sim.advance(10);
        assert_eq!(sim.counter(), 0);
        assert_eq!(sim.elapsed_ticks(), 0);
    }

    #[test]
    fn counter_wraps_at_width() {
        let mut sim = SimTimer::new(16);
        sim.start(clock());
        sim.advance(65_535);
        assert_eq!(sim.counter(), 65_535);
        sim.advance(2);
        assert_eq!(sim.counter(), 1);
        assert_eq!(sim.elapsed_ticks(), 65_537);
    }

    #[test]
    fn interrupt_latches_only_when_enabled() {
        let mut sim = SimTimer::new(16);
        sim.start(clock());
        sim.write_compare(5);
        sim.advance(5);
        assert!(!sim.interrupt_pending());

        sim.enable_interrupt();
        sim.advance(65_536);
        assert!(sim.interrupt_pending());
        assert!(sim.take_interrupt());
        assert!(!sim.take_interrupt());
    }

    #[test]
    fn restart_resets_counter() {
        let mut sim = SimTimer::new(32);
        sim.start(clock());
        sim.advance(1234);
        sim.start(clock());
        assert_eq!(sim.counter(), 0);
        assert_eq!(sim.clock(), Some(clock()));
    }
}
