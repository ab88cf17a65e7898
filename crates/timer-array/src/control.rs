use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::config::TimerArrayConfig;
use crate::error::Result;
use crate::peripheral::{CounterPeripheral, TickClock};
use crate::table::TimerTable;
use crate::timer::{Timer, TimerHandle};

/// Multiplexes up to `N` logical timers onto one [`CounterPeripheral`].
///
/// Foreground operations ([`attach`](Self::attach), [`detach`](Self::detach),
/// [`attach_synchronized`](Self::attach_synchronized), ...) run with the peripheral's interrupt
/// masked and re-synchronise the compare register before returning, on success and on error.
/// The interrupt handler calls [`on_compare_match`](Self::on_compare_match).
///
/// Timers attached before the first [`start`](Self::start) are scheduled relative to counter
/// value 0, which is where `start` resets the counter; attaching early is therefore a way to
/// line timers up at startup.
pub struct TimerArrayControl<P: CounterPeripheral, const N: usize> {
    pub(crate) peripheral: P,
    config: TimerArrayConfig,
    pub(crate) table: TimerTable<N>,
    started: bool,
    compare: Option<u32>,
}

impl<P: CounterPeripheral, const N: usize> TimerArrayControl<P, N> {
    pub fn new(peripheral: P, config: TimerArrayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            peripheral,
            config,
            table: TimerTable::new(config.counter_mask()),
            started: false,
            compare: None,
        })
    }

    pub fn config(&self) -> &TimerArrayConfig {
        &self.config
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Programs the prescaler, resets the counter to zero and arms the compare interrupt.
    ///
    /// Calling `start` again re-initialises the array: every attached timer is detached
    /// (without firing) before the counter restarts. Registered timers stay registered.
    pub fn start(&mut self) -> Result<()> {
        let tick_frequency_hz = self.config.validate_division()?;

        let mut cs = self.critical();
        if cs.started {
            debug!(
                pending = cs.table.pending().len(),
                "restarting timer array, detaching all timers"
            );
            cs.table.detach_all();
        }
        let clock = TickClock {
            input_frequency_hz: cs.config.input_frequency_hz,
            prescaler: cs.config.frequency_division,
            tick_frequency_hz,
        };
        cs.peripheral.start(clock);
        cs.started = true;
        cs.compare = None;
        debug!(
            tick_frequency_hz,
            prescaler = clock.prescaler,
            counter_bits = cs.config.counter_bits,
            "timer array started"
        );
        Ok(())
    }

    /// Registers a timer and returns its handle. The timer starts detached.
    pub fn add_timer(&mut self, timer: Timer) -> Result<TimerHandle> {
        self.critical().table.insert(timer)
    }

    /// Unregisters a detached timer and hands it back.
    pub fn remove_timer(&mut self, handle: TimerHandle) -> Result<Timer> {
        self.critical().table.remove(handle)
    }

    pub fn timer(&self, handle: TimerHandle) -> Result<&Timer> {
        self.table.get(handle)
    }

    pub fn is_attached(&self, handle: TimerHandle) -> Result<bool> {
        Ok(self.table.get(handle)?.is_attached())
    }

    /// Schedules the timer `delay` ticks after the current counter value.
    pub fn attach(&mut self, handle: TimerHandle) -> Result<()> {
        let mut cs = self.critical();
        let now = cs.counter_now();
        cs.table.attach(handle, now)
    }

    /// Schedules the timer `delay` ticks after the next expiry of `reference`.
    ///
    /// The new timer is phase-locked to the reference's cycle rather than to the moment of
    /// the call, so the time spent between the two attaches does not shift it.
    pub fn attach_synchronized(
        &mut self,
        handle: TimerHandle,
        reference: TimerHandle,
    ) -> Result<()> {
        let mut cs = self.critical();
        let now = cs.counter_now();
        cs.table.attach_synchronized(handle, reference, now)
    }

    /// Cancels the timer. Its callback will not run again unless it is re-attached.
    pub fn detach(&mut self, handle: TimerHandle) -> Result<()> {
        self.critical().table.detach(handle)
    }

    /// Handles of the scheduled timers, in the order they will fire.
    pub fn pending(&self) -> impl Iterator<Item = TimerHandle> + '_ {
        self.table.pending().iter().map(|e| e.handle)
    }

    pub fn pending_len(&self) -> usize {
        self.table.pending().len()
    }

    /// Ticks until the next compare match, if the array is running and a timer is scheduled.
    pub fn ticks_until_next(&self) -> Option<u32> {
        if !self.started {
            return None;
        }
        let nearest = self.table.pending().nearest()?;
        Some(nearest.expiry.wrapping_sub(self.counter_now()) & self.config.counter_mask())
    }

    pub(crate) fn counter_now(&self) -> u32 {
        if self.started {
            self.peripheral.read_counter() & self.config.counter_mask()
        } else {
            0
        }
    }

    fn critical(&mut self) -> Critical<'_, P, N> {
        self.peripheral.disable_interrupt();
        Critical { control: self }
    }

    /// Points the compare register at the nearest pending expiry and sets the interrupt enable
    /// to match: enabled iff started and something is pending.
    pub(crate) fn sync_compare(&mut self) {
        let nearest = if self.started {
            self.table.pending().nearest().map(|e| e.expiry)
        } else {
            None
        };
        let Some(expiry) = nearest else {
            self.peripheral.disable_interrupt();
            self.compare = None;
            return;
        };

        if self.compare != Some(expiry) {
            self.peripheral.write_compare(expiry);
            self.compare = Some(expiry);
        }
        self.peripheral.enable_interrupt();
        if self.table.pending().is_due(self.counter_now()) {
            self.peripheral.pend_interrupt();
        }
    }
}

/// Scoped critical section: the peripheral interrupt is masked while this guard lives, and
/// the compare register and interrupt enable are restored from the pending set when it drops.
struct Critical<'a, P: CounterPeripheral, const N: usize> {
    control: &'a mut TimerArrayControl<P, N>,
}

impl<P: CounterPeripheral, const N: usize> Deref for Critical<'_, P, N> {
    type Target = TimerArrayControl<P, N>;

    fn deref(&self) -> &Self::Target {
        self.control
    }
}

impl<P: CounterPeripheral, const N: usize> DerefMut for Critical<'_, P, N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.control
    }
}

impl<P: CounterPeripheral, const N: usize> Drop for Critical<'_, P, N> {
    fn drop(&mut self) {
        self.control.sync_compare();
    }
}
