use tracing::{trace, warn};

use crate::control::TimerArrayControl;
use crate::error::Result;
use crate::peripheral::CounterPeripheral;
use crate::table::TimerTable;
use crate::timer::TimerHandle;

/// Scheduling operations available to callbacks, independent of the array capacity.
trait Schedule {
    fn attach(&mut self, handle: TimerHandle, now: u32) -> Result<()>;
    fn attach_synchronized(
        &mut self,
        handle: TimerHandle,
        reference: TimerHandle,
        now: u32,
    ) -> Result<()>;
    fn detach(&mut self, handle: TimerHandle) -> Result<()>;
    fn is_attached(&self, handle: TimerHandle) -> Result<bool>;
}

impl<const N: usize> Schedule for TimerTable<N> {
    fn attach(&mut self, handle: TimerHandle, now: u32) -> Result<()> {
        TimerTable::attach(self, handle, now)
    }

    fn attach_synchronized(
        &mut self,
        handle: TimerHandle,
        reference: TimerHandle,
        now: u32,
    ) -> Result<()> {
        TimerTable::attach_synchronized(self, handle, reference, now)
    }

    fn detach(&mut self, handle: TimerHandle) -> Result<()> {
        TimerTable::detach(self, handle)
    }

    fn is_attached(&self, handle: TimerHandle) -> Result<bool> {
        Ok(self.get(handle)?.is_attached())
    }
}

/// What a callback sees while it runs in interrupt context.
///
/// Changes made through the context take effect immediately for the rest of the dispatch
/// pass: a timer detached here does not fire even if it was due in the same pass. The compare
/// register is reprogrammed once, after the last callback returns.
pub struct ExpiryContext<'a> {
    table: &'a mut dyn Schedule,
    handle: TimerHandle,
    expiry: u32,
    now: u32,
}

impl ExpiryContext<'_> {
    /// The timer whose callback is running.
    pub fn handle(&self) -> TimerHandle {
        self.handle
    }

    /// Counter value this expiry was scheduled for.
    pub fn expiry(&self) -> u32 {
        self.expiry
    }

    /// Counter value read when the interrupt was taken.
    pub fn now(&self) -> u32 {
        self.now
    }

    pub fn attach(&mut self, handle: TimerHandle) -> Result<()> {
        self.table.attach(handle, self.now)
    }

    pub fn attach_synchronized(
        &mut self,
        handle: TimerHandle,
        reference: TimerHandle,
    ) -> Result<()> {
        self.table.attach_synchronized(handle, reference, self.now)
    }

    pub fn detach(&mut self, handle: TimerHandle) -> Result<()> {
        self.table.detach(handle)
    }

    pub fn is_attached(&self, handle: TimerHandle) -> Result<bool> {
        self.table.is_attached(handle)
    }
}

impl<P: CounterPeripheral, const N: usize> TimerArrayControl<P, N> {
    /// Compare-match interrupt handler. Returns the number of callbacks invoked.
    ///
    /// Every pending timer whose expiry the counter has reached fires, in expiry order (ties in
    /// attach order). Periodic timers are re-armed at `expiry + delay`, keeping their phase
    /// regardless of interrupt latency; one-shot timers are detached. Scheduling state is
    /// updated before each callback runs, so a periodic callback may detach itself and a
    /// one-shot callback may re-attach itself.
    ///
    /// A periodic timer whose next expiry has also gone by while the interrupt was held off
    /// fires once per missed period, back to back, before the next timer in the pass.
    ///
    /// Must not be re-entered; the single interrupt line guarantees that on hardware.
    pub fn on_compare_match(&mut self) -> usize {
        let now = self.counter_now();
        let due = self.table.pending_mut().pop_due(now);
        if due.is_empty() {
            trace!(now, "spurious compare match");
            self.sync_compare();
            return 0;
        }

        let mut fired = 0;
        for entry in due {
            let mut expiry = entry.expiry;
            while let Some(again) = self.fire(entry.handle, expiry, now) {
                fired += 1;
                match again {
                    Some(next) => {
                        trace!(handle = %entry.handle, next, now, "periodic timer catching up");
                        expiry = next;
                    }
                    None => break,
                }
            }
        }

        self.sync_compare();
        fired
    }

    /// Updates the timer's schedule and runs its callback for the expiry at `expiry`.
    ///
    /// Returns `None` if the timer no longer waits for that expiry, otherwise whether it is
    /// due again in this pass.
    fn fire(&mut self, handle: TimerHandle, expiry: u32, now: u32) -> Option<Option<u32>> {
        let periodic = match self.table.get(handle) {
            // Detached, or detached and re-attached, by an earlier callback in this pass.
            Ok(timer)
                if timer.is_attached()
                    && timer.raw_expiry() == expiry
                    && !self.table.pending().contains(handle) =>
            {
                timer.is_periodic()
            }
            _ => return None,
        };

        let mut again = None;
        if periodic {
            match self.table.rearm(handle, now) {
                Ok(next) => again = next,
                Err(err) => {
                    warn!(%handle, %err, "failed to re-arm periodic timer");
                    if let Ok(timer) = self.table.get_mut(handle) {
                        timer.unschedule();
                    }
                }
            }
        } else if let Ok(timer) = self.table.get_mut(handle) {
            timer.unschedule();
        }

        let mut callback = self.table.get_mut(handle).ok()?.take_callback()?;
        trace!(%handle, expiry, now, "timer fired");
        let mut ctx = ExpiryContext {
            table: &mut self.table,
            handle,
            expiry,
            now,
        };
        callback(&mut ctx);
        if let Ok(timer) = self.table.get_mut(handle) {
            timer.restore_callback(callback);
        }
        Some(again)
    }
}
