use tracing::debug;

use crate::error::{Result, TimerError};
use crate::pending::PendingSet;
use crate::timer::{Timer, TimerHandle};

#[derive(Debug, Default)]
struct Slot {
    generation: u16,
    timer: Option<Timer>,
}

/// Timer arena plus pending set: the scheduling state shared by the foreground operations and
/// the dispatcher.
///
/// Nothing here touches the peripheral; callers re-synchronise the compare register afterwards.
#[derive(Debug)]
pub(crate) struct TimerTable<const N: usize> {
    slots: [Slot; N],
    pending: PendingSet<N>,
    mask: u32,
}

impl<const N: usize> TimerTable<N> {
    pub(crate) fn new(mask: u32) -> Self {
        assert!(N <= u16::MAX as usize, "timer capacity must fit in a u16 index");
        Self {
            slots: std::array::from_fn(|_| Slot::default()),
            pending: PendingSet::new(mask),
            mask,
        }
    }

    pub(crate) fn pending(&self) -> &PendingSet<N> {
        &self.pending
    }

    pub(crate) fn pending_mut(&mut self) -> &mut PendingSet<N> {
        &mut self.pending
    }

    pub(crate) fn insert(&mut self, timer: Timer) -> Result<TimerHandle> {
        let Some(index) = self.slots.iter().position(|s| s.timer.is_none()) else {
            return Err(TimerError::CapacityExhausted { capacity: N });
        };
        let slot = &mut self.slots[index];
        slot.timer = Some(timer);
        Ok(TimerHandle {
            index: index as u16,
            generation: slot.generation,
        })
    }

    pub(crate) fn remove(&mut self, handle: TimerHandle) -> Result<Timer> {
        if self.get(handle)?.is_attached() {
            return Err(TimerError::TimerAttached(handle));
        }
        let slot = &mut self.slots[handle.index()];
        slot.generation = slot.generation.wrapping_add(1);
        slot.timer.take().ok_or(TimerError::UnknownTimer(handle))
    }

    pub(crate) fn get(&self, handle: TimerHandle) -> Result<&Timer> {
        self.slots
            .get(handle.index())
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.timer.as_ref())
            .ok_or(TimerError::UnknownTimer(handle))
    }

    pub(crate) fn get_mut(&mut self, handle: TimerHandle) -> Result<&mut Timer> {
        self.slots
            .get_mut(handle.index())
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.timer.as_mut())
            .ok_or(TimerError::UnknownTimer(handle))
    }

    fn check_delay(&self, delay: u32) -> Result<()> {
        if delay == 0 || delay > self.mask {
            return Err(TimerError::DelayOutOfRange {
                delay,
                max: self.mask,
            });
        }
        Ok(())
    }

    /// Schedules `handle` to expire `delay` ticks after `now`.
    pub(crate) fn attach(&mut self, handle: TimerHandle, now: u32) -> Result<()> {
        let timer = self.get(handle)?;
        if timer.is_attached() {
            return Err(TimerError::AlreadyAttached(handle));
        }
        let delay = timer.delay();
        self.check_delay(delay)?;

        self.pending.rebase(now);
        let expiry = now.wrapping_add(delay) & self.mask;
        self.schedule(handle, expiry)?;
        debug!(%handle, now, delay, expiry, "timer attached");
        Ok(())
    }

    /// Schedules `handle` to expire `delay` ticks after the next expiry of `reference`.
    pub(crate) fn attach_synchronized(
        &mut self,
        handle: TimerHandle,
        reference: TimerHandle,
        now: u32,
    ) -> Result<()> {
        let timer = self.get(handle)?;
        if timer.is_attached() {
            return Err(TimerError::AlreadyAttached(handle));
        }
        let delay = timer.delay();
        let reference_expiry = self
            .get(reference)?
            .absolute_expiry()
            .ok_or(TimerError::ReferenceNotAttached(reference))?;
        self.check_delay(delay)?;

        self.pending.rebase(now);
        if !self.pending.contains(reference) {
            // The reference is being dispatched in this pass, so its expiry is at or behind now.
            let lag = now.wrapping_sub(reference_expiry) & self.mask;
            if delay <= lag {
                return Err(TimerError::ExpiryPassed { delay, lag });
            }
        } else {
            let lead = self.pending.distance(reference_expiry);
            if lead as u64 + delay as u64 > self.mask as u64 {
                return Err(TimerError::DelayOutOfRange {
                    delay,
                    max: self.mask - lead,
                });
            }
        }
        let expiry = reference_expiry.wrapping_add(delay) & self.mask;
        self.schedule(handle, expiry)?;
        debug!(%handle, %reference, delay, expiry, "timer attached in sync");
        Ok(())
    }

    fn schedule(&mut self, handle: TimerHandle, expiry: u32) -> Result<()> {
        self.pending
            .insert(handle, expiry)
            .map_err(|_| TimerError::CapacityExhausted { capacity: N })?;
        self.get_mut(handle)?.schedule(expiry);
        Ok(())
    }

    /// Moves a periodic timer popped by the dispatcher to its next expiry.
    ///
    /// If the interrupt ran so late that the next expiry is not after `now` either, the timer
    /// stays out of the pending set and the expiry is returned: it is due again in this pass.
    pub(crate) fn rearm(&mut self, handle: TimerHandle, now: u32) -> Result<Option<u32>> {
        let timer = self.get(handle)?;
        let (expiry, delay) = (timer.raw_expiry(), timer.delay());
        let next = expiry.wrapping_add(delay) & self.mask;
        let lag = now.wrapping_sub(expiry) & self.mask;
        if delay <= lag {
            self.get_mut(handle)?.schedule(next);
            return Ok(Some(next));
        }
        self.schedule(handle, next)?;
        Ok(None)
    }

    pub(crate) fn detach(&mut self, handle: TimerHandle) -> Result<()> {
        let timer = self.get_mut(handle)?;
        if !timer.is_attached() {
            return Err(TimerError::NotAttached(handle));
        }
        timer.unschedule();
        self.pending.remove(handle);
        debug!(%handle, "timer detached");
        Ok(())
    }

    pub(crate) fn detach_all(&mut self) {
        for timer in self.slots.iter_mut().filter_map(|s| s.timer.as_mut()) {
            timer.unschedule();
        }
        self.pending.clear();
    }
}
