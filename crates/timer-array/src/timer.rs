use std::fmt;

use crate::dispatch::ExpiryContext;

pub(crate) type Callback = Box<dyn FnMut(&mut ExpiryContext<'_>) + Send>;

/// Stable reference to a timer registered with a [`crate::TimerArrayControl`].
///
/// Handles carry a generation so that a handle kept after [`remove_timer`] cannot reach the
/// timer that later reuses the slot.
///
/// [`remove_timer`]: crate::TimerArrayControl::remove_timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    pub(crate) index: u16,
    pub(crate) generation: u16,
}

impl TimerHandle {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// One logical timer: a delay in ticks, a mode and a notification callback.
///
/// `absolute_expiry` and `attached` are scheduling state owned by the control; the application
/// can only read them.
pub struct Timer {
    delay: u32,
    periodic: bool,
    absolute_expiry: u32,
    attached: bool,
    callback: Option<Callback>,
}

impl Timer {
    /// Creates a timer whose callback takes no arguments.
    pub fn new<F>(delay: u32, periodic: bool, mut callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::with_context(delay, periodic, move |_: &mut ExpiryContext<'_>| callback())
    }

    /// Creates a timer whose callback can inspect the expiry and attach/detach timers.
    pub fn with_context<F>(delay: u32, periodic: bool, callback: F) -> Self
    where
        F: FnMut(&mut ExpiryContext<'_>) + Send + 'static,
    {
        Self {
            delay,
            periodic,
            absolute_expiry: 0,
            attached: false,
            callback: Some(Box::new(callback)),
        }
    }

    pub fn delay(&self) -> u32 {
        self.delay
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Counter value of the next expiry, if the timer is scheduled.
    pub fn absolute_expiry(&self) -> Option<u32> {
        self.attached.then_some(self.absolute_expiry)
    }

    pub(crate) fn schedule(&mut self, expiry: u32) {
        self.absolute_expiry = expiry;
        self.attached = true;
    }

    pub(crate) fn unschedule(&mut self) {
        self.attached = false;
    }

    pub(crate) fn raw_expiry(&self) -> u32 {
        self.absolute_expiry
    }

    pub(crate) fn take_callback(&mut self) -> Option<Callback> {
        self.callback.take()
    }

    pub(crate) fn restore_callback(&mut self, callback: Callback) {
        self.callback = Some(callback);
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("delay", &self.delay)
            .field("periodic", &self.periodic)
            .field("absolute_expiry", &self.absolute_expiry)
            .field("attached", &self.attached)
            .finish_non_exhaustive()
    }
}
