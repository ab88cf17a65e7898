/// Clock settings handed to [`CounterPeripheral::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickClock {
    pub input_frequency_hz: u32,
    /// Number of input clocks per counter tick.
    pub prescaler: u32,
    pub tick_frequency_hz: u32,
}

/// A free-running up-counter with one compare register and one compare-match interrupt.
///
/// The counter wraps at the width configured in [`crate::TimerArrayConfig`]. Implementations
/// must raise the interrupt (and eventually call
/// [`crate::TimerArrayControl::on_compare_match`]) when the counter reaches the compare value
/// while the interrupt is enabled.
pub trait CounterPeripheral {
    /// Applies the prescaler, resets the counter to zero and lets it run.
    fn start(&mut self, clock: TickClock);

    fn read_counter(&self) -> u32;

    fn write_compare(&mut self, value: u32);

    fn enable_interrupt(&mut self);

    fn disable_interrupt(&mut self);

    /// Marks the compare-match interrupt pending in software.
    ///
    /// Used when a compare value was programmed after the counter had already passed it, so the
    /// match would otherwise only happen after a full counter wrap.
    fn pend_interrupt(&mut self);
}
