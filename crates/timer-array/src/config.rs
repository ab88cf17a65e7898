use std::time::Duration;

use crate::error::{Result, TimerError};

/// Counter widths the engine knows how to wrap.
pub const SUPPORTED_COUNTER_BITS: [u32; 2] = [16, 32];

/// Construction-time description of the hardware counter.
///
/// The tick rate is `input_frequency_hz / frequency_division`, truncated. A division that does
/// not divide the input clock evenly is not an error; the truncated rate is what the hardware
/// will run at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerArrayConfig {
    pub input_frequency_hz: u32,
    pub frequency_division: u32,
    /// Usable counter width. Using 16 on a 32-bit counter works but limits the longest delay.
    pub counter_bits: u32,
}

impl TimerArrayConfig {
    pub const fn new(input_frequency_hz: u32, frequency_division: u32, counter_bits: u32) -> Self {
        Self {
            input_frequency_hz,
            frequency_division,
            counter_bits,
        }
    }

    /// Checks the parts of the configuration that can be judged before `start()`.
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_COUNTER_BITS.contains(&self.counter_bits) {
            return Err(TimerError::InvalidCounterWidth(self.counter_bits));
        }
        Ok(())
    }

    /// Checks the frequency division and returns the resulting tick frequency.
    pub fn validate_division(&self) -> Result<u32> {
        self.tick_frequency_hz().ok_or(TimerError::Unconfigured {
            division: self.frequency_division,
            input_hz: self.input_frequency_hz,
        })
    }

    /// `2^bits - 1`.
    pub fn counter_mask(&self) -> u32 {
        match self.counter_bits {
            32 => u32::MAX,
            bits => (1u32 << bits.min(31)) - 1,
        }
    }

    /// Longest delay a single timer can be scheduled with, in ticks.
    pub fn max_delay(&self) -> u32 {
        self.counter_mask()
    }

    /// Achievable tick frequency, or `None` if the division is zero or exceeds the input clock.
    pub fn tick_frequency_hz(&self) -> Option<u32> {
        match self.input_frequency_hz.checked_div(self.frequency_division) {
            Some(0) | None => None,
            Some(hz) => Some(hz),
        }
    }

    /// Converts a wall-clock duration into ticks, rounding down.
    ///
    /// Returns `None` when the tick rate is invalid or the result does not fit a single delay.
    pub fn ticks_from_duration(&self, duration: Duration) -> Option<u32> {
        let hz = self.tick_frequency_hz()? as u128;
        let ticks = duration.as_nanos() * hz / 1_000_000_000u128;
        u32::try_from(ticks)
            .ok()
            .filter(|&ticks| ticks <= self.max_delay())
    }

    /// Converts a tick count into wall-clock time, rounding up to the next nanosecond.
    pub fn duration_from_ticks(&self, ticks: u32) -> Option<Duration> {
        let hz = self.tick_frequency_hz()? as u128;
        let numer = (ticks as u128) * 1_000_000_000u128;
        let nanos = (numer + hz - 1) / hz;
        Some(Duration::from_nanos(nanos as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_mask_matches_width() {
        assert_eq!(TimerArrayConfig::new(1, 1, 16).counter_mask(), 0xFFFF);
        assert_eq!(TimerArrayConfig::new(1, 1, 32).counter_mask(), u32::MAX);
    }

    #[test]
    fn rejects_unsupported_width() {
        let err = TimerArrayConfig::new(84_000_000, 8_400, 24)
            .validate()
            .unwrap_err();
        assert_eq!(err, TimerError::InvalidCounterWidth(24));
    }

    #[test]
    fn tick_frequency_truncates() {
        // 84 MHz / 10 kHz divides evenly; 1000 / 3 does not.
        let cfg = TimerArrayConfig::new(84_000_000, 84_000_000 / 10_000, 16);
        assert_eq!(cfg.tick_frequency_hz(), Some(10_000));
        assert_eq!(TimerArrayConfig::new(1000, 3, 16).tick_frequency_hz(), Some(333));
    }

    #[test]
    fn zero_or_oversized_division_is_unconfigured() {
        for division in [0, 1001] {
            let cfg = TimerArrayConfig::new(1000, division, 16);
            assert_eq!(
                cfg.validate_division(),
                Err(TimerError::Unconfigured {
                    division,
                    input_hz: 1000
                })
            );
        }
    }

    #[test]
    fn duration_conversions_at_10khz() {
        let cfg = TimerArrayConfig::new(84_000_000, 8_400, 16);
        assert_eq!(cfg.ticks_from_duration(Duration::from_millis(500)), Some(5000));
        // 6.5536 s is one tick past the 16-bit range.
        assert_eq!(cfg.ticks_from_duration(Duration::from_micros(6_553_600)), None);
        assert_eq!(cfg.duration_from_ticks(5000), Some(Duration::from_millis(500)));
    }
}
