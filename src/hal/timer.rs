use avr_device::atmega128::{TC0, TC2};
use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::config::TICK_COMPARE;

/// Timer2: WGM21 (CTC), clk/256
const TCCR2_CTC_DIV256: u8 = 0x0C;

/// Start the 2ms rotation tick (Timer2 compare)
pub fn start_tick() {
    unsafe {
        let p = TC2::ptr();
        (*p).tcnt2.write(|w| w.bits(0));
        (*p).ocr2.write(|w| w.bits(TICK_COMPARE));
        (*p).tccr2.write(|w| w.bits(TCCR2_CTC_DIV256));
    }
}

/// Timer0 normal mode, clk/64
const TCCR0_DIV64: u8 = 0x04;
const US_PER_TICK: u16 = 4;
const TICKS_PER_MS: u16 = 250;

/// Busy-wait delay on the free-running Timer0
///
/// Foreground only; handlers may stretch a delay but never shorten it.
pub struct Delay {
    _private: (),
}

impl Delay {
    pub fn new() -> Self {
        unsafe {
            (*TC0::ptr()).tccr0.write(|w| w.bits(TCCR0_DIV64));
        }
        Self { _private: () }
    }

    fn counter(&self) -> u8 {
        unsafe { (*TC0::ptr()).tcnt0.read().bits() }
    }

    fn wait_ticks(&mut self, ticks: u16) {
        let mut remaining = ticks;
        let mut last = self.counter();
        while remaining > 0 {
            let now = self.counter();
            let elapsed = now.wrapping_sub(last) as u16;
            remaining = remaining.saturating_sub(elapsed);
            last = now;
        }
    }
}

impl DelayUs<u16> for Delay {
    fn delay_us(&mut self, us: u16) {
        self.wait_ticks(us / US_PER_TICK + 1);
    }
}

impl DelayMs<u16> for Delay {
    fn delay_ms(&mut self, ms: u16) {
        for _ in 0..ms {
            self.wait_ticks(TICKS_PER_MS);
        }
    }
}
