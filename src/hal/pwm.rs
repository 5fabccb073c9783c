//! Timer1 frame timing for the servo-style command pulse
//!
//! CTC on OCR1A gives the 20ms frame (compare A starts the pulse), compare
//! B ends it. The line itself is a plain GPIO driven from the handlers.

use avr_device::atmega128::TC1;

use crate::config::{PULSE_MIN_TICKS, SERVO_PERIOD_TICKS};
use crate::drivers::pulse::PulseTimer;

/// WGM12: CTC with TOP = OCR1A
const WGM12: u8 = 1 << 3;
/// clk/64 = 4us per tick
const CS_DIV64: u8 = 0x03;

pub struct ServoTimer {
    _private: (),
}

impl ServoTimer {
    pub fn new() -> Self {
        unsafe {
            let p = TC1::ptr();
            (*p).tccr1b.write(|w| w.bits(0));
            (*p).tccr1a.write(|w| w.bits(0));
            (*p).tcnt1.write(|w| w.bits(0));
            (*p).ocr1a.write(|w| w.bits(SERVO_PERIOD_TICKS));
            (*p).ocr1b.write(|w| w.bits(PULSE_MIN_TICKS));
            (*p).tccr1b.write(|w| w.bits(WGM12 | CS_DIV64));
        }
        Self { _private: () }
    }
}

impl PulseTimer for ServoTimer {
    #[inline]
    fn set_falling_edge(&mut self, ticks: u16) {
        unsafe {
            (*TC1::ptr()).ocr1b.write(|w| w.bits(ticks));
        }
    }
}
