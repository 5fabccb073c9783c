//! Servo-style command pulse for the external motor driver
//!
//! A 20ms frame starts with the command line asserted; a second timer
//! compare ends the pulse 1..2ms later depending on the duty latched at
//! the start of the frame.

use embedded_hal::digital::v2::OutputPin;

use crate::config::{PULSE_MIN_TICKS, PULSE_SPAN_TICKS};

/// Timer compare that ends the pulse
pub trait PulseTimer {
    /// Fire the falling-edge event `ticks` after the frame start
    fn set_falling_edge(&mut self, ticks: u16);
}

/// Falling-edge offset for a duty command
#[inline]
pub fn pulse_ticks(duty: u8) -> u16 {
    PULSE_MIN_TICKS + (duty as u32 * PULSE_SPAN_TICKS as u32 / u8::MAX as u32) as u16
}

pub struct PulseGenerator<L, T> {
    line: L,
    timer: T,
    latched: u8,
}

impl<L: OutputPin, T: PulseTimer> PulseGenerator<L, T> {
    pub fn new(mut line: L, mut timer: T) -> Self {
        line.set_low().ok();
        timer.set_falling_edge(PULSE_MIN_TICKS);
        Self {
            line,
            timer,
            latched: 0,
        }
    }

    /// Frame start: assert the line and latch `duty` for this pulse
    pub fn begin_period(&mut self, duty: u8) {
        self.latched = duty;
        self.timer.set_falling_edge(pulse_ticks(duty));
        self.line.set_high().ok();
    }

    /// Falling edge: release the line, returning the duty this pulse carried
    pub fn end_pulse(&mut self) -> u8 {
        self.line.set_low().ok();
        self.latched
    }

    /// Hold the line low for good
    pub fn park(&mut self) {
        self.latched = 0;
        self.line.set_low().ok();
    }

    pub fn latched(&self) -> u8 {
        self.latched
    }

    pub fn release(self) -> (L, T) {
        (self.line, self.timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::pin::{Mock as PinMock, State, Transaction};

    #[derive(Default)]
    struct CompareLog {
        edges: Vec<u16>,
    }

    impl PulseTimer for &mut CompareLog {
        fn set_falling_edge(&mut self, ticks: u16) {
            self.edges.push(ticks);
        }
    }

    #[test]
    fn pulse_width_spans_one_to_two_ms() {
        assert_eq!(pulse_ticks(0), 250);
        assert_eq!(pulse_ticks(255), 500);
        assert_eq!(pulse_ticks(128), 375);
    }

    #[test]
    fn duty_is_latched_for_the_whole_pulse() {
        let expectations = [
            Transaction::set(State::Low),
            Transaction::set(State::High),
            Transaction::set(State::Low),
            Transaction::set(State::High),
            Transaction::set(State::Low),
        ];
        let mut log = CompareLog::default();
        let mut line = PinMock::new(&expectations);
        {
            let mut pwm = PulseGenerator::new(line.clone(), &mut log);

            pwm.begin_period(200);
            assert_eq!(pwm.latched(), 200);
            assert_eq!(pwm.end_pulse(), 200);

            pwm.begin_period(40);
            assert_eq!(pwm.end_pulse(), 40);
        }
        assert_eq!(log.edges, [250, pulse_ticks(200), pulse_ticks(40)]);
        line.done();
    }
}
