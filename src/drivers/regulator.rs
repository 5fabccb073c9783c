//! Current-limited PI regulation of the motor command
//!
//! The regulator works on the ratio of measured current to commanded
//! throttle rather than on raw current, so the control target scales
//! with the command. All arithmetic saturates; an overcurrent is handled
//! by driving the output down, never by reporting a fault.

use crate::config;

/// Regulator configuration
#[derive(Clone, Copy, Debug)]
pub struct RegulatorConfig {
    pub low_throttle: u8,
    pub low_current: u8,
    pub full_load_ratio: u16,
    pub overcurrent_ratio: u16,
    pub short_term_limit: i16,
    pub long_term_max: u16,
    pub output_shift: u8,
}

impl RegulatorConfig {
    pub const fn new() -> Self {
        Self {
            low_throttle: config::LOW_THROTTLE,
            low_current: config::LOW_CURRENT,
            full_load_ratio: config::FULL_LOAD_RATIO,
            overcurrent_ratio: config::OVERCURRENT_RATIO,
            short_term_limit: config::SHORT_TERM_LIMIT,
            long_term_max: config::LONG_TERM_MAX,
            output_shift: config::OUTPUT_SHIFT,
        }
    }
}

impl Default for RegulatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Integrator state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct IntegratorState {
    short_term: i16,
    long_term: u16,
}

/// Which branch produced the last output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegulatorMode {
    /// Throttle released, duty forced to zero
    Stopped,
    /// Command or current too small to regulate against
    OpenLoop,
    /// Current at the full-load boundary, output frozen
    Holding,
    /// Dangerous overcurrent, throttle treated as zero
    Cutback,
    ClosedLoop,
}

pub struct Regulator {
    config: RegulatorConfig,
    state: IntegratorState,
    mode: RegulatorMode,
}

impl Regulator {
    pub const fn new(config: RegulatorConfig) -> Self {
        Self {
            config,
            state: IntegratorState { short_term: 0, long_term: 0 },
            mode: RegulatorMode::Stopped,
        }
    }

    /// Run one regulation step, returning the duty command (0..=255)
    pub fn update(&mut self, throttle: u8, current: u8) -> u8 {
        if throttle == 0 {
            self.reset();
            self.mode = RegulatorMode::Stopped;
            return 0;
        }

        if throttle < self.config.low_throttle || current < self.config.low_current {
            self.state.short_term = 0;
            self.state.long_term = (throttle as u16) << self.config.output_shift;
            self.mode = RegulatorMode::OpenLoop;
            return throttle;
        }

        // throttle >= low_throttle > 0 here
        let ratio = ((current as u16) << 8) / throttle as u16;

        let mut wanted = throttle as i32;
        if ratio > self.config.overcurrent_ratio {
            wanted = 0;
            self.mode = RegulatorMode::Cutback;
        } else if ratio > self.config.full_load_ratio {
            self.mode = RegulatorMode::Holding;
            return self.output();
        } else {
            self.mode = RegulatorMode::ClosedLoop;
        }

        let error = wanted - ratio as i32;
        let limit = self.config.short_term_limit as i32;
        let short_term = (self.state.short_term as i32 + error).clamp(-limit, limit);
        let long_term = (self.state.long_term as i32 + short_term + error)
            .clamp(0, self.config.long_term_max as i32);

        self.state.short_term = short_term as i16;
        self.state.long_term = long_term as u16;

        self.output()
    }

    /// Drop both integrators
    pub fn reset(&mut self) {
        self.state = IntegratorState::default();
    }

    pub fn mode(&self) -> RegulatorMode {
        self.mode
    }

    pub fn short_term(&self) -> i16 {
        self.state.short_term
    }

    pub fn long_term(&self) -> u16 {
        self.state.long_term
    }

    fn output(&self) -> u8 {
        let duty = self.state.long_term >> self.config.output_shift;
        duty.min(u8::MAX as u16) as u8
    }
}

impl Default for Regulator {
    fn default() -> Self {
        Self::new(RegulatorConfig::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // xorshift, enough to scatter inputs across the whole range
    fn next(seed: &mut u32) -> u32 {
        *seed ^= *seed << 13;
        *seed ^= *seed >> 17;
        *seed ^= *seed << 5;
        *seed
    }

    #[test]
    fn released_throttle_stops_immediately() {
        let mut reg = Regulator::default();
        for _ in 0..20 {
            reg.update(200, 40);
        }
        assert!(reg.long_term() > 0);

        assert_eq!(reg.update(0, 40), 0);
        assert_eq!(reg.long_term(), 0);
        assert_eq!(reg.short_term(), 0);
        assert_eq!(reg.mode(), RegulatorMode::Stopped);
    }

    #[test]
    fn low_command_runs_open_loop() {
        let mut reg = Regulator::default();
        assert_eq!(reg.update(20, 200), 20);
        assert_eq!(reg.long_term(), 20 * 64);
        assert_eq!(reg.mode(), RegulatorMode::OpenLoop);

        assert_eq!(reg.update(180, 10), 180);
        assert_eq!(reg.long_term(), 180 * 64);
    }

    #[test]
    fn stalled_motor_follows_throttle_without_oscillation() {
        let mut reg = Regulator::default();
        let mut last = 0;
        for _ in 0..10 {
            let duty = reg.update(200, 0);
            assert!(duty >= last);
            assert!(duty <= 200);
            last = duty;
        }
        assert_eq!(last, 200);
    }

    #[test]
    fn closed_loop_ramps_without_exceeding_full_scale() {
        let mut reg = Regulator::default();
        reg.update(200, 0);
        let mut last = reg.update(200, 30);
        assert_eq!(reg.mode(), RegulatorMode::ClosedLoop);
        for _ in 0..200 {
            let duty = reg.update(200, 30);
            assert!(duty >= last);
            last = duty;
        }
        assert_eq!(last, 255);
        assert_eq!(reg.long_term(), 16383);
    }

    #[test]
    fn full_load_freezes_output() {
        let mut reg = Regulator::default();
        let before = reg.update(100, 20);
        // ratio = 110 * 256 / 100 = 281
        assert_eq!(reg.update(100, 110), before);
        assert_eq!(reg.mode(), RegulatorMode::Holding);
        assert_eq!(reg.long_term(), 100 * 64);
    }

    #[test]
    fn overcurrent_integrates_with_zero_throttle() {
        let mut reg = Regulator::default();
        reg.update(100, 20);
        let long_term = reg.long_term() as i32;

        // ratio = 255 * 256 / 100 = 652
        let duty = reg.update(100, 255);
        assert_eq!(reg.mode(), RegulatorMode::Cutback);

        let error = -652;
        let short_term = error.max(-255);
        let expected = (long_term + short_term + error).clamp(0, 16383) >> 6;
        assert_eq!(duty as i32, expected);
        assert_eq!(reg.short_term(), -255);
    }

    #[test]
    fn integrators_stay_bounded() {
        let mut reg = Regulator::default();
        let mut seed = 0x1234_5678;
        for _ in 0..20_000 {
            let throttle = (next(&mut seed) & 0xFF) as u8;
            let current = (next(&mut seed) & 0xFF) as u8;
            reg.update(throttle, current);
            assert!(reg.long_term() <= 16383);
            assert!((-255..=255).contains(&reg.short_term()));
        }
    }
}
