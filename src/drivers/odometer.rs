//! Wheel rotation timing, speed, distance and energy accumulation

/// Speed in 1/4 km/h for rotation periods 11..=255 ticks (2ms each)
pub const SPEED_TABLE: [u8; 245] = [
    247, 227, 209, 194, 181, 170, 160, 151, 143, 136, 130, 124, 119, 114, 109, 105, 101, 97, 94,
    91, 88, 85, 83, 80, 78, 76, 74, 72, 70, 68, 67, 65, 64, 62, 61, 60, 58, 57, 56, 55, 54, 53, 52,
    51, 50, 49, 48, 47, 47, 46, 45, 44, 44, 43, 42, 42, 41, 40, 40, 39, 39, 38, 38, 37, 37, 36, 36,
    35, 35, 34, 34, 34, 33, 33, 32, 32, 32, 31, 31, 31, 30, 30, 30, 29, 29, 29, 28, 28, 28, 28, 27,
    27, 27, 27, 26, 26, 26, 26, 25, 25, 25, 25, 25, 24, 24, 24, 24, 24, 23, 23, 23, 23, 23, 22, 22,
    22, 22, 22, 22, 21, 21, 21, 21, 21, 21, 20, 20, 20, 20, 20, 20, 20, 19, 19, 19, 19, 19, 19, 19,
    19, 18, 18, 18, 18, 18, 18, 18, 18, 18, 17, 17, 17, 17, 17, 17, 17, 17, 17, 17, 16, 16, 16, 16,
    16, 16, 16, 16, 16, 16, 16, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 14, 14, 14, 14,
    14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13,
    13, 13, 13, 13, 13, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12,
    12, 11, 11, 11, 11, 11, 11, 11, 11, 0,
];

/// Periods at or below this are faster than the table resolves
pub const MIN_TABLE_PERIOD: u8 = 10;

/// Reported when the wheel turns faster than the table covers
pub const MAX_SPEED: u8 = u8::MAX;

/// Period value meaning "no pulse within the counter range"
pub const STOPPED_PERIOD: u8 = u8::MAX;

const _: () = assert!(SPEED_TABLE.len() == (u8::MAX - MIN_TABLE_PERIOD) as usize);

/// Convert a rotation period (ticks) into speed (1/4 km/h)
pub fn speed_for_period(period: u8) -> u8 {
    if period <= MIN_TABLE_PERIOD {
        return MAX_SPEED;
    }
    SPEED_TABLE
        .get((period - MIN_TABLE_PERIOD - 1) as usize)
        .copied()
        .unwrap_or(0)
}

/// Session counters and rotation timing
#[derive(Clone, Debug, Default)]
pub struct Odometer {
    cycle_time: u8,
    last_period: u8,
    speed: u8,
    distance: u32,
    energy: u32,
}

impl Odometer {
    pub const fn new() -> Self {
        Self {
            cycle_time: 0,
            last_period: 0,
            speed: 0,
            distance: 0,
            energy: 0,
        }
    }

    /// 2ms tick: advance the period counter, declare standstill on saturation
    pub fn tick(&mut self) {
        if self.cycle_time < u8::MAX {
            self.cycle_time += 1;
        } else {
            self.last_period = STOPPED_PERIOD;
            self.speed = 0;
        }
    }

    /// One wheel revolution
    pub fn rotation_pulse(&mut self) {
        self.last_period = self.cycle_time;
        self.cycle_time = 0;
        self.distance = self.distance.saturating_add(1);
        self.speed = speed_for_period(self.last_period);
    }

    /// Energy sample for one regulation cycle; `+1` models quiescent draw
    pub fn sample_energy(&mut self, current: u8) {
        self.energy = self.energy.saturating_add(current as u32 + 1);
    }

    /// Zero the session counters, returning the energy they held
    pub fn reset_session(&mut self) -> u32 {
        let energy = self.energy;
        self.distance = 0;
        self.energy = 0;
        energy
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn last_period(&self) -> u8 {
        self.last_period
    }

    pub fn distance(&self) -> u32 {
        self.distance
    }

    pub fn energy(&self) -> u32 {
        self.energy
    }
}
