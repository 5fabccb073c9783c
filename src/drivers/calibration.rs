//! Sensor calibration
//!
//! Raw 8-bit conversions are clamped to each sensor's usable window and
//! then linearised through a per-sensor lookup table.

use crate::config::SAMPLE_RETRY_LIMIT;

/// Throttle input, 0.86V..4.5V mapped onto a "wanted acceleration" curve
pub const THROTTLE_TABLE: [u8; 194] = [
    0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 6, 6, 6, 6,
    7, 7, 7, 8, 8, 9, 9, 9, 10, 10, 11, 11, 12, 12, 13, 13, 14, 14, 15, 16, 16, 17, 17, 18, 19, 20,
    20, 21, 22, 23, 24, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 38, 39, 40, 41, 43, 44,
    45, 47, 48, 49, 51, 52, 54, 55, 57, 58, 60, 62, 63, 65, 67, 69, 71, 72, 74, 76, 78, 80, 82, 84,
    86, 89, 91, 93, 95, 97, 100, 102, 104, 107, 109, 112, 114, 117, 119, 122, 125, 127, 130, 133,
    136, 139, 141, 144, 147, 150, 153, 156, 160, 163, 166, 169, 172, 176, 179, 182, 186, 189, 192,
    196, 199, 203, 206, 210, 214, 217, 221, 225, 228, 232, 236, 240, 244, 248, 252, 255,
];

/// Motor current, 0.6V (0A)..2.6V (50A) mapped linearly onto 0..255
pub const CURRENT_TABLE: [u8; 109] = [
    0, 3, 5, 8, 10, 12, 15, 17, 19, 22, 24, 26, 29, 31, 34, 36, 38, 41, 43, 45, 48, 50, 52, 55, 57,
    59, 62, 64, 67, 69, 71, 74, 76, 78, 81, 83, 85, 88, 90, 93, 95, 97, 100, 102, 104, 107, 109,
    111, 114, 116, 118, 121, 123, 126, 128, 130, 133, 135, 137, 140, 142, 144, 147, 149, 152, 154,
    156, 159, 161, 163, 166, 168, 170, 173, 175, 177, 180, 182, 185, 187, 189, 192, 194, 196, 199,
    201, 203, 206, 208, 211, 213, 215, 218, 220, 222, 225, 227, 229, 232, 234, 236, 239, 241, 244,
    246, 248, 251, 253, 255,
];

/// Static description of one analog sensor
#[derive(Clone, Copy, Debug)]
pub struct SensorCalibration {
    pub channel: u8,
    pub min: u8,
    pub max: u8,
    /// `None` keeps the clamped reading as-is
    pub table: Option<&'static [u8]>,
}

/// Motor current on ADC2, 1/5A per step
pub const CURRENT: SensorCalibration = SensorCalibration {
    channel: 2,
    min: 33,
    max: 141,
    table: Some(&CURRENT_TABLE),
};

/// Battery voltage on ADC4, 1/25V per step above 10V
pub const VOLTAGE: SensorCalibration = SensorCalibration {
    channel: 4,
    min: 0,
    max: 180,
    table: None,
};

/// Throttle on ADC5
pub const THROTTLE: SensorCalibration = SensorCalibration {
    channel: 5,
    min: 51,
    max: 244,
    table: Some(&THROTTLE_TABLE),
};

// The clamped domain must cover each table exactly
const _: () = assert!(CURRENT_TABLE.len() == (141 - 33) + 1);
const _: () = assert!(THROTTLE_TABLE.len() == (244 - 51) + 1);

/// Clamp a raw sample into `0..=max-min`
#[inline]
pub fn clamp_to_range(raw: u8, min: u8, max: u8) -> u8 {
    if raw < min {
        0
    } else if raw > max {
        max - min
    } else {
        raw - min
    }
}

impl SensorCalibration {
    /// Convert a raw conversion result into the sensor's physical scale
    pub fn apply(&self, raw: u8) -> u8 {
        let index = clamp_to_range(raw, self.min, self.max);
        match self.table {
            Some(table) => table[index as usize],
            None => index,
        }
    }
}

/// Single-conversion analog input
///
/// `read` starts a conversion on first call and answers `WouldBlock`
/// until the left-adjusted 8-bit result is ready.
pub trait AnalogSource {
    type Error;

    fn read(&mut self, channel: u8) -> nb::Result<u8, Self::Error>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum SampleError<E> {
    Adc(E),
    Timeout,
}

/// Blocking, bounded sampler over an [`AnalogSource`]
pub struct Sampler<A> {
    adc: A,
}

impl<A: AnalogSource> Sampler<A> {
    pub fn new(adc: A) -> Self {
        Self { adc }
    }

    /// Sample `sensor` and return the calibrated reading
    pub fn measure(&mut self, sensor: &SensorCalibration) -> Result<u8, SampleError<A::Error>> {
        let mut polls = 0;
        loop {
            match self.adc.read(sensor.channel) {
                Ok(raw) => return Ok(sensor.apply(raw)),
                Err(nb::Error::Other(e)) => return Err(SampleError::Adc(e)),
                Err(nb::Error::WouldBlock) => {
                    polls += 1;
                    if polls >= SAMPLE_RETRY_LIMIT {
                        return Err(SampleError::Timeout);
                    }
                }
            }
        }
    }

    pub fn source_mut(&mut self) -> &mut A {
        &mut self.adc
    }
}
