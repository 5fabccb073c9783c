use avr_device::atmega128::ADC;
use core::convert::Infallible;

use crate::drivers::calibration::AnalogSource;

const ADEN: u8 = 1 << 7;
const ADSC: u8 = 1 << 6;
/// clk/128 = 125kHz conversion clock
const PRESCALER_DIV128: u8 = 0x07;

/// AREF reference, result left-adjusted so ADCH holds the top 8 bits
const ADLAR: u8 = 1 << 5;
const CHANNEL_MASK: u8 = 0x07;

/// Single conversions on PORTF, 8-bit results
pub struct Adc {
    pending: Option<u8>,
}

impl Adc {
    pub fn new() -> Self {
        unsafe {
            let p = ADC::ptr();
            (*p).admux.write(|w| w.bits(ADLAR));
            (*p).adcsra.write(|w| w.bits(ADEN | PRESCALER_DIV128));
        }
        Self { pending: None }
    }

    fn busy(&self) -> bool {
        unsafe { (*ADC::ptr()).adcsra.read().bits() & ADSC != 0 }
    }
}

impl AnalogSource for Adc {
    type Error = Infallible;

    fn read(&mut self, channel: u8) -> nb::Result<u8, Infallible> {
        if self.busy() {
            return Err(nb::Error::WouldBlock);
        }

        if self.pending == Some(channel) {
            self.pending = None;
            let result = unsafe { (*ADC::ptr()).adc.read().bits() };
            return Ok((result >> 8) as u8);
        }

        unsafe {
            let p = ADC::ptr();
            (*p).admux.write(|w| w.bits(ADLAR | (channel & CHANNEL_MASK)));
            (*p).adcsra.write(|w| w.bits(ADEN | ADSC | PRESCALER_DIV128));
        }
        self.pending = Some(channel);
        Err(nb::Error::WouldBlock)
    }
}
