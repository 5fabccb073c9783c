use avr_device::atmega128::{PORTA, PORTB, PORTC, PORTE};
use core::convert::Infallible;
use embedded_hal::digital::v2::OutputPin;

use crate::drivers::lcd::{LcdBus, Register};

/// Output line on PORTB
pub struct PortBLine<const P: u8> {
    _private: (),
}

impl<const P: u8> PortBLine<P> {
    /// Configure the pin as an output, driven low
    pub fn new() -> Self {
        unsafe {
            let p = PORTB::ptr();
            (*p).portb.modify(|r, w| w.bits(r.bits() & !(1 << P)));
            (*p).ddrb.modify(|r, w| w.bits(r.bits() | (1 << P)));
        }
        Self { _private: () }
    }
}

impl<const P: u8> OutputPin for PortBLine<P> {
    type Error = Infallible;

    #[inline]
    fn set_high(&mut self) -> Result<(), Infallible> {
        unsafe {
            (*PORTB::ptr()).portb.modify(|r, w| w.bits(r.bits() | (1 << P)));
        }
        Ok(())
    }

    #[inline]
    fn set_low(&mut self) -> Result<(), Infallible> {
        unsafe {
            (*PORTB::ptr()).portb.modify(|r, w| w.bits(r.bits() & !(1 << P)));
        }
        Ok(())
    }
}

/// Command pulse to the motor driver
pub type PwmLine = PortBLine<5>;
/// Cooling fan enable
pub type FanLine = PortBLine<4>;

const BUTTON_SHIFT: u8 = 4;
const BUTTON_MASK: u8 = 0b11 << BUTTON_SHIFT;

/// Two push buttons on PE4/PE5, active low with pull-ups
pub struct Buttons {
    _private: (),
}

impl Buttons {
    pub fn new() -> Self {
        unsafe {
            let p = PORTE::ptr();
            (*p).ddre.modify(|r, w| w.bits(r.bits() & !BUTTON_MASK));
            (*p).porte.modify(|r, w| w.bits(r.bits() | BUTTON_MASK));
        }
        Self { _private: () }
    }

    /// Pressed mask: bit 0 = PE4, bit 1 = PE5
    pub fn pressed(&self) -> u8 {
        let pins = unsafe { (*PORTE::ptr()).pine.read().bits() };
        (!pins & BUTTON_MASK) >> BUTTON_SHIFT
    }
}

const LCD_RS: u8 = 1 << 0;
const LCD_RW: u8 = 1 << 1;
const LCD_E: u8 = 1 << 2;
const LCD_CONTROL: u8 = LCD_RS | LCD_RW | LCD_E;

/// HD44780 8-bit bus: data on PORTA, RS/RW/E on PC0..PC2
pub struct LcdPort {
    _private: (),
}

impl LcdPort {
    pub fn new() -> Self {
        unsafe {
            (*PORTA::ptr()).ddra.write(|w| w.bits(0xFF));
            (*PORTC::ptr()).portc.modify(|r, w| w.bits(r.bits() & !LCD_CONTROL));
            (*PORTC::ptr()).ddrc.modify(|r, w| w.bits(r.bits() | LCD_CONTROL));
        }
        Self { _private: () }
    }
}

impl LcdBus for LcdPort {
    fn write(&mut self, register: Register, byte: u8) {
        unsafe {
            let c = PORTC::ptr();
            let rs = match register {
                Register::Command => 0,
                Register::Data => LCD_RS,
            };
            (*c).portc.modify(|r, w| w.bits((r.bits() & !LCD_CONTROL) | rs));
            (*PORTA::ptr()).porta.write(|w| w.bits(byte));

            (*c).portc.modify(|r, w| w.bits(r.bits() | LCD_E));
            // enable pulse must be at least 450ns wide
            for _ in 0..8 {
                avr_device::asm::nop();
            }
            (*c).portc.modify(|r, w| w.bits(r.bits() & !LCD_E));
        }
    }
}
