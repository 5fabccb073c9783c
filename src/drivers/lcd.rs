//! HD44780 character display (8 characters x 2 lines, 8-bit bus)

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

const CLEAR: u8 = 0x01;
const ENTRY_MODE_INCREMENT: u8 = 0x06;
const DISPLAY_ON: u8 = 0x0C;
const CURSOR_SHIFT_RIGHT: u8 = 0x14;
const FUNCTION_8BIT_2LINE: u8 = 0x38;
const SET_DDRAM: u8 = 0x80;

const LINE_ADDRESS: [u8; 2] = [0x00, 0x40];

/// Command execution time
const COMMAND_US: u16 = 40;
/// Clear / home execution time
const CLEAR_MS: u16 = 2;
/// Power-on settling before the first command
const POWER_ON_MS: u16 = 2;

/// Register selected by the RS line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    Command,
    Data,
}

/// Parallel bus to the controller; one call is one E strobe
pub trait LcdBus {
    fn write(&mut self, register: Register, byte: u8);
}

/// What the rest of the firmware needs from a text display
pub trait TextDisplay {
    fn initialize(&mut self);
    fn clear(&mut self);
    fn write_text_at(&mut self, line: u8, col: u8, text: &str);
}

pub struct Hd44780<B, D> {
    bus: B,
    delay: D,
}

impl<B, D> Hd44780<B, D>
where
    B: LcdBus,
    D: DelayUs<u16> + DelayMs<u16>,
{
    pub fn new(bus: B, delay: D) -> Self {
        Self { bus, delay }
    }

    fn command(&mut self, byte: u8) {
        self.bus.write(Register::Command, byte);
        if byte == CLEAR {
            self.delay.delay_ms(CLEAR_MS);
        } else {
            self.delay.delay_us(COMMAND_US);
        }
    }

    fn data(&mut self, byte: u8) {
        self.bus.write(Register::Data, byte);
        self.delay.delay_us(COMMAND_US);
    }

    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }
}

impl<B, D> TextDisplay for Hd44780<B, D>
where
    B: LcdBus,
    D: DelayUs<u16> + DelayMs<u16>,
{
    fn initialize(&mut self) {
        self.delay.delay_ms(POWER_ON_MS);
        self.command(FUNCTION_8BIT_2LINE);
        self.command(DISPLAY_ON);
        self.command(CLEAR);
        self.command(ENTRY_MODE_INCREMENT);
        self.command(CURSOR_SHIFT_RIGHT);
    }

    fn clear(&mut self) {
        self.command(CLEAR);
    }

    fn write_text_at(&mut self, line: u8, col: u8, text: &str) {
        let base = LINE_ADDRESS[(line & 1) as usize];
        self.command(SET_DDRAM | ((base + col) & 0x7F));
        for byte in text.bytes() {
            self.data(byte);
        }
    }
}
