use avr_device::atmega128::EEPROM;

use crate::drivers::persistence::NonVolatile;

/// ATmega128 data EEPROM size in bytes
pub const EEPROM_SIZE: u16 = 4096;

const EERE: u8 = 1 << 0;
const EEWE: u8 = 1 << 1;
const EEMWE: u8 = 1 << 2;

/// A write takes about 8.5ms; this comfortably covers it at 16MHz
const BUSY_POLL_LIMIT: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EepromError {
    Timeout,
    OutOfRange,
}

pub struct Eeprom {
    _private: (),
}

impl Eeprom {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn busy_wait(&self) -> Result<(), EepromError> {
        for _ in 0..BUSY_POLL_LIMIT {
            if unsafe { (*EEPROM::ptr()).eecr.read().bits() } & EEWE == 0 {
                return Ok(());
            }
        }
        Err(EepromError::Timeout)
    }

    fn check(slot: u16) -> Result<(), EepromError> {
        if slot < EEPROM_SIZE {
            Ok(())
        } else {
            Err(EepromError::OutOfRange)
        }
    }
}

impl NonVolatile for Eeprom {
    type Error = EepromError;

    fn read_u8(&mut self, slot: u16) -> Result<u8, EepromError> {
        Self::check(slot)?;
        self.busy_wait()?;
        unsafe {
            let p = EEPROM::ptr();
            (*p).eear.write(|w| w.bits(slot));
            (*p).eecr.write(|w| w.bits(EERE));
            Ok((*p).eedr.read().bits())
        }
    }

    fn wait_ready(&mut self) -> Result<(), EepromError> {
        self.busy_wait()
    }

    /// Skips the write when the cell already holds `value`
    fn write_u8(&mut self, slot: u16, value: u8) -> Result<(), EepromError> {
        if self.read_u8(slot)? == value {
            return Ok(());
        }
        self.busy_wait()?;
        // EEWE must follow EEMWE within four cycles
        avr_device::interrupt::free(|_| unsafe {
            let p = EEPROM::ptr();
            (*p).eear.write(|w| w.bits(slot));
            (*p).eedr.write(|w| w.bits(value));
            (*p).eecr.write(|w| w.bits(EEMWE));
            (*p).eecr.write(|w| w.bits(EEMWE | EEWE));
        });
        Ok(())
    }
}
