use avr_device::atmega128::CPU;

const SE: u8 = 1 << 5;
/// SM2..SM0 (bits 2, 3, 4)
const SLEEP_MODE_MASK: u8 = 0b0001_1100;
const SLEEP_POWER_DOWN: u8 = 1 << 4;

pub struct Power {
    _private: (),
}

impl Power {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Stop for good: interrupts off, power-down sleep until the supply dies
    pub fn park(&mut self) -> ! {
        avr_device::interrupt::disable();
        unsafe {
            (*CPU::ptr()).mcucr.modify(|r, w| {
                w.bits((r.bits() & !SLEEP_MODE_MASK) | SLEEP_POWER_DOWN | SE)
            });
        }
        loop {
            avr_device::asm::sleep();
        }
    }
}
