//! Interrupt source masks: timers, rotation and shutdown inputs, serial

use avr_device::atmega128::{EXINT, TC1, USART0};

use crate::controller::EventSources;

/// INT0 and INT1 on the falling edge
const EICRA_FALLING_INT0_INT1: u8 = 0b0000_1010;
const INT0_INT1: u8 = 0b0000_0011;

/// OCIE2 | OCIE1A | OCIE1B
const TIMER_SOURCES: u8 = (1 << 7) | (1 << 4) | (1 << 3);

const UDRIE0: u8 = 1 << 5;

/// Rotation pulse on INT0 (PD0), shutdown signal on INT1 (PD1)
pub struct InterruptSources {
    _private: (),
}

impl InterruptSources {
    pub fn new() -> Self {
        unsafe {
            let p = EXINT::ptr();
            (*p).eimsk.write(|w| w.bits(0));
            (*p).eicra.write(|w| w.bits(EICRA_FALLING_INT0_INT1));
        }
        Self { _private: () }
    }

    /// Unmask the cycle, tick, rotation and shutdown interrupts
    pub fn enable_all(&mut self) {
        unsafe {
            let p = EXINT::ptr();
            // drop edges latched while masked
            (*p).eifr.write(|w| w.bits(INT0_INT1));
            (*p).eimsk.write(|w| w.bits(INT0_INT1));
            (*TC1::ptr()).timsk.modify(|r, w| w.bits(r.bits() | TIMER_SOURCES));
        }
    }
}

impl EventSources for InterruptSources {
    fn disable_all(&mut self) {
        unsafe {
            (*EXINT::ptr()).eimsk.write(|w| w.bits(0));
            (*TC1::ptr()).timsk.modify(|r, w| w.bits(r.bits() & !TIMER_SOURCES));
            (*USART0::ptr()).ucsr0b.modify(|r, w| w.bits(r.bits() & !UDRIE0));
        }
    }
}
