//! Register-level drivers for the ATmega128
//!
//! Each driver owns its registers by convention: it is constructed once in
//! `main` and touches nothing outside its own peripheral.

pub mod adc;
pub mod eeprom;
pub mod exint;
pub mod gpio;
pub mod power;
pub mod pwm;
pub mod timer;
pub mod uart;

pub use adc::Adc;
pub use eeprom::{Eeprom, EepromError};
pub use exint::InterruptSources;
pub use gpio::{Buttons, FanLine, LcdPort, PwmLine};
pub use power::Power;
pub use pwm::ServoTimer;
pub use timer::Delay;
pub use uart::Uart;
