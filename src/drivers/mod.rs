pub mod button_handler;
pub mod calibration;
pub mod lcd;
pub mod odometer;
pub mod persistence;
pub mod pulse;
pub mod regulator;

#[cfg(target_arch = "avr")]
pub mod serial_console;

pub use button_handler::{ButtonAction, ButtonHandler};
pub use calibration::{AnalogSource, SampleError, Sampler, SensorCalibration};
pub use lcd::{Hd44780, LcdBus, TextDisplay};
pub use odometer::Odometer;
pub use persistence::{FoldPolicy, NonVolatile, PersistedTotals, Persistence, SlotLayout};
pub use pulse::{PulseGenerator, PulseTimer};
pub use regulator::{Regulator, RegulatorConfig};

#[cfg(target_arch = "avr")]
pub use serial_console::SerialConsole;
