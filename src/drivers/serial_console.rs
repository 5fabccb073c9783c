use core::convert::Infallible;

use crate::hal::Uart;

/// Log sink on USART0
pub struct SerialConsole {
    uart: Uart,
}

impl SerialConsole {
    pub fn new() -> Self {
        Self { uart: Uart::new() }
    }

    /// Block until every queued byte is on the wire
    pub fn drain(&mut self) {
        self.uart.drain();
    }
}

impl ufmt::uWrite for SerialConsole {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
        self.uart.write_str(s);
        Ok(())
    }
}
