//! Line-oriented event log over a serial sink

use ufmt::{uDisplay, uWrite, uwrite};

/// Record category, most severe first
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogType {
    Error = 0,
    System = 1,
    Debug = 2,
}

impl LogType {
    fn tag(self) -> &'static str {
        match self {
            LogType::Error => "[ERR] ",
            LogType::System => "[SYS] ",
            LogType::Debug => "[DBG] ",
        }
    }
}

/// Most verbose level built into this firmware
#[cfg(feature = "debug")]
pub const DEFAULT_LEVEL: LogType = LogType::Debug;
#[cfg(not(feature = "debug"))]
pub const DEFAULT_LEVEL: LogType = LogType::System;

pub struct Logger<W> {
    sink: W,
    max_level: LogType,
}

impl<W: uWrite> Logger<W> {
    pub fn new(sink: W) -> Self {
        Self::with_level(sink, DEFAULT_LEVEL)
    }

    pub fn with_level(sink: W, max_level: LogType) -> Self {
        Self { sink, max_level }
    }

    pub fn enabled(&self, log_type: LogType) -> bool {
        log_type <= self.max_level
    }

    // Sink errors are dropped: there is nowhere else to report them
    pub fn log(&mut self, log_type: LogType, msg: &str) {
        if self.enabled(log_type) {
            uwrite!(self.sink, "{}{}\r\n", log_type.tag(), msg).ok();
        }
    }

    pub fn log_value<V: uDisplay>(&mut self, log_type: LogType, msg: &str, value: V) {
        if self.enabled(log_type) {
            uwrite!(self.sink, "{}{}: {}\r\n", log_type.tag(), msg, value).ok();
        }
    }

    pub fn log_system(&mut self, msg: &str) {
        self.log(LogType::System, msg);
    }

    pub fn log_error(&mut self, msg: &str) {
        self.log(LogType::Error, msg);
    }

    pub fn log_debug(&mut self, msg: &str) {
        self.log(LogType::Debug, msg);
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    pub struct Capture(pub String);

    impl uWrite for Capture {
        type Error = core::convert::Infallible;

        fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
            self.0.push_str(s);
            Ok(())
        }
    }

    #[test]
    fn records_are_tagged_lines() {
        let mut log = Logger::with_level(Capture::default(), LogType::Debug);
        log.log_system("restored");
        log.log_value(LogType::Error, "eeprom", 3u8);
        log.log_debug("mode");
        assert_eq!(log.sink_mut().0, "[SYS] restored\r\n[ERR] eeprom: 3\r\n[DBG] mode\r\n");
    }

    #[test]
    fn verbose_records_are_dropped() {
        let mut log = Logger::with_level(Capture::default(), LogType::System);
        log.log_debug("hidden");
        log.log_value(LogType::Debug, "voltage", 130u8);
        log.log_error("shown");
        assert_eq!(log.sink_mut().0, "[ERR] shown\r\n");
        assert!(!log.enabled(LogType::Debug));
    }
}
