//! Foreground logic: startup restore, buttons, dashboard and the farewell
//!
//! The interrupt handlers own the control loop; this layer only reads
//! snapshots of the shared [`Context`] and reacts to the rider.

use ufmt::uWrite;

use crate::controller::Context;
use crate::dashboard::{Dashboard, Line};
use crate::drivers::button_handler::{ButtonAction, ButtonHandler};
use crate::drivers::lcd::TextDisplay;
use crate::drivers::persistence::{NonVolatile, PersistedTotals, Persistence};
use crate::logger::{LogType, Logger};
use crate::os::Exclusive;

pub struct Application<S, D, W> {
    persistence: Persistence<S>,
    display: D,
    logger: Logger<W>,
    dashboard: Dashboard,
    buttons: ButtonHandler,
}

impl<S, D, W> Application<S, D, W>
where
    S: NonVolatile,
    D: TextDisplay,
    W: uWrite,
{
    pub fn new(persistence: Persistence<S>, display: D, logger: Logger<W>) -> Self {
        Self {
            persistence,
            display,
            logger,
            dashboard: Dashboard::new(),
            buttons: ButtonHandler::new(),
        }
    }

    /// Restore the lifetime totals and greet the rider
    ///
    /// Must run before any interrupt source is enabled.
    pub fn start(&mut self) -> Context {
        self.display.initialize();
        self.display.clear();

        let totals = match self.persistence.restore() {
            Ok(totals) => {
                self.logger.log_value(LogType::System, "total revs", totals.total_distance);
                self.logger.log_value(LogType::System, "total mAh", totals.total_energy);
                totals
            }
            Err(_) => {
                self.logger.log_error("restore failed, using defaults");
                PersistedTotals::default()
            }
        };

        self.dashboard.show_banner(&mut self.display, 0);
        Context::new(totals)
    }

    /// One pass of the foreground loop. Returns `false` once halted.
    pub fn step<C: Exclusive<Context>>(&mut self, raw_buttons: u8, ctx: &C) -> bool {
        if ctx.with(|c| c.is_halted()).unwrap_or(true) {
            return false;
        }

        if let Some(action) = self.buttons.poll(raw_buttons) {
            self.handle(action, ctx);
        }

        if let Some(telemetry) = ctx.with(|c| c.snapshot()) {
            self.dashboard.refresh(&mut self.display, &telemetry);
        }
        true
    }

    fn handle<C: Exclusive<Context>>(&mut self, action: ButtonAction, ctx: &C) {
        let line = match action {
            ButtonAction::CycleTop => Line::Top,
            ButtonAction::CycleBottom => Line::Bottom,
            ButtonAction::ResetSession => {
                self.reset_session(ctx);
                return;
            }
        };

        if let Some((metric, now)) = ctx.with(|c| (c.cycle_line(line), c.cycles())) {
            self.logger.log_value(LogType::Debug, "metric", metric.index());
            self.dashboard.show_label(&mut self.display, line, metric, now);
        }
    }

    fn reset_session<C: Exclusive<Context>>(&mut self, ctx: &C) {
        let Some(totals) = ctx.with(|c| c.reset_session()) else {
            return;
        };
        self.logger.log_value(LogType::System, "session reset, total mAh", totals.total_energy);

        // storage writes take milliseconds; never inside the critical section
        match self.persistence.commit_reset(&totals) {
            Ok(true) => self.logger.log_debug("totals committed"),
            Ok(false) => {}
            Err(_) => self.logger.log_error("commit failed"),
        }
    }

    /// Report the shutdown flush and say goodbye
    ///
    /// The shutdown handler has already written the store; this only reads
    /// what it recorded in the halted context.
    pub fn power_down<C: Exclusive<Context>>(&mut self, ctx: &C) {
        match ctx.with(|c| (*c.totals(), c.flush_ok())) {
            Some((totals, Some(true))) => {
                self.logger.log_value(LogType::System, "shutdown, total revs", totals.total_distance);
                self.logger.log_value(LogType::System, "shutdown, total mAh", totals.total_energy);
            }
            _ => self.logger.log_error("shutdown flush failed"),
        }
        Dashboard::farewell(&mut self.display);
    }

    pub fn logger_mut(&mut self) -> &mut Logger<W> {
        &mut self.logger
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn persistence_mut(&mut self) -> &mut Persistence<S> {
        &mut self.persistence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControlIo, EventSources};
    use crate::dashboard::{DisplayMode, Metric};
    use crate::drivers::button_handler::{BOTTOM_BUTTON, TOP_BUTTON};
    use crate::drivers::calibration::AnalogSource;
    use crate::drivers::persistence::{FoldPolicy, SlotLayout};
    use crate::drivers::pulse::PulseTimer;
    use core::cell::RefCell;
    use embedded_hal_mock::pin::{Mock as PinMock, State, Transaction};

    struct Eeprom([u8; 64]);

    impl NonVolatile for Eeprom {
        type Error = ();

        fn read_u8(&mut self, slot: u16) -> Result<u8, ()> {
            self.0.get(slot as usize).copied().ok_or(())
        }

        fn write_u8(&mut self, slot: u16, value: u8) -> Result<(), ()> {
            *self.0.get_mut(slot as usize).ok_or(())? = value;
            Ok(())
        }
    }

    /// Store that is not there
    struct Missing;

    impl NonVolatile for Missing {
        type Error = ();

        fn read_u8(&mut self, _slot: u16) -> Result<u8, ()> {
            Err(())
        }

        fn write_u8(&mut self, _slot: u16, _value: u8) -> Result<(), ()> {
            Err(())
        }
    }

    #[derive(Default)]
    struct Screen {
        lines: [String; 2],
        initialized: bool,
    }

    impl TextDisplay for Screen {
        fn initialize(&mut self) {
            self.initialized = true;
        }

        fn clear(&mut self) {
            self.lines = Default::default();
        }

        fn write_text_at(&mut self, line: u8, _col: u8, text: &str) {
            self.lines[line as usize] = text.to_string();
        }
    }

    #[derive(Default)]
    struct Capture(String);

    impl uWrite for Capture {
        type Error = core::convert::Infallible;

        fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
            self.0.push_str(s);
            Ok(())
        }
    }

    fn app<S: NonVolatile>(storage: S) -> Application<S, Screen, Capture> {
        Application::new(
            Persistence::new(storage, SlotLayout::CURRENT, FoldPolicy::Immediate),
            Screen::default(),
            Logger::with_level(Capture::default(), LogType::Debug),
        )
    }

    fn press<S: NonVolatile>(app: &mut Application<S, Screen, Capture>, mask: u8, ctx: &RefCell<Context>) {
        for raw in [mask, mask, 0, 0] {
            app.step(raw, ctx);
        }
    }

    #[test]
    fn startup_restores_and_shows_banner() {
        let mut app = app(Eeprom([0xFF; 64]));
        let ctx = app.start();
        assert_eq!(ctx.totals(), &PersistedTotals::default());
        assert!(app.display_mut().initialized);
        assert_eq!(app.display_mut().lines[1], "ver. 1.6");
        assert!(app.logger_mut().sink_mut().0.starts_with("[SYS] total revs: 0\r\n"));
    }

    #[test]
    fn unreadable_store_falls_back_to_defaults() {
        let mut app = app(Missing);
        let ctx = app.start();
        assert_eq!(ctx.totals().display_mode, DisplayMode::DEFAULT);
        assert!(app.logger_mut().sink_mut().0.contains("[ERR] restore failed"));
    }

    #[test]
    fn buttons_cycle_the_lines() {
        let mut app = app(Eeprom([0xFF; 64]));
        let ctx = RefCell::new(app.start());

        press(&mut app, TOP_BUTTON, &ctx);
        assert_eq!(ctx.borrow().totals().display_mode.top(), Metric::TotalDistance);
        assert_eq!(app.display_mut().lines[0], "Tot.dist");

        press(&mut app, BOTTOM_BUTTON, &ctx);
        assert_eq!(ctx.borrow().totals().display_mode.bottom(), Metric::Energy);
    }

    struct NoAdc;

    impl AnalogSource for NoAdc {
        type Error = ();

        fn read(&mut self, _channel: u8) -> nb::Result<u8, ()> {
            Err(nb::Error::Other(()))
        }
    }

    struct NoTimer;

    impl PulseTimer for NoTimer {
        fn set_falling_edge(&mut self, _ticks: u16) {}
    }

    struct Mask;

    impl EventSources for Mask {
        fn disable_all(&mut self) {}
    }

    type ParkedIo = ControlIo<NoAdc, PinMock, PinMock, NoTimer>;

    fn parked_io() -> ParkedIo {
        let lows = [Transaction::set(State::Low), Transaction::set(State::Low)];
        ControlIo::new(NoAdc, PinMock::new(&lows), PinMock::new(&lows), NoTimer)
    }

    fn finish(io: ParkedIo) {
        let ControlIo { pulse, mut fan, .. } = io;
        let (mut line, _) = pulse.release();
        line.done();
        fan.done();
    }

    #[test]
    fn halted_context_stops_the_loop() {
        let mut app = app(Eeprom([0xFF; 64]));
        let ctx = RefCell::new(app.start());
        assert!(app.step(0, &ctx));

        let mut io = parked_io();
        ctx.borrow_mut().halt(&mut Mask, &mut io);
        assert!(!app.step(0b11, &ctx));
        finish(io);
    }

    #[test]
    fn power_down_reports_the_recorded_flush() {
        let mut app = app(Eeprom([0xFF; 64]));
        let ctx = RefCell::new(app.start());
        let mut store = Persistence::new(Eeprom([0xFF; 64]), SlotLayout::CURRENT, FoldPolicy::Immediate);
        let mut io = parked_io();
        ctx.borrow_mut().on_rotation_pulse();
        ctx.borrow_mut().shut_down(&mut Mask, &mut io, &mut store).unwrap();

        app.power_down(&ctx);
        assert!(app.logger_mut().sink_mut().0.contains("[SYS] shutdown, total revs: 1\r\n"));
        assert_eq!(app.display_mut().lines, ["  GOOD  ", "  BYE   "]);
        finish(io);
    }

    #[test]
    fn failed_flush_is_reported_but_farewell_is_shown() {
        let mut app = app(Missing);
        let ctx = RefCell::new(app.start());
        let mut store = Persistence::new(Missing, SlotLayout::CURRENT, FoldPolicy::Immediate);
        let mut io = parked_io();
        assert!(ctx.borrow_mut().shut_down(&mut Mask, &mut io, &mut store).is_err());

        app.power_down(&ctx);
        assert_eq!(app.display_mut().lines[0], "  GOOD  ");
        assert!(app.logger_mut().sink_mut().0.contains("[ERR] shutdown flush failed"));
        finish(io);
    }
}
