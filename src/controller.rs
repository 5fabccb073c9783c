//! Handler state shared by the timer, rotation and shutdown events
//!
//! All mutable state the interrupt handlers touch lives in one [`Context`].
//! Each event has a method here; the firmware binary calls it from the
//! matching interrupt with exclusive access. Once [`Context::halt`] has run
//! every handler is a no-op for the rest of the power cycle.

use embedded_hal::digital::v2::OutputPin;

use crate::config::VOLTAGE_SAMPLE_MAX_CURRENT;
use crate::dashboard::{DisplayMode, Line, Metric};
use crate::drivers::calibration::{self, AnalogSource, Sampler};
use crate::drivers::odometer::Odometer;
use crate::drivers::persistence::{fold_energy, NonVolatile, PersistedTotals, Persistence};
use crate::drivers::pulse::{PulseGenerator, PulseTimer};
use crate::drivers::regulator::{Regulator, RegulatorConfig};
use crate::os::Exclusive;

/// Masks every interrupt source that can reach a handler
pub trait EventSources {
    fn disable_all(&mut self);
}

/// Hardware the cycle handlers drive
pub struct ControlIo<A, L, F, T> {
    pub sampler: Sampler<A>,
    pub pulse: PulseGenerator<L, T>,
    pub fan: F,
}

impl<A, L, F, T> ControlIo<A, L, F, T>
where
    A: AnalogSource,
    L: OutputPin,
    F: OutputPin,
    T: PulseTimer,
{
    pub fn new(adc: A, line: L, mut fan: F, timer: T) -> Self {
        fan.set_low().ok();
        Self {
            sampler: Sampler::new(adc),
            pulse: PulseGenerator::new(line, timer),
            fan,
        }
    }

    /// Drive both output lines low
    pub fn park(&mut self) {
        self.pulse.park();
        self.fan.set_low().ok();
    }
}

/// Consistent copy of everything the dashboard shows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Telemetry {
    pub total_distance: u32,
    pub total_energy: u32,
    pub distance: u32,
    pub energy: u32,
    pub voltage: u8,
    pub current: u8,
    pub speed: u8,
    pub cycles: u32,
    pub display_mode: DisplayMode,
}

pub struct Context {
    regulator: Regulator,
    odometer: Odometer,
    throttle: u8,
    current: u8,
    voltage: u8,
    /// Regulator output waiting for the next frame start
    duty: u8,
    fan_on: bool,
    totals: PersistedTotals,
    cycles: u32,
    halted: bool,
    /// Set by the shutdown flush
    flush_ok: Option<bool>,
}

impl Context {
    pub const fn new(totals: PersistedTotals) -> Self {
        Self {
            regulator: Regulator::new(RegulatorConfig::new()),
            odometer: Odometer::new(),
            throttle: 0,
            current: 0,
            voltage: 0,
            duty: 0,
            fan_on: false,
            totals,
            cycles: 0,
            halted: false,
            flush_ok: None,
        }
    }

    /// Frame start: emit the pending duty, then sample current and throttle
    pub fn on_cycle_start<A, L, F, T>(&mut self, io: &mut ControlIo<A, L, F, T>)
    where
        A: AnalogSource,
        L: OutputPin,
        F: OutputPin,
        T: PulseTimer,
    {
        if self.halted {
            return;
        }
        io.pulse.begin_period(self.duty);

        // a failed conversion keeps the last good reading
        if let Ok(current) = io.sampler.measure(&calibration::CURRENT) {
            self.current = current;
        }
        if let Ok(throttle) = io.sampler.measure(&calibration::THROTTLE) {
            self.throttle = throttle;
        }
        self.cycles = self.cycles.wrapping_add(1);
    }

    /// Pulse end: regulate, account energy, run the fan, sample the battery
    pub fn on_pulse_end<A, L, F, T>(&mut self, io: &mut ControlIo<A, L, F, T>)
    where
        A: AnalogSource,
        L: OutputPin,
        F: OutputPin,
        T: PulseTimer,
    {
        if self.halted {
            return;
        }
        io.pulse.end_pulse();

        self.duty = self.regulator.update(self.throttle, self.current);
        self.odometer.sample_energy(self.current);

        self.fan_on = self.throttle != 0;
        if self.fan_on {
            io.fan.set_high().ok();
        } else {
            io.fan.set_low().ok();
        }

        // under load the pack voltage sags; only sample it near idle
        if self.current < VOLTAGE_SAMPLE_MAX_CURRENT {
            if let Ok(voltage) = io.sampler.measure(&calibration::VOLTAGE) {
                self.voltage = voltage;
            }
        }
    }

    /// 2ms tick
    pub fn on_tick(&mut self) {
        if self.halted {
            return;
        }
        self.odometer.tick();
    }

    /// One wheel revolution
    pub fn on_rotation_pulse(&mut self) {
        if self.halted {
            return;
        }
        self.odometer.rotation_pulse();
        self.totals.total_distance = self.totals.total_distance.saturating_add(1);
    }

    /// Fold session energy into the totals and zero the session counters
    pub fn reset_session(&mut self) -> PersistedTotals {
        let energy = self.odometer.reset_session();
        self.totals.total_energy = fold_energy(self.totals.total_energy, energy);
        self.totals
    }

    pub fn cycle_line(&mut self, line: Line) -> Metric {
        self.totals.display_mode.cycle(line)
    }

    pub fn snapshot(&self) -> Telemetry {
        Telemetry {
            total_distance: self.totals.total_distance,
            total_energy: self.totals.total_energy,
            distance: self.odometer.distance(),
            energy: self.odometer.energy(),
            voltage: self.voltage,
            current: self.current,
            speed: self.odometer.speed(),
            cycles: self.cycles,
            display_mode: self.totals.display_mode,
        }
    }

    /// Shutdown signal: mask every source, then stop the motor for good
    ///
    /// Returns the totals to flush, with the session energy folded in.
    /// Calling it again returns the same totals.
    pub fn halt<E, A, L, F, T>(
        &mut self,
        sources: &mut E,
        io: &mut ControlIo<A, L, F, T>,
    ) -> PersistedTotals
    where
        E: EventSources,
        A: AnalogSource,
        L: OutputPin,
        F: OutputPin,
        T: PulseTimer,
    {
        sources.disable_all();
        self.halted = true;
        io.park();
        self.regulator.reset();
        self.duty = 0;
        self.fan_on = false;
        self.reset_session()
    }

    /// Shutdown handler body: halt, then write all three slots
    ///
    /// The outcome stays readable through [`Context::flush_ok`] for the
    /// foreground to report.
    pub fn shut_down<E, A, L, F, T, S>(
        &mut self,
        sources: &mut E,
        io: &mut ControlIo<A, L, F, T>,
        store: &mut Persistence<S>,
    ) -> Result<PersistedTotals, S::Error>
    where
        E: EventSources,
        A: AnalogSource,
        L: OutputPin,
        F: OutputPin,
        T: PulseTimer,
        S: NonVolatile,
    {
        let totals = self.halt(sources, io);
        let result = store.flush(&totals);
        self.flush_ok = Some(result.is_ok());
        result.map(|()| totals)
    }

    pub fn flush_ok(&self) -> Option<bool> {
        self.flush_ok
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn totals(&self) -> &PersistedTotals {
        &self.totals
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    pub fn fan_on(&self) -> bool {
        self.fan_on
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(PersistedTotals::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardError<E> {
    /// The shutdown flush owns the store now
    Halted,
    Storage(E),
}

/// Foreground handle on the store that stops writing once the context halts
///
/// The halt check and the start of each byte write share one exclusive
/// section, so nothing written here can land after the shutdown flush.
pub struct HaltGuard<'a, S, C> {
    storage: S,
    ctx: &'a C,
}

impl<'a, S, C> HaltGuard<'a, S, C> {
    pub fn new(storage: S, ctx: &'a C) -> Self {
        Self { storage, ctx }
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}

impl<'a, S, C> NonVolatile for HaltGuard<'a, S, C>
where
    S: NonVolatile,
    C: Exclusive<Context>,
{
    type Error = GuardError<S::Error>;

    fn read_u8(&mut self, slot: u16) -> Result<u8, Self::Error> {
        self.storage.read_u8(slot).map_err(GuardError::Storage)
    }

    fn wait_ready(&mut self) -> Result<(), Self::Error> {
        self.storage.wait_ready().map_err(GuardError::Storage)
    }

    fn write_u8(&mut self, slot: u16, value: u8) -> Result<(), Self::Error> {
        // a previous byte may still be programming; never wait for it locked
        self.wait_ready()?;
        let storage = &mut self.storage;
        self.ctx
            .with(|ctx| {
                if ctx.is_halted() {
                    Err(GuardError::Halted)
                } else {
                    storage.write_u8(slot, value).map_err(GuardError::Storage)
                }
            })
            .unwrap_or(Err(GuardError::Halted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::persistence::{FoldPolicy, SlotLayout};
    use core::cell::RefCell;
    use embedded_hal_mock::pin::{Mock as PinMock, State, Transaction};

    /// Raw readings per channel, answered immediately
    struct FixedAdc {
        raw: [u8; 8],
        reads: Vec<u8>,
    }

    impl FixedAdc {
        fn new(current: u8, voltage: u8, throttle: u8) -> Self {
            let mut raw = [0; 8];
            raw[2] = current;
            raw[4] = voltage;
            raw[5] = throttle;
            Self { raw, reads: Vec::new() }
        }
    }

    impl AnalogSource for FixedAdc {
        type Error = ();

        fn read(&mut self, channel: u8) -> nb::Result<u8, ()> {
            self.reads.push(channel);
            Ok(self.raw[channel as usize])
        }
    }

    struct Edges(Vec<u16>);

    impl PulseTimer for Edges {
        fn set_falling_edge(&mut self, ticks: u16) {
            self.0.push(ticks);
        }
    }

    #[derive(Default)]
    struct Mask {
        disabled: usize,
    }

    impl EventSources for Mask {
        fn disable_all(&mut self) {
            self.disabled += 1;
        }
    }

    type Io = ControlIo<FixedAdc, PinMock, PinMock, Edges>;

    fn io(adc: FixedAdc, line: &[Transaction], fan: &[Transaction]) -> Io {
        ControlIo::new(adc, PinMock::new(line), PinMock::new(fan), Edges(Vec::new()))
    }

    fn finish(io: Io) {
        let ControlIo { pulse, mut fan, .. } = io;
        let (mut line, _) = pulse.release();
        line.done();
        fan.done();
    }

    #[test]
    fn duty_from_one_cycle_is_emitted_at_the_next_frame() {
        // full throttle, zero current: open loop
        let line = [
            Transaction::set(State::Low),
            Transaction::set(State::High),
            Transaction::set(State::Low),
            Transaction::set(State::High),
        ];
        let fan = [Transaction::set(State::Low), Transaction::set(State::High)];
        let mut io = io(FixedAdc::new(0, 130, 255), &line, &fan);
        let mut ctx = Context::default();

        ctx.on_cycle_start(&mut io);
        assert_eq!(io.pulse.latched(), 0);
        ctx.on_pulse_end(&mut io);
        assert_eq!(ctx.duty(), 255);
        assert!(ctx.fan_on());

        ctx.on_cycle_start(&mut io);
        assert_eq!(io.pulse.latched(), 255);
        finish(io);
    }

    #[test]
    fn voltage_is_sampled_only_near_idle() {
        let mut ctx = Context::default();

        let mut idle = io(
            FixedAdc::new(33, 130, 0),
            &[Transaction::set(State::Low), Transaction::set(State::High), Transaction::set(State::Low)],
            &[Transaction::set(State::Low), Transaction::set(State::Low)],
        );
        ctx.on_cycle_start(&mut idle);
        ctx.on_pulse_end(&mut idle);
        assert_eq!(ctx.snapshot().voltage, 130);
        assert_eq!(idle.sampler.source_mut().reads, [2, 5, 4]);
        finish(idle);

        // raw 100 on the current channel is well above 2A
        let mut loaded = io(
            FixedAdc::new(100, 90, 0),
            &[Transaction::set(State::Low), Transaction::set(State::High), Transaction::set(State::Low)],
            &[Transaction::set(State::Low), Transaction::set(State::Low)],
        );
        ctx.on_cycle_start(&mut loaded);
        ctx.on_pulse_end(&mut loaded);
        assert_eq!(ctx.snapshot().voltage, 130);
        assert_eq!(loaded.sampler.source_mut().reads, [2, 5]);
        finish(loaded);
    }

    #[test]
    fn energy_accumulates_every_cycle() {
        let mut ctx = Context::default();
        let mut io = io(
            FixedAdc::new(0, 0, 0),
            &[
                Transaction::set(State::Low),
                Transaction::set(State::High),
                Transaction::set(State::Low),
                Transaction::set(State::High),
                Transaction::set(State::Low),
            ],
            &[Transaction::set(State::Low), Transaction::set(State::Low), Transaction::set(State::Low)],
        );
        for _ in 0..2 {
            ctx.on_cycle_start(&mut io);
            ctx.on_pulse_end(&mut io);
        }
        let t = ctx.snapshot();
        assert_eq!(t.energy, 2);
        assert_eq!(t.cycles, 2);
        finish(io);
    }

    #[test]
    fn rotation_counts_session_and_lifetime_distance() {
        let mut ctx = Context::new(PersistedTotals {
            total_distance: 1000,
            ..PersistedTotals::default()
        });
        for _ in 0..5 {
            ctx.on_rotation_pulse();
        }
        let t = ctx.snapshot();
        assert_eq!(t.distance, 5);
        assert_eq!(t.total_distance, 1005);
    }

    #[test]
    fn halt_is_final() {
        let lows = [
            Transaction::set(State::Low),
            Transaction::set(State::Low),
            Transaction::set(State::Low),
        ];
        let mut io = io(FixedAdc::new(0, 0, 255), &lows, &lows);
        let mut sources = Mask::default();
        let mut ctx = Context::default();
        for _ in 0..4 {
            ctx.odometer.sample_energy(0xFF);
        }

        let totals = ctx.halt(&mut sources, &mut io);
        assert_eq!(sources.disabled, 1);
        assert_eq!(totals.total_energy, 1);
        assert!(ctx.is_halted());
        let frozen = ctx.snapshot();
        assert_eq!(frozen.total_energy, 1);
        assert_eq!(frozen.energy, 0);

        // nothing moves any more, and no pin is touched
        ctx.on_cycle_start(&mut io);
        ctx.on_pulse_end(&mut io);
        ctx.on_tick();
        ctx.on_rotation_pulse();
        assert_eq!(ctx.snapshot(), frozen);
        assert!(io.sampler.source_mut().reads.is_empty());

        // a repeated signal parks again but folds nothing new
        assert_eq!(ctx.halt(&mut sources, &mut io), totals);
        assert_eq!(sources.disabled, 2);
        finish(io);
    }

    /// Byte store that can be told to fail
    struct Cells {
        bytes: [u8; 40],
        broken: bool,
    }

    impl Default for Cells {
        fn default() -> Self {
            Cells { bytes: [0; 40], broken: false }
        }
    }

    impl NonVolatile for Cells {
        type Error = ();

        fn read_u8(&mut self, slot: u16) -> Result<u8, ()> {
            self.bytes.get(slot as usize).copied().ok_or(())
        }

        fn write_u8(&mut self, slot: u16, value: u8) -> Result<(), ()> {
            if self.broken {
                return Err(());
            }
            *self.bytes.get_mut(slot as usize).ok_or(())? = value;
            Ok(())
        }
    }

    fn parked_io() -> Io {
        let lows = [Transaction::set(State::Low), Transaction::set(State::Low)];
        io(FixedAdc::new(0, 0, 0), &lows, &lows)
    }

    #[test]
    fn shut_down_flushes_before_returning() {
        let mut io = parked_io();
        let mut store = Persistence::new(Cells::default(), SlotLayout::CURRENT, FoldPolicy::OnShutdown);
        let mut ctx = Context::default();
        for _ in 0..3 {
            ctx.on_rotation_pulse();
        }
        assert_eq!(ctx.flush_ok(), None);

        let totals = ctx.shut_down(&mut Mask::default(), &mut io, &mut store).unwrap();
        assert_eq!(totals.total_distance, 3);
        assert_eq!(ctx.flush_ok(), Some(true));
        assert!(ctx.is_halted());
        assert_eq!(store.storage_mut().bytes[15], 3);
        finish(io);
    }

    #[test]
    fn failed_flush_is_recorded() {
        let mut io = parked_io();
        let cells = Cells {
            broken: true,
            ..Cells::default()
        };
        let mut store = Persistence::new(cells, SlotLayout::CURRENT, FoldPolicy::Immediate);
        let mut ctx = Context::default();

        assert_eq!(ctx.shut_down(&mut Mask::default(), &mut io, &mut store), Err(()));
        assert_eq!(ctx.flush_ok(), Some(false));
        assert!(ctx.is_halted());
        finish(io);
    }

    #[test]
    fn guarded_store_stops_writing_after_halt() {
        let ctx = RefCell::new(Context::default());
        let mut guarded = HaltGuard::new(Cells::default(), &ctx);
        assert_eq!(guarded.write_u32(25, 9), Ok(()));

        let mut io = parked_io();
        ctx.borrow_mut().halt(&mut Mask::default(), &mut io);
        assert_eq!(guarded.write_u8(25, 7), Err(GuardError::Halted));
        assert_eq!(guarded.read_u32(25), Ok(9));
        finish(io);
    }

    #[test]
    fn guarded_store_refuses_while_the_context_is_busy() {
        let ctx = RefCell::new(Context::default());
        let mut guarded = HaltGuard::new(Cells::default(), &ctx);
        let _held = ctx.borrow_mut();
        assert_eq!(guarded.write_u8(35, 1), Err(GuardError::Halted));
        assert_eq!(guarded.storage_mut().bytes[35], 0);
    }

    #[test]
    fn guarded_store_reports_storage_errors() {
        let ctx = RefCell::new(Context::default());
        let cells = Cells {
            broken: true,
            ..Cells::default()
        };
        let mut guarded = HaltGuard::new(cells, &ctx);
        assert_eq!(guarded.write_u8(15, 1), Err(GuardError::Storage(())));
    }
}
