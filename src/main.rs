#![cfg_attr(target_arch = "avr", no_std, no_main, feature(abi_avr_interrupt))]

#[cfg(target_arch = "avr")]
use panic_halt as _;

#[cfg(target_arch = "avr")]
use embedded_hal::blocking::delay::DelayMs;
#[cfg(target_arch = "avr")]
use esc_firmware::{
    config,
    controller::HaltGuard,
    drivers::{Hd44780, Persistence, SerialConsole},
    hal::{self, Adc, Buttons, Delay, Eeprom, FanLine, InterruptSources, LcdPort, Power, PwmLine, ServoTimer},
    os::{Exclusive, Shared},
    Application, ControlIo, Context, Logger,
};

#[cfg(target_arch = "avr")]
type Io = ControlIo<Adc, PwmLine, FanLine, ServoTimer>;

// Handler state, installed before interrupts are enabled
#[cfg(target_arch = "avr")]
static CONTEXT: Shared<Context> = Shared::new();
#[cfg(target_arch = "avr")]
static IO: Shared<Io> = Shared::new();
/// Store handle reserved for the shutdown flush
#[cfg(target_arch = "avr")]
static STORE: Shared<Persistence<Eeprom>> = Shared::new();

#[cfg(target_arch = "avr")]
#[avr_device::entry]
fn main() -> ! {
    let logger = Logger::new(SerialConsole::new());
    let lcd = Hd44780::new(LcdPort::new(), Delay::new());
    let persistence = Persistence::new(
        HaltGuard::new(Eeprom::new(), &CONTEXT),
        config::SLOT_LAYOUT,
        config::FOLD_POLICY,
    );
    let mut app = Application::new(persistence, lcd, logger);
    let buttons = Buttons::new();
    let mut delay = Delay::new();

    CONTEXT.install(app.start());
    IO.install(ControlIo::new(Adc::new(), PwmLine::new(), FanLine::new(), ServoTimer::new()));
    STORE.install(Persistence::new(Eeprom::new(), config::SLOT_LAYOUT, config::FOLD_POLICY));
    hal::timer::start_tick();

    let mut sources = InterruptSources::new();
    sources.enable_all();
    app.logger_mut().log_system("running");
    unsafe { avr_device::interrupt::enable() };

    while app.step(buttons.pressed(), &CONTEXT) {
        delay.delay_ms(config::FOREGROUND_PERIOD_MS);
    }

    // The shutdown handler has flushed and masked every source
    app.power_down(&CONTEXT);
    app.logger_mut().sink_mut().drain();
    Power::new().park()
}

#[cfg(target_arch = "avr")]
#[avr_device::interrupt(atmega128)]
fn TIMER1_COMPA() {
    CONTEXT.with(|ctx| IO.with(|io| ctx.on_cycle_start(io)));
}

#[cfg(target_arch = "avr")]
#[avr_device::interrupt(atmega128)]
fn TIMER1_COMPB() {
    CONTEXT.with(|ctx| IO.with(|io| ctx.on_pulse_end(io)));
}

#[cfg(target_arch = "avr")]
#[avr_device::interrupt(atmega128)]
fn TIMER2_COMP() {
    CONTEXT.with(|ctx| ctx.on_tick());
}

#[cfg(target_arch = "avr")]
#[avr_device::interrupt(atmega128)]
fn INT0() {
    CONTEXT.with(|ctx| ctx.on_rotation_pulse());
}

/// Shutdown signal: nothing else runs until the totals are written
#[cfg(target_arch = "avr")]
#[avr_device::interrupt(atmega128)]
fn INT1() {
    CONTEXT.with(|ctx| {
        IO.with(|io| STORE.with(|store| ctx.shut_down(&mut InterruptSources::new(), io, store).ok()))
    });
}

#[cfg(not(target_arch = "avr"))]
fn main() {}
