//! Configuration constants for the ESC firmware
//!
//! Everything the control loop, the odometer and the persistence layer
//! need is fixed at compile time. There is no runtime tuning.

use crate::drivers::persistence::{FoldPolicy, SlotLayout};

/// CPU frequency in Hz
pub const CPU_FREQ_HZ: u32 = 16_000_000;

/// UART baud rate of the diagnostic console
pub const UART_BAUD: u32 = 9600;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Sampling / regulation cycle period (Timer1 compare A)
pub const CYCLE_PERIOD_MS: u16 = 20;

/// Rotation period tick (Timer2 compare)
pub const TICK_PERIOD_MS: u16 = 2;

/// Delay between two passes of the foreground loop
pub const FOREGROUND_PERIOD_MS: u16 = 7;

/// Timer1 reload for the 20ms frame (clk/64 = 4us per tick)
pub const SERVO_PERIOD_TICKS: u16 = 4999;

/// Pulse width for duty 0 (1ms)
pub const PULSE_MIN_TICKS: u16 = 250;

/// Additional pulse width for duty 255 (1ms more)
pub const PULSE_SPAN_TICKS: u16 = 250;

/// Timer2 compare value for the 2ms tick (clk/256 = 16us per tick)
pub const TICK_COMPARE: u8 = 124;

// ---------------------------------------------------------------------------
// Regulator
// ---------------------------------------------------------------------------

/// Throttle below this runs open loop (10% of full scale)
pub const LOW_THROTTLE: u8 = 25;

/// Current below this runs open loop (5A)
pub const LOW_CURRENT: u8 = 25;

/// Current/throttle ratio at full load
pub const FULL_LOAD_RATIO: u16 = 256;

/// Current/throttle ratio that forces a cutback
pub const OVERCURRENT_RATIO: u16 = 512;

/// Symmetric bound of the short-term error sum
pub const SHORT_TERM_LIMIT: i16 = 255;

/// Upper bound of the long-term output sum (255 << 6 | 63)
pub const LONG_TERM_MAX: u16 = 16383;

/// Long-term sum to duty shift
pub const OUTPUT_SHIFT: u8 = 6;

// ---------------------------------------------------------------------------
// Auxiliary outputs and sampling
// ---------------------------------------------------------------------------

/// Battery voltage is only sampled below this current (2A)
pub const VOLTAGE_SAMPLE_MAX_CURRENT: u8 = 10;

/// Polls of a pending conversion before the sample is abandoned
pub const SAMPLE_RETRY_LIMIT: u16 = 1000;

/// Consecutive identical polls before a button mask is accepted
pub const BUTTON_DEBOUNCE_POLLS: u8 = 2;

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// EEPROM slots of the persisted totals
pub const SLOT_LAYOUT: SlotLayout = SlotLayout::CURRENT;

/// When session energy reaches non-volatile storage
#[cfg(not(feature = "fold-on-shutdown"))]
pub const FOLD_POLICY: FoldPolicy = FoldPolicy::Immediate;

#[cfg(feature = "fold-on-shutdown")]
pub const FOLD_POLICY: FoldPolicy = FoldPolicy::OnShutdown;

/// Session energy units per mAh (20ms cycles * 1/5A steps)
pub const ENERGY_SCALE: u32 = 922;

/// Session energy units per Ah
pub const ENERGY_AH_SCALE: u32 = 921_600;

/// Persisted energy (mAh) per Ah
pub const TOTAL_ENERGY_AH_DIV: u32 = 1000;

// ---------------------------------------------------------------------------
// Display scaling
// ---------------------------------------------------------------------------

/// Wheel revolutions to km: revs * 395 >> 20
pub const DISTANCE_KM_MUL: u64 = 395;
pub const DISTANCE_KM_SHIFT: u32 = 20;

/// Wheel revolutions to m: revs * 386 >> 10
pub const DISTANCE_M_MUL: u64 = 386;
pub const DISTANCE_M_SHIFT: u32 = 10;

/// Battery voltage reading: 10V + reading / 25
pub const VOLTAGE_OFFSET_V: u8 = 10;
pub const VOLTAGE_STEPS_PER_V: u8 = 25;

/// Voltage readings bounding the rest-capacity gauge
pub const CAPACITY_EMPTY: u8 = 80;
pub const CAPACITY_FULL: u8 = 180;

/// Current reading steps per ampere
pub const CURRENT_STEPS_PER_A: u8 = 5;

/// Speed reading steps per km/h
pub const SPEED_STEPS_PER_KMH: u8 = 4;

/// Characters per display line
pub const DISPLAY_COLUMNS: usize = 8;

/// Banner durations and redraw throttle, in sampling cycles
pub const BANNER_CYCLES: u32 = 100;
pub const MODE_LABEL_CYCLES: u32 = 50;
pub const REDRAW_CYCLES: u32 = 25;

pub const BANNER_TOP: &str = " HELLO  ";
pub const BANNER_BOTTOM: &str = "ver. 1.6";
pub const FAREWELL_TOP: &str = "  GOOD  ";
pub const FAREWELL_BOTTOM: &str = "  BYE   ";
