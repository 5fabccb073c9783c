//! Two-line telemetry dashboard
//!
//! Each display line shows one of eight metrics. The selection is a
//! single byte so it can be persisted next to the lifetime totals.

use ufmt::{uWrite, uwrite};

use crate::config::{self, DISPLAY_COLUMNS};
use crate::controller::Telemetry;
use crate::drivers::lcd::TextDisplay;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Metric {
    TotalDistance = 1,
    TotalEnergy = 2,
    Distance = 3,
    Energy = 4,
    RestCapacity = 5,
    Voltage = 6,
    Current = 7,
    Speed = 8,
}

impl Metric {
    pub const COUNT: u8 = 8;

    pub fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            1 => Metric::TotalDistance,
            2 => Metric::TotalEnergy,
            3 => Metric::Distance,
            4 => Metric::Energy,
            5 => Metric::RestCapacity,
            6 => Metric::Voltage,
            7 => Metric::Current,
            8 => Metric::Speed,
            _ => return None,
        })
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Following metric, wrapping from the last to the first
    pub fn next(self) -> Self {
        let index = if self.index() < Self::COUNT { self.index() + 1 } else { 1 };
        Self::from_index(index).unwrap_or(Metric::TotalDistance)
    }

    /// Fixed-width name shown right after a selection change
    pub fn label(self) -> &'static str {
        match self {
            Metric::TotalDistance => "Tot.dist",
            Metric::TotalEnergy => "Tot.cons",
            Metric::Distance => "Distance",
            Metric::Energy => "Consumed",
            Metric::RestCapacity => "Rest cap",
            Metric::Voltage => "Accu.   ",
            Metric::Current => "Current ",
            Metric::Speed => "Speed   ",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Line {
    Top,
    Bottom,
}

impl Line {
    pub fn row(self) -> u8 {
        match self {
            Line::Top => 0,
            Line::Bottom => 1,
        }
    }
}

/// Metric selection of both display lines; the lines never show the same metric
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayMode {
    top: Metric,
    bottom: Metric,
}

impl DisplayMode {
    pub const DEFAULT: DisplayMode = DisplayMode {
        top: Metric::Speed,
        bottom: Metric::Distance,
    };

    pub fn new(top: Metric, bottom: Metric) -> Option<Self> {
        (top != bottom).then_some(Self { top, bottom })
    }

    /// Decode the stored byte: top in the low nibble, bottom in the high nibble
    pub fn from_byte(byte: u8) -> Option<Self> {
        let top = Metric::from_index(byte & 0x0F)?;
        let bottom = Metric::from_index(byte >> 4)?;
        Self::new(top, bottom)
    }

    pub fn to_byte(self) -> u8 {
        (self.bottom.index() << 4) | self.top.index()
    }

    pub fn top(&self) -> Metric {
        self.top
    }

    pub fn bottom(&self) -> Metric {
        self.bottom
    }

    pub fn metric(&self, line: Line) -> Metric {
        match line {
            Line::Top => self.top,
            Line::Bottom => self.bottom,
        }
    }

    /// Advance one line, skipping whatever the other line shows
    pub fn cycle(&mut self, line: Line) -> Metric {
        match line {
            Line::Top => {
                self.top = self.top.next();
                if self.top == self.bottom {
                    self.top = self.top.next();
                }
                self.top
            }
            Line::Bottom => {
                self.bottom = self.bottom.next();
                if self.bottom == self.top {
                    self.bottom = self.bottom.next();
                }
                self.bottom
            }
        }
    }
}

impl Default for DisplayMode {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const LINE_CAPACITY: usize = 16;

/// Fixed-size text buffer for one display line
pub struct LineBuf {
    bytes: [u8; LINE_CAPACITY],
    len: usize,
}

impl LineBuf {
    pub const fn new() -> Self {
        Self {
            bytes: [b' '; LINE_CAPACITY],
            len: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }

    /// Fill with spaces up to `width` characters
    pub fn pad_to(&mut self, width: usize) {
        let width = width.min(LINE_CAPACITY);
        while self.len < width {
            self.bytes[self.len] = b' ';
            self.len += 1;
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Default for LineBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl uWrite for LineBuf {
    type Error = core::convert::Infallible;

    // Overlong text is cut at the buffer end, like the 8-digit limit on the panel
    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        for &byte in s.as_bytes() {
            if self.len == LINE_CAPACITY {
                break;
            }
            self.bytes[self.len] = byte;
            self.len += 1;
        }
        Ok(())
    }
}

/// Format `metric` from a telemetry snapshot
pub fn render(metric: Metric, t: &Telemetry, out: &mut LineBuf) {
    let result = match metric {
        Metric::TotalDistance => {
            let km = (t.total_distance as u64 * config::DISTANCE_KM_MUL) >> config::DISTANCE_KM_SHIFT;
            uwrite!(out, "{} km", km as u32)
        }
        Metric::TotalEnergy => {
            let ah = t.total_energy / config::TOTAL_ENERGY_AH_DIV + t.energy / config::ENERGY_AH_SCALE;
            uwrite!(out, "{} Ah", ah)
        }
        Metric::Distance => {
            let m = (t.distance as u64 * config::DISTANCE_M_MUL) >> config::DISTANCE_M_SHIFT;
            uwrite!(out, "{} m", m as u32)
        }
        Metric::Energy => uwrite!(out, "{} mAh", t.energy / config::ENERGY_SCALE),
        Metric::RestCapacity => {
            if t.voltage >= config::CAPACITY_FULL {
                uwrite!(out, "100 %")
            } else if t.voltage >= config::CAPACITY_EMPTY {
                uwrite!(out, "{} %", t.voltage - config::CAPACITY_EMPTY)
            } else {
                uwrite!(out, "!  0 % !")
            }
        }
        Metric::Voltage => uwrite!(
            out,
            "{} V",
            config::VOLTAGE_OFFSET_V + t.voltage / config::VOLTAGE_STEPS_PER_V
        ),
        Metric::Current => uwrite!(out, "{} A", t.current / config::CURRENT_STEPS_PER_A),
        Metric::Speed => {
            let steps = config::SPEED_STEPS_PER_KMH;
            uwrite!(
                out,
                "{}.{}km/h",
                t.speed / steps,
                (t.speed % steps) as u16 * 10 / steps as u16
            )
        }
    };
    // LineBuf truncates instead of failing
    result.ok();
}

/// Redraw scheduling and banners
pub struct Dashboard {
    paused_at: u32,
    pause_cycles: u32,
}

impl Dashboard {
    pub const fn new() -> Self {
        Self {
            paused_at: 0,
            pause_cycles: 0,
        }
    }

    fn pause(&mut self, now: u32, cycles: u32) {
        self.paused_at = now;
        self.pause_cycles = cycles;
    }

    pub fn is_paused(&self, now: u32) -> bool {
        now.wrapping_sub(self.paused_at) < self.pause_cycles
    }

    pub fn show_banner<D: TextDisplay>(&mut self, display: &mut D, now: u32) {
        display.write_text_at(0, 0, config::BANNER_TOP);
        display.write_text_at(1, 0, config::BANNER_BOTTOM);
        self.pause(now, config::BANNER_CYCLES);
    }

    /// Name a freshly selected metric in place of its value for a moment
    pub fn show_label<D: TextDisplay>(&mut self, display: &mut D, line: Line, metric: Metric, now: u32) {
        display.write_text_at(line.row(), 0, metric.label());
        self.pause(now, config::MODE_LABEL_CYCLES);
    }

    /// Redraw both lines unless paused; returns whether anything was drawn
    pub fn refresh<D: TextDisplay>(&mut self, display: &mut D, t: &Telemetry) -> bool {
        if self.is_paused(t.cycles) {
            return false;
        }
        let mut text = LineBuf::new();
        for line in [Line::Top, Line::Bottom] {
            text.clear();
            render(t.display_mode.metric(line), t, &mut text);
            text.pad_to(DISPLAY_COLUMNS);
            display.write_text_at(line.row(), 0, text.as_str());
        }
        self.pause(t.cycles, config::REDRAW_CYCLES);
        true
    }

    pub fn farewell<D: TextDisplay>(display: &mut D) {
        display.write_text_at(0, 0, config::FAREWELL_TOP);
        display.write_text_at(1, 0, config::FAREWELL_BOTTOM);
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}
