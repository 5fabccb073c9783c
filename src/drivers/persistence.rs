//! Lifetime totals in non-volatile storage
//!
//! Totals are read once at startup and written on two occasions only:
//! when the rider resets the session (depending on [`FoldPolicy`]) and on
//! the shutdown signal. Nothing else touches the store.

use crate::config::ENERGY_SCALE;
use crate::dashboard::DisplayMode;

/// Byte-addressed storage that survives power loss
///
/// Writes must be idempotent: writing the value already stored is a no-op.
pub trait NonVolatile {
    type Error;

    fn read_u8(&mut self, slot: u16) -> Result<u8, Self::Error>;
    fn write_u8(&mut self, slot: u16, value: u8) -> Result<(), Self::Error>;

    /// Block until a byte write may start
    fn wait_ready(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn read_u32(&mut self, slot: u16) -> Result<u32, Self::Error> {
        let mut bytes = [0u8; 4];
        for (offset, byte) in bytes.iter_mut().enumerate() {
            *byte = self.read_u8(slot + offset as u16)?;
        }
        Ok(u32::from_le_bytes(bytes))
    }

    fn write_u32(&mut self, slot: u16, value: u32) -> Result<(), Self::Error> {
        for (offset, byte) in value.to_le_bytes().iter().enumerate() {
            self.write_u8(slot + offset as u16, *byte)?;
        }
        Ok(())
    }
}

/// Slot numbers of the three persisted values
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotLayout {
    pub total_distance: u16,
    pub total_energy: u16,
    pub display_mode: u16,
}

impl SlotLayout {
    pub const CURRENT: SlotLayout = SlotLayout {
        total_distance: 15,
        total_energy: 25,
        display_mode: 35,
    };

    /// Layout written by the first firmware generation
    pub const LEGACY: SlotLayout = SlotLayout {
        total_distance: 10,
        total_energy: 20,
        display_mode: 30,
    };
}

/// When folded session energy reaches the store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldPolicy {
    /// Write the new total (and a changed display mode) on session reset
    Immediate,
    /// Keep folded totals in RAM until the shutdown flush
    OnShutdown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PersistedTotals {
    /// Wheel revolutions
    pub total_distance: u32,
    /// mAh
    pub total_energy: u32,
    pub display_mode: DisplayMode,
}

/// Add session energy (cycle units) to a total in mAh
pub fn fold_energy(total_energy: u32, session_energy: u32) -> u32 {
    total_energy.saturating_add(session_energy / ENERGY_SCALE)
}

const ERASED_WORD: u32 = u32::MAX;

pub struct Persistence<S> {
    storage: S,
    layout: SlotLayout,
    policy: FoldPolicy,
    stored_mode: Option<DisplayMode>,
}

impl<S: NonVolatile> Persistence<S> {
    pub fn new(storage: S, layout: SlotLayout, policy: FoldPolicy) -> Self {
        Self {
            storage,
            layout,
            policy,
            stored_mode: None,
        }
    }

    /// Read the totals; erased or invalid slots fall back to defaults
    pub fn restore(&mut self) -> Result<PersistedTotals, S::Error> {
        let total_distance = self.read_counter(self.layout.total_distance)?;
        let total_energy = self.read_counter(self.layout.total_energy)?;
        let mode_byte = self.storage.read_u8(self.layout.display_mode)?;
        let display_mode = DisplayMode::from_byte(mode_byte).unwrap_or_default();
        self.stored_mode = DisplayMode::from_byte(mode_byte);

        Ok(PersistedTotals {
            total_distance,
            total_energy,
            display_mode,
        })
    }

    /// Commit a session reset. Returns whether the store was written.
    pub fn commit_reset(&mut self, totals: &PersistedTotals) -> Result<bool, S::Error> {
        if self.policy == FoldPolicy::OnShutdown {
            return Ok(false);
        }
        self.storage.write_u32(self.layout.total_energy, totals.total_energy)?;
        self.write_mode_if_changed(totals.display_mode)?;
        Ok(true)
    }

    /// Write all three slots
    pub fn flush(&mut self, totals: &PersistedTotals) -> Result<(), S::Error> {
        self.storage.write_u32(self.layout.total_distance, totals.total_distance)?;
        self.storage.write_u32(self.layout.total_energy, totals.total_energy)?;
        self.storage.write_u8(self.layout.display_mode, totals.display_mode.to_byte())?;
        self.stored_mode = Some(totals.display_mode);
        Ok(())
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    fn read_counter(&mut self, slot: u16) -> Result<u32, S::Error> {
        let value = self.storage.read_u32(slot)?;
        Ok(if value == ERASED_WORD { 0 } else { value })
    }

    fn write_mode_if_changed(&mut self, mode: DisplayMode) -> Result<(), S::Error> {
        if self.stored_mode != Some(mode) {
            self.storage.write_u8(self.layout.display_mode, mode.to_byte())?;
            self.stored_mode = Some(mode);
        }
        Ok(())
    }
}
