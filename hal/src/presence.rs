//! # Present-Set Query
//!
//! The host answers, once per device, which engine kinds and how many
//! instances of each physically exist. The answer is hardware inventory,
//! not operating mode, and never changes for the lifetime of the device.

use alloc::vec::Vec;

use crate::error::{HalError, Result};
use crate::types::{ChipGeneration, ChipIdentity, EngineDescriptor, EngineKind};

// =============================================================================
// PRESENT ENTRY
// =============================================================================

/// Hardware-discovered instance count for one engine kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PresentEntry {
    /// Engine kind
    pub kind: EngineKind,
    /// Number of instances that exist (`0..instance_count`)
    pub instance_count: u16,
}

impl PresentEntry {
    /// Create an entry
    pub const fn new(kind: EngineKind, instance_count: u16) -> Self {
        Self {
            kind,
            instance_count,
        }
    }

    /// Whether this entry covers the descriptor
    pub fn covers(&self, desc: EngineDescriptor) -> bool {
        self.kind == desc.kind() && desc.instance() < self.instance_count
    }
}

// =============================================================================
// PRESENCE QUERY
// =============================================================================

/// Hardware inventory query, answered once per device construction
pub trait PresenceQuery: Send + Sync {
    /// Report every engine kind present on this chip with its instance count
    fn present_engines(&self, chip: &ChipIdentity) -> Result<Vec<PresentEntry>>;
}

/// A fixed inventory, independent of the chip
#[derive(Debug, Clone, Default)]
pub struct StaticPresence {
    entries: Vec<PresentEntry>,
}

impl StaticPresence {
    /// Create from a list of entries
    pub fn new(entries: &[PresentEntry]) -> Self {
        Self {
            entries: entries.to_vec(),
        }
    }
}

impl PresenceQuery for StaticPresence {
    fn present_engines(&self, _chip: &ChipIdentity) -> Result<Vec<PresentEntry>> {
        Ok(self.entries.clone())
    }
}

/// Inventory selected by chip generation
#[derive(Debug, Clone, Default)]
pub struct GenerationPresence {
    tables: Vec<(ChipGeneration, &'static [PresentEntry])>,
}

impl GenerationPresence {
    /// Create an empty table
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    /// Add the inventory for one generation
    pub fn with(mut self, generation: ChipGeneration, entries: &'static [PresentEntry]) -> Self {
        self.tables.retain(|(known, _)| *known != generation);
        self.tables.push((generation, entries));
        self
    }
}

impl PresenceQuery for GenerationPresence {
    fn present_engines(&self, chip: &ChipIdentity) -> Result<Vec<PresentEntry>> {
        if chip.generation == ChipGeneration::Unknown {
            return Err(HalError::UnknownChip);
        }

        self.tables
            .iter()
            .find(|(known, _)| *known == chip.generation)
            .map(|(_, entries)| entries.to_vec())
            .ok_or(HalError::InventoryUnavailable)
    }
}
