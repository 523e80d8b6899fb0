//! # Present-Set Resolver
//!
//! Turns the host's hardware inventory into the immutable present set the
//! rest of the orchestrator filters against. Runs once per device, after
//! chip identification and before any engine object exists.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use helix_device_hal::{ChipIdentity, EngineDescriptor, EngineKind, PresenceQuery, PresentEntry};

use crate::engine_type::EngineTypeTable;
use crate::error::{ErrorKind, Result};

/// Engines that physically exist on one device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresentSet {
    counts: BTreeMap<EngineKind, u16>,
}

impl PresentSet {
    /// Build from raw entries, validating them against the type table
    pub fn from_entries(entries: &[PresentEntry], types: &EngineTypeTable<'_>) -> Result<Self> {
        let mut counts = BTreeMap::new();

        for entry in entries {
            let Some(ty) = types.lookup(entry.kind) else {
                crate::lifecycle_bail!(
                    ErrorKind::NotFound,
                    "present engine kind not declared",
                    "{}",
                    entry.kind
                );
            };

            crate::lifecycle_ensure!(
                entry.instance_count <= ty.instance_count,
                ErrorKind::InstanceOutOfRange,
                "present instance count exceeds declaration",
                "{}: {} > {}",
                entry.kind,
                entry.instance_count,
                ty.instance_count
            );

            crate::lifecycle_ensure!(
                counts.insert(entry.kind, entry.instance_count).is_none(),
                ErrorKind::DuplicateDescriptor,
                "engine kind reported present twice",
                "{}",
                entry.kind
            );
        }

        counts.retain(|_, count| *count > 0);
        Ok(Self { counts })
    }

    /// Whether `desc` is present
    pub fn contains(&self, desc: EngineDescriptor) -> bool {
        self.counts
            .get(&desc.kind())
            .map_or(false, |count| desc.instance() < *count)
    }

    /// Whether any instance of `kind` is present
    pub fn contains_kind(&self, kind: EngineKind) -> bool {
        self.counts.contains_key(&kind)
    }

    /// Present instance count for `kind` (0 when absent)
    pub fn instance_count(&self, kind: EngineKind) -> u16 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Every present descriptor, kind order then instance order
    pub fn descriptors(&self) -> impl Iterator<Item = EngineDescriptor> + '_ {
        self.counts
            .iter()
            .flat_map(|(kind, count)| (0..*count).map(move |idx| EngineDescriptor::new(*kind, idx)))
    }

    /// Present entries, kind order
    pub fn entries(&self) -> Vec<PresentEntry> {
        self.counts
            .iter()
            .map(|(kind, count)| PresentEntry::new(*kind, *count))
            .collect()
    }

    /// Total number of present engines
    pub fn total(&self) -> usize {
        self.counts.values().map(|count| *count as usize).sum()
    }

    /// Whether nothing is present
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Release the set
    pub(crate) fn clear(&mut self) {
        self.counts.clear();
    }
}

/// Query the host once and build the present set
pub fn resolve_present_set(
    query: &dyn PresenceQuery,
    chip: &ChipIdentity,
    types: &EngineTypeTable<'_>,
) -> Result<PresentSet> {
    let entries = query.present_engines(chip)?;
    let set = PresentSet::from_entries(&entries, types)?;

    log::debug!(
        "present: {} engines across {} kinds on chip {:#x}",
        set.total(),
        set.counts.len(),
        chip.chip_id
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_type::EngineType;
    use helix_device_hal::{ChipFeatures, HalError, StaticPresence};

    static TYPES: [EngineType; 3] = [
        EngineType::new(EngineKind::Graphics, 1),
        EngineType::new(EngineKind::Copy, 2),
        EngineType::new(EngineKind::VideoDecode, 4),
    ];

    fn types() -> EngineTypeTable<'static> {
        EngineTypeTable::new(&TYPES).unwrap()
    }

    #[test]
    fn test_present_membership() {
        let set = PresentSet::from_entries(
            &[
                PresentEntry::new(EngineKind::Graphics, 1),
                PresentEntry::new(EngineKind::Copy, 1),
                PresentEntry::new(EngineKind::VideoDecode, 0),
            ],
            &types(),
        )
        .unwrap();

        assert!(set.contains(EngineDescriptor::new(EngineKind::Copy, 0)));
        assert!(!set.contains(EngineDescriptor::new(EngineKind::Copy, 1)));
        assert!(!set.contains_kind(EngineKind::VideoDecode));
        assert_eq!(set.total(), 2);
        assert_eq!(
            set.descriptors().collect::<Vec<_>>(),
            alloc::vec![
                EngineDescriptor::new(EngineKind::Graphics, 0),
                EngineDescriptor::new(EngineKind::Copy, 0),
            ]
        );
    }

    #[test]
    fn test_present_validation() {
        let err = PresentSet::from_entries(&[PresentEntry::new(EngineKind::Copy, 3)], &types())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InstanceOutOfRange);

        let err = PresentSet::from_entries(&[PresentEntry::new(EngineKind::Timer, 1)], &types())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = PresentSet::from_entries(
            &[
                PresentEntry::new(EngineKind::Copy, 1),
                PresentEntry::new(EngineKind::Copy, 2),
            ],
            &types(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateDescriptor);
    }

    #[test]
    fn test_resolve_propagates_host_failure() {
        struct Broken;
        impl PresenceQuery for Broken {
            fn present_engines(&self, _chip: &ChipIdentity) -> helix_device_hal::Result<Vec<PresentEntry>> {
                Err(HalError::InventoryUnavailable)
            }
        }

        let chip = ChipIdentity::new(0x172, 0, ChipFeatures::empty());
        let err = resolve_present_set(&Broken, &chip, &types()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InventoryUnavailable);

        let query = StaticPresence::new(&[PresentEntry::new(EngineKind::Graphics, 1)]);
        let set = resolve_present_set(&query, &chip, &types()).unwrap();
        assert_eq!(set.instance_count(EngineKind::Graphics), 1);
    }
}
