//! # Order-List Builder
//!
//! Derives the four ordered descriptor lists (Init, Load, Unload, Destroy)
//! from a declared partial order over engine kinds, filtered by the
//! present set.
//!
//! ## List Construction
//!
//! ```text
//!  Order table (declaration order)      Present set {GR:1, CE:2}
//!  ┌──────────────────────────┐
//!  │ GR   INIT|LOAD|UNLD|DSTR │        INIT    : GR0 CE0 CE1
//!  │ CE   INIT|LOAD|UNLD|DSTR │  ───▶  LOAD    : GR0 CE0 CE1
//!  │ NVDEC ...  (not present) │        UNLOAD  : CE1 CE0 GR0   (reversed)
//!  └──────────────────────────┘        DESTROY : CE1 CE0 GR0   (reversed)
//! ```
//!
//! UNLOAD and DESTROY walk the table backwards and emit instances in
//! descending order, so teardown undoes bring-up without a second table.
//! A kind may appear in several entries with disjoint phase flags to get a
//! different position per phase.

use alloc::vec::Vec;

use helix_device_hal::{EngineDescriptor, EngineKind};

use crate::error::{ErrorKind, Result};
use crate::present::PresentSet;

// =============================================================================
// PHASE FLAGS
// =============================================================================

bitflags::bitflags! {
    /// Phases an order entry participates in
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PhaseFlags: u8 {
        /// Init list (PreInit, Init)
        const INIT    = 1 << 0;
        /// Load list (PreLoad, Load, PostLoad)
        const LOAD    = 1 << 1;
        /// Unload list (PreUnload, Unload, PostUnload)
        const UNLOAD  = 1 << 2;
        /// Destroy list
        const DESTROY = 1 << 3;
        /// Every phase
        const ALL     = Self::INIT.bits() | Self::LOAD.bits() | Self::UNLOAD.bits() | Self::DESTROY.bits();
    }
}

/// Which ordered list a phase walks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListPhase {
    /// Init list
    Init,
    /// Load list
    Load,
    /// Unload list
    Unload,
    /// Destroy list
    Destroy,
}

impl ListPhase {
    /// All list phases
    pub const ALL: [ListPhase; 4] = [
        ListPhase::Init,
        ListPhase::Load,
        ListPhase::Unload,
        ListPhase::Destroy,
    ];

    /// Flag an order entry must carry to appear in this list
    pub const fn flag(&self) -> PhaseFlags {
        match self {
            ListPhase::Init => PhaseFlags::INIT,
            ListPhase::Load => PhaseFlags::LOAD,
            ListPhase::Unload => PhaseFlags::UNLOAD,
            ListPhase::Destroy => PhaseFlags::DESTROY,
        }
    }

    /// Whether the order table is walked backwards
    pub const fn is_reversed(&self) -> bool {
        matches!(self, ListPhase::Unload | ListPhase::Destroy)
    }
}

// =============================================================================
// ORDER ENTRY
// =============================================================================

/// One declaration of the partial order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderEntry {
    /// Engine kind
    pub kind: EngineKind,
    /// Phases this entry positions the kind in
    pub phases: PhaseFlags,
}

impl OrderEntry {
    /// Entry for a subset of phases
    pub const fn new(kind: EngineKind, phases: PhaseFlags) -> Self {
        Self { kind, phases }
    }

    /// Entry for every phase
    pub const fn all(kind: EngineKind) -> Self {
        Self::new(kind, PhaseFlags::ALL)
    }
}

/// Default engine order for the supported device family
///
/// Interrupts are positioned twice: early for init/destroy, last for
/// load so they are enabled once every engine can take them (and first
/// to be disabled on unload).
pub static DEFAULT_ENGINE_ORDER: [OrderEntry; 21] = [
    OrderEntry::all(EngineKind::Bus),
    OrderEntry::new(EngineKind::Interrupt, PhaseFlags::INIT.union(PhaseFlags::DESTROY)),
    OrderEntry::all(EngineKind::Timer),
    OrderEntry::all(EngineKind::MemorySystem),
    OrderEntry::all(EngineKind::MemoryManager),
    OrderEntry::all(EngineKind::PowerManager),
    OrderEntry::all(EngineKind::FramebufferFalcon),
    OrderEntry::all(EngineKind::Fifo),
    OrderEntry::all(EngineKind::Graphics),
    OrderEntry::all(EngineKind::Copy),
    OrderEntry::all(EngineKind::VideoDecode),
    OrderEntry::all(EngineKind::VideoEncode),
    OrderEntry::all(EngineKind::JpegDecode),
    OrderEntry::all(EngineKind::OpticalFlow),
    OrderEntry::all(EngineKind::Cipher),
    OrderEntry::all(EngineKind::SecureProcessor),
    OrderEntry::all(EngineKind::Software),
    OrderEntry::all(EngineKind::DisplayProcessor),
    OrderEntry::all(EngineKind::KernelDisplay),
    OrderEntry::all(EngineKind::Inforom),
    OrderEntry::new(EngineKind::Interrupt, PhaseFlags::LOAD.union(PhaseFlags::UNLOAD)),
];

// =============================================================================
// ORDERED LISTS
// =============================================================================

/// The four phase-ordered descriptor lists of one device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedLists {
    init: Vec<EngineDescriptor>,
    load: Vec<EngineDescriptor>,
    unload: Vec<EngineDescriptor>,
    destroy: Vec<EngineDescriptor>,
}

impl OrderedLists {
    /// The list for a phase
    pub fn list(&self, phase: ListPhase) -> &[EngineDescriptor] {
        match phase {
            ListPhase::Init => &self.init,
            ListPhase::Load => &self.load,
            ListPhase::Unload => &self.unload,
            ListPhase::Destroy => &self.destroy,
        }
    }

    fn list_mut(&mut self, phase: ListPhase) -> &mut Vec<EngineDescriptor> {
        match phase {
            ListPhase::Init => &mut self.init,
            ListPhase::Load => &mut self.load,
            ListPhase::Unload => &mut self.unload,
            ListPhase::Destroy => &mut self.destroy,
        }
    }

    /// Whether `desc` is in the list for `phase`
    pub fn contains(&self, phase: ListPhase, desc: EngineDescriptor) -> bool {
        self.list(phase).contains(&desc)
    }

    /// Length of the Init list
    pub fn len(&self) -> usize {
        self.init.len()
    }

    /// Whether every list is empty
    pub fn is_empty(&self) -> bool {
        ListPhase::ALL.iter().all(|phase| self.list(*phase).is_empty())
    }

    /// Remove `desc` from every list; returns whether anything was removed
    pub fn prune(&mut self, desc: EngineDescriptor) -> bool {
        self.prune_phases(desc, &ListPhase::ALL)
    }

    /// Remove `desc` from the given lists; returns whether anything was removed
    pub fn prune_phases(&mut self, desc: EngineDescriptor, phases: &[ListPhase]) -> bool {
        let mut removed = false;
        for phase in phases {
            let list = self.list_mut(*phase);
            let before = list.len();
            list.retain(|entry| *entry != desc);
            removed |= list.len() != before;
        }
        removed
    }

    pub(crate) fn clear(&mut self) {
        for phase in ListPhase::ALL {
            self.list_mut(phase).clear();
        }
    }
}

/// Build the list for one phase
fn build_phase(present: &PresentSet, order: &[OrderEntry], phase: ListPhase) -> Result<Vec<EngineDescriptor>> {
    let mut list = Vec::with_capacity(present.total());

    let mut visit = |entry: &OrderEntry| -> Result<()> {
        if !entry.phases.contains(phase.flag()) {
            return Ok(());
        }

        let count = present.instance_count(entry.kind);
        let emit = |idx: u16, list: &mut Vec<EngineDescriptor>| -> Result<()> {
            let desc = EngineDescriptor::new(entry.kind, idx);
            crate::lifecycle_ensure!(
                !list.contains(&desc),
                ErrorKind::DuplicateDescriptor,
                "descriptor ordered twice in one phase",
                "{} in {:?}",
                desc,
                phase
            );
            list.push(desc);
            Ok(())
        };

        if phase.is_reversed() {
            for idx in (0..count).rev() {
                emit(idx, &mut list)?;
            }
        } else {
            for idx in 0..count {
                emit(idx, &mut list)?;
            }
        }
        Ok(())
    };

    if phase.is_reversed() {
        order.iter().rev().try_for_each(&mut visit)?;
    } else {
        order.iter().try_for_each(&mut visit)?;
    }

    Ok(list)
}

/// Build the four ordered lists
///
/// Fails with `InconsistentOrderLists` when the phase-filtered lists
/// disagree in length, or when a present engine is left out of them.
pub fn build_lists(present: &PresentSet, order: &[OrderEntry]) -> Result<OrderedLists> {
    let lists = OrderedLists {
        init: build_phase(present, order, ListPhase::Init)?,
        load: build_phase(present, order, ListPhase::Load)?,
        unload: build_phase(present, order, ListPhase::Unload)?,
        destroy: build_phase(present, order, ListPhase::Destroy)?,
    };

    let len = lists.init.len();
    if ListPhase::ALL.iter().any(|phase| lists.list(*phase).len() != len) {
        crate::lifecycle_bail!(
            ErrorKind::InconsistentOrderLists,
            "sizes of all engine order lists do not match",
            "init {} load {} unload {} destroy {}",
            lists.init.len(),
            lists.load.len(),
            lists.unload.len(),
            lists.destroy.len()
        );
    }

    if let Some(desc) = present.descriptors().find(|desc| !lists.init.contains(desc)) {
        crate::lifecycle_bail!(
            ErrorKind::InconsistentOrderLists,
            "present engine has no order entry",
            "{}",
            desc
        );
    }

    log::debug!("order: built lists with {} engines", len);
    Ok(lists)
}
