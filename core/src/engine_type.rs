//! # Engine Type Table
//!
//! Static declaration of every engine kind a device family may carry, how
//! many instances it can have, and whether it is constructed in the early
//! pass (before the class registry and engine table exist).
//!
//! The table is process-wide immutable data. Its declaration order is the
//! construction order; teardown of engine objects walks it backwards.

use helix_device_hal::EngineKind;

use crate::error::{ErrorKind, LifecycleError, Result};

// =============================================================================
// ENGINE TYPE
// =============================================================================

/// One declared engine category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineType {
    /// Engine kind
    pub kind: EngineKind,
    /// Maximum number of instances
    pub instance_count: u16,
    /// Constructed in the early pass
    pub construct_early: bool,
}

impl EngineType {
    /// Regular (late) engine type
    pub const fn new(kind: EngineKind, instance_count: u16) -> Self {
        Self {
            kind,
            instance_count,
            construct_early: false,
        }
    }

    /// Engine type constructed in the early pass
    pub const fn early(kind: EngineKind, instance_count: u16) -> Self {
        Self {
            kind,
            instance_count,
            construct_early: true,
        }
    }
}

/// Upper bound on declared engine types
pub const MAX_ENGINE_TYPES: usize = 32;

const DEFAULT_TYPE_COUNT: usize = 20;

/// Default engine type table for the supported device family
pub static DEFAULT_ENGINE_TYPES: [EngineType; DEFAULT_TYPE_COUNT] = [
    EngineType::early(EngineKind::Bus, 1),
    EngineType::early(EngineKind::Interrupt, 1),
    EngineType::early(EngineKind::Timer, 1),
    EngineType::new(EngineKind::MemorySystem, 1),
    EngineType::new(EngineKind::MemoryManager, 1),
    EngineType::new(EngineKind::Fifo, 1),
    EngineType::new(EngineKind::Graphics, 8),
    EngineType::new(EngineKind::Copy, 10),
    EngineType::new(EngineKind::VideoDecode, 8),
    EngineType::new(EngineKind::VideoEncode, 3),
    EngineType::new(EngineKind::JpegDecode, 8),
    EngineType::new(EngineKind::OpticalFlow, 1),
    EngineType::new(EngineKind::Cipher, 1),
    EngineType::new(EngineKind::SecureProcessor, 1),
    EngineType::new(EngineKind::Software, 1),
    EngineType::new(EngineKind::PowerManager, 1),
    EngineType::new(EngineKind::DisplayProcessor, 1),
    EngineType::new(EngineKind::FramebufferFalcon, 1),
    EngineType::new(EngineKind::KernelDisplay, 1),
    EngineType::new(EngineKind::Inforom, 1),
];

static_assertions::const_assert!(DEFAULT_TYPE_COUNT <= MAX_ENGINE_TYPES);

// =============================================================================
// TABLE VIEW
// =============================================================================

/// Borrowed view over an engine type table
#[derive(Debug, Clone, Copy)]
pub struct EngineTypeTable<'a> {
    types: &'a [EngineType],
}

impl EngineTypeTable<'static> {
    /// View over [`DEFAULT_ENGINE_TYPES`]
    pub fn default_table() -> Self {
        Self {
            types: &DEFAULT_ENGINE_TYPES,
        }
    }
}

impl<'a> EngineTypeTable<'a> {
    /// Wrap a table, rejecting duplicate kinds and oversize tables
    pub fn new(types: &'a [EngineType]) -> Result<Self> {
        if types.len() > MAX_ENGINE_TYPES {
            return Err(LifecycleError::new(
                ErrorKind::InvalidArgument,
                "too many engine types",
            ));
        }

        for (idx, ty) in types.iter().enumerate() {
            if types[..idx].iter().any(|prev| prev.kind == ty.kind) {
                return Err(crate::lifecycle_error!(
                    ErrorKind::InvalidState,
                    "engine kind declared twice",
                    "{}",
                    ty.kind
                ));
            }
        }

        Ok(Self { types })
    }

    /// Look up the declaration for a kind
    pub fn lookup(&self, kind: EngineKind) -> Option<&'a EngineType> {
        self.types.iter().find(|ty| ty.kind == kind)
    }

    /// Declarations in table order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &'a EngineType> + 'a {
        self.types.iter()
    }

    /// Sum of declared instance counts
    pub fn total_instances(&self) -> usize {
        self.types.iter().map(|ty| ty.instance_count as usize).sum()
    }

    /// Number of declared kinds
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
