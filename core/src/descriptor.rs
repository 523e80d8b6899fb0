//! # Descriptor Resolver
//!
//! Maps `(kind, instance)` to a validated [`EngineDescriptor`], and each
//! kind to the concrete engine implementation bound to it for this device
//! variant.
//!
//! ## Slot Binding
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Device slot (abstract)         EngineCatalog (per variant)       │
//! │                                                                   │
//! │  Copy ──────────────────────▶  ConcreteTypeInfo "ce-ampere"       │
//! │                                 generations: [Ampere, Ada]        │
//! │                                 construct: fn(desc, chip) -> Box  │
//! │                                                                   │
//! │  Copy ──────────────────────▶  ConcreteTypeInfo "ce-generic"      │
//! │                                 generations: any                  │
//! │                                                                   │
//! │  First matching entry wins; no runtime type casts afterwards.     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use core::fmt;

use alloc::boxed::Box;
use alloc::vec::Vec;

use helix_device_hal::{ChipFeatures, ChipGeneration, ChipIdentity, EngineDescriptor, EngineKind};

use crate::engine::Engine;
use crate::engine_type::EngineTypeTable;
use crate::error::{ErrorKind, Result};

// =============================================================================
// CONCRETE TYPE INFO
// =============================================================================

/// Constructor producing the engine object for a descriptor
pub type EngineConstructor =
    Box<dyn Fn(EngineDescriptor, &ChipIdentity) -> Box<dyn Engine> + Send + Sync>;

/// One concrete implementation that can fill an engine slot
pub struct ConcreteTypeInfo {
    /// Kind of slot this implementation fills
    pub kind: EngineKind,
    /// Implementation name
    pub name: &'static str,
    /// Generations this implementation supports (`None` = all)
    pub generations: Option<&'static [ChipGeneration]>,
    /// Features the chip must have
    pub required_features: ChipFeatures,
    /// Object constructor
    pub construct: EngineConstructor,
}

impl ConcreteTypeInfo {
    /// Implementation valid for every chip
    pub fn new<F>(kind: EngineKind, name: &'static str, construct: F) -> Self
    where
        F: Fn(EngineDescriptor, &ChipIdentity) -> Box<dyn Engine> + Send + Sync + 'static,
    {
        Self {
            kind,
            name,
            generations: None,
            required_features: ChipFeatures::empty(),
            construct: Box::new(construct),
        }
    }

    /// Restrict to a set of generations
    pub fn for_generations(mut self, generations: &'static [ChipGeneration]) -> Self {
        self.generations = Some(generations);
        self
    }

    /// Require chip features
    pub fn requiring(mut self, features: ChipFeatures) -> Self {
        self.required_features = features;
        self
    }

    /// Whether this implementation applies to `chip`
    pub fn applies_to(&self, chip: &ChipIdentity) -> bool {
        let generation_ok = self
            .generations
            .map_or(true, |gens| gens.contains(&chip.generation));
        generation_ok && chip.features.contains(self.required_features)
    }
}

impl fmt::Debug for ConcreteTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcreteTypeInfo")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("generations", &self.generations)
            .field("required_features", &self.required_features)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ENGINE CATALOG
// =============================================================================

/// Registry of concrete implementations, searched in registration order
#[derive(Debug, Default)]
pub struct EngineCatalog {
    entries: Vec<ConcreteTypeInfo>,
}

impl EngineCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation
    pub fn register(&mut self, info: ConcreteTypeInfo) {
        self.entries.push(info);
    }

    /// Builder-style registration
    pub fn with(mut self, info: ConcreteTypeInfo) -> Self {
        self.register(info);
        self
    }

    /// Implementation bound to `kind` on `chip`
    pub fn class_info_for(&self, kind: EngineKind, chip: &ChipIdentity) -> Option<&ConcreteTypeInfo> {
        self.entries
            .iter()
            .find(|info| info.kind == kind && info.applies_to(chip))
    }

    /// Number of registered implementations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Validates descriptors against the engine type table
#[derive(Debug, Clone, Copy)]
pub struct DescriptorResolver {
    types: EngineTypeTable<'static>,
}

impl DescriptorResolver {
    /// Create a resolver over a type table
    pub fn new(types: EngineTypeTable<'static>) -> Self {
        Self { types }
    }

    /// Resolve `(kind, instance)` to a descriptor
    ///
    /// `NotFound` means the table and the caller disagree, which is a
    /// programmer error rather than a runtime condition.
    pub fn resolve(&self, kind: EngineKind, instance: u16) -> Result<EngineDescriptor> {
        let Some(ty) = self.types.lookup(kind) else {
            crate::lifecycle_bail!(ErrorKind::NotFound, "engine kind not declared", "{}", kind);
        };

        crate::lifecycle_ensure!(
            instance < ty.instance_count,
            ErrorKind::NotFound,
            "engine instance not declared",
            "{}{} >= {}",
            kind,
            instance,
            ty.instance_count
        );

        Ok(EngineDescriptor::new(kind, instance))
    }

    /// Underlying type table
    pub fn types(&self) -> EngineTypeTable<'static> {
        self.types
    }
}
