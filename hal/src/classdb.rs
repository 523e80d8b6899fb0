//! # Class Registry
//!
//! The externally-visible capability classes a device exposes, each bound
//! to the engine that implements it. The orchestrator only needs to add
//! classes for a descriptor, drop every class of a descriptor, and count
//! what is left; everything else about class allocation stays with the host.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        CLASS REGISTRY                          │
//! │                                                                │
//! │   class id ──▶ ClassDescriptor { engine: Some(CE0) }           │
//! │   class id ──▶ ClassDescriptor { engine: Some(GR0) }           │
//! │   class id ──▶ ClassDescriptor { engine: None }   (device)     │
//! │                                                                │
//! │   remove_for_engine(CE0) drops every row pointing at CE0       │
//! └───────────────────────────────────────────────────────────────┘
//! ```

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::error::{HalError, Result};
use crate::types::EngineDescriptor;

// =============================================================================
// CLASS DESCRIPTOR
// =============================================================================

/// One capability class and the engine backing it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassDescriptor {
    /// Class number
    pub class_id: u32,
    /// Backing engine, `None` for device-level classes
    pub engine: Option<EngineDescriptor>,
}

impl ClassDescriptor {
    /// Class backed by an engine
    pub const fn engine(class_id: u32, engine: EngineDescriptor) -> Self {
        Self {
            class_id,
            engine: Some(engine),
        }
    }

    /// Device-level class with no backing engine
    pub const fn device(class_id: u32) -> Self {
        Self {
            class_id,
            engine: None,
        }
    }
}

// =============================================================================
// REGISTRY TRAIT
// =============================================================================

/// Capability registry consumed by the orchestrator
pub trait ClassRegistry: Send {
    /// Register a class
    fn register(&mut self, class: ClassDescriptor) -> Result<()>;

    /// Remove every class backed by `engine`, returning how many were removed
    fn remove_for_engine(&mut self, engine: EngineDescriptor) -> usize;

    /// Number of classes backed by `engine`
    fn count_for_engine(&self, engine: EngineDescriptor) -> usize;

    /// Distinct engines that currently back at least one class, sorted
    fn engines(&self) -> Vec<EngineDescriptor>;

    /// Whether a class is registered
    fn contains(&self, class_id: u32) -> bool;

    /// Total number of classes
    fn len(&self) -> usize;

    /// Whether the registry is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// CLASS DATABASE
// =============================================================================

/// Hash-backed class registry
#[derive(Debug, Default)]
pub struct ClassDb {
    classes: HashMap<u32, ClassDescriptor>,
    capacity: Option<usize>,
}

impl ClassDb {
    /// Create an unbounded registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that refuses more than `capacity` classes
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            classes: HashMap::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    /// Look up a class
    pub fn get(&self, class_id: u32) -> Option<&ClassDescriptor> {
        self.classes.get(&class_id)
    }

    /// Remove a single class
    pub fn unregister(&mut self, class_id: u32) -> Result<ClassDescriptor> {
        self.classes
            .remove(&class_id)
            .ok_or(HalError::ClassNotFound(class_id))
    }
}

impl ClassRegistry for ClassDb {
    fn register(&mut self, class: ClassDescriptor) -> Result<()> {
        if self.classes.contains_key(&class.class_id) {
            return Err(HalError::ClassExists(class.class_id));
        }
        if let Some(cap) = self.capacity {
            if self.classes.len() >= cap {
                return Err(HalError::RegistryFull);
            }
        }

        #[cfg(feature = "debug")]
        log::trace!("classdb: register {:#06x} -> {:?}", class.class_id, class.engine);

        self.classes.insert(class.class_id, class);
        Ok(())
    }

    fn remove_for_engine(&mut self, engine: EngineDescriptor) -> usize {
        let before = self.classes.len();
        self.classes.retain(|_, class| class.engine != Some(engine));
        let removed = before - self.classes.len();

        if removed > 0 {
            log::debug!("classdb: removed {} classes for {}", removed, engine);
        }
        removed
    }

    fn count_for_engine(&self, engine: EngineDescriptor) -> usize {
        self.classes
            .values()
            .filter(|class| class.engine == Some(engine))
            .count()
    }

    fn engines(&self) -> Vec<EngineDescriptor> {
        let mut engines: Vec<_> = self.classes.values().filter_map(|c| c.engine).collect();
        engines.sort_unstable();
        engines.dedup();
        engines
    }

    fn contains(&self, class_id: u32) -> bool {
        self.classes.contains_key(&class_id)
    }

    fn len(&self) -> usize {
        self.classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EngineKind;

    const CE0: EngineDescriptor = EngineDescriptor::new(EngineKind::Copy, 0);
    const CE1: EngineDescriptor = EngineDescriptor::new(EngineKind::Copy, 1);
    const GR0: EngineDescriptor = EngineDescriptor::new(EngineKind::Graphics, 0);

    fn populated() -> ClassDb {
        let mut db = ClassDb::new();
        db.register(ClassDescriptor::engine(0xc5b5, CE0)).unwrap();
        db.register(ClassDescriptor::engine(0xc6b5, CE0)).unwrap();
        db.register(ClassDescriptor::engine(0xc7b5, CE1)).unwrap();
        db.register(ClassDescriptor::engine(0xc797, GR0)).unwrap();
        db.register(ClassDescriptor::device(0x0080)).unwrap();
        db
    }

    #[test]
    fn test_register_duplicate() {
        let mut db = populated();
        assert_eq!(
            db.register(ClassDescriptor::device(0x0080)),
            Err(HalError::ClassExists(0x0080))
        );
        assert_eq!(db.len(), 5);
    }

    #[test]
    fn test_remove_for_engine() {
        let mut db = populated();
        assert_eq!(db.count_for_engine(CE0), 2);
        assert_eq!(db.remove_for_engine(CE0), 2);
        assert_eq!(db.count_for_engine(CE0), 0);
        assert_eq!(db.remove_for_engine(CE0), 0);
        assert_eq!(db.count_for_engine(CE1), 1);
        assert!(db.contains(0x0080));
    }

    #[test]
    fn test_engines_sorted_distinct() {
        let db = populated();
        assert_eq!(db.engines(), alloc::vec![GR0, CE0, CE1]);
    }

    #[test]
    fn test_capacity_limit() {
        let mut db = ClassDb::with_capacity_limit(1);
        db.register(ClassDescriptor::device(1)).unwrap();
        assert_eq!(
            db.register(ClassDescriptor::device(2)),
            Err(HalError::RegistryFull)
        );
        assert_eq!(db.unregister(1).unwrap().class_id, 1);
        assert_eq!(db.unregister(1), Err(HalError::ClassNotFound(1)));
    }
}
