//! # Coprocessor Authority
//!
//! On parts with a firmware coprocessor, an engine can be absent from the
//! local driver while the coprocessor still runs it on the host's behalf.
//! The orchestrator asks before it drops an engine's classes.

use alloc::collections::BTreeSet;

use crate::types::{EngineDescriptor, EngineKind};

/// Out-of-band authority over remotely-run engines
pub trait Coprocessor: Send + Sync {
    /// Whether the coprocessor still supports `engine`
    fn supports_engine(&self, engine: EngineDescriptor) -> bool;
}

/// Monolithic device: nothing is supported remotely
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCoprocessor;

impl Coprocessor for NoCoprocessor {
    fn supports_engine(&self, _engine: EngineDescriptor) -> bool {
        false
    }
}

/// Coprocessor that reports a fixed set of supported engines
#[derive(Debug, Clone, Default)]
pub struct OffloadSet {
    engines: BTreeSet<EngineDescriptor>,
    kinds: BTreeSet<EngineKind>,
}

impl OffloadSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Support a single engine
    pub fn with_engine(mut self, engine: EngineDescriptor) -> Self {
        self.engines.insert(engine);
        self
    }

    /// Support every instance of a kind
    pub fn with_kind(mut self, kind: EngineKind) -> Self {
        self.kinds.insert(kind);
        self
    }
}

impl Coprocessor for OffloadSet {
    fn supports_engine(&self, engine: EngineDescriptor) -> bool {
        self.kinds.contains(&engine.kind()) || self.engines.contains(&engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offload_set() {
        let ce1 = EngineDescriptor::new(EngineKind::Copy, 1);
        let set = OffloadSet::new()
            .with_engine(ce1)
            .with_kind(EngineKind::VideoDecode);

        assert!(set.supports_engine(ce1));
        assert!(!set.supports_engine(EngineDescriptor::new(EngineKind::Copy, 0)));
        assert!(set.supports_engine(EngineDescriptor::new(EngineKind::VideoDecode, 5)));
        assert!(!NoCoprocessor.supports_engine(ce1));
    }
}
