//! # Engine States and Transitions
//!
//! ```text
//!   Unconstructed ──construct──▶ Constructed ──pre_init──▶ PreInitialized
//!         │                          │                          │
//!         │                          ▼                          ▼
//!         └────────────────────▶  Missing  ◀──────────────── (pruned)
//!
//!   PreInitialized ──init──▶ Initialized ──load──▶ Loaded
//!                                 ▲                   │
//!                                 └──────unload───────┘
//!
//!   any ──destroy──▶ Destroyed
//! ```
//!
//! `Unloaded` is not a separate state: an unloaded engine is back in
//! `Initialized` and may be loaded again.

use core::fmt;

use crate::order::ListPhase;

// =============================================================================
// ENGINE STATE
// =============================================================================

/// Per-engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EngineState {
    /// No object exists for the slot
    Unconstructed,
    /// Object constructed
    Constructed,
    /// Pre-initialization done
    PreInitialized,
    /// Initialized (also the state after unload)
    Initialized,
    /// Loaded and running
    Loaded,
    /// Torn down
    Destroyed,
    /// Pruned before initialization completed
    Missing,
}

impl EngineState {
    /// State an engine returns to after a successful unload
    pub const UNLOADED: EngineState = EngineState::Initialized;

    /// State after `transition` succeeds from `self`
    pub const fn after(self, transition: EngineTransition) -> EngineState {
        match transition {
            EngineTransition::Construct => EngineState::Constructed,
            EngineTransition::PreInit => EngineState::PreInitialized,
            EngineTransition::Init => EngineState::Initialized,
            EngineTransition::Load => EngineState::Loaded,
            EngineTransition::Unload => EngineState::UNLOADED,
            EngineTransition::Destroy => EngineState::Destroyed,
            EngineTransition::PreLoad
            | EngineTransition::PostLoad
            | EngineTransition::PreUnload
            | EngineTransition::PostUnload => self,
        }
    }

    /// Whether the engine has finished initialization
    pub const fn is_initialized(self) -> bool {
        matches!(self, EngineState::Initialized | EngineState::Loaded)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// =============================================================================
// TRANSITIONS
// =============================================================================

/// How a transition treats a failing engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// First non-`NotSupported` failure aborts the phase
    AbortOnFirst,
    /// Failures are logged, the phase visits every engine
    BestEffort,
    /// The callback cannot fail
    Infallible,
}

/// One named per-engine transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EngineTransition {
    /// Object construction
    Construct,
    /// Pre-initialization (presence confirmed, missing engines pruned)
    PreInit,
    /// Initialization
    Init,
    /// Before load
    PreLoad,
    /// Load
    Load,
    /// After load
    PostLoad,
    /// Before unload
    PreUnload,
    /// Unload
    Unload,
    /// After unload
    PostUnload,
    /// Destruction
    Destroy,
}

impl EngineTransition {
    /// Load transitions in execution order
    pub const LOAD_SEQUENCE: [EngineTransition; 3] = [
        EngineTransition::PreLoad,
        EngineTransition::Load,
        EngineTransition::PostLoad,
    ];

    /// Unload transitions in execution order
    pub const UNLOAD_SEQUENCE: [EngineTransition; 3] = [
        EngineTransition::PreUnload,
        EngineTransition::Unload,
        EngineTransition::PostUnload,
    ];

    /// Name used in the transition log
    pub const fn name(&self) -> &'static str {
        match self {
            EngineTransition::Construct => "Construct",
            EngineTransition::PreInit => "PreInit",
            EngineTransition::Init => "Init",
            EngineTransition::PreLoad => "PreLoad",
            EngineTransition::Load => "Load",
            EngineTransition::PostLoad => "PostLoad",
            EngineTransition::PreUnload => "PreUnload",
            EngineTransition::Unload => "Unload",
            EngineTransition::PostUnload => "PostUnload",
            EngineTransition::Destroy => "Destroy",
        }
    }

    /// Ordered list walked by this transition (`None` for construction)
    pub const fn list(&self) -> Option<ListPhase> {
        match self {
            EngineTransition::Construct => None,
            EngineTransition::PreInit | EngineTransition::Init => Some(ListPhase::Init),
            EngineTransition::PreLoad | EngineTransition::Load | EngineTransition::PostLoad => {
                Some(ListPhase::Load)
            },
            EngineTransition::PreUnload
            | EngineTransition::Unload
            | EngineTransition::PostUnload => Some(ListPhase::Unload),
            EngineTransition::Destroy => Some(ListPhase::Destroy),
        }
    }

    /// Failure handling for this transition
    pub const fn policy(&self) -> FailurePolicy {
        match self {
            EngineTransition::PreUnload
            | EngineTransition::Unload
            | EngineTransition::PostUnload => FailurePolicy::BestEffort,
            EngineTransition::Destroy => FailurePolicy::Infallible,
            _ => FailurePolicy::AbortOnFirst,
        }
    }

    /// Whether the lock is released between engines for this transition
    pub const fn has_release_points(&self) -> bool {
        matches!(
            self.list(),
            Some(ListPhase::Load) | Some(ListPhase::Unload)
        )
    }
}

impl fmt::Display for EngineTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_after_transition() {
        let state = EngineState::Constructed
            .after(EngineTransition::PreInit)
            .after(EngineTransition::Init)
            .after(EngineTransition::PreLoad);
        assert_eq!(state, EngineState::Initialized);

        let loaded = state.after(EngineTransition::Load).after(EngineTransition::PostLoad);
        assert_eq!(loaded, EngineState::Loaded);
        assert_eq!(loaded.after(EngineTransition::Unload), EngineState::UNLOADED);
        assert!(loaded.is_initialized());
        assert!(!EngineState::PreInitialized.is_initialized());
    }

    #[test]
    fn test_transition_lists_and_policies() {
        assert_eq!(EngineTransition::PreInit.list(), Some(ListPhase::Init));
        assert_eq!(EngineTransition::PostUnload.list(), Some(ListPhase::Unload));
        assert_eq!(EngineTransition::Construct.list(), None);

        assert_eq!(EngineTransition::Load.policy(), FailurePolicy::AbortOnFirst);
        assert_eq!(EngineTransition::Unload.policy(), FailurePolicy::BestEffort);
        assert_eq!(EngineTransition::Destroy.policy(), FailurePolicy::Infallible);

        assert!(EngineTransition::PostLoad.has_release_points());
        assert!(!EngineTransition::Init.has_release_points());
    }
}
