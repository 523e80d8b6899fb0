//! # Lifecycle Configuration
//!
//! Transition flags passed to every engine callback, and the per-device
//! policy knobs of the lifecycle driver.

use alloc::vec::Vec;

use helix_device_hal::EngineKind;

use crate::error::LifecycleError;

// =============================================================================
// TRANSITION FLAGS
// =============================================================================

bitflags::bitflags! {
    /// Phase-flags word handed to every transition callback
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TransitionFlags: u32 {
        /// Engine state must survive the transition (suspend/resume)
        const PRESERVING     = 1 << 0;
        /// Power-management transition
        const PM_TRANSITION  = 1 << 1;
        /// Suspend to RAM
        const PM_SUSPEND     = 1 << 2;
        /// Suspend to disk
        const PM_HIBERNATE   = 1 << 3;
        /// Deep-idle power-gating transition
        const GC6_TRANSITION = 1 << 4;
        /// Skip non-essential teardown work
        const FAST_UNLOAD    = 1 << 5;
    }
}

impl TransitionFlags {
    /// Flags for a suspend-to-RAM cycle
    pub const fn suspend() -> Self {
        Self::PRESERVING
            .union(Self::PM_TRANSITION)
            .union(Self::PM_SUSPEND)
    }

    /// Flags for a hibernate cycle
    pub const fn hibernate() -> Self {
        Self::PRESERVING
            .union(Self::PM_TRANSITION)
            .union(Self::PM_HIBERNATE)
    }
}

// =============================================================================
// PRE-INIT ALLOW LIST
// =============================================================================

/// What to do when an allow-listed engine answers `NotSupported` in PreInit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotSupportedAction {
    /// Drop the engine's classes before pruning it
    RemoveClasses,
    /// Warn that the engine is deprecated, then prune it
    WarnDeprecated,
}

/// One entry of the PreInit `NotSupported` allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowEntry {
    /// Engine kind permitted to be absent
    pub kind: EngineKind,
    /// Action taken before pruning
    pub action: NotSupportedAction,
}

// =============================================================================
// LIFECYCLE CONFIG
// =============================================================================

/// Per-device lifecycle policy
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Kinds whose unload failure is fatal while `PRESERVING` is set
    pub fatal_on_unload: Vec<EngineKind>,
    /// Kinds allowed to answer `NotSupported` during PreInit
    pub pre_init_allow_list: Vec<AllowEntry>,
    /// Drop the device lock and service interrupts between load/unload steps
    pub release_between_steps: bool,
    /// Assert on table and programmer errors (debug builds only)
    pub assert_table_errors: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            fatal_on_unload: alloc::vec![EngineKind::MemorySystem],
            pre_init_allow_list: alloc::vec![
                AllowEntry {
                    kind: EngineKind::KernelDisplay,
                    action: NotSupportedAction::RemoveClasses,
                },
                AllowEntry {
                    kind: EngineKind::Inforom,
                    action: NotSupportedAction::WarnDeprecated,
                },
            ],
            release_between_steps: true,
            assert_table_errors: cfg!(debug_assertions),
        }
    }
}

impl LifecycleConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the fatal-on-unload exception list
    pub fn with_fatal_on_unload(mut self, kinds: &[EngineKind]) -> Self {
        self.fatal_on_unload = kinds.to_vec();
        self
    }

    /// Allow `kind` to answer `NotSupported` during PreInit
    pub fn with_pre_init_allowed(mut self, kind: EngineKind, action: NotSupportedAction) -> Self {
        self.pre_init_allow_list.retain(|entry| entry.kind != kind);
        self.pre_init_allow_list.push(AllowEntry { kind, action });
        self
    }

    /// Enable or disable release points
    pub fn with_release_between_steps(mut self, release: bool) -> Self {
        self.release_between_steps = release;
        self
    }

    /// Enable or disable table-error assertions
    pub fn with_table_assertions(mut self, assert: bool) -> Self {
        self.assert_table_errors = assert;
        self
    }

    /// Allow-list action for `kind`, if any
    pub fn pre_init_action(&self, kind: EngineKind) -> Option<NotSupportedAction> {
        self.pre_init_allow_list
            .iter()
            .find(|entry| entry.kind == kind)
            .map(|entry| entry.action)
    }

    /// Whether an unload failure of `kind` is fatal under `flags`
    pub fn is_fatal_unload(&self, kind: EngineKind, flags: TransitionFlags) -> bool {
        flags.contains(TransitionFlags::PRESERVING) && self.fatal_on_unload.contains(&kind)
    }

    /// Report a table or programmer error and hand it back
    pub(crate) fn table_error(&self, err: LifecycleError) -> LifecycleError {
        log::error!("lifecycle: table error: {}", err);
        if self.assert_table_errors {
            debug_assert!(false, "{}", err);
        }
        err
    }

    /// Report a table or programmer error that does not stop the caller
    pub(crate) fn report_table_error(&self, err: LifecycleError) {
        drop(self.table_error(err));
    }
}
