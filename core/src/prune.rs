//! # Missing-Engine Pruning
//!
//! Reconciles the ordered lists, the class registry and the engine table
//! with what is actually usable on the device. Runs at the start of PreInit
//! and whenever an engine drops out before initialization completes.
//!
//! ```text
//!   Init list ──► exists? ── no ──────────────────────┐
//!                    │ yes                             │
//!                    ▼                                 ▼
//!               flagged missing / !is_present ──► init_missing, free
//!                    │ no                              │
//!                  keep                     delete_engine_on_pre_init
//!                                            ├─ coprocessor owns it? keep classes
//!                                            ├─ otherwise remove its classes
//!                                            └─ prune from all four lists
//! ```
//!
//! A coprocessor may back an engine that is absent locally; its classes
//! then stay registered so clients can still reach it.

use helix_device_hal::EngineDescriptor;

use crate::config::NotSupportedAction;
use crate::device::{Device, DeviceInner, DeviceStatus};
use crate::error::{ErrorKind, Result};
use crate::order::ListPhase;
use crate::state::EngineState;

impl DeviceInner {
    /// Drop every Init-list engine that is missing, then reconcile classes
    ///
    /// Idempotent: a second run finds nothing to do.
    pub(crate) fn remove_missing_engines(&mut self) -> Result<()> {
        let snapshot = self.ctx.lists.list(ListPhase::Init).to_vec();

        for desc in snapshot {
            let keep = match self.engines.get(&desc) {
                Some(slot) => !self.ctx.is_missing(desc) && slot.engine.is_present(&self.ctx),
                None => false,
            };
            if keep {
                continue;
            }

            if let Some(mut slot) = self.engines.remove(&desc) {
                log::info!("device {}: {} is missing", self.ctx.instance, desc);
                slot.engine.init_missing(&mut self.ctx);
            }
            self.ctx.missing.insert(desc);
            self.retired.insert(desc, EngineState::Missing);
            self.delete_engine_on_pre_init(desc)?;
        }

        // Classes still pointing at engines nobody can serve.
        let mut removed = 0usize;
        for engine in self.ctx.classes.engines() {
            if self.engines.contains_key(&engine) || self.ctx.coprocessor.supports_engine(engine) {
                continue;
            }
            removed += self.ctx.classes.remove_for_engine(engine);
        }
        if removed > 0 {
            log::debug!("device {}: dropped {} orphaned classes", self.ctx.instance, removed);
            self.ctx.engine_table.invalidate();
        }

        self.ctx.engine_table.rebuild(self.ctx.classes.as_ref())
    }

    /// Remove an engine from the lists before PreInit completes
    pub(crate) fn delete_engine_on_pre_init(&mut self, desc: EngineDescriptor) -> Result<()> {
        let remote = self.ctx.coprocessor.supports_engine(desc);

        if !remote {
            let removed = self.ctx.classes.remove_for_engine(desc);
            log::debug!("device {}: removed {} classes of {}", self.ctx.instance, removed, desc);
        }

        if self.ctx.lists.prune(desc) {
            self.stats.pruned += 1;
            log::info!(
                "device {}: pruned {}{}",
                self.ctx.instance,
                desc,
                if remote { " (coprocessor keeps its classes)" } else { "" }
            );
        }

        if !remote {
            self.ctx.engine_table.invalidate();
            self.ctx.engine_table.rebuild(self.ctx.classes.as_ref())?;
        }
        Ok(())
    }

    /// Remove an engine's classes and drop it from the load/unload lists
    ///
    /// The Init and Destroy lists keep the engine so it is still
    /// initialized and torn down.
    pub(crate) fn delete_engine_from_class_db(&mut self, desc: EngineDescriptor) {
        let removed = self.ctx.classes.remove_for_engine(desc);
        self.ctx
            .lists
            .prune_phases(desc, &[ListPhase::Load, ListPhase::Unload]);
        self.ctx.engine_table.invalidate();
        log::info!(
            "device {}: {} withdrawn from class db ({} classes)",
            self.ctx.instance,
            desc,
            removed
        );
    }

    /// Handle `NotSupported` from PreInit
    pub(crate) fn prune_unsupported(&mut self, desc: EngineDescriptor) -> Result<()> {
        match self.ctx.config.pre_init_action(desc.kind()) {
            Some(NotSupportedAction::RemoveClasses) => {
                self.ctx.classes.remove_for_engine(desc);
                self.ctx.engine_table.invalidate();
            },
            Some(NotSupportedAction::WarnDeprecated) => {
                log::warn!("device {}: {} is deprecated, removing", self.ctx.instance, desc);
            },
            None => {
                let err = crate::lifecycle_error!(
                    ErrorKind::InvalidState,
                    "unexpected NotSupported from PreInit",
                    "{}",
                    desc
                );
                self.ctx.config.report_table_error(err);
            },
        }

        self.stats.not_supported += 1;
        if let Some(mut slot) = self.engines.remove(&desc) {
            slot.engine.init_missing(&mut self.ctx);
            slot.engine.destroy(&mut self.ctx);
        }
        self.ctx.missing.insert(desc);
        self.retired.insert(desc, EngineState::Missing);
        self.delete_engine_on_pre_init(desc)
    }
}

impl Device {
    /// Re-run missing-engine pruning
    pub fn remove_missing_engines(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.expect_status(
            &[DeviceStatus::Constructed, DeviceStatus::PreInitialized],
            "remove missing engines",
        )?;
        inner.remove_missing_engines()
    }

    /// Drop an engine before PreInit, freeing its object if one exists
    pub fn delete_engine_on_pre_init(&self, desc: EngineDescriptor) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.expect_status(&[DeviceStatus::Constructed], "delete engine")?;

        if let Some(mut slot) = inner.engines.remove(&desc) {
            slot.engine.destroy(&mut inner.ctx);
        }
        inner.ctx.missing.insert(desc);
        inner.retired.insert(desc, EngineState::Missing);
        inner.delete_engine_on_pre_init(desc)
    }

    /// Withdraw an engine's classes and skip it during load and unload
    pub fn delete_engine_from_class_db(&self, desc: EngineDescriptor) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.expect_status(
            &[
                DeviceStatus::Constructed,
                DeviceStatus::PreInitialized,
                DeviceStatus::Initialized,
            ],
            "delete engine from class db",
        )?;
        inner.delete_engine_from_class_db(desc);
        Ok(())
    }
}
