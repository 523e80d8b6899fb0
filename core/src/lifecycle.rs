//! # Lifecycle Driver
//!
//! Walks the ordered lists and invokes each engine's transition hook.
//!
//! ```text
//!   construct ──► pre_init ──► init ──► load ◄──► unload ──► destroy
//!       │             │          │        │          │          │
//!   type table     Init list  Init list  Load list  Unload   Destroy list
//!   (early pass,   + prune               3 passes   3 passes  then free in
//!    then late)                          abort      best      reverse type
//!                                        on first   effort    order
//! ```
//!
//! Construction, PreInit, Init and Destroy run with the device lock held
//! throughout. Load and unload drop it after every engine step so the
//! host can service other devices' interrupts.
//!
//! A `NotSupported` result is success everywhere except PreInit, where
//! it removes the engine.

use alloc::string::ToString;

use helix_device_hal::EngineDescriptor;

use crate::config::TransitionFlags;
use crate::device::{Device, DeviceInner, DeviceStatus, EngineSlot};
use crate::engine_type::EngineTypeTable;
use crate::error::{ErrorKind, LifecycleError, Result};
use crate::order::{build_lists, ListPhase};
use crate::present::resolve_present_set;
use crate::state::{EngineState, EngineTransition, FailurePolicy};

/// Failure sink for the released walks
type FailureHandler<'a> = dyn FnMut(&mut DeviceInner, LifecycleError) -> Result<()> + 'a;

// =============================================================================
// DEVICE OPERATIONS
// =============================================================================

impl Device {
    /// Resolve the present set, build the lists and construct every present engine
    ///
    /// Engine types flagged `construct_early` are created first; everything
    /// else follows in type-table order, instances ascending.
    pub fn construct(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.expect_status(&[DeviceStatus::Created], "construct")?;

        let presence = inner.presence.take().ok_or_else(|| {
            LifecycleError::new(ErrorKind::InvalidState, "presence already consumed")
        })?;

        let types = inner.ctx.resolver.types();
        inner.ctx.present = resolve_present_set(presence.as_ref(), &inner.ctx.chip, &types)?;
        let lists = build_lists(&inner.ctx.present, inner.ctx.order)
            .map_err(|err| inner.ctx.config.table_error(err))?;
        inner.ctx.lists = lists;

        inner.build_class_db()?;
        inner.ctx.engine_table.construct();
        inner.ctx.engine_table.rebuild(inner.ctx.classes.as_ref())?;

        inner.create_children(&types, true)?;
        inner.create_children(&types, false)?;

        log::info!(
            "device {}: constructed {} of {} present engines",
            inner.ctx.instance,
            inner.engines.len(),
            inner.ctx.present.total()
        );
        inner.status = DeviceStatus::Constructed;
        Ok(())
    }

    /// Prune missing engines, then PreInit the Init list
    pub fn pre_init(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.expect_status(&[DeviceStatus::Constructed], "pre-init")?;

        inner.remove_missing_engines()?;

        let order = inner.ctx.lists.list(ListPhase::Init).to_vec();
        for desc in order {
            // An earlier engine may have pruned this one.
            if !inner.ctx.lists.contains(ListPhase::Init, desc) {
                continue;
            }

            match inner.step(desc, EngineTransition::PreInit, TransitionFlags::empty()) {
                None | Some(Ok(())) => {},
                Some(Err(err)) if err.is_not_supported() => inner.prune_unsupported(desc)?,
                Some(Err(err)) => {
                    let err = err.with_engine(desc).with_transition(EngineTransition::PreInit);
                    log::error!("device {}: {}", inner.ctx.instance, err);
                    return Err(err);
                },
            }
        }

        inner.status = DeviceStatus::PreInitialized;
        Ok(())
    }

    /// Init the Init list
    pub fn init(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.expect_status(&[DeviceStatus::PreInitialized], "init")?;

        let order = inner.ctx.lists.list(ListPhase::Init).to_vec();
        for desc in order {
            if let Err(err) = inner.drive(desc, EngineTransition::Init, TransitionFlags::empty()) {
                log::error!("device {}: {}", inner.ctx.instance, err);
                return Err(err);
            }
        }

        inner.status = DeviceStatus::Initialized;
        Ok(())
    }

    /// PreLoad, Load and PostLoad the Load list
    ///
    /// Each pass completes over every engine before the next begins. The
    /// first failure stops everything and leaves the device
    /// [`DeviceStatus::PartiallyLoaded`]; engines after the failing one are
    /// left untouched and nothing is rolled back.
    pub fn load(&self, flags: TransitionFlags) -> Result<()> {
        let instance = self.begin(&[DeviceStatus::Initialized], "load", DeviceStatus::PartiallyLoaded)?;
        log::info!("device {}: load ({:?})", instance, flags);

        let result = self.walk_released(&EngineTransition::LOAD_SEQUENCE, flags, &mut |inner, err| {
            log::error!("device {}: load aborted: {}", inner.ctx.instance, err);
            Err(err)
        });

        self.finish(if result.is_ok() {
            DeviceStatus::Loaded
        } else {
            DeviceStatus::PartiallyLoaded
        });
        result
    }

    /// PreUnload, Unload and PostUnload the Unload list
    ///
    /// Every engine is visited even after failures. A failure of a kind
    /// configured fatal under `flags` is returned as is; otherwise the first
    /// failure comes back wrapped in [`ErrorKind::BestEffortFailure`].
    pub fn unload(&self, flags: TransitionFlags) -> Result<()> {
        let instance = self.begin(
            &[DeviceStatus::Loaded, DeviceStatus::PartiallyLoaded],
            "unload",
            DeviceStatus::PartiallyLoaded,
        )?;
        log::info!("device {}: unload ({:?})", instance, flags);

        let mut first: Option<LifecycleError> = None;
        let mut fatal: Option<LifecycleError> = None;
        let mut failures = 0u32;

        let walked = self.walk_released(&EngineTransition::UNLOAD_SEQUENCE, flags, &mut |inner, err| {
            inner.stats.best_effort_failures += 1;
            failures += 1;
            log::error!("device {}: {}", inner.ctx.instance, err);

            let is_fatal = err
                .engine()
                .map_or(false, |desc| inner.ctx.config.is_fatal_unload(desc.kind(), flags));
            if is_fatal && fatal.is_none() {
                fatal = Some(err.clone());
            }
            if first.is_none() {
                first = Some(err);
            }
            Ok(())
        });

        self.finish(DeviceStatus::Initialized);
        walked?;

        if let Some(err) = fatal {
            return Err(err);
        }
        match first {
            Some(err) => Err(LifecycleError::new(
                ErrorKind::BestEffortFailure,
                "unload completed with failures",
            )
            .with_details(alloc::format!("{} failed steps", failures))
            .with_source(err)),
            None => Ok(()),
        }
    }

    /// Destroy the Destroy list, then free every engine object
    ///
    /// Objects are freed in reverse type-table order, instances descending,
    /// after which the engine table, lists and present set are released.
    pub fn destroy(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.expect_status(
            &[
                DeviceStatus::Created,
                DeviceStatus::Constructed,
                DeviceStatus::PreInitialized,
                DeviceStatus::Initialized,
                DeviceStatus::PartiallyLoaded,
                DeviceStatus::Loaded,
            ],
            "destroy",
        )?;

        if matches!(inner.status, DeviceStatus::Loaded | DeviceStatus::PartiallyLoaded) {
            log::warn!("device {}: destroying without unload", inner.ctx.instance);
        }

        let order = inner.ctx.lists.list(ListPhase::Destroy).to_vec();
        for desc in order {
            let _ = inner.step(desc, EngineTransition::Destroy, TransitionFlags::empty());
        }

        inner.destruct_children();
        inner.ctx.engine_table.destroy();
        inner.ctx.lists.clear();
        inner.ctx.present.clear();

        log::info!("device {}: destroyed", inner.ctx.instance);
        inner.status = DeviceStatus::Destroyed;
        Ok(())
    }

    // =========================================================================
    // Released walks
    // =========================================================================

    /// Claim the device for a released walk, returning its instance number
    fn begin(&self, allowed: &[DeviceStatus], operation: &'static str, during: DeviceStatus) -> Result<u32> {
        let mut inner = self.inner.lock();
        inner.expect_status(allowed, operation)?;
        inner.busy = true;
        inner.status = during;
        Ok(inner.ctx.instance)
    }

    fn finish(&self, status: DeviceStatus) {
        let mut inner = self.inner.lock();
        inner.busy = false;
        inner.status = status;
    }

    /// Run `sequence` pass by pass, releasing the lock after every engine
    ///
    /// The list is re-read at the start of each pass.
    fn walk_released(
        &self,
        sequence: &[EngineTransition],
        flags: TransitionFlags,
        on_failure: &mut FailureHandler<'_>,
    ) -> Result<()> {
        for &transition in sequence {
            debug_assert!(transition.has_release_points());
            let Some(phase) = transition.list() else {
                continue;
            };

            let order = self.inner.lock().ctx.lists.list(phase).to_vec();
            for desc in order {
                {
                    let mut guard = self.inner.lock();
                    if let Err(err) = guard.drive(desc, transition, flags) {
                        debug_assert_ne!(transition.policy(), FailurePolicy::Infallible);
                        on_failure(&mut *guard, err)?;
                    }
                }
                self.release_point();
            }
        }
        Ok(())
    }
}

// =============================================================================
// LOCKED HELPERS
// =============================================================================

impl DeviceInner {
    /// Run one hook, treating `NotSupported` as success
    pub(crate) fn drive(
        &mut self,
        desc: EngineDescriptor,
        transition: EngineTransition,
        flags: TransitionFlags,
    ) -> Result<()> {
        match self.step(desc, transition, flags) {
            None | Some(Ok(())) => Ok(()),
            Some(Err(err)) if err.is_not_supported() => {
                self.absorb(desc, transition);
                Ok(())
            },
            Some(Err(err)) => Err(err.with_engine(desc).with_transition(transition)),
        }
    }

    /// Register the declared classes whose engine is present
    pub(crate) fn build_class_db(&mut self) -> Result<()> {
        let DeviceInner {
            ctx,
            declared_classes,
            ..
        } = self;

        let mut registered = 0usize;
        for class in declared_classes.iter() {
            if class.engine.map_or(true, |engine| ctx.present.contains(engine)) {
                ctx.classes.register(*class)?;
                registered += 1;
            }
        }

        ctx.engine_table.invalidate();
        log::debug!(
            "device {}: registered {} of {} classes",
            ctx.instance,
            registered,
            declared_classes.len()
        );
        Ok(())
    }

    /// Construct every present engine of the early or the late group
    fn create_children(&mut self, types: &EngineTypeTable<'static>, early: bool) -> Result<()> {
        for ty in types.iter().filter(|ty| ty.construct_early == early) {
            for instance in 0..ty.instance_count {
                let desc = EngineDescriptor::new(ty.kind, instance);
                if self.ctx.present.contains(desc) {
                    self.create_engine(desc)?;
                }
            }
        }
        Ok(())
    }

    fn create_engine(&mut self, desc: EngineDescriptor) -> Result<()> {
        let Some(info) = self.catalog.class_info_for(desc.kind(), &self.ctx.chip) else {
            log::debug!("device {}: no implementation for {}", self.ctx.instance, desc);
            return Ok(());
        };

        let name = info.name;
        let mut engine = (info.construct)(desc, &self.ctx.chip);
        log::debug!("device {}: {} Construct begin ({})", self.ctx.instance, name, desc);

        let result = engine.construct(&mut self.ctx);
        self.stats.transitions += 1;

        match result {
            Ok(()) if !self.ctx.is_missing(desc) => {
                log::debug!("device {}: {} Construct end ({})", self.ctx.instance, name, desc);
                self.engines.insert(
                    desc,
                    EngineSlot {
                        engine,
                        state: EngineState::Constructed,
                    },
                );
                Ok(())
            },
            Ok(()) => {
                log::info!("device {}: {} missing after construct", self.ctx.instance, desc);
                drop(engine);
                self.retire(desc, EngineState::Missing);
                Ok(())
            },
            Err(err) if err.is_not_supported() => {
                log::info!("device {}: {} not supported on this chip", self.ctx.instance, desc);
                drop(engine);
                self.stats.not_supported += 1;
                self.ctx.mark_missing(desc);
                self.retire(desc, EngineState::Missing);
                Ok(())
            },
            Err(err) => {
                let err = LifecycleError::new(ErrorKind::ConstructFailed, "engine construction failed")
                    .with_details(name.to_string())
                    .with_engine(desc)
                    .with_transition(EngineTransition::Construct)
                    .with_source(err);
                log::error!("device {}: {}", self.ctx.instance, err);
                Err(err)
            },
        }
    }

    /// Free engine objects in reverse type-table order, instances descending
    fn destruct_children(&mut self) {
        let types = self.ctx.resolver.types();
        for ty in types.iter().rev() {
            for instance in (0..ty.instance_count).rev() {
                let desc = EngineDescriptor::new(ty.kind, instance);
                if let Some(slot) = self.engines.remove(&desc) {
                    log::debug!("device {}: freeing {} ({})", self.ctx.instance, desc, slot.state);
                    self.retired.insert(desc, EngineState::Destroyed);
                }
            }
        }
        debug_assert!(self.engines.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifecycleConfig;
    use crate::device::DeviceBuilder;
    use crate::engine_id::ClientEngine;
    use crate::engine_type::EngineType;
    use crate::order::OrderEntry;
    use crate::testing::{ampere, ce, gr, gr_ce_builder, MockPlan};
    use alloc::sync::Arc;
    use alloc::vec;
    use alloc::vec::Vec;
    use helix_device_hal::{CountingService, EngineKind, PresentEntry, StaticPresence};

    fn gr_ce(copies: u16) -> [PresentEntry; 2] {
        [
            PresentEntry::new(EngineKind::Graphics, 1),
            PresentEntry::new(EngineKind::Copy, copies),
        ]
    }

    fn initialized(device: &Device) {
        device.construct().unwrap();
        device.pre_init().unwrap();
        device.init().unwrap();
    }

    fn memsys(instance: u16) -> EngineDescriptor {
        EngineDescriptor::new(EngineKind::MemorySystem, instance)
    }

    static MEM_TYPES: [EngineType; 3] = [
        EngineType::new(EngineKind::MemorySystem, 1),
        EngineType::new(EngineKind::Graphics, 1),
        EngineType::new(EngineKind::Copy, 1),
    ];

    static MEM_ORDER: [OrderEntry; 3] = [
        OrderEntry::all(EngineKind::MemorySystem),
        OrderEntry::all(EngineKind::Graphics),
        OrderEntry::all(EngineKind::Copy),
    ];

    fn memsys_device(plan: &MockPlan) -> Device {
        DeviceBuilder::new(1, ampere())
            .with_engine_types(&MEM_TYPES)
            .with_engine_order(&MEM_ORDER)
            .with_catalog(plan.catalog(&[EngineKind::MemorySystem, EngineKind::Graphics, EngineKind::Copy]))
            .with_presence(StaticPresence::new(&[
                PresentEntry::new(EngineKind::MemorySystem, 1),
                PresentEntry::new(EngineKind::Graphics, 1),
                PresentEntry::new(EngineKind::Copy, 1),
            ]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_present_subset_filters_lists() {
        let plan = MockPlan::new();
        let device = gr_ce_builder(&gr_ce(1), &plan).build().unwrap();
        device.construct().unwrap();

        let lists = device.lists();
        assert_eq!(lists.list(ListPhase::Init), &[gr(0), ce(0)]);
        assert_eq!(lists.list(ListPhase::Load), &[gr(0), ce(0)]);
        assert_eq!(lists.list(ListPhase::Unload), &[ce(0), gr(0)]);
        assert!(device.is_eng_desc_supported(ce(0)));
        assert!(!device.is_eng_desc_supported(ce(1)));

        device.pre_init().unwrap();
        assert!(device.is_engine_available(ClientEngine::Copy(0)).unwrap());
        assert!(!device.is_engine_available(ClientEngine::Copy(1)).unwrap());
    }

    #[test]
    fn test_full_lifecycle() {
        let plan = MockPlan::new();
        let device = gr_ce_builder(&gr_ce(2), &plan).build().unwrap();

        device.construct().unwrap();
        assert_eq!(device.status(), DeviceStatus::Constructed);
        assert_eq!(plan.calls_for("Construct"), vec![gr(0), ce(0), ce(1)]);
        assert_eq!(device.engine_count(), 3);

        device.pre_init().unwrap();
        device.init().unwrap();
        assert_eq!(plan.calls_for("Init"), vec![gr(0), ce(0), ce(1)]);
        assert_eq!(device.engine_state(ce(1)), EngineState::Initialized);

        device.load(TransitionFlags::empty()).unwrap();
        assert_eq!(device.status(), DeviceStatus::Loaded);
        assert_eq!(device.engine_state(gr(0)), EngineState::Loaded);

        device.unload(TransitionFlags::empty()).unwrap();
        assert_eq!(device.status(), DeviceStatus::Initialized);
        assert_eq!(plan.calls_for("Unload"), vec![ce(1), ce(0), gr(0)]);
        assert_eq!(device.engine_state(gr(0)), EngineState::UNLOADED);

        device.destroy().unwrap();
        assert_eq!(device.status(), DeviceStatus::Destroyed);
        assert_eq!(plan.calls_for("Destroy"), vec![ce(1), ce(0), gr(0)]);
        assert_eq!(device.engine_state(ce(0)), EngineState::Destroyed);
        assert_eq!(device.engine_count(), 0);
        assert!(device.lists().is_empty());
        assert!(device.present_set().is_empty());
        assert_eq!(device.stats().transitions, 3 + 3 + 3 + 9 + 9 + 3);
    }

    #[test]
    fn test_load_passes_complete_in_order() {
        let plan = MockPlan::new();
        let device = gr_ce_builder(&gr_ce(1), &plan).build().unwrap();
        initialized(&device);
        device.load(TransitionFlags::empty()).unwrap();

        let hooks: Vec<_> = plan
            .calls()
            .into_iter()
            .filter(|(hook, _)| hook.contains("Load"))
            .collect();
        assert_eq!(
            hooks,
            vec![
                ("PreLoad", gr(0)),
                ("PreLoad", ce(0)),
                ("Load", gr(0)),
                ("Load", ce(0)),
                ("PostLoad", gr(0)),
                ("PostLoad", ce(0)),
            ]
        );
    }

    #[test]
    fn test_load_aborts_on_first_failure() {
        let plan = MockPlan::new().fail(ce(1), EngineTransition::Load, ErrorKind::TransientEngineFailure);
        let device = gr_ce_builder(&gr_ce(4), &plan).build().unwrap();
        initialized(&device);

        let err = device.load(TransitionFlags::empty()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransientEngineFailure);
        assert_eq!(err.engine(), Some(ce(1)));
        assert_eq!(err.transition(), Some(EngineTransition::Load));

        assert_eq!(plan.calls_for("PreLoad").len(), 5);
        assert_eq!(plan.calls_for("Load"), vec![gr(0), ce(0), ce(1)]);
        assert!(plan.calls_for("PostLoad").is_empty());

        assert_eq!(device.engine_state(gr(0)), EngineState::Loaded);
        assert_eq!(device.engine_state(ce(0)), EngineState::Loaded);
        for desc in [ce(1), ce(2), ce(3)] {
            assert_eq!(device.engine_state(desc), EngineState::Initialized);
        }
        assert_eq!(device.status(), DeviceStatus::PartiallyLoaded);

        // A partially loaded device can still be unloaded.
        device.unload(TransitionFlags::empty()).unwrap();
        assert_eq!(device.status(), DeviceStatus::Initialized);
    }

    #[test]
    fn test_unload_is_best_effort() {
        let plan = MockPlan::new()
            .fail(ce(2), EngineTransition::Unload, ErrorKind::TransientEngineFailure)
            .fail(ce(0), EngineTransition::Unload, ErrorKind::EngineFault);
        let device = gr_ce_builder(&gr_ce(4), &plan).build().unwrap();
        initialized(&device);
        device.load(TransitionFlags::empty()).unwrap();

        let err = device.unload(TransitionFlags::empty()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BestEffortFailure);
        let first = err.source().unwrap();
        assert_eq!(first.engine(), Some(ce(2)));
        assert_eq!(first.kind(), ErrorKind::TransientEngineFailure);

        assert_eq!(plan.calls_for("Unload"), vec![ce(3), ce(2), ce(1), ce(0), gr(0)]);
        assert_eq!(plan.calls_for("PostUnload").len(), 5);
        assert_eq!(device.engine_state(ce(2)), EngineState::Loaded);
        assert_eq!(device.engine_state(ce(1)), EngineState::UNLOADED);
        assert_eq!(device.stats().best_effort_failures, 2);
        assert_eq!(device.status(), DeviceStatus::Initialized);
    }

    #[test]
    fn test_memory_system_unload_failure_is_fatal_when_preserving() {
        let plan = MockPlan::new()
            .fail(ce(0), EngineTransition::Unload, ErrorKind::TransientEngineFailure)
            .fail(memsys(0), EngineTransition::Unload, ErrorKind::ResourceExhausted);

        let device = memsys_device(&plan);
        initialized(&device);
        device.load(TransitionFlags::empty()).unwrap();
        let err = device.unload(TransitionFlags::suspend()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(err.engine(), Some(memsys(0)));

        device.load(TransitionFlags::empty()).unwrap();
        let err = device.unload(TransitionFlags::empty()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BestEffortFailure);
        assert_eq!(err.source().and_then(|e| e.engine()), Some(ce(0)));
    }

    #[test]
    fn test_release_points_between_steps() {
        let plan = MockPlan::new();
        let service = Arc::new(CountingService::new());
        let device = gr_ce_builder(&gr_ce(1), &plan)
            .with_interrupts(service.clone())
            .build()
            .unwrap();
        initialized(&device);
        assert_eq!(service.serviced(), 0);

        device.load(TransitionFlags::empty()).unwrap();
        assert_eq!(service.serviced(), 6);
        device.unload(TransitionFlags::empty()).unwrap();
        assert_eq!(service.serviced(), 12);
        assert_eq!(device.stats().release_points, 12);

        let plan = MockPlan::new();
        let service = Arc::new(CountingService::new());
        let device = gr_ce_builder(&gr_ce(1), &plan)
            .with_config(LifecycleConfig::default().with_release_between_steps(false))
            .with_interrupts(service.clone())
            .build()
            .unwrap();
        initialized(&device);
        device.load(TransitionFlags::empty()).unwrap();
        assert_eq!(service.serviced(), 0);
    }

    #[test]
    fn test_early_types_construct_first() {
        static TYPES: [EngineType; 2] = [
            EngineType::new(EngineKind::Graphics, 1),
            EngineType::early(EngineKind::Bus, 1),
        ];
        static ORDER: [OrderEntry; 2] = [
            OrderEntry::all(EngineKind::Bus),
            OrderEntry::all(EngineKind::Graphics),
        ];

        let plan = MockPlan::new();
        let device = DeviceBuilder::new(0, ampere())
            .with_engine_types(&TYPES)
            .with_engine_order(&ORDER)
            .with_catalog(plan.catalog(&[EngineKind::Graphics, EngineKind::Bus]))
            .with_presence(StaticPresence::new(&[
                PresentEntry::new(EngineKind::Graphics, 1),
                PresentEntry::new(EngineKind::Bus, 1),
            ]))
            .build()
            .unwrap();
        device.construct().unwrap();
        device.destroy().unwrap();

        let bus = EngineDescriptor::new(EngineKind::Bus, 0);
        assert_eq!(plan.calls_for("Construct"), vec![bus, gr(0)]);
        assert_eq!(plan.calls_for("Destroy"), vec![gr(0), bus]);
    }

    #[test]
    fn test_construct_not_supported_leaves_slot_empty() {
        let plan = MockPlan::new()
            .fail(ce(0), EngineTransition::Construct, ErrorKind::NotSupported)
            .missing_on_construct(ce(2));
        let device = gr_ce_builder(&gr_ce(3), &plan).build().unwrap();
        device.construct().unwrap();

        assert_eq!(device.engine_count(), 2);
        assert_eq!(device.engine_state(ce(0)), EngineState::Missing);
        assert_eq!(device.engine_state(ce(2)), EngineState::Missing);

        device.pre_init().unwrap();
        assert_eq!(device.lists().list(ListPhase::Init), &[gr(0), ce(1)]);
        assert!(plan.calls_for("InitMissing").is_empty());
    }

    #[test]
    fn test_construct_failure_aborts() {
        let plan = MockPlan::new().fail(gr(0), EngineTransition::Construct, ErrorKind::EngineFault);
        let device = gr_ce_builder(&gr_ce(2), &plan).build().unwrap();

        let err = device.construct().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstructFailed);
        assert_eq!(err.root_cause().kind(), ErrorKind::EngineFault);
        assert!(plan.calls_for("Construct").iter().all(|desc| *desc == gr(0)));
        assert_eq!(device.status(), DeviceStatus::Created);

        let err = device.construct().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        device.destroy().unwrap();
    }

    #[test]
    fn test_construct_rejects_present_kind_without_order_entry() {
        static GR_ONLY: [OrderEntry; 1] = [OrderEntry::all(EngineKind::Graphics)];
        let plan = MockPlan::new();
        let device = gr_ce_builder(&gr_ce(1), &plan)
            .with_engine_order(&GR_ONLY)
            .build()
            .unwrap();

        let err = device.construct().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InconsistentOrderLists);
        assert_eq!(err.details(), Some("CE0"));
        assert!(plan.calls_for("Construct").is_empty());
        assert_eq!(device.status(), DeviceStatus::Created);
        device.destroy().unwrap();
    }

    #[test]
    fn test_pre_init_failure_aborts() {
        let plan = MockPlan::new().fail(gr(0), EngineTransition::PreInit, ErrorKind::EngineFault);
        let device = gr_ce_builder(&gr_ce(1), &plan).build().unwrap();
        device.construct().unwrap();

        let err = device.pre_init().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineFault);
        assert_eq!(err.transition(), Some(EngineTransition::PreInit));
        assert_eq!(plan.calls_for("PreInit"), vec![gr(0)]);
        assert_eq!(device.status(), DeviceStatus::Constructed);
    }

    #[test]
    fn test_init_absorbs_not_supported() {
        let plan = MockPlan::new()
            .fail(gr(0), EngineTransition::Init, ErrorKind::NotSupported)
            .fail(ce(0), EngineTransition::Load, ErrorKind::NotSupported);
        let device = gr_ce_builder(&gr_ce(1), &plan).build().unwrap();
        initialized(&device);
        assert_eq!(device.engine_state(gr(0)), EngineState::Initialized);

        device.load(TransitionFlags::empty()).unwrap();
        assert_eq!(device.engine_state(ce(0)), EngineState::Loaded);
        assert_eq!(device.stats().not_supported, 2);
    }

    #[test]
    fn test_init_failure_aborts() {
        let plan = MockPlan::new().fail(gr(0), EngineTransition::Init, ErrorKind::EngineFault);
        let device = gr_ce_builder(&gr_ce(1), &plan).build().unwrap();
        device.construct().unwrap();
        device.pre_init().unwrap();

        let err = device.init().unwrap_err();
        assert_eq!(err.engine(), Some(gr(0)));
        assert!(plan.calls_for("Init").iter().all(|desc| *desc == gr(0)));
        assert_eq!(device.status(), DeviceStatus::PreInitialized);
    }

    #[test]
    fn test_status_gating() {
        let plan = MockPlan::new();
        let device = gr_ce_builder(&gr_ce(1), &plan).build().unwrap();

        assert_eq!(device.init().unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(
            device.load(TransitionFlags::empty()).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            device.unload(TransitionFlags::empty()).unwrap_err().kind(),
            ErrorKind::InvalidState
        );

        initialized(&device);
        assert_eq!(device.pre_init().unwrap_err().kind(), ErrorKind::InvalidState);

        device.destroy().unwrap();
        assert_eq!(device.destroy().unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(
            device.is_engine_available(ClientEngine::Graphics(0)).unwrap_err().kind(),
            ErrorKind::TableNotConstructed
        );
    }
}
