//! # Device
//!
//! One device instance: the engine objects it owns, the four ordered
//! lists, the present set, the class registry and the client engine table,
//! all behind a single coarse device lock.
//!
//! ## Ownership
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Device                                                                  │
//! │  ┌────────────────────────────────────────────────────────────────────┐ │
//! │  │ spin::Mutex<DeviceInner>                                            │ │
//! │  │                                                                     │ │
//! │  │  engines: BTreeMap<EngineDescriptor, EngineSlot>                    │ │
//! │  │  ┌──────────────────────────────────────────────────────────────┐  │ │
//! │  │  │ DeviceContext (handed to engines as &mut)                     │  │ │
//! │  │  │  chip · config · present set · ordered lists                  │  │ │
//! │  │  │  class registry · engine table · coprocessor · missing set    │  │ │
//! │  │  └──────────────────────────────────────────────────────────────┘  │ │
//! │  └────────────────────────────────────────────────────────────────────┘ │
//! │  interrupts: Arc<dyn InterruptService>   (called at release points)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Re-entrancy Contract
//!
//! Engine hooks run with the device lock held and receive the context
//! from that guard. A hook must never call back into [`Device`]; anything
//! it needs from the device is on [`DeviceContext`]. Between per-engine
//! load/unload steps the lock is dropped. Across such a release point the
//! only thing a phase relies on is that list construction has completed.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use helix_device_hal::{
    ChipIdentity, ClassDb, ClassDescriptor, ClassRegistry, Coprocessor, EngineDescriptor,
    EngineKind, InterruptService, NoCoprocessor, NoInterrupts, PresenceQuery,
};

use crate::config::{LifecycleConfig, TransitionFlags};
use crate::descriptor::{DescriptorResolver, EngineCatalog};
use crate::engine::{dispatch, Engine};
use crate::engine_id::{ClientEngine, EngineTable};
use crate::engine_type::{EngineType, EngineTypeTable, DEFAULT_ENGINE_TYPES};
use crate::error::{ErrorKind, LifecycleError, Result};
use crate::order::{ListPhase, OrderEntry, OrderedLists, DEFAULT_ENGINE_ORDER};
use crate::present::PresentSet;
use crate::state::{EngineState, EngineTransition};

// =============================================================================
// DEVICE STATUS
// =============================================================================

/// Device-level lifecycle position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    /// Built, nothing constructed yet
    Created,
    /// Engine objects constructed
    Constructed,
    /// PreInit completed, missing engines pruned
    PreInitialized,
    /// Init completed (also the state after unload)
    Initialized,
    /// Load in progress, or aborted part way
    PartiallyLoaded,
    /// Load completed
    Loaded,
    /// Torn down
    Destroyed,
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Counters kept across the device's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Engine hooks invoked
    pub transitions: u64,
    /// `NotSupported` results absorbed as success
    pub not_supported: u32,
    /// Teardown failures logged and skipped
    pub best_effort_failures: u32,
    /// Engines pruned from the ordered lists
    pub pruned: u32,
    /// Release points passed during load/unload
    pub release_points: u64,
}

// =============================================================================
// DEVICE CONTEXT
// =============================================================================

/// Device state visible to engine hooks
pub struct DeviceContext {
    pub(crate) instance: u32,
    pub(crate) chip: ChipIdentity,
    pub(crate) config: LifecycleConfig,
    pub(crate) resolver: DescriptorResolver,
    pub(crate) order: &'static [OrderEntry],
    pub(crate) present: PresentSet,
    pub(crate) lists: OrderedLists,
    pub(crate) classes: Box<dyn ClassRegistry>,
    pub(crate) engine_table: EngineTable,
    pub(crate) coprocessor: Box<dyn Coprocessor>,
    pub(crate) missing: BTreeSet<EngineDescriptor>,
}

impl DeviceContext {
    /// Device instance number
    pub fn instance(&self) -> u32 {
        self.instance
    }

    /// Chip identification
    pub fn chip(&self) -> &ChipIdentity {
        &self.chip
    }

    /// Lifecycle policy
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Present set
    pub fn present(&self) -> &PresentSet {
        &self.present
    }

    /// Ordered lists
    pub fn lists(&self) -> &OrderedLists {
        &self.lists
    }

    /// Class registry
    pub fn classes(&self) -> &dyn ClassRegistry {
        self.classes.as_ref()
    }

    /// Class registry, mutable
    ///
    /// Changing classes invalidates the engine table.
    pub fn classes_mut(&mut self) -> &mut dyn ClassRegistry {
        self.engine_table.invalidate();
        self.classes.as_mut()
    }

    /// Client engine table
    pub fn engine_table(&self) -> &EngineTable {
        &self.engine_table
    }

    /// Flag an engine as missing; it is freed or pruned before PreInit completes
    pub fn mark_missing(&mut self, desc: EngineDescriptor) {
        if self.missing.insert(desc) {
            log::info!("device {}: {} flagged missing", self.instance, desc);
        }
    }

    /// Whether an engine has been flagged missing
    pub fn is_missing(&self, desc: EngineDescriptor) -> bool {
        self.missing.contains(&desc)
    }

    /// Whether the descriptor is in the Init list
    pub fn is_eng_desc_supported(&self, desc: EngineDescriptor) -> bool {
        self.lists.contains(ListPhase::Init, desc)
    }

    /// Validate `(kind, instance)` against the engine type table
    pub fn resolve(&self, kind: EngineKind, instance: u16) -> Result<EngineDescriptor> {
        self.resolver
            .resolve(kind, instance)
            .map_err(|err| self.config.table_error(err))
    }
}

impl fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContext")
            .field("instance", &self.instance)
            .field("chip", &self.chip)
            .field("present", &self.present)
            .field("lists", &self.lists)
            .field("classes", &self.classes.len())
            .field("engine_table", &self.engine_table)
            .field("missing", &self.missing)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// DEVICE INNER
// =============================================================================

/// An owned engine object and its lifecycle state
pub(crate) struct EngineSlot {
    pub(crate) engine: Box<dyn Engine>,
    pub(crate) state: EngineState,
}

/// Everything protected by the device lock
pub(crate) struct DeviceInner {
    pub(crate) ctx: DeviceContext,
    pub(crate) engines: BTreeMap<EngineDescriptor, EngineSlot>,
    pub(crate) retired: BTreeMap<EngineDescriptor, EngineState>,
    pub(crate) catalog: EngineCatalog,
    pub(crate) presence: Option<Box<dyn PresenceQuery>>,
    pub(crate) declared_classes: Vec<ClassDescriptor>,
    pub(crate) status: DeviceStatus,
    pub(crate) busy: bool,
    pub(crate) stats: DeviceStats,
}

impl DeviceInner {
    /// Fail unless the device is idle and in one of `allowed`
    pub(crate) fn expect_status(&self, allowed: &[DeviceStatus], operation: &'static str) -> Result<()> {
        crate::lifecycle_ensure!(
            !self.busy,
            ErrorKind::InvalidState,
            "transition already in progress",
            "{} on device {}",
            operation,
            self.ctx.instance
        );
        crate::lifecycle_ensure!(
            allowed.contains(&self.status),
            ErrorKind::InvalidState,
            "operation not valid in current device status",
            "{} while {:?}",
            operation,
            self.status
        );
        Ok(())
    }

    /// Lifecycle state of a slot
    pub(crate) fn state_of(&self, desc: EngineDescriptor) -> EngineState {
        self.engines
            .get(&desc)
            .map(|slot| slot.state)
            .or_else(|| self.retired.get(&desc).copied())
            .unwrap_or(EngineState::Unconstructed)
    }

    /// Run one engine hook, bracketed by the transition log
    ///
    /// Returns `None` when the slot is empty. The engine state advances
    /// only on success.
    pub(crate) fn step(
        &mut self,
        desc: EngineDescriptor,
        transition: EngineTransition,
        flags: TransitionFlags,
    ) -> Option<Result<()>> {
        let DeviceInner {
            ctx,
            engines,
            stats,
            ..
        } = self;
        let slot = engines.get_mut(&desc)?;

        log::debug!(
            "device {}: {} {} begin ({})",
            ctx.instance,
            slot.engine.name(),
            transition,
            desc
        );

        let result = dispatch(slot.engine.as_mut(), transition, ctx, flags);
        stats.transitions += 1;
        if result.is_ok() {
            slot.state = slot.state.after(transition);
        }

        log::debug!(
            "device {}: {} {} end -> {} ({})",
            ctx.instance,
            slot.engine.name(),
            transition,
            slot.state,
            match &result {
                Ok(()) => "ok",
                Err(err) if err.is_not_supported() => "not supported",
                Err(_) => "failed",
            }
        );

        Some(result)
    }

    /// Treat a `NotSupported` result as success
    pub(crate) fn absorb(&mut self, desc: EngineDescriptor, transition: EngineTransition) {
        self.stats.not_supported += 1;
        if let Some(slot) = self.engines.get_mut(&desc) {
            slot.state = slot.state.after(transition);
        }
        log::debug!(
            "device {}: {} does not support {}, continuing",
            self.ctx.instance,
            desc,
            transition
        );
    }

    /// Free an engine object, remembering its final state
    pub(crate) fn retire(&mut self, desc: EngineDescriptor, state: EngineState) {
        if self.engines.remove(&desc).is_some() {
            log::debug!("device {}: freed {}", self.ctx.instance, desc);
        }
        self.retired.insert(desc, state);
    }
}

// =============================================================================
// DEVICE
// =============================================================================

/// A device and its engines
pub struct Device {
    pub(crate) inner: Mutex<DeviceInner>,
    pub(crate) interrupts: Arc<dyn InterruptService>,
    pub(crate) release_between_steps: bool,
    pub(crate) release_points: AtomicU64,
}

impl Device {
    /// Start building a device
    pub fn builder(instance: u32, chip: ChipIdentity) -> DeviceBuilder {
        DeviceBuilder::new(instance, chip)
    }

    /// Device instance number
    pub fn instance(&self) -> u32 {
        self.inner.lock().ctx.instance
    }

    /// Current device status
    pub fn status(&self) -> DeviceStatus {
        self.inner.lock().status
    }

    /// Lifecycle state of one engine slot
    pub fn engine_state(&self, desc: EngineDescriptor) -> EngineState {
        self.inner.lock().state_of(desc)
    }

    /// Number of live engine objects
    pub fn engine_count(&self) -> usize {
        self.inner.lock().engines.len()
    }

    /// Snapshot of the ordered lists
    pub fn lists(&self) -> OrderedLists {
        self.inner.lock().ctx.lists.clone()
    }

    /// Snapshot of the present set
    pub fn present_set(&self) -> PresentSet {
        self.inner.lock().ctx.present.clone()
    }

    /// Lifetime counters
    pub fn stats(&self) -> DeviceStats {
        let mut stats = self.inner.lock().stats;
        stats.release_points = self.release_points.load(Ordering::Relaxed);
        stats
    }

    /// Whether the descriptor is in the Init list
    pub fn is_eng_desc_supported(&self, desc: EngineDescriptor) -> bool {
        self.inner.lock().ctx.is_eng_desc_supported(desc)
    }

    /// Validate `(kind, instance)` against the engine type table
    pub fn resolve(&self, kind: EngineKind, instance: u16) -> Result<EngineDescriptor> {
        self.inner.lock().ctx.resolve(kind, instance)
    }

    /// Whether a client engine is available, rebuilding the table if needed
    pub fn is_engine_available(&self, client: ClientEngine) -> Result<bool> {
        let mut guard = self.inner.lock();
        let ctx = &mut guard.ctx;
        ctx.engine_table.rebuild(ctx.classes.as_ref())?;
        Ok(ctx.engine_table.check(client))
    }

    /// Available client engines, rebuilding the table if needed
    pub fn available_engines(&self) -> Result<Vec<ClientEngine>> {
        let mut guard = self.inner.lock();
        let ctx = &mut guard.ctx;
        ctx.engine_table.rebuild(ctx.classes.as_ref())?;
        Ok(ctx.engine_table.entries().to_vec())
    }

    /// Run `f` against the locked device context
    pub fn with_context<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&DeviceContext) -> R,
    {
        f(&self.inner.lock().ctx)
    }

    /// Drop the lock's hold on other devices: service their interrupts
    pub(crate) fn release_point(&self) {
        if !self.release_between_steps {
            return;
        }
        self.release_points.fetch_add(1, Ordering::Relaxed);
        self.interrupts.service_other_devices();
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Device")
            .field("instance", &inner.ctx.instance)
            .field("status", &inner.status)
            .field("engines", &inner.engines.keys().collect::<Vec<_>>())
            .field("stats", &inner.stats)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(Device: Send, Sync);

// =============================================================================
// BUILDER
// =============================================================================

/// Builder for [`Device`]
pub struct DeviceBuilder {
    instance: u32,
    chip: ChipIdentity,
    config: LifecycleConfig,
    types: &'static [EngineType],
    order: &'static [OrderEntry],
    catalog: EngineCatalog,
    presence: Option<Box<dyn PresenceQuery>>,
    classes: Box<dyn ClassRegistry>,
    declared_classes: Vec<ClassDescriptor>,
    coprocessor: Box<dyn Coprocessor>,
    interrupts: Arc<dyn InterruptService>,
}

impl DeviceBuilder {
    /// Builder with the default tables and collaborators
    pub fn new(instance: u32, chip: ChipIdentity) -> Self {
        Self {
            instance,
            chip,
            config: LifecycleConfig::default(),
            types: &DEFAULT_ENGINE_TYPES,
            order: &DEFAULT_ENGINE_ORDER,
            catalog: EngineCatalog::new(),
            presence: None,
            classes: Box::new(ClassDb::new()),
            declared_classes: Vec::new(),
            coprocessor: Box::new(NoCoprocessor),
            interrupts: Arc::new(NoInterrupts),
        }
    }

    /// Lifecycle policy
    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Engine type table
    pub fn with_engine_types(mut self, types: &'static [EngineType]) -> Self {
        self.types = types;
        self
    }

    /// Engine order table
    pub fn with_engine_order(mut self, order: &'static [OrderEntry]) -> Self {
        self.order = order;
        self
    }

    /// Concrete engine implementations
    pub fn with_catalog(mut self, catalog: EngineCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Hardware inventory query
    pub fn with_presence<P: PresenceQuery + 'static>(mut self, presence: P) -> Self {
        self.presence = Some(Box::new(presence));
        self
    }

    /// Class registry implementation
    pub fn with_class_registry<C: ClassRegistry + 'static>(mut self, classes: C) -> Self {
        self.classes = Box::new(classes);
        self
    }

    /// Classes this chip exposes, registered for present engines at construction
    pub fn with_classes(mut self, classes: &[ClassDescriptor]) -> Self {
        self.declared_classes.extend_from_slice(classes);
        self
    }

    /// Coprocessor authority
    pub fn with_coprocessor<C: Coprocessor + 'static>(mut self, coprocessor: C) -> Self {
        self.coprocessor = Box::new(coprocessor);
        self
    }

    /// Interrupt hook called at release points
    pub fn with_interrupts(mut self, interrupts: Arc<dyn InterruptService>) -> Self {
        self.interrupts = interrupts;
        self
    }

    /// Validate the tables and create the device
    pub fn build(self) -> Result<Device> {
        let types = EngineTypeTable::new(self.types)?;
        let presence = self.presence.ok_or_else(|| {
            LifecycleError::new(ErrorKind::InvalidArgument, "device has no presence query")
        })?;

        for entry in self.order {
            if types.lookup(entry.kind).is_none() {
                return Err(crate::lifecycle_error!(
                    ErrorKind::NotFound,
                    "ordered engine kind not declared",
                    "{}",
                    entry.kind
                ));
            }
        }

        let release_between_steps = self.config.release_between_steps;
        let ctx = DeviceContext {
            instance: self.instance,
            chip: self.chip,
            config: self.config,
            resolver: DescriptorResolver::new(types),
            order: self.order,
            present: PresentSet::default(),
            lists: OrderedLists::default(),
            classes: self.classes,
            engine_table: EngineTable::new(),
            coprocessor: self.coprocessor,
            missing: BTreeSet::new(),
        };

        Ok(Device {
            inner: Mutex::new(DeviceInner {
                ctx,
                engines: BTreeMap::new(),
                retired: BTreeMap::new(),
                catalog: self.catalog,
                presence: Some(presence),
                declared_classes: self.declared_classes,
                status: DeviceStatus::Created,
                busy: false,
                stats: DeviceStats::default(),
            }),
            interrupts: self.interrupts,
            release_between_steps,
            release_points: AtomicU64::new(0),
        })
    }
}

impl fmt::Debug for DeviceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuilder")
            .field("instance", &self.instance)
            .field("chip", &self.chip)
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}
