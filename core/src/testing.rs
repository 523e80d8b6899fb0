//! Test doubles shared by the unit tests

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use helix_device_hal::{
    ChipFeatures, ChipIdentity, ClassDescriptor, EngineDescriptor, EngineKind, PresentEntry,
    StaticPresence,
};

use crate::config::{LifecycleConfig, TransitionFlags};
use crate::descriptor::{ConcreteTypeInfo, EngineCatalog};
use crate::device::{DeviceBuilder, DeviceContext};
use crate::engine::Engine;
use crate::engine_type::EngineType;
use crate::error::{ErrorKind, LifecycleError, Result};
use crate::order::OrderEntry;
use crate::state::EngineTransition;

/// Hook invocations, in call order
pub(crate) type CallLog = Arc<Mutex<Vec<(&'static str, EngineDescriptor)>>>;

pub(crate) static GR_CE_TYPES: [EngineType; 2] = [
    EngineType::new(EngineKind::Graphics, 1),
    EngineType::new(EngineKind::Copy, 4),
];

pub(crate) static GR_CE_ORDER: [OrderEntry; 2] = [
    OrderEntry::all(EngineKind::Graphics),
    OrderEntry::all(EngineKind::Copy),
];

pub(crate) fn gr_ce_types() -> &'static [EngineType] {
    &GR_CE_TYPES
}

pub(crate) fn gr(instance: u16) -> EngineDescriptor {
    EngineDescriptor::new(EngineKind::Graphics, instance)
}

pub(crate) fn ce(instance: u16) -> EngineDescriptor {
    EngineDescriptor::new(EngineKind::Copy, instance)
}

/// One class per engine, id derived from the descriptor
pub(crate) fn class_for(desc: EngineDescriptor) -> ClassDescriptor {
    ClassDescriptor::engine(0x1000 + (desc.kind() as u32) * 0x10 + desc.instance() as u32, desc)
}

pub(crate) fn ampere() -> ChipIdentity {
    ChipIdentity::new(0x172, 1, ChipFeatures::empty())
}

// =============================================================================
// MOCK ENGINE
// =============================================================================

/// Engine that records its hooks and fails on request
pub(crate) struct MockEngine {
    desc: EngineDescriptor,
    log: CallLog,
    failures: Vec<(EngineTransition, ErrorKind)>,
    present: bool,
    missing_on_construct: bool,
}

impl MockEngine {
    pub(crate) fn new(desc: EngineDescriptor) -> Self {
        Self {
            desc,
            log: CallLog::default(),
            failures: Vec::new(),
            present: true,
            missing_on_construct: false,
        }
    }

    fn hit(&mut self, transition: EngineTransition) -> Result<()> {
        self.log.lock().push((transition.name(), self.desc));
        match self.failures.iter().find(|(t, _)| *t == transition) {
            Some((_, kind)) => Err(LifecycleError::new(*kind, "mock failure")),
            None => Ok(()),
        }
    }
}

impl Engine for MockEngine {
    fn descriptor(&self) -> EngineDescriptor {
        self.desc
    }

    fn construct(&mut self, ctx: &mut DeviceContext) -> Result<()> {
        self.hit(EngineTransition::Construct)?;
        if self.missing_on_construct {
            ctx.mark_missing(self.desc);
        }
        Ok(())
    }

    fn is_present(&self, _ctx: &DeviceContext) -> bool {
        self.present
    }

    fn init_missing(&mut self, _ctx: &mut DeviceContext) {
        self.log.lock().push(("InitMissing", self.desc));
    }

    fn pre_init(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        self.hit(EngineTransition::PreInit)
    }

    fn init(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        self.hit(EngineTransition::Init)
    }

    fn pre_load(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        self.hit(EngineTransition::PreLoad)
    }

    fn load(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        self.hit(EngineTransition::Load)
    }

    fn post_load(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        self.hit(EngineTransition::PostLoad)
    }

    fn pre_unload(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        self.hit(EngineTransition::PreUnload)
    }

    fn unload(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        self.hit(EngineTransition::Unload)
    }

    fn post_unload(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        self.hit(EngineTransition::PostUnload)
    }

    fn destroy(&mut self, _ctx: &mut DeviceContext) {
        let _ = self.hit(EngineTransition::Destroy);
    }
}

// =============================================================================
// MOCK PLAN
// =============================================================================

#[derive(Default)]
struct PlanState {
    failures: Vec<(EngineDescriptor, EngineTransition, ErrorKind)>,
    absent: Vec<EngineDescriptor>,
    missing_on_construct: Vec<EngineDescriptor>,
}

/// Scripted behaviour for every engine a catalog creates
#[derive(Clone, Default)]
pub(crate) struct MockPlan {
    state: Arc<Mutex<PlanState>>,
    log: CallLog,
}

impl MockPlan {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail(self, desc: EngineDescriptor, transition: EngineTransition, kind: ErrorKind) -> Self {
        self.state.lock().failures.push((desc, transition, kind));
        self
    }

    pub(crate) fn absent(self, desc: EngineDescriptor) -> Self {
        self.state.lock().absent.push(desc);
        self
    }

    pub(crate) fn missing_on_construct(self, desc: EngineDescriptor) -> Self {
        self.state.lock().missing_on_construct.push(desc);
        self
    }

    pub(crate) fn engine(&self, desc: EngineDescriptor) -> MockEngine {
        let state = self.state.lock();
        MockEngine {
            desc,
            log: self.log.clone(),
            failures: state
                .failures
                .iter()
                .filter(|(d, _, _)| *d == desc)
                .map(|(_, t, kind)| (*t, *kind))
                .collect(),
            present: !state.absent.contains(&desc),
            missing_on_construct: state.missing_on_construct.contains(&desc),
        }
    }

    /// Catalog binding every kind in `kinds` to this plan
    pub(crate) fn catalog(&self, kinds: &[EngineKind]) -> EngineCatalog {
        let mut catalog = EngineCatalog::new();
        for kind in kinds {
            let plan = self.clone();
            catalog.register(ConcreteTypeInfo::new(*kind, "mock", move |desc, _| {
                Box::new(plan.engine(desc))
            }));
        }
        catalog
    }

    pub(crate) fn calls(&self) -> Vec<(&'static str, EngineDescriptor)> {
        self.log.lock().clone()
    }

    /// Engines that saw the hook named `name`, in call order
    pub(crate) fn calls_for(&self, name: &str) -> Vec<EngineDescriptor> {
        self.log
            .lock()
            .iter()
            .filter(|(hook, _)| *hook == name)
            .map(|(_, desc)| *desc)
            .collect()
    }
}

/// Graphics/copy device builder with one class per declared engine
pub(crate) fn gr_ce_builder(present: &[PresentEntry], plan: &MockPlan) -> DeviceBuilder {
    let classes: Vec<ClassDescriptor> = core::iter::once(gr(0))
        .chain((0..4).map(ce))
        .map(class_for)
        .collect();

    DeviceBuilder::new(0, ampere())
        .with_config(LifecycleConfig::default().with_table_assertions(false))
        .with_engine_types(&GR_CE_TYPES)
        .with_engine_order(&GR_CE_ORDER)
        .with_catalog(plan.catalog(&[EngineKind::Graphics, EngineKind::Copy]))
        .with_presence(StaticPresence::new(present))
        .with_classes(&classes)
}
