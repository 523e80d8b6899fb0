//! # Engine Capability Interface
//!
//! Every engine object implements [`Engine`]. The orchestrator owns the
//! objects and calls these hooks in list order; engines never call each
//! other through the orchestrator and never take the device lock
//! themselves. They get the already-locked [`DeviceContext`] instead.
//!
//! All hooks default to success so an engine only overrides the
//! transitions it cares about.

use helix_device_hal::EngineDescriptor;

use crate::config::TransitionFlags;
use crate::device::DeviceContext;
use crate::error::Result;
use crate::state::EngineTransition;

/// Lifecycle capability set of one engine object
pub trait Engine: Send {
    /// Descriptor of the slot this object fills
    fn descriptor(&self) -> EngineDescriptor;

    /// Name used in logs
    fn name(&self) -> &'static str {
        self.descriptor().kind().name()
    }

    /// Finish construction
    ///
    /// Returning `NotSupported`, or calling [`DeviceContext::mark_missing`],
    /// frees the object and leaves the slot empty.
    fn construct(&mut self, _ctx: &mut DeviceContext) -> Result<()> {
        Ok(())
    }

    /// Whether the hardware behind this object is actually there
    fn is_present(&self, _ctx: &DeviceContext) -> bool {
        true
    }

    /// Called on an engine found missing, right before it is freed
    fn init_missing(&mut self, _ctx: &mut DeviceContext) {}

    /// Pre-initialization
    fn pre_init(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        Ok(())
    }

    /// Initialization
    fn init(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        Ok(())
    }

    /// Before load
    fn pre_load(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        Ok(())
    }

    /// Load
    fn load(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        Ok(())
    }

    /// After load
    fn post_load(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        Ok(())
    }

    /// Before unload
    fn pre_unload(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        Ok(())
    }

    /// Unload
    fn unload(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        Ok(())
    }

    /// After unload
    fn post_unload(&mut self, _ctx: &mut DeviceContext, _flags: TransitionFlags) -> Result<()> {
        Ok(())
    }

    /// Teardown; has no error channel
    fn destroy(&mut self, _ctx: &mut DeviceContext) {}
}

/// Invoke the hook for `transition` on `engine`
pub(crate) fn dispatch(
    engine: &mut dyn Engine,
    transition: EngineTransition,
    ctx: &mut DeviceContext,
    flags: TransitionFlags,
) -> Result<()> {
    match transition {
        EngineTransition::Construct => engine.construct(ctx),
        EngineTransition::PreInit => engine.pre_init(ctx, flags),
        EngineTransition::Init => engine.init(ctx, flags),
        EngineTransition::PreLoad => engine.pre_load(ctx, flags),
        EngineTransition::Load => engine.load(ctx, flags),
        EngineTransition::PostLoad => engine.post_load(ctx, flags),
        EngineTransition::PreUnload => engine.pre_unload(ctx, flags),
        EngineTransition::Unload => engine.unload(ctx, flags),
        EngineTransition::PostUnload => engine.post_unload(ctx, flags),
        EngineTransition::Destroy => {
            engine.destroy(ctx);
            Ok(())
        },
    }
}
