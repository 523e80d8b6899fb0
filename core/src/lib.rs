//! # Helix Device Core
//!
//! Engine-lifecycle orchestrator for one device: decides which engines
//! exist, in which order they move through their lifecycle, and what
//! happens when one of them fails or turns out to be missing.
//!
//! ## Components
//!
//! - **Engine type table**: declared engine kinds and instance counts
//! - **Present set**: what the hardware actually has
//! - **Ordered lists**: Init, Load, Unload and Destroy walk orders
//! - **Lifecycle driver**: construct, pre-init, init, load, unload, destroy
//! - **Pruning**: removes missing engines and reconciles the class registry
//! - **Engine table**: client-visible engine availability
//!
//! ```text
//!          ChipIdentity ──► PresenceQuery ──► PresentSet
//!                                                │
//!   EngineTypeTable ─┐                           ▼
//!   OrderEntry[] ────┴────────────────────► OrderedLists
//!                                                │
//!   EngineCatalog ──► Engine objects ◄── lifecycle driver ──► InterruptService
//!                                                │
//!                     ClassRegistry ◄──── pruning ──► EngineTable
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let device = Device::builder(0, chip)
//!     .with_catalog(catalog)
//!     .with_presence(presence)
//!     .build()?;
//!
//! device.construct()?;
//! device.pre_init()?;
//! device.init()?;
//! device.load(TransitionFlags::empty())?;
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod config;
pub mod descriptor;
pub mod device;
pub mod engine;
pub mod engine_id;
pub mod engine_type;
pub mod error;
pub mod lifecycle;
pub mod order;
pub mod present;
pub mod prune;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AllowEntry, LifecycleConfig, NotSupportedAction, TransitionFlags};
pub use descriptor::{ConcreteTypeInfo, DescriptorResolver, EngineCatalog, EngineConstructor};
pub use device::{Device, DeviceBuilder, DeviceContext, DeviceStats, DeviceStatus};
pub use engine::Engine;
pub use engine_id::{ClientEngine, EngineTable};
pub use engine_type::{EngineType, EngineTypeTable, DEFAULT_ENGINE_TYPES};
pub use error::{ErrorKind, LifecycleError, Result};
pub use order::{build_lists, ListPhase, OrderEntry, OrderedLists, PhaseFlags, DEFAULT_ENGINE_ORDER};
pub use present::{resolve_present_set, PresentSet};
pub use state::{EngineState, EngineTransition, FailurePolicy};

pub use helix_device_hal as hal;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
