//! # Helix Device HAL
//!
//! Host-facing collaborator interfaces for the device engine-lifecycle
//! orchestrator.
//!
//! The orchestrator never touches registers. Everything it needs to know
//! about the concrete device arrives through the traits in this crate:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      helix-device-hal                            │
//! │                                                                  │
//! │  ┌────────────────┐  ┌────────────────┐  ┌───────────────────┐   │
//! │  │ PresenceQuery  │  │ ClassRegistry  │  │    Coprocessor    │   │
//! │  │ (what exists)  │  │ (what clients  │  │ (what firmware    │   │
//! │  │                │  │   can reach)   │  │  still runs)      │   │
//! │  └────────────────┘  └────────────────┘  └───────────────────┘   │
//! │                                                                  │
//! │  ┌────────────────┐  ┌────────────────────────────────────────┐  │
//! │  │InterruptService│  │ Types: EngineKind, EngineDescriptor,   │  │
//! │  │(release points)│  │        ChipIdentity                    │  │
//! │  └────────────────┘  └────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod classdb;
pub mod coprocessor;
pub mod error;
pub mod interrupts;
pub mod presence;
pub mod types;

pub use classdb::{ClassDb, ClassDescriptor, ClassRegistry};
pub use coprocessor::{Coprocessor, NoCoprocessor, OffloadSet};
pub use error::{HalError, Result};
pub use interrupts::{CountingService, InterruptService, NoInterrupts};
pub use presence::{GenerationPresence, PresenceQuery, PresentEntry, StaticPresence};
pub use types::{ChipFeatures, ChipGeneration, ChipIdentity, EngineDescriptor, EngineKind};
