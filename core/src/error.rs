//! # Lifecycle Error Handling
//!
//! Error types for the engine lifecycle orchestrator.
//!
//! ## Propagation Policy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ERROR PROPAGATION FLOW                            │
//! │                                                                          │
//! │  Construct / PreInit / Init / Load                                       │
//! │  ╔═══════════════╗                                                       │
//! │  ║ Engine fails  ║──▶ NotSupported ──▶ absorbed (or pruned in PreInit)   │
//! │  ╚═══════════════╝──▶ anything else ──▶ phase aborts, error returned     │
//! │                                                                          │
//! │  Unload / Destroy                                                        │
//! │  ╔═══════════════╗                                                       │
//! │  ║ Engine fails  ║──▶ logged ──▶ next engine ──▶ ... ──▶ first error     │
//! │  ╚═══════════════╝                                      returned last    │
//! │                                                                          │
//! │  Table / programmer errors                                               │
//! │  ╔═══════════════╗                                                       │
//! │  ║ Bad table     ║──▶ debug_assert ──▶ opaque error in release           │
//! │  ╚═══════════════╝                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Categories
//!
//! | Category | Range | Recoverable | Example |
//! |----------|-------|-------------|---------|
//! | General | 0-99 | NotSupported only | Engine fused off |
//! | Table | 100-199 | No | Order lists disagree in length |
//! | Engine | 200-299 | Yes | Load step timed out |
//! | Host | 300-399 | No | Chip could not be identified |

use core::fmt;

use alloc::boxed::Box;
use alloc::string::{String, ToString};

use helix_device_hal::{EngineDescriptor, HalError};

use crate::state::EngineTransition;

// =============================================================================
// ERROR KIND
// =============================================================================

/// Classification of lifecycle errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    // -------------------------------------------------------------------------
    // General Errors (0-99)
    // -------------------------------------------------------------------------
    /// Unknown or unclassified error
    Unknown                = 0,

    /// Engine legitimately absent or disabled
    NotSupported           = 1,

    /// Operation invalid in the current device state
    InvalidState           = 2,

    /// Invalid argument provided
    InvalidArgument        = 3,

    /// Descriptor or entry not found
    NotFound               = 4,

    /// Entry already exists
    AlreadyExists          = 5,

    // -------------------------------------------------------------------------
    // Table Errors (100-199)
    // -------------------------------------------------------------------------
    /// The four phase-filtered order lists disagree in length
    InconsistentOrderLists = 100,

    /// A descriptor appears twice in one order list
    DuplicateDescriptor    = 101,

    /// Instance index beyond the engine type's declared count
    InstanceOutOfRange     = 102,

    /// Engine table used before construction
    TableNotConstructed    = 103,

    /// Engine table queried while invalid
    TableInvalid           = 104,

    // -------------------------------------------------------------------------
    // Engine Errors (200-299)
    // -------------------------------------------------------------------------
    /// Engine failed a forward transition; may succeed on retry
    TransientEngineFailure = 200,

    /// Engine failed a teardown transition; the phase kept going
    BestEffortFailure      = 201,

    /// Engine object could not be constructed
    ConstructFailed        = 202,

    /// Engine reported a hardware fault
    EngineFault            = 203,

    /// Engine ran out of a backing resource (e.g. save area memory)
    ResourceExhausted      = 204,

    // -------------------------------------------------------------------------
    // Host Errors (300-399)
    // -------------------------------------------------------------------------
    /// Chip identification failed
    HardwareNotIdentified  = 300,

    /// Present-set query failed
    InventoryUnavailable   = 301,

    /// Class registry rejected an operation
    ClassRegistryFault     = 302,
}

impl ErrorKind {
    /// Get the error category name
    pub const fn category(&self) -> &'static str {
        match *self as u32 {
            0..=99 => "General",
            100..=199 => "Table",
            200..=299 => "Engine",
            300..=399 => "Host",
            _ => "Unknown",
        }
    }

    /// Check if the error can be absorbed without failing the device
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorKind::NotSupported
                | ErrorKind::TransientEngineFailure
                | ErrorKind::BestEffortFailure
        )
    }

    /// Check if the error is a programmer or table error
    pub const fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidState
                | ErrorKind::NotFound
                | ErrorKind::InconsistentOrderLists
                | ErrorKind::DuplicateDescriptor
                | ErrorKind::InstanceOutOfRange
                | ErrorKind::TableNotConstructed
                | ErrorKind::TableInvalid
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// =============================================================================
// LIFECYCLE ERROR
// =============================================================================

/// Error raised while driving engines through their lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleError {
    /// Error classification
    kind: ErrorKind,

    /// Human-readable message
    message: &'static str,

    /// Optional detailed message
    details: Option<String>,

    /// Engine that raised the error
    engine: Option<EngineDescriptor>,

    /// Transition during which the error occurred
    transition: Option<EngineTransition>,

    /// Chained source error
    source: Option<Box<LifecycleError>>,
}

/// Lifecycle Result type alias
pub type Result<T> = core::result::Result<T, LifecycleError>;

impl LifecycleError {
    /// Create new error with kind and message
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self {
            kind,
            message,
            details: None,
            engine: None,
            transition: None,
            source: None,
        }
    }

    /// Create error from kind with default message
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind, kind_to_message(kind))
    }

    /// Shorthand for the `NotSupported` error engines return when absent
    pub const fn not_supported() -> Self {
        Self::new(ErrorKind::NotSupported, "engine not supported")
    }

    /// Add details to error
    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach the engine that raised the error
    pub fn with_engine(mut self, engine: EngineDescriptor) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Attach the transition during which the error occurred
    pub fn with_transition(mut self, transition: EngineTransition) -> Self {
        self.transition = Some(transition);
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: LifecycleError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get message
    pub fn message(&self) -> &str {
        self.message
    }

    /// Get details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Get engine
    pub fn engine(&self) -> Option<EngineDescriptor> {
        self.engine
    }

    /// Get transition
    pub fn transition(&self) -> Option<EngineTransition> {
        self.transition
    }

    /// Get source error
    pub fn source(&self) -> Option<&LifecycleError> {
        self.source.as_deref()
    }

    /// Innermost error in the chain
    pub fn root_cause(&self) -> &LifecycleError {
        let mut current = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    /// Check if this is the absorbable `NotSupported` kind
    pub fn is_not_supported(&self) -> bool {
        self.kind == ErrorKind::NotSupported
    }

    /// Check if recoverable
    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.category(), self.message)?;

        if let Some(ref details) = self.details {
            write!(f, ": {}", details)?;
        }

        if let Some(engine) = self.engine {
            write!(f, " (engine: {})", engine)?;
        }

        if let Some(transition) = self.transition {
            write!(f, " (transition: {})", transition)?;
        }

        if let Some(ref source) = self.source {
            write!(f, " <- {}", source)?;
        }

        Ok(())
    }
}

impl From<HalError> for LifecycleError {
    fn from(err: HalError) -> Self {
        let kind = match err {
            HalError::UnknownChip => ErrorKind::HardwareNotIdentified,
            HalError::InventoryUnavailable => ErrorKind::InventoryUnavailable,
            HalError::InstanceOutOfRange => ErrorKind::InstanceOutOfRange,
            HalError::ClassExists(_) => ErrorKind::AlreadyExists,
            HalError::ClassNotFound(_) => ErrorKind::NotFound,
            HalError::RegistryFull => ErrorKind::ClassRegistryFault,
            _ => ErrorKind::Unknown,
        };
        LifecycleError::new(kind, "host collaborator failed").with_details(err.to_string())
    }
}

fn kind_to_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Unknown => "unknown error",
        ErrorKind::NotSupported => "engine not supported",
        ErrorKind::InvalidState => "invalid device state",
        ErrorKind::InvalidArgument => "invalid argument",
        ErrorKind::NotFound => "not found",
        ErrorKind::AlreadyExists => "already exists",
        ErrorKind::InconsistentOrderLists => "sizes of engine order lists do not match",
        ErrorKind::DuplicateDescriptor => "descriptor listed twice",
        ErrorKind::InstanceOutOfRange => "instance index out of range",
        ErrorKind::TableNotConstructed => "engine table not constructed",
        ErrorKind::TableInvalid => "engine table invalid",
        ErrorKind::TransientEngineFailure => "engine transition failed",
        ErrorKind::BestEffortFailure => "engine teardown step failed",
        ErrorKind::ConstructFailed => "engine construction failed",
        ErrorKind::EngineFault => "engine fault",
        ErrorKind::ResourceExhausted => "engine resource exhausted",
        ErrorKind::HardwareNotIdentified => "chip not identified",
        ErrorKind::InventoryUnavailable => "hardware inventory unavailable",
        ErrorKind::ClassRegistryFault => "class registry fault",
    }
}

// =============================================================================
// ERROR MACROS
// =============================================================================

/// Create a LifecycleError, optionally with formatted details
#[macro_export]
macro_rules! lifecycle_error {
    ($kind:expr, $msg:literal) => {
        $crate::error::LifecycleError::new($kind, $msg)
    };
    ($kind:expr, $msg:literal, $($arg:tt)*) => {
        $crate::error::LifecycleError::new($kind, $msg)
            .with_details(alloc::format!($($arg)*))
    };
}

/// Return early with an error
#[macro_export]
macro_rules! lifecycle_bail {
    ($kind:expr, $msg:literal) => {
        return Err($crate::lifecycle_error!($kind, $msg))
    };
    ($kind:expr, $msg:literal, $($arg:tt)*) => {
        return Err($crate::lifecycle_error!($kind, $msg, $($arg)*))
    };
}

/// Ensure a condition is true, otherwise return error
#[macro_export]
macro_rules! lifecycle_ensure {
    ($cond:expr, $kind:expr, $msg:literal) => {
        if !$cond {
            $crate::lifecycle_bail!($kind, $msg);
        }
    };
    ($cond:expr, $kind:expr, $msg:literal, $($arg:tt)*) => {
        if !$cond {
            $crate::lifecycle_bail!($kind, $msg, $($arg)*);
        }
    };
}

// =============================================================================
// TESTS
// =============================================================================
