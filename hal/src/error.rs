//! # HAL Error Handling
//!
//! Errors reported by host collaborators back to the orchestrator.
//!
//! These stay deliberately small: the HAL only ever answers questions
//! (what is present, what is registered, what the coprocessor supports),
//! so the failure space is limited to identification and registry faults.

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// HAL Result type alias
pub type Result<T> = core::result::Result<T, HalError>;

// =============================================================================
// ERROR ENUM
// =============================================================================

/// Errors raised by host collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum HalError {
    /// Chip identification registers could not be decoded
    UnknownChip,
    /// Hardware inventory could not be read
    InventoryUnavailable,
    /// Present entry names more instances than the engine type declares
    InstanceOutOfRange,
    /// Class is already registered
    ClassExists(u32),
    /// Class is not registered
    ClassNotFound(u32),
    /// Registry has reached its capacity
    RegistryFull,
}

impl HalError {
    /// Short human-readable description
    pub const fn as_str(&self) -> &'static str {
        match self {
            HalError::UnknownChip => "unknown chip",
            HalError::InventoryUnavailable => "hardware inventory unavailable",
            HalError::InstanceOutOfRange => "present instance out of range",
            HalError::ClassExists(_) => "class already registered",
            HalError::ClassNotFound(_) => "class not registered",
            HalError::RegistryFull => "class registry full",
        }
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HalError::ClassExists(class) | HalError::ClassNotFound(class) => {
                write!(f, "{} (class {:#06x})", self.as_str(), class)
            },
            _ => f.write_str(self.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_display_includes_class() {
        let err = HalError::ClassExists(0xc5c0);
        assert_eq!(err.to_string(), "class already registered (class 0xc5c0)");
        assert_eq!(HalError::UnknownChip.to_string(), "unknown chip");
    }
}
