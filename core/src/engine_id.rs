//! # Client Engine Table
//!
//! Stable, externally-visible engine identifiers and the availability
//! table derived from the class registry.
//!
//! ## Table Lifecycle
//!
//! ```text
//!   construct()          invalidate()            rebuild(classes)
//!  ┌────────────┐       ┌────────────┐          ┌────────────────────────┐
//!  │ allocated  │──────▶│  invalid   │─────────▶│ valid: every host      │
//!  │ invalid    │       │            │◀─────────│ engine with >= 1 class │
//!  └────────────┘       └────────────┘  prune   └────────────────────────┘
//! ```
//!
//! The table is never patched in place: any change to the class registry
//! invalidates it and the next query rebuilds it wholesale.

use core::fmt;

use arrayvec::ArrayVec;

use helix_device_hal::{ClassRegistry, EngineDescriptor, EngineKind};

use crate::error::{ErrorKind, LifecycleError, Result};

// =============================================================================
// CLIENT ENGINE ID
// =============================================================================

/// Externally-visible engine identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClientEngine {
    /// Graphics engine `n` (0-7)
    Graphics(u8),
    /// Copy engine `n` (0-9)
    Copy(u8),
    /// Video decoder `n` (0-7)
    VideoDecode(u8),
    /// Cipher engine
    Cipher,
    /// Video encoder `n` (0-2)
    VideoEncode(u8),
    /// Software methods
    Software,
    /// Security processor
    SecureProcessor,
    /// JPEG decoder `n` (0-7)
    JpegDecode(u8),
    /// Optical flow accelerator `n` (0)
    OpticalFlow(u8),
    /// Display processor
    DisplayProcessor,
    /// Power management unit
    PowerManager,
    /// Framebuffer falcon
    FramebufferFalcon,
    /// Host interface
    Host,
}

impl ClientEngine {
    /// Stable numeric id
    pub const fn raw(&self) -> u32 {
        match *self {
            ClientEngine::Graphics(n) => n as u32,
            ClientEngine::Copy(n) => 0x10 + n as u32,
            ClientEngine::VideoDecode(n) => 0x20 + n as u32,
            ClientEngine::Cipher => 0x30,
            ClientEngine::VideoEncode(n) => 0x31 + n as u32,
            ClientEngine::Software => 0x38,
            ClientEngine::SecureProcessor => 0x39,
            ClientEngine::JpegDecode(n) => 0x40 + n as u32,
            ClientEngine::OpticalFlow(n) => 0x50 + n as u32,
            ClientEngine::DisplayProcessor => 0x60,
            ClientEngine::PowerManager => 0x61,
            ClientEngine::FramebufferFalcon => 0x62,
            ClientEngine::Host => 0x63,
        }
    }

    /// Decode a stable numeric id
    pub fn from_raw(raw: u32) -> Option<Self> {
        CLIENT_ENGINE_MAP
            .iter()
            .map(|entry| entry.client)
            .find(|client| client.raw() == raw)
    }
}

impl fmt::Display for ClientEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientEngine::Graphics(n) => write!(f, "GR{}", n),
            ClientEngine::Copy(n) => write!(f, "COPY{}", n),
            ClientEngine::VideoDecode(n) => write!(f, "NVDEC{}", n),
            ClientEngine::Cipher => f.write_str("CIPHER"),
            ClientEngine::VideoEncode(n) => write!(f, "NVENC{}", n),
            ClientEngine::Software => f.write_str("SW"),
            ClientEngine::SecureProcessor => f.write_str("SEC2"),
            ClientEngine::JpegDecode(n) => write!(f, "NVJPEG{}", n),
            ClientEngine::OpticalFlow(n) => write!(f, "OFA{}", n),
            ClientEngine::DisplayProcessor => f.write_str("DPU"),
            ClientEngine::PowerManager => f.write_str("PMU"),
            ClientEngine::FramebufferFalcon => f.write_str("FBFLCN"),
            ClientEngine::Host => f.write_str("HOST"),
        }
    }
}

// =============================================================================
// STATIC MAP
// =============================================================================

/// One row of the client/descriptor correspondence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientEngineEntry {
    /// External id
    pub client: ClientEngine,
    /// Internal descriptor
    pub engine: EngineDescriptor,
    /// Whether clients can target this engine directly
    pub host_engine: bool,
}

const fn host(client: ClientEngine, kind: EngineKind, instance: u16) -> ClientEngineEntry {
    ClientEngineEntry {
        client,
        engine: EngineDescriptor::new(kind, instance),
        host_engine: true,
    }
}

const fn internal(client: ClientEngine, kind: EngineKind) -> ClientEngineEntry {
    ClientEngineEntry {
        client,
        engine: EngineDescriptor::new(kind, 0),
        host_engine: false,
    }
}

/// Maximum number of client engines
pub const MAX_CLIENT_ENGINES: usize = 48;

const CLIENT_MAP_LEN: usize = 45;

/// Static client engine correspondence
pub static CLIENT_ENGINE_MAP: [ClientEngineEntry; CLIENT_MAP_LEN] = [
    host(ClientEngine::Graphics(0), EngineKind::Graphics, 0),
    host(ClientEngine::Graphics(1), EngineKind::Graphics, 1),
    host(ClientEngine::Graphics(2), EngineKind::Graphics, 2),
    host(ClientEngine::Graphics(3), EngineKind::Graphics, 3),
    host(ClientEngine::Graphics(4), EngineKind::Graphics, 4),
    host(ClientEngine::Graphics(5), EngineKind::Graphics, 5),
    host(ClientEngine::Graphics(6), EngineKind::Graphics, 6),
    host(ClientEngine::Graphics(7), EngineKind::Graphics, 7),
    host(ClientEngine::Copy(0), EngineKind::Copy, 0),
    host(ClientEngine::Copy(1), EngineKind::Copy, 1),
    host(ClientEngine::Copy(2), EngineKind::Copy, 2),
    host(ClientEngine::Copy(3), EngineKind::Copy, 3),
    host(ClientEngine::Copy(4), EngineKind::Copy, 4),
    host(ClientEngine::Copy(5), EngineKind::Copy, 5),
    host(ClientEngine::Copy(6), EngineKind::Copy, 6),
    host(ClientEngine::Copy(7), EngineKind::Copy, 7),
    host(ClientEngine::Copy(8), EngineKind::Copy, 8),
    host(ClientEngine::Copy(9), EngineKind::Copy, 9),
    host(ClientEngine::VideoDecode(0), EngineKind::VideoDecode, 0),
    host(ClientEngine::VideoDecode(1), EngineKind::VideoDecode, 1),
    host(ClientEngine::VideoDecode(2), EngineKind::VideoDecode, 2),
    host(ClientEngine::VideoDecode(3), EngineKind::VideoDecode, 3),
    host(ClientEngine::VideoDecode(4), EngineKind::VideoDecode, 4),
    host(ClientEngine::VideoDecode(5), EngineKind::VideoDecode, 5),
    host(ClientEngine::VideoDecode(6), EngineKind::VideoDecode, 6),
    host(ClientEngine::VideoDecode(7), EngineKind::VideoDecode, 7),
    host(ClientEngine::Cipher, EngineKind::Cipher, 0),
    host(ClientEngine::VideoEncode(0), EngineKind::VideoEncode, 0),
    host(ClientEngine::VideoEncode(1), EngineKind::VideoEncode, 1),
    host(ClientEngine::VideoEncode(2), EngineKind::VideoEncode, 2),
    host(ClientEngine::Software, EngineKind::Software, 0),
    host(ClientEngine::SecureProcessor, EngineKind::SecureProcessor, 0),
    host(ClientEngine::JpegDecode(0), EngineKind::JpegDecode, 0),
    host(ClientEngine::JpegDecode(1), EngineKind::JpegDecode, 1),
    host(ClientEngine::JpegDecode(2), EngineKind::JpegDecode, 2),
    host(ClientEngine::JpegDecode(3), EngineKind::JpegDecode, 3),
    host(ClientEngine::JpegDecode(4), EngineKind::JpegDecode, 4),
    host(ClientEngine::JpegDecode(5), EngineKind::JpegDecode, 5),
    host(ClientEngine::JpegDecode(6), EngineKind::JpegDecode, 6),
    host(ClientEngine::JpegDecode(7), EngineKind::JpegDecode, 7),
    host(ClientEngine::OpticalFlow(0), EngineKind::OpticalFlow, 0),
    internal(ClientEngine::DisplayProcessor, EngineKind::DisplayProcessor),
    internal(ClientEngine::PowerManager, EngineKind::PowerManager),
    internal(ClientEngine::FramebufferFalcon, EngineKind::FramebufferFalcon),
    internal(ClientEngine::Host, EngineKind::Fifo),
];

static_assertions::const_assert!(CLIENT_MAP_LEN <= MAX_CLIENT_ENGINES);

/// Descriptor behind a client engine id
pub fn client_to_descriptor(client: ClientEngine) -> Option<EngineDescriptor> {
    CLIENT_ENGINE_MAP
        .iter()
        .find(|entry| entry.client == client)
        .map(|entry| entry.engine)
}

/// Client engine id for a descriptor
pub fn descriptor_to_client(engine: EngineDescriptor) -> Option<ClientEngine> {
    CLIENT_ENGINE_MAP
        .iter()
        .find(|entry| entry.engine == engine)
        .map(|entry| entry.client)
}

// =============================================================================
// ENGINE TABLE
// =============================================================================

/// Availability table of client engines for one device
#[derive(Debug, Clone, Default)]
pub struct EngineTable {
    entries: ArrayVec<ClientEngine, MAX_CLIENT_ENGINES>,
    constructed: bool,
    valid: bool,
}

impl EngineTable {
    /// Create an unconstructed table
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the table; it starts invalid
    pub fn construct(&mut self) {
        self.entries.clear();
        self.constructed = true;
        self.valid = false;
    }

    /// Mark the table for rebuild
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Rebuild from the class registry if invalid
    ///
    /// Running this twice in a row yields the same table.
    pub fn rebuild(&mut self, classes: &dyn ClassRegistry) -> Result<()> {
        if !self.constructed {
            return Err(LifecycleError::from_kind(ErrorKind::TableNotConstructed));
        }
        if self.valid {
            return Ok(());
        }

        self.entries.clear();
        for entry in CLIENT_ENGINE_MAP.iter().filter(|entry| entry.host_engine) {
            if classes.count_for_engine(entry.engine) == 0 {
                continue;
            }
            self.entries.try_push(entry.client).map_err(|_| {
                LifecycleError::new(ErrorKind::ResourceExhausted, "engine table full")
            })?;
        }

        self.valid = true;
        log::debug!("engine table: rebuilt with {} engines", self.entries.len());
        Ok(())
    }

    /// Whether `client` is available (linear search)
    pub fn check(&self, client: ClientEngine) -> bool {
        debug_assert!(self.valid, "engine table queried while invalid");
        self.entries.contains(&client)
    }

    /// Available client engines
    pub fn entries(&self) -> &[ClientEngine] {
        &self.entries
    }

    /// Whether the table is valid
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the table is constructed
    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// Release the table
    pub fn destroy(&mut self) {
        self.entries.clear();
        self.constructed = false;
        self.valid = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helix_device_hal::{ClassDb, ClassDescriptor};

    const GR0: EngineDescriptor = EngineDescriptor::new(EngineKind::Graphics, 0);
    const CE0: EngineDescriptor = EngineDescriptor::new(EngineKind::Copy, 0);
    const CE1: EngineDescriptor = EngineDescriptor::new(EngineKind::Copy, 1);
    const PMU: EngineDescriptor = EngineDescriptor::new(EngineKind::PowerManager, 0);

    fn classes() -> ClassDb {
        let mut db = ClassDb::new();
        db.register(ClassDescriptor::engine(0xc797, GR0)).unwrap();
        db.register(ClassDescriptor::engine(0xc7b5, CE0)).unwrap();
        db.register(ClassDescriptor::engine(0x0001, PMU)).unwrap();
        db
    }

    #[test]
    fn test_map_is_consistent() {
        for (idx, entry) in CLIENT_ENGINE_MAP.iter().enumerate() {
            assert!(!CLIENT_ENGINE_MAP[idx + 1..]
                .iter()
                .any(|other| other.client == entry.client || other.engine == entry.engine));
            assert_eq!(ClientEngine::from_raw(entry.client.raw()), Some(entry.client));
        }
    }

    #[test]
    fn test_translation() {
        assert_eq!(client_to_descriptor(ClientEngine::Copy(1)), Some(CE1));
        assert_eq!(descriptor_to_client(CE1), Some(ClientEngine::Copy(1)));
        assert_eq!(
            descriptor_to_client(EngineDescriptor::new(EngineKind::Fifo, 0)),
            Some(ClientEngine::Host)
        );
        assert_eq!(descriptor_to_client(EngineDescriptor::new(EngineKind::Timer, 0)), None);
    }

    #[test]
    fn test_rebuild_requires_construct() {
        let mut table = EngineTable::new();
        let err = table.rebuild(&classes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TableNotConstructed);
    }

    #[test]
    fn test_rebuild_filters_host_engines_with_classes() {
        let mut table = EngineTable::new();
        table.construct();
        table.rebuild(&classes()).unwrap();

        assert_eq!(table.entries(), &[ClientEngine::Graphics(0), ClientEngine::Copy(0)]);
        assert!(table.check(ClientEngine::Copy(0)));
        assert!(!table.check(ClientEngine::Copy(1)));
        assert!(!table.check(ClientEngine::PowerManager));
    }

    #[test]
    fn test_rebuild_roundtrip() {
        let db = classes();
        let mut table = EngineTable::new();
        table.construct();
        table.rebuild(&db).unwrap();
        let first = table.entries().to_vec();

        table.rebuild(&db).unwrap();
        assert_eq!(table.entries(), first.as_slice());

        table.invalidate();
        table.rebuild(&db).unwrap();
        assert_eq!(table.entries(), first.as_slice());
    }

    #[test]
    fn test_rebuild_after_class_removal() {
        let mut db = classes();
        let mut table = EngineTable::new();
        table.construct();
        table.rebuild(&db).unwrap();

        db.remove_for_engine(CE0);
        table.invalidate();
        table.rebuild(&db).unwrap();
        assert_eq!(table.entries(), &[ClientEngine::Graphics(0)]);

        table.destroy();
        assert!(!table.is_constructed());
        assert!(table.entries().is_empty());
    }
}
