//! # Shared Device Types
//!
//! Value types exchanged between the host and the lifecycle orchestrator.
//!
//! ## Descriptor Encoding
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    EngineDescriptor                          │
//! │                                                              │
//! │   31                     16 15                          0    │
//! │  ┌─────────────────────────┬─────────────────────────────┐   │
//! │  │        EngineKind       │       instance index        │   │
//! │  └─────────────────────────┴─────────────────────────────┘   │
//! │                                                              │
//! │  Ordering: kind first, then instance (matches raw value)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use core::fmt;

// =============================================================================
// ENGINE KIND
// =============================================================================

/// Every engine category a device may carry
///
/// The discriminant is the stable on-wire kind number used when a
/// descriptor is packed into its raw form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum EngineKind {
    /// Bus interface (config space, BAR setup)
    Bus               = 0x01,
    /// Top-level interrupt controller
    Interrupt         = 0x02,
    /// Platform timer
    Timer             = 0x03,
    /// Memory system (framebuffer controller, save/restore)
    MemorySystem      = 0x04,
    /// Memory manager (address spaces, page tables)
    MemoryManager     = 0x05,
    /// Host interface / channel scheduler
    Fifo              = 0x06,
    /// Graphics and compute engine
    Graphics          = 0x10,
    /// Copy engine
    Copy              = 0x11,
    /// Video decoder
    VideoDecode       = 0x12,
    /// Video encoder
    VideoEncode       = 0x13,
    /// JPEG decoder
    JpegDecode        = 0x14,
    /// Optical flow accelerator
    OpticalFlow       = 0x15,
    /// Cipher engine
    Cipher            = 0x16,
    /// Security processor
    SecureProcessor   = 0x17,
    /// Software methods engine
    Software          = 0x18,
    /// Power management unit
    PowerManager      = 0x20,
    /// Display processor
    DisplayProcessor  = 0x21,
    /// Framebuffer falcon
    FramebufferFalcon = 0x22,
    /// Kernel-side display engine
    KernelDisplay     = 0x30,
    /// Board information ROM
    Inforom           = 0x31,
}

impl EngineKind {
    /// All kinds in discriminant order
    pub const ALL: [EngineKind; 20] = [
        EngineKind::Bus,
        EngineKind::Interrupt,
        EngineKind::Timer,
        EngineKind::MemorySystem,
        EngineKind::MemoryManager,
        EngineKind::Fifo,
        EngineKind::Graphics,
        EngineKind::Copy,
        EngineKind::VideoDecode,
        EngineKind::VideoEncode,
        EngineKind::JpegDecode,
        EngineKind::OpticalFlow,
        EngineKind::Cipher,
        EngineKind::SecureProcessor,
        EngineKind::Software,
        EngineKind::PowerManager,
        EngineKind::DisplayProcessor,
        EngineKind::FramebufferFalcon,
        EngineKind::KernelDisplay,
        EngineKind::Inforom,
    ];

    /// Short name used in logs and descriptor formatting
    pub const fn name(&self) -> &'static str {
        match self {
            EngineKind::Bus => "BUS",
            EngineKind::Interrupt => "INTR",
            EngineKind::Timer => "TMR",
            EngineKind::MemorySystem => "MEMSYS",
            EngineKind::MemoryManager => "MMU",
            EngineKind::Fifo => "FIFO",
            EngineKind::Graphics => "GR",
            EngineKind::Copy => "CE",
            EngineKind::VideoDecode => "NVDEC",
            EngineKind::VideoEncode => "NVENC",
            EngineKind::JpegDecode => "NVJPG",
            EngineKind::OpticalFlow => "OFA",
            EngineKind::Cipher => "CIPHER",
            EngineKind::SecureProcessor => "SEC2",
            EngineKind::Software => "SW",
            EngineKind::PowerManager => "PMU",
            EngineKind::DisplayProcessor => "DPU",
            EngineKind::FramebufferFalcon => "FBFLCN",
            EngineKind::KernelDisplay => "KDISP",
            EngineKind::Inforom => "INFOROM",
        }
    }

    /// Decode a raw kind number
    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| *kind as u16 == raw)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// ENGINE DESCRIPTOR
// =============================================================================

/// The `(kind, instance)` key identifying one engine slot on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineDescriptor {
    kind: EngineKind,
    instance: u16,
}

impl EngineDescriptor {
    /// Create a descriptor
    ///
    /// No range check happens here; the descriptor resolver validates
    /// instances against the engine type table.
    pub const fn new(kind: EngineKind, instance: u16) -> Self {
        Self { kind, instance }
    }

    /// Engine kind
    pub const fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Instance index within the kind
    pub const fn instance(&self) -> u16 {
        self.instance
    }

    /// Packed raw form (`kind << 16 | instance`)
    pub const fn raw(&self) -> u32 {
        ((self.kind as u32) << 16) | self.instance as u32
    }

    /// Decode a packed raw descriptor
    pub fn from_raw(raw: u32) -> Option<Self> {
        let kind = EngineKind::from_raw((raw >> 16) as u16)?;
        Some(Self::new(kind, (raw & 0xFFFF) as u16))
    }
}

impl fmt::Display for EngineDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.name(), self.instance)
    }
}

// =============================================================================
// CHIP IDENTITY
// =============================================================================

/// GPU architecture generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum ChipGeneration {
    /// Unknown/unsupported generation
    Unknown   = 0,
    /// Turing (TU10x)
    Turing    = 0x160,
    /// Ampere (GA10x)
    Ampere    = 0x170,
    /// Ada Lovelace (AD10x)
    Ada       = 0x190,
    /// Hopper (GH100)
    Hopper    = 0x180,
    /// Blackwell (GB20x)
    Blackwell = 0x1A0,
}

impl ChipGeneration {
    /// Decode the architecture field of a chip id
    pub const fn from_chip_id(chip_id: u32) -> Self {
        match chip_id & 0x1F0 {
            0x160 => ChipGeneration::Turing,
            0x170 => ChipGeneration::Ampere,
            0x180 => ChipGeneration::Hopper,
            0x190 => ChipGeneration::Ada,
            0x1A0 => ChipGeneration::Blackwell,
            _ => ChipGeneration::Unknown,
        }
    }
}

bitflags::bitflags! {
    /// Platform features that change which engine implementations apply
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChipFeatures: u32 {
        /// A firmware coprocessor owns part of the engine state
        const COPROCESSOR = 1 << 0;
        /// Running as a virtual function / guest
        const VIRTUAL     = 1 << 1;
        /// Integrated (SoC) part without a PCI bus interface
        const SOC         = 1 << 2;
        /// Display hardware is fused off
        const HEADLESS    = 1 << 3;
    }
}

/// Chip identification, available before any engine is constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChipIdentity {
    /// Architecture generation
    pub generation: ChipGeneration,
    /// Full chip id (architecture | implementation)
    pub chip_id: u32,
    /// Silicon revision
    pub revision: u8,
    /// Platform features
    pub features: ChipFeatures,
}

impl ChipIdentity {
    /// Create an identity from a chip id
    pub const fn new(chip_id: u32, revision: u8, features: ChipFeatures) -> Self {
        Self {
            generation: ChipGeneration::from_chip_id(chip_id),
            chip_id,
            revision,
            features,
        }
    }

    /// Decode a boot identification register
    ///
    /// Layout: chip id in bits 20..29, revision in bits 0..8.
    pub const fn from_boot_register(boot: u32, features: ChipFeatures) -> Self {
        Self::new((boot >> 20) & 0x1FF, (boot & 0xFF) as u8, features)
    }

    /// Whether a firmware coprocessor is present
    pub const fn has_coprocessor(&self) -> bool {
        self.features.contains(ChipFeatures::COPROCESSOR)
    }
}

static_assertions::assert_impl_all!(EngineKind: Send, Sync, Copy, Ord);
static_assertions::assert_impl_all!(EngineDescriptor: Send, Sync, Copy, Ord, core::hash::Hash);
static_assertions::assert_impl_all!(ChipIdentity: Send, Sync, Copy);
