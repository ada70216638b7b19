//! The five memory-configuration address spaces this node answers for
//! (S-9.7.4.5 / `original_source/openlcb/protocol_datagram_config_mem_handler.c`).
//!
//! Train FDI (0xFA), train function configuration (0xF9) and firmware
//! (0xEF) are out of scope: the reference guards them behind
//! `SUPPORT_TRACTION`/`SUPPORT_FIRMWARE_BOOTLOADER` and this workspace
//! never enables either.

use crate::cmd::SpaceSelector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSpace {
    Cdi,
    All,
    ConfigMemory,
    AcdiManufacturer,
    AcdiUser,
}

impl AddressSpace {
    pub const CDI: u8 = 0xFF;
    pub const ALL: u8 = 0xFE;
    pub const CONFIG_MEMORY: u8 = 0xFD;
    pub const ACDI_MANUFACTURER: u8 = 0xFC;
    pub const ACDI_USER: u8 = 0xFB;

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::CDI => Some(AddressSpace::Cdi),
            Self::ALL => Some(AddressSpace::All),
            Self::CONFIG_MEMORY => Some(AddressSpace::ConfigMemory),
            Self::ACDI_MANUFACTURER => Some(AddressSpace::AcdiManufacturer),
            Self::ACDI_USER => Some(AddressSpace::AcdiUser),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            AddressSpace::Cdi => Self::CDI,
            AddressSpace::All => Self::ALL,
            AddressSpace::ConfigMemory => Self::CONFIG_MEMORY,
            AddressSpace::AcdiManufacturer => Self::ACDI_MANUFACTURER,
            AddressSpace::AcdiUser => Self::ACDI_USER,
        }
    }

    /// Resolves a read/write command's space, either named directly by
    /// `selector` or, for the generic form, carried as `generic_byte`
    /// (the request's payload offset 6).
    pub fn from_selector(selector: SpaceSelector, generic_byte: u8) -> Option<Self> {
        match selector {
            SpaceSelector::Cdi => Some(AddressSpace::Cdi),
            SpaceSelector::All => Some(AddressSpace::All),
            SpaceSelector::ConfigMemory => Some(AddressSpace::ConfigMemory),
            SpaceSelector::InPayload => Self::from_byte(generic_byte),
        }
    }
}
