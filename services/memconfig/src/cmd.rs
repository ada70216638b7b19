//! Datagram sub-command byte values for the memory-configuration protocol
//! (S-9.7.4.5).
//!
//! The reference this port is grounded on names these bytes only through
//! symbolic constants (`DATAGRAM_MEMORY_WRITE_UNDER_MASK_SPACE_FD` and
//! similar); the header defining their literal values was not present in
//! the retrieved source. Rather than guess at a shared bit layout across
//! the three command families, each sub-command below is its own named
//! constant, cross-checked against the wire bytes a conformant tool
//! actually sends (a CDI read is `0x43`/reply `0x53`, a write-under-mask
//! of configuration memory is `0x88`/reply `0x98`).

/// Which address space a read/write/write-under-mask command names, either
/// directly (the low two bits of the command byte) or via a byte carried
/// in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceSelector {
    InPayload,
    Cdi,
    All,
    ConfigMemory,
}

pub const CONFIG_MEM_CONFIGURATION: u8 = 0x20;
pub const REPLY_OK_OFFSET: u8 = 0x10;

pub const WRITE_SPACE_IN_BYTE_6: u8 = 0x00;
pub const WRITE_SPACE_FD: u8 = 0x01;
pub const WRITE_SPACE_FE: u8 = 0x02;
pub const WRITE_SPACE_FF: u8 = 0x03;

pub const WRITE_REPLY_SPACE_IN_BYTE_6: u8 = WRITE_SPACE_IN_BYTE_6 + REPLY_OK_OFFSET;
pub const WRITE_REPLY_SPACE_FD: u8 = WRITE_SPACE_FD + REPLY_OK_OFFSET;
pub const WRITE_REPLY_SPACE_FE: u8 = WRITE_SPACE_FE + REPLY_OK_OFFSET;
pub const WRITE_REPLY_SPACE_FF: u8 = WRITE_SPACE_FF + REPLY_OK_OFFSET;

pub const READ_SPACE_IN_BYTE_6: u8 = 0x40;
pub const READ_SPACE_FD: u8 = 0x41;
pub const READ_SPACE_FE: u8 = 0x42;
pub const READ_SPACE_FF: u8 = 0x43;

pub const READ_REPLY_SPACE_IN_BYTE_6: u8 = READ_SPACE_IN_BYTE_6 + REPLY_OK_OFFSET;
pub const READ_REPLY_SPACE_FD: u8 = READ_SPACE_FD + REPLY_OK_OFFSET;
pub const READ_REPLY_SPACE_FE: u8 = READ_SPACE_FE + REPLY_OK_OFFSET;
pub const READ_REPLY_SPACE_FF: u8 = READ_SPACE_FF + REPLY_OK_OFFSET;

pub const OPTIONS: u8 = 0x80;
pub const OPTIONS_REPLY: u8 = 0x82;
pub const GET_ADDRESS_SPACE_INFO: u8 = 0x84;
pub const ADDRESS_SPACE_INFO_REPLY_PRESENT: u8 = 0x86;

pub const WRITE_UNDER_MASK_SPACE_IN_BYTE_6: u8 = 0x87;
pub const WRITE_UNDER_MASK_SPACE_FD: u8 = 0x88;
pub const WRITE_UNDER_MASK_SPACE_FE: u8 = 0x89;
pub const WRITE_UNDER_MASK_SPACE_FF: u8 = 0x8A;

pub const ADDRESS_SPACE_INFO_REPLY_NOT_PRESENT: u8 = 0x8B;
pub const GET_UNIQUE_ID: u8 = 0x8C;
pub const RESERVE_LOCK: u8 = 0x8D;
pub const RESERVE_LOCK_REPLY: u8 = 0x8E;

pub const WRITE_UNDER_MASK_REPLY_SPACE_IN_BYTE_6: u8 = WRITE_UNDER_MASK_SPACE_IN_BYTE_6 + REPLY_OK_OFFSET;
pub const WRITE_UNDER_MASK_REPLY_SPACE_FD: u8 = WRITE_UNDER_MASK_SPACE_FD + REPLY_OK_OFFSET;
pub const WRITE_UNDER_MASK_REPLY_SPACE_FE: u8 = WRITE_UNDER_MASK_SPACE_FE + REPLY_OK_OFFSET;
pub const WRITE_UNDER_MASK_REPLY_SPACE_FF: u8 = WRITE_UNDER_MASK_SPACE_FF + REPLY_OK_OFFSET;

pub const FREEZE: u8 = 0xA0;
pub const UNFREEZE: u8 = 0xA1;
pub const UPDATE_COMPLETE: u8 = 0xA8;
pub const RESET_REBOOT: u8 = 0xA9;
pub const FACTORY_RESET: u8 = 0xAA;

pub fn is_write(byte: u8) -> bool {
    matches!(byte, WRITE_SPACE_IN_BYTE_6 | WRITE_SPACE_FD | WRITE_SPACE_FE | WRITE_SPACE_FF)
}

pub fn is_write_under_mask(byte: u8) -> bool {
    matches!(
        byte,
        WRITE_UNDER_MASK_SPACE_IN_BYTE_6
            | WRITE_UNDER_MASK_SPACE_FD
            | WRITE_UNDER_MASK_SPACE_FE
            | WRITE_UNDER_MASK_SPACE_FF
    )
}

pub fn is_read(byte: u8) -> bool {
    matches!(byte, READ_SPACE_IN_BYTE_6 | READ_SPACE_FD | READ_SPACE_FE | READ_SPACE_FF)
}

/// Resolves the space selector for any of the three command families. Only
/// meaningful when the matching `is_*` predicate above is true of `byte`.
pub fn space_selector(byte: u8) -> SpaceSelector {
    match byte {
        WRITE_SPACE_FD | READ_SPACE_FD | WRITE_UNDER_MASK_SPACE_FD => SpaceSelector::ConfigMemory,
        WRITE_SPACE_FE | READ_SPACE_FE | WRITE_UNDER_MASK_SPACE_FE => SpaceSelector::All,
        WRITE_SPACE_FF | READ_SPACE_FF | WRITE_UNDER_MASK_SPACE_FF => SpaceSelector::Cdi,
        _ => SpaceSelector::InPayload,
    }
}
