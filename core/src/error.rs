//! Standard OpenLCB error codes (§7).
//!
//! Carried as the payload of `Datagram Rejected` and `Optional Interaction
//! Rejected` replies. Modeled on the teacher's small `num_enum`-derived
//! protocol enums (e.g. `EngineState`), not on a `thiserror` error type —
//! these values travel on the wire, they are not a host-side `Error` trait
//! implementor.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// A 16-bit OpenLCB error code.
///
/// The high nibble distinguishes permanent (`0x1xxx`) from temporary
/// (`0x2xxx`) failures; a temporary code means the requester may retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ErrorCode {
    NotImplemented = 0x1000,
    CommandUnknown = 0x1041,
    SubcommandUnknown = 0x1042,
    UnknownMtiOrTransportProtocol = 0x1043,
    OutOfBoundsInvalidAddress = 0x1081,
    InvalidArguments = 0x1080,
    AddressSpaceUnknown = 0x1082,

    TransferError = 0x2000,
    BufferUnavailable = 0x2040,
}

impl ErrorCode {
    /// The temporary bit (bit 12, `0x1000` within the high nibble's own
    /// nibble) — set for every code in the `0x2xxx` range. A requester that
    /// sees this set on a `Datagram Rejected` may resend.
    pub const fn is_temporary(self) -> bool {
        (self as u16) & 0x2000 != 0
    }

    pub const fn is_permanent(self) -> bool {
        !self.is_temporary()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn temporary_bit_matches_high_nibble() {
        assert!(ErrorCode::TransferError.is_temporary());
        assert!(ErrorCode::BufferUnavailable.is_temporary());
        assert!(ErrorCode::InvalidArguments.is_permanent());
        assert!(ErrorCode::CommandUnknown.is_permanent());
    }

    #[test]
    fn round_trips_through_u16() {
        let raw: u16 = ErrorCode::SubcommandUnknown.into();
        assert_eq!(raw, 0x1042);
        assert_eq!(ErrorCode::try_from(0x1042u16).unwrap(), ErrorCode::SubcommandUnknown);
    }
}
