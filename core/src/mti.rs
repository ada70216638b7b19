//! Message Type Indicators (§4.7, §8, GLOSSARY).
//!
//! The teacher generates its CBUS opcode enum (`vlcb_defs::CbusOpCodes`) via
//! `num_enum`; since that vendored crate isn't part of this workspace, its
//! role is folded in here directly for the OpenLCB MTI space.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// A 12-bit (basic) or 16-bit (extended) Message Type Indicator.
///
/// Values are the standard S-9.7.3 assignments; variants not named here
/// (stream and train-control sub-protocols the workspace does not implement)
/// are represented as [`Mti::Unknown`] by [`Mti::from_raw`] rather than
/// causing a parse error, matching §4.7's "Unregistered optional handlers"
/// behavior for request MTIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Mti {
    InitializationComplete = 0x0100,
    InitializationCompleteSimple = 0x0101,

    VerifyNodeIdAddressed = 0x0488,
    VerifyNodeIdGlobal = 0x0490,
    VerifiedNodeId = 0x0170,

    OptionalInteractionRejected = 0x0068,
    TerminateDueToError = 0x00A8,

    ProtocolSupportInquiry = 0x0828,
    ProtocolSupportReply = 0x0668,

    IdentifyConsumer = 0x08F4,
    ConsumerRangeIdentified = 0x04A4,
    ConsumerIdentifiedUnknown = 0x04C7,
    ConsumerIdentifiedValid = 0x04C4,
    ConsumerIdentifiedInvalid = 0x04C5,
    ConsumerIdentifiedReserved = 0x04C6,

    IdentifyProducer = 0x0914,
    ProducerRangeIdentified = 0x0524,
    ProducerIdentifiedUnknown = 0x0547,
    ProducerIdentifiedValid = 0x0544,
    ProducerIdentifiedInvalid = 0x0545,
    ProducerIdentifiedReserved = 0x0546,

    IdentifyEventsAddressed = 0x0968,
    IdentifyEventsGlobal = 0x0970,
    LearnEvent = 0x0594,
    PcEventReport = 0x05B4,
    PcEventReportWithPayload = 0x0F15,

    SimpleNodeIdentInfoRequest = 0x0DE8,
    SimpleNodeIdentInfoReply = 0x0A08,

    Datagram = 0x1C48,
    DatagramReceivedOk = 0x0A28,
    DatagramRejected = 0x0A48,

    StreamInitRequest = 0x0CC8,
    StreamInitReply = 0x0868,
    StreamSendData = 0x1F88,
    StreamProceed = 0x0888,
    StreamComplete = 0x08A8,
}

impl Mti {
    /// Parse a raw MTI, returning `None` for values this workspace assigns
    /// no handler to (the dispatcher treats that as "unregistered", not as
    /// a wire error — see §4.7).
    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::try_from(raw).ok()
    }

    pub const fn as_raw(self) -> u16 {
        self as u16
    }

    /// Whether this MTI's frame carries a destination alias/NodeID, per the
    /// `MASK_DEST_ADDRESS_PRESENT` bit described in the Data Model.
    pub const fn is_addressed(self) -> bool {
        self.as_raw() & 0x0008 != 0
    }

    /// Dispatch priority: the upper 3 bits of the MTI, used to order the
    /// inbound FIFO (§4.2).
    pub const fn priority(self) -> u8 {
        ((self.as_raw() >> 12) & 0x7) as u8
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_through_raw() {
        assert_eq!(Mti::from_raw(0x0490), Some(Mti::VerifyNodeIdGlobal));
        assert_eq!(Mti::VerifyNodeIdGlobal.as_raw(), 0x0490);
    }

    #[test]
    fn unregistered_mti_is_none_not_error() {
        assert_eq!(Mti::from_raw(0xFFFF), None);
    }

    #[test]
    fn addressed_bit_set_on_addressed_mtis() {
        assert!(Mti::VerifyNodeIdAddressed.is_addressed());
        assert!(Mti::SimpleNodeIdentInfoRequest.is_addressed());
    }
}
