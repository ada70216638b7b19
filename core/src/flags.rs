//! Per-node state flags (§3 Data Model "Node").
//!
//! Modeled on the teacher's bitflags-based `NodeFlags` (formerly in
//! `module.rs`), narrowed to the four flags the Data Model actually names.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct NodeFlags: u8 {
        /// Node has completed login and is processing messages.
        const INITIALIZED = 1 << 0;
        /// Node's alias survived the reservation window unchallenged.
        const PERMITTED = 1 << 1;
        /// `Datagram Received OK` was sent for the held datagram; the main
        /// dispatcher should re-enter the handler to do the slow work.
        const DATAGRAM_ACK_SENT = 1 << 2;
        /// A temporary `Datagram Rejected` was received for the held
        /// datagram; the main loop should reissue it.
        const RESEND_DATAGRAM = 1 << 3;
        /// The RX path observed another node claim this alias during the
        /// reservation window.
        const HAS_DUPLICATE_ALIAS = 1 << 4;
    }
}
