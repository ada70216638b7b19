//! A protocol service's outbound message, queued for the interface layer
//! to encode onto the wire (§4.7 "dispatch table").
//!
//! Kept wire-independent (no CAN framing) so `services/*` crates, which
//! depend only on `openlcb-core`, can build replies without depending on
//! `openlcb-network`.

use crate::config::SNIP_MAX_PAYLOAD;
use crate::ids::Alias;
use crate::mti::Mti;
use heapless::Vec;

/// One OpenLCB message a service wants transmitted. `dest` is `None` for a
/// broadcast (global) message.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reply {
    pub mti: Mti,
    pub dest: Option<Alias>,
    pub payload: Vec<u8, SNIP_MAX_PAYLOAD>,
}

impl Reply {
    pub fn new(mti: Mti, dest: Option<Alias>) -> Self {
        Self { mti, dest, payload: Vec::new() }
    }

    pub fn with_payload(mti: Mti, dest: Option<Alias>, payload: &[u8]) -> Self {
        let mut reply = Self::new(mti, dest);
        let _ = reply.payload.extend_from_slice(payload);
        reply
    }
}

/// Outcome of routing one inbound message to a service (§4.7).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchOutcome {
    /// No registered handler for this MTI; the caller decides whether that
    /// warrants Optional Interaction Rejected (addressed) or silence
    /// (broadcast).
    Unhandled,
    /// Handled, nothing to send back.
    Handled,
    /// Handled, with one reply message to transmit.
    Reply(Reply),
    /// Handled, with more than one reply to transmit in order. The datagram
    /// protocol's two-phase processing (§4.9) needs this: an immediate
    /// `Datagram Received OK` ack followed by the sub-command's own data
    /// reply.
    Replies(Vec<Reply, 2>),
}
