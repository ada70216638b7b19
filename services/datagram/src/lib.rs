//! Datagram protocol (§4.9): the acknowledge/reject envelope around the
//! memory-configuration sub-protocol.
//!
//! Grounded on `protocol_datagram_config_mem_handler.c`'s two-phase
//! handling, where a request is first acknowledged with `Datagram Received
//! OK` and the (possibly slow) sub-command work happens on a later
//! re-entry. This port runs [`MemConfigHandler::handle`] synchronously
//! within one [`Dispatch::dispatch`] call, but still emits both phases on
//! the wire for a sub-command that returns data: the immediate
//! `Datagram Received OK` ack (releasing the requester's retry store)
//! followed by the sub-command's own reply datagram
//! ([`DispatchOutcome::Replies`]). A sub-command with no reply payload
//! collapses to a single bare ack. The reference's retained "reply
//! pending" exponent and resend-on-timeout bookkeeping are not
//! implemented; `Node::last_received_datagram`/`datagram_age_ticks` are
//! reserved for that but unused here.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

use byteorder::{ByteOrder, NetworkEndian};
use heapless::Vec;

use openlcb_core::config::DATAGRAM_MAX_PAYLOAD;
use openlcb_core::error::ErrorCode;
use openlcb_core::ids::Alias;
use openlcb_core::mti::Mti;
use openlcb_core::reply::{DispatchOutcome, Reply};
use openlcb_core::service::{OpenlcbService, ServiceId};
use openlcb_core::{net_debug, net_trace};
use openlcb_network::iface::Dispatch;
use openlcb_network::node::Node;

/// The only datagram command this workspace implements (S-9.7.3.3).
const CONFIG_MEM_CONFIGURATION: u8 = 0x20;

/// Reply datagram payload, handed back to the requester's own alias.
pub type ReplyPayload = Vec<u8, DATAGRAM_MAX_PAYLOAD>;

/// Delegate that does the actual memory-configuration sub-command work
/// once the datagram envelope has validated the command byte. Implemented
/// by `openlcb-svc-memconfig`.
pub trait MemConfigHandler<const MAX_EVENTS: usize> {
    /// `payload` is the full datagram payload, command byte included
    /// (`payload[0] == 0x20`).
    ///
    /// - `Ok(Some(data))`: send `data` back as a new Datagram (the
    ///   sub-command's own reply framing, including its reply command
    ///   byte, is `data[0]`).
    /// - `Ok(None)`: the sub-command needs no reply payload; just
    ///   acknowledge with `Datagram Received OK`.
    /// - `Err(code)`: reject with `Datagram Rejected` carrying `code`.
    fn handle(
        &mut self,
        node: &mut Node<MAX_EVENTS>,
        source_alias: Alias,
        payload: &[u8],
    ) -> Result<Option<ReplyPayload>, ErrorCode>;
}

/// The datagram service: checks the command byte and hands everything
/// else to `M`.
pub struct Service<M> {
    handler: M,
}

impl<M> Service<M> {
    pub fn new(handler: M) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &M {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut M {
        &mut self.handler
    }
}

impl<M> OpenlcbService for Service<M> {
    fn service_id() -> ServiceId {
        ServiceId::Datagram
    }

    fn service_version() -> u8 {
        1
    }
}

impl<const MAX_EVENTS: usize, M> Dispatch<MAX_EVENTS> for Service<M>
where
    M: MemConfigHandler<MAX_EVENTS>,
{
    fn dispatch(
        &mut self,
        node: &mut Node<MAX_EVENTS>,
        mti: Mti,
        source_alias: Alias,
        payload: &[u8],
    ) -> DispatchOutcome {
        if mti != Mti::Datagram {
            return DispatchOutcome::Unhandled;
        }

        let Some(&command) = payload.first() else {
            return reject(source_alias, ErrorCode::InvalidArguments);
        };
        if command != CONFIG_MEM_CONFIGURATION {
            net_debug!("datagram: unknown command byte, rejecting");
            return reject(source_alias, ErrorCode::CommandUnknown);
        }

        net_trace!("datagram: dispatching memory-configuration datagram");
        match self.handler.handle(node, source_alias, payload) {
            Ok(Some(data)) => {
                let mut replies = Vec::new();
                let _ = replies.push(Reply::new(Mti::DatagramReceivedOk, Some(source_alias)));
                let _ = replies.push(Reply::with_payload(Mti::Datagram, Some(source_alias), &data));
                DispatchOutcome::Replies(replies)
            }
            Ok(None) => DispatchOutcome::Reply(Reply::new(Mti::DatagramReceivedOk, Some(source_alias))),
            Err(code) => reject(source_alias, code),
        }
    }
}

fn reject(dest: Alias, code: ErrorCode) -> DispatchOutcome {
    let mut bytes = [0u8; 2];
    NetworkEndian::write_u16(&mut bytes, code.into());
    DispatchOutcome::Reply(Reply::with_payload(Mti::DatagramRejected, Some(dest), &bytes))
}
