//! The interface: CAN RX/TX assembly (§4.5-4.6), login state machines
//! (§4.4, §4.8) and the main dispatcher (§4.7), tied to a [`crate::phy::Device`].
//!
//! Generalizes the teacher's `iface::interface` (whose `process_can` was a
//! `todo!()` stub) from a CBUS-specific skeleton into the full OpenLCB
//! ingress/egress loop.

mod login;

pub use login::{step as login_step, Emission as LoginEmission};

use byteorder::{ByteOrder, NetworkEndian};
use heapless::Vec;
use openlcb_core::error::ErrorCode;
use openlcb_core::ids::Alias;
use openlcb_core::mti::Mti;
use openlcb_core::reply::{DispatchOutcome, Reply};

use crate::alias::AliasTable;
use crate::buffer::{BufferHandle, BufferKind, BufferList, BufferStore, Fifo, ListKey};
use crate::node::{Node, NodePool};
use crate::phy::{Device, DeviceCapabilities, RxToken, TxToken};
use crate::wire::can::Frame as CanFrame;
use crate::wire::openlcb::{Fragment, FramingBits};

/// A dispatch target: the protocol services this engine hosts. Services
/// register for MTIs the way the teacher's `services::all::Service` sum
/// type dispatches to `vlcb-svc-mns`; here it dispatches to
/// datagram/memconfig/nodeinfo (see `services/all`).
pub trait Dispatch<const MAX_EVENTS: usize> {
    /// Handle one fully reassembled inbound message addressed to (or
    /// broadcast and relevant to) `node`. A [`DispatchOutcome::Unhandled`]
    /// return leaves the Optional Interaction Rejected fallback (§4.7) to
    /// the caller for addressed requests.
    fn dispatch(
        &mut self,
        node: &mut Node<MAX_EVENTS>,
        mti: Mti,
        source_alias: Alias,
        payload: &[u8],
    ) -> DispatchOutcome;
}

/// Everything the interface needs that isn't the node pool or alias table:
/// buffer store, in-progress reassembly list, and the priority FIFO.
pub struct PollContext<
    const BASIC_CAP: usize,
    const DATAGRAM_CAP: usize,
    const SNIP_CAP: usize,
    const LIST_CAP: usize,
    const FIFO_CAP: usize,
> {
    pub store: BufferStore<BASIC_CAP, DATAGRAM_CAP, SNIP_CAP>,
    pub list: BufferList<LIST_CAP>,
    pub fifo: Fifo<FIFO_CAP>,
}

impl<
        const BASIC_CAP: usize,
        const DATAGRAM_CAP: usize,
        const SNIP_CAP: usize,
        const LIST_CAP: usize,
        const FIFO_CAP: usize,
    > Default for PollContext<BASIC_CAP, DATAGRAM_CAP, SNIP_CAP, LIST_CAP, FIFO_CAP>
{
    fn default() -> Self {
        Self {
            store: BufferStore::new(),
            list: BufferList::new(),
            fifo: Fifo::new(),
        }
    }
}

/// Ties a [`Device`], the node pool, the alias table, and the buffer layer
/// together into one pollable engine.
pub struct Interface<D: Device> {
    device: D,
}

impl<D: Device> Interface<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }

    pub fn device_capabilities(&self) -> DeviceCapabilities {
        self.device.capabilities()
    }

    /// Run one tick: drive every node's login/run state machine (emitting
    /// any frame it produces), then drain the receive side and dispatch
    /// whatever the FIFO has collected.
    #[allow(clippy::too_many_arguments)]
    pub fn poll<
        const MAX_NODES: usize,
        const MAX_EVENTS: usize,
        const ALIAS_CAP: usize,
        const BASIC_CAP: usize,
        const DATAGRAM_CAP: usize,
        const SNIP_CAP: usize,
        const LIST_CAP: usize,
        const FIFO_CAP: usize,
        S: Dispatch<MAX_EVENTS>,
    >(
        &mut self,
        nodes: &mut NodePool<MAX_NODES, MAX_EVENTS>,
        aliases: &mut AliasTable<ALIAS_CAP>,
        ctx: &mut PollContext<BASIC_CAP, DATAGRAM_CAP, SNIP_CAP, LIST_CAP, FIFO_CAP>,
        services: &mut S,
    ) {
        self.egress(nodes, aliases);
        self.ingress(aliases, ctx);
        self.dispatch(nodes, ctx, services);
    }

    fn egress<const MAX_NODES: usize, const MAX_EVENTS: usize, const ALIAS_CAP: usize>(
        &mut self,
        nodes: &mut NodePool<MAX_NODES, MAX_EVENTS>,
        aliases: &mut AliasTable<ALIAS_CAP>,
    ) {
        for node in nodes.iter_mut() {
            if let Some(emission) = login_step(node, aliases) {
                let Some(tx) = self.device.transmit() else {
                    net_debug!("iface: egress dropped, no tx token available");
                    continue;
                };
                emit(tx, node, emission);
            }
        }
    }

    fn ingress<
        const ALIAS_CAP: usize,
        const BASIC_CAP: usize,
        const DATAGRAM_CAP: usize,
        const SNIP_CAP: usize,
        const LIST_CAP: usize,
        const FIFO_CAP: usize,
    >(
        &mut self,
        aliases: &mut AliasTable<ALIAS_CAP>,
        ctx: &mut PollContext<BASIC_CAP, DATAGRAM_CAP, SNIP_CAP, LIST_CAP, FIFO_CAP>,
    ) {
        while let Some((rx, _tx)) = self.device.receive() {
            rx.consume(|raw| {
                let Ok(frame) = CanFrame::new_checked(&*raw) else {
                    net_debug!("iface: dropped malformed CAN frame");
                    return;
                };
                if frame.is_control_frame() {
                    // Any CID/RID/AMD/AMR seen for an alias we are still
                    // reserving (not yet permitted) means another node on
                    // the bus claimed it first; the login state machine's
                    // Wait200Ms state checks this flag before moving on to
                    // LoadReserveId (§4.4).
                    let alias = frame.source_alias();
                    if aliases.contains(alias) && !aliases.is_permitted(alias) {
                        aliases.mark_duplicate(alias);
                    }
                    return;
                }
                process_message_frame(&frame, ctx);
            });
        }
    }

    fn dispatch<
        const MAX_NODES: usize,
        const MAX_EVENTS: usize,
        const BASIC_CAP: usize,
        const DATAGRAM_CAP: usize,
        const SNIP_CAP: usize,
        const LIST_CAP: usize,
        const FIFO_CAP: usize,
        S: Dispatch<MAX_EVENTS>,
    >(
        &mut self,
        nodes: &mut NodePool<MAX_NODES, MAX_EVENTS>,
        ctx: &mut PollContext<BASIC_CAP, DATAGRAM_CAP, SNIP_CAP, LIST_CAP, FIFO_CAP>,
        services: &mut S,
    ) {
        while let Some((mti, handle)) = ctx.fifo.pop() {
            let payload: Vec<u8, { openlcb_core::config::SNIP_MAX_PAYLOAD }>;
            let (source_alias, dest_alias) = match handle {
                BufferHandle::Basic(_) => {
                    let Some(buf) = ctx.store.basic(handle) else { continue };
                    payload = Vec::from_slice(buf.data.as_slice()).unwrap_or_default();
                    (buf.source_alias, buf.dest_alias)
                }
                BufferHandle::Datagram(_) => {
                    let Some(buf) = ctx.store.datagram(handle) else { continue };
                    payload = Vec::from_slice(buf.data.as_slice()).unwrap_or_default();
                    (buf.source_alias, buf.dest_alias)
                }
                BufferHandle::Snip(_) => {
                    let Some(buf) = ctx.store.snip(handle) else { continue };
                    payload = Vec::from_slice(buf.data.as_slice()).unwrap_or_default();
                    (buf.source_alias, buf.dest_alias)
                }
            };

            let mut any_handled = false;
            let mut addressed_node_alias = None;
            for node in nodes.iter_mut() {
                let addressed_to_me = matches!(dest_alias, Some(a) if a == node.alias);
                let is_broadcast = dest_alias.is_none();
                let node_eligible = (node.is_initialized() && (is_broadcast || addressed_to_me))
                    || mti == Mti::VerifyNodeIdGlobal;
                if !node_eligible {
                    continue;
                }
                if addressed_to_me {
                    addressed_node_alias = Some(node.alias);
                }
                match services.dispatch(node, mti, source_alias, payload.as_slice()) {
                    DispatchOutcome::Unhandled => {}
                    DispatchOutcome::Handled => any_handled = true,
                    DispatchOutcome::Reply(reply) => {
                        any_handled = true;
                        if let Some(tx) = self.device.transmit() {
                            emit_reply(tx, node.alias, &reply);
                        } else {
                            net_debug!("iface: reply dropped, no tx token available");
                        }
                    }
                    DispatchOutcome::Replies(replies) => {
                        any_handled = true;
                        for reply in replies {
                            if let Some(tx) = self.device.transmit() {
                                emit_reply(tx, node.alias, &reply);
                            } else {
                                net_debug!("iface: reply dropped, no tx token available");
                            }
                        }
                    }
                }
            }

            if !any_handled {
                if let Some(alias) = addressed_node_alias {
                    net_debug!("iface: optional interaction rejected for unregistered MTI");
                    let reply = optional_interaction_rejected(source_alias, mti);
                    if let Some(tx) = self.device.transmit() {
                        emit_reply(tx, alias, &reply);
                    } else {
                        net_debug!("iface: reply dropped, no tx token available");
                    }
                }
            }

            ctx.store.release(handle);
        }
    }
}

fn emit<T: TxToken, const MAX_EVENTS: usize>(tx: T, node: &Node<MAX_EVENTS>, emission: LoginEmission) {
    match emission {
        LoginEmission::ControlFrame { identifier } => {
            tx.consume(CanFrame::<&[u8]>::header_len(), |buf| {
                let mut frame = CanFrame::new_unchecked(buf);
                frame.set_identifier(identifier);
            });
        }
        LoginEmission::ControlFrameWithNodeId { identifier } => {
            let len = CanFrame::<&[u8]>::header_len() + 6;
            tx.consume(len, |buf| {
                let mut frame = CanFrame::new_unchecked(buf);
                frame.set_identifier(identifier);
                frame.payload_mut().copy_from_slice(node.node_id.as_bytes());
            });
        }
        LoginEmission::Message { mti } => {
            emit_global_message(tx, node.alias, mti, node.node_id.as_bytes());
        }
        LoginEmission::MessageWithRange { mti, range } => {
            emit_global_message(tx, node.alias, mti, range.base().as_bytes());
        }
        LoginEmission::MessageWithEvent { mti, event } => {
            emit_global_message(tx, node.alias, mti, event.as_bytes());
        }
    }
}

/// Transmit a global (unaddressed) single-frame OpenLCB message: no
/// destination-alias header, `data` copied straight into the payload.
/// Framing bits only exist on addressed frames (§4.6).
fn emit_global_message<T: TxToken>(tx: T, source_alias: Alias, mti: Mti, data: &[u8]) {
    let len = CanFrame::<&[u8]>::header_len() + data.len();
    tx.consume(len, |buf| {
        let mut frame = CanFrame::new_unchecked(buf);
        frame.set_priority(mti.priority());
        frame.set_variable_field(mti.as_raw());
        frame.set_source_alias(source_alias);
        frame.payload_mut().copy_from_slice(data);
    });
}

/// Transmit a service's [`Reply`](openlcb_core::reply::Reply) as a single
/// CAN frame. Addressed MTIs get the 2-byte destination-alias header
/// `process_message_frame` expects on receive (top two bits the `Only`
/// framing marker, low 12 bits the alias); global MTIs are written with no
/// header at all, matching [`emit_global_message`]. Replies whose payload
/// doesn't fit (SNIP/CDI streams) are truncated; splitting those across
/// First/Middle/Last frames is not yet implemented.
fn emit_reply<T: TxToken>(tx: T, source_alias: Alias, reply: &openlcb_core::reply::Reply) {
    const ONLY_FRAMING_BITS: u16 = 0b11 << 14;

    let addressed = reply.mti.is_addressed();
    let header_len = if addressed { 2 } else { 0 };
    let max_data = 8 - header_len;
    if reply.payload.len() > max_data {
        net_debug!("iface: multi-frame reply splitting not yet implemented, truncating");
    }
    let data_len = core::cmp::min(reply.payload.len(), max_data);
    let len = CanFrame::<&[u8]>::header_len() + header_len + data_len;
    tx.consume(len, |buf| {
        let mut frame = CanFrame::new_unchecked(buf);
        frame.set_priority(reply.mti.priority());
        frame.set_variable_field(reply.mti.as_raw());
        frame.set_source_alias(source_alias);

        let payload = frame.payload_mut();
        if addressed {
            let dest = reply.dest.map(|a| a.value()).unwrap_or(0) & 0x0FFF;
            NetworkEndian::write_u16(&mut payload[0..2], dest | ONLY_FRAMING_BITS);
            payload[2..2 + data_len].copy_from_slice(&reply.payload[..data_len]);
        } else {
            payload[..data_len].copy_from_slice(&reply.payload[..data_len]);
        }
    });
}

/// Builds the Optional Interaction Rejected reply for an addressed request
/// MTI with no registered handler (§4.7, §7): error code `NotImplemented`
/// followed by the offending MTI, both big-endian.
fn optional_interaction_rejected(dest: Alias, rejected_mti: Mti) -> Reply {
    let mut payload = [0u8; 4];
    NetworkEndian::write_u16(&mut payload[0..2], ErrorCode::NotImplemented.into());
    NetworkEndian::write_u16(&mut payload[2..4], rejected_mti.as_raw());
    Reply::with_payload(Mti::OptionalInteractionRejected, Some(dest), &payload)
}

/// Reassemble one non-control CAN frame into the buffer list/FIFO (§4.6).
fn process_message_frame<
    const BASIC_CAP: usize,
    const DATAGRAM_CAP: usize,
    const SNIP_CAP: usize,
    const LIST_CAP: usize,
    const FIFO_CAP: usize,
>(
    frame: &CanFrame<&[u8]>,
    ctx: &mut PollContext<BASIC_CAP, DATAGRAM_CAP, SNIP_CAP, LIST_CAP, FIFO_CAP>,
) {
    let source_alias = frame.source_alias();
    let payload = frame.payload();

    let Some(mti) = Mti::from_raw(frame.variable_field()) else {
        net_debug!("iface: dropping frame with unregistered mti");
        return;
    };

    // Addressed MTIs carry a 2-byte destination-alias header ahead of the
    // message data, the framing bits living in its top two bits (§4.6).
    // Global MTIs carry no header; a global message is always exactly one
    // frame in this workspace, so its framing is implicitly Only.
    let (dest_alias, framing, data) = if mti.is_addressed() {
        if payload.len() < 2 {
            net_debug!("iface: dropped addressed frame shorter than its destination-alias header");
            return;
        }
        let fragment = Fragment::new_unchecked(payload);
        let framing = fragment.framing();
        let dest = Alias::new(NetworkEndian::read_u16(&payload[0..2]) & 0x0FFF);
        (Some(dest), framing, &payload[2..])
    } else {
        (None, FramingBits::Only, &payload[..])
    };

    let kind = if mti == Mti::Datagram { BufferKind::Datagram } else { BufferKind::Basic };

    match framing {
        FramingBits::Only => {
            let Some(handle) = ctx.store.allocate(kind, mti, source_alias, dest_alias) else {
                net_debug!("iface: buffer pool exhausted, dropping frame");
                return;
            };
            append_to(&mut ctx.store, handle, data);
            if ctx.fifo.push(mti, handle).is_err() {
                ctx.store.release(handle);
            }
        }
        FramingBits::First => {
            let key = ListKey { source_alias, dest_alias: dest_alias.unwrap_or(Alias::INVALID), mti };
            if let Some((index, old_handle)) = ctx.list.find(key) {
                // New FIRST for an already-open key: benign protocol
                // violation recovery (§8) — drop the stale partial.
                ctx.list.release(index);
                ctx.store.release(old_handle);
            }
            let Some(handle) = ctx.store.allocate(kind, mti, source_alias, dest_alias) else {
                return;
            };
            append_to(&mut ctx.store, handle, data);
            let _ = ctx.list.add(key, handle);
        }
        FramingBits::Middle => {
            let key = ListKey { source_alias, dest_alias: dest_alias.unwrap_or(Alias::INVALID), mti };
            if let Some((_, handle)) = ctx.list.find(key) {
                append_to(&mut ctx.store, handle, data);
            }
        }
        FramingBits::Last => {
            let key = ListKey { source_alias, dest_alias: dest_alias.unwrap_or(Alias::INVALID), mti };
            if let Some((index, handle)) = ctx.list.find(key) {
                append_to(&mut ctx.store, handle, data);
                ctx.list.release(index);
                if ctx.fifo.push(mti, handle).is_err() {
                    ctx.store.release(handle);
                }
            }
        }
    }
}

/// Append `data` to whichever pool `handle` points into.
fn append_to<
    const BASIC_CAP: usize,
    const DATAGRAM_CAP: usize,
    const SNIP_CAP: usize,
>(
    store: &mut BufferStore<BASIC_CAP, DATAGRAM_CAP, SNIP_CAP>,
    handle: BufferHandle,
    data: &[u8],
) {
    match handle {
        BufferHandle::Basic(_) => {
            if let Some(buf) = store.basic_mut(handle) {
                let _ = buf.data.extend_from_slice(data);
            }
        }
        BufferHandle::Datagram(_) => {
            if let Some(buf) = store.datagram_mut(handle) {
                let _ = buf.data.extend_from_slice(data);
            }
        }
        BufferHandle::Snip(_) => {
            if let Some(buf) = store.snip_mut(handle) {
                let _ = buf.data.extend_from_slice(data);
            }
        }
    }
}
