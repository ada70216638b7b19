//! Memory-configuration protocol (§4.10-§4.11): CDI, ACDI and
//! configuration-memory read/write/lock, served over the datagram
//! transport from `openlcb-svc-datagram`.
//!
//! Responder side only: a host tool originates reads and writes against
//! this node, this node never originates them against another, so the
//! resend-tracking `*_REPLY_OK`/`*_REPLY_FAIL` sub-commands (which only
//! matter to the side that sent the original request) are never matched
//! here.
//!
//! Grounded on
//! `protocol_datagram_config_mem_handler.c`: the validation rules in
//! [`validate_range`], the write-under-mask algorithm in
//! [`Service::handle_write_under_mask`], and the Options/Address-Space-Info/
//! Reserve-Lock reply layouts all mirror that file's behavior byte for
//! byte. The one deliberate departure is ACDI User (0xFB): the reference
//! remaps writes to it into an address-shifted alias of Configuration
//! Memory; here it is its own space with dedicated
//! [`HostCallbacks::acdi_user_read`]/[`HostCallbacks::acdi_user_write`]
//! methods instead.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

mod cmd;
mod space;

use byteorder::{ByteOrder, NetworkEndian};

use openlcb_core::config::MEMCONFIG_MAX_COUNT;
use openlcb_core::error::ErrorCode;
use openlcb_core::identity::NodeIdentity;
use openlcb_core::ids::{Alias, NodeId};
use openlcb_core::service::{OpenlcbService, ServiceId};
use openlcb_network::node::Node;
use openlcb_svc_datagram::{MemConfigHandler, ReplyPayload};

use cmd::SpaceSelector;
use space::AddressSpace;

/// Host-supplied storage behind the spaces this node does not serve out of
/// static bytes: configuration memory and the ACDI user-data fields.
/// Parameterized on [`NodeId`] so one implementation can back every virtual
/// node a device hosts.
pub trait HostCallbacks {
    /// Last valid address in configuration memory (its size minus one).
    fn config_memory_highest_address(&self, node_id: NodeId) -> u32;
    fn config_memory_read(&mut self, node_id: NodeId, address: u32, out: &mut [u8]) -> Result<(), ErrorCode>;
    fn config_memory_write(&mut self, node_id: NodeId, address: u32, data: &[u8]) -> Result<(), ErrorCode>;

    /// Last valid address in the ACDI user-name/user-description fields.
    fn acdi_user_highest_address(&self, node_id: NodeId) -> u32;
    fn acdi_user_read(&mut self, node_id: NodeId, address: u32, out: &mut [u8]) -> Result<(), ErrorCode>;
    fn acdi_user_write(&mut self, node_id: NodeId, address: u32, data: &[u8]) -> Result<(), ErrorCode>;

    fn reboot(&mut self, node_id: NodeId);
    fn configuration_memory_factory_reset(&mut self, node_id: NodeId);
}

struct SpaceInfo {
    highest_address: u32,
    read_only: bool,
    low_address: u32,
}

/// Applies the reference's validation to a requested `(address, count)`
/// range, clamping `count` down to what the space actually holds.
fn validate_range(info: &SpaceInfo, address: u32, count: u8) -> Result<u8, ErrorCode> {
    if address > info.highest_address {
        return Err(ErrorCode::OutOfBoundsInvalidAddress);
    }
    if count > MEMCONFIG_MAX_COUNT {
        return Err(ErrorCode::InvalidArguments);
    }
    if count == 0 {
        return Err(ErrorCode::InvalidArguments);
    }
    if address + count as u32 > info.highest_address {
        return Ok((info.highest_address - address + 1) as u8);
    }
    Ok(count)
}

fn slice_read(src: &[u8], address: u32, out: &mut [u8]) -> Result<(), ErrorCode> {
    let start = address as usize;
    let end = start + out.len();
    let slice = src.get(start..end).ok_or(ErrorCode::OutOfBoundsInvalidAddress)?;
    out.copy_from_slice(slice);
    Ok(())
}

/// Resolves which address space a read/write/write-under-mask command
/// targets, and the payload offset its count (for reads) or data (for
/// writes) starts at.
fn parse_space_and_offset(command: u8, payload: &[u8]) -> Result<(AddressSpace, usize), ErrorCode> {
    let selector = cmd::space_selector(command);
    match selector {
        SpaceSelector::InPayload => {
            let &byte = payload.get(6).ok_or(ErrorCode::InvalidArguments)?;
            let space = AddressSpace::from_byte(byte).ok_or(ErrorCode::AddressSpaceUnknown)?;
            Ok((space, 7))
        }
        _ => {
            let space = AddressSpace::from_selector(selector, 0).ok_or(ErrorCode::AddressSpaceUnknown)?;
            Ok((space, 6))
        }
    }
}

fn parse_address(payload: &[u8]) -> Result<u32, ErrorCode> {
    let bytes = payload.get(2..6).ok_or(ErrorCode::InvalidArguments)?;
    Ok(NetworkEndian::read_u32(bytes))
}

fn push_all(reply: &mut ReplyPayload, bytes: &[u8]) -> Result<(), ErrorCode> {
    reply.extend_from_slice(bytes).map_err(|_| ErrorCode::BufferUnavailable)
}

/// The memory-configuration service: `I` supplies this node's static CDI
/// and ACDI Manufacturer bytes, `H` backs configuration memory and ACDI
/// User storage.
pub struct Service<I, H> {
    identity: I,
    host: H,
}

impl<I, H> Service<I, H> {
    pub fn new(identity: I, host: H) -> Self {
        Self { identity, host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

impl<I, H> OpenlcbService for Service<I, H> {
    fn service_id() -> ServiceId {
        ServiceId::MemConfig
    }

    fn service_version() -> u8 {
        1
    }
}

impl<I: NodeIdentity, H: HostCallbacks> Service<I, H> {
    fn space_info<const MAX_EVENTS: usize>(&self, node: &Node<MAX_EVENTS>, space: AddressSpace) -> Option<SpaceInfo> {
        match space {
            AddressSpace::Cdi => Some(SpaceInfo {
                highest_address: (self.identity.cdi().len() as u32).saturating_sub(1),
                read_only: true,
                low_address: 0,
            }),
            AddressSpace::All => None,
            AddressSpace::ConfigMemory => Some(SpaceInfo {
                highest_address: self.host.config_memory_highest_address(node.node_id),
                read_only: false,
                low_address: 0,
            }),
            AddressSpace::AcdiManufacturer => Some(SpaceInfo {
                highest_address: (self.identity.acdi_manufacturer().len() as u32).saturating_sub(1),
                read_only: true,
                low_address: 0,
            }),
            AddressSpace::AcdiUser => Some(SpaceInfo {
                highest_address: self.host.acdi_user_highest_address(node.node_id),
                read_only: false,
                low_address: 0,
            }),
        }
    }

    fn read_space<const MAX_EVENTS: usize>(
        &mut self,
        node: &Node<MAX_EVENTS>,
        space: AddressSpace,
        address: u32,
        out: &mut [u8],
    ) -> Result<(), ErrorCode> {
        match space {
            AddressSpace::Cdi => slice_read(self.identity.cdi(), address, out),
            AddressSpace::AcdiManufacturer => slice_read(self.identity.acdi_manufacturer(), address, out),
            AddressSpace::All => Err(ErrorCode::NotImplemented),
            AddressSpace::ConfigMemory => self.host.config_memory_read(node.node_id, address, out),
            AddressSpace::AcdiUser => self.host.acdi_user_read(node.node_id, address, out),
        }
    }

    fn write_space<const MAX_EVENTS: usize>(
        &mut self,
        node: &Node<MAX_EVENTS>,
        space: AddressSpace,
        address: u32,
        data: &[u8],
    ) -> Result<(), ErrorCode> {
        match space {
            AddressSpace::ConfigMemory => self.host.config_memory_write(node.node_id, address, data),
            AddressSpace::AcdiUser => self.host.acdi_user_write(node.node_id, address, data),
            AddressSpace::Cdi | AddressSpace::AcdiManufacturer | AddressSpace::All => Err(ErrorCode::NotImplemented),
        }
    }

    fn handle_read<const MAX_EVENTS: usize>(
        &mut self,
        node: &Node<MAX_EVENTS>,
        sub: u8,
        payload: &[u8],
    ) -> Result<Option<ReplyPayload>, ErrorCode> {
        let (space, count_offset) = parse_space_and_offset(sub, payload)?;
        let address = parse_address(payload)?;
        let &requested = payload.get(count_offset).ok_or(ErrorCode::InvalidArguments)?;
        let info = self.space_info(node, space).ok_or(ErrorCode::AddressSpaceUnknown)?;
        let count = validate_range(&info, address, requested)?;

        let mut reply = ReplyPayload::new();
        push_all(&mut reply, &[cmd::CONFIG_MEM_CONFIGURATION, sub + cmd::REPLY_OK_OFFSET])?;
        let mut addr_bytes = [0u8; 4];
        NetworkEndian::write_u32(&mut addr_bytes, address);
        push_all(&mut reply, &addr_bytes)?;
        if count_offset == 7 {
            push_all(&mut reply, &[space.as_byte()])?;
        }

        let mut data = [0u8; MEMCONFIG_MAX_COUNT as usize];
        let data = &mut data[..count as usize];
        self.read_space(node, space, address, data)?;
        push_all(&mut reply, data)?;
        Ok(Some(reply))
    }

    fn handle_write<const MAX_EVENTS: usize>(
        &mut self,
        node: &Node<MAX_EVENTS>,
        sub: u8,
        payload: &[u8],
    ) -> Result<Option<ReplyPayload>, ErrorCode> {
        let (space, data_offset) = parse_space_and_offset(sub, payload)?;
        let address = parse_address(payload)?;
        let data = payload.get(data_offset..).ok_or(ErrorCode::InvalidArguments)?;
        let info = self.space_info(node, space).ok_or(ErrorCode::AddressSpaceUnknown)?;
        if info.read_only {
            return Err(ErrorCode::NotImplemented);
        }
        let count = validate_range(&info, address, data.len() as u8)?;
        self.write_space(node, space, address, &data[..count as usize])?;

        let mut reply = ReplyPayload::new();
        push_all(&mut reply, &[cmd::CONFIG_MEM_CONFIGURATION, sub + cmd::REPLY_OK_OFFSET])?;
        let mut addr_bytes = [0u8; 4];
        NetworkEndian::write_u32(&mut addr_bytes, address);
        push_all(&mut reply, &addr_bytes)?;
        Ok(Some(reply))
    }

    fn handle_write_under_mask<const MAX_EVENTS: usize>(
        &mut self,
        node: &Node<MAX_EVENTS>,
        sub: u8,
        payload: &[u8],
    ) -> Result<Option<ReplyPayload>, ErrorCode> {
        let (space, data_offset) = parse_space_and_offset(sub, payload)?;
        let address = parse_address(payload)?;
        let pairs = payload.get(data_offset..).ok_or(ErrorCode::InvalidArguments)?;
        if pairs.is_empty() || pairs.len() % 2 != 0 {
            return Err(ErrorCode::InvalidArguments);
        }
        let requested = (pairs.len() / 2) as u8;
        let info = self.space_info(node, space).ok_or(ErrorCode::AddressSpaceUnknown)?;
        if info.read_only {
            return Err(ErrorCode::NotImplemented);
        }
        let count = validate_range(&info, address, requested)?;

        let mut existing = [0u8; MEMCONFIG_MAX_COUNT as usize];
        let existing = &mut existing[..count as usize];
        self.read_space(node, space, address, existing)?;

        let mut result = [0u8; MEMCONFIG_MAX_COUNT as usize];
        let result = &mut result[..count as usize];
        for i in 0..count as usize {
            let mask = pairs[i * 2];
            let value = pairs[i * 2 + 1];
            result[i] = (value & mask) | (existing[i] & !mask);
        }
        self.write_space(node, space, address, result)?;

        let mut reply = ReplyPayload::new();
        push_all(&mut reply, &[cmd::CONFIG_MEM_CONFIGURATION, sub + cmd::REPLY_OK_OFFSET])?;
        let mut addr_bytes = [0u8; 4];
        NetworkEndian::write_u32(&mut addr_bytes, address);
        push_all(&mut reply, &addr_bytes)?;
        Ok(Some(reply))
    }

    fn handle_options(&self) -> ReplyPayload {
        let mut reply = ReplyPayload::new();
        // 0x8000 write-under-mask, 0x0800 read ACDI mfr, 0x0400 read ACDI
        // user, 0x0200 write ACDI user.
        let available_commands: u16 = 0x8000 | 0x0800 | 0x0400 | 0x0200;
        let mut hdr = [0u8; 2];
        NetworkEndian::write_u16(&mut hdr, available_commands);
        // write lengths 1/2/4/64 supported, no streaming.
        let write_lengths: u8 = 0x80 | 0x40 | 0x20 | 0x02;
        let _ = reply.extend_from_slice(&[cmd::CONFIG_MEM_CONFIGURATION, cmd::OPTIONS_REPLY]);
        let _ = reply.extend_from_slice(&hdr);
        let _ = reply.push(write_lengths);
        let _ = reply.push(AddressSpace::Cdi.as_byte());
        let _ = reply.push(AddressSpace::AcdiUser.as_byte());
        reply
    }

    fn handle_get_address_space_info<const MAX_EVENTS: usize>(
        &self,
        node: &Node<MAX_EVENTS>,
        payload: &[u8],
    ) -> ReplyPayload {
        let requested = payload.get(2).copied().unwrap_or(0);
        let mut reply = ReplyPayload::new();
        match AddressSpace::from_byte(requested).and_then(|space| self.space_info(node, space).map(|info| (space, info))) {
            Some((space, info)) => {
                let _ = reply.extend_from_slice(&[cmd::CONFIG_MEM_CONFIGURATION, cmd::ADDRESS_SPACE_INFO_REPLY_PRESENT, space.as_byte()]);
                let mut addr_bytes = [0u8; 4];
                NetworkEndian::write_u32(&mut addr_bytes, info.highest_address);
                let _ = reply.extend_from_slice(&addr_bytes);
                let flags = (info.read_only as u8) | 0x02;
                let _ = reply.push(flags);
                let mut low_bytes = [0u8; 4];
                NetworkEndian::write_u32(&mut low_bytes, info.low_address);
                let _ = reply.extend_from_slice(&low_bytes);
            }
            None => {
                let _ = reply.extend_from_slice(&[
                    cmd::CONFIG_MEM_CONFIGURATION,
                    cmd::ADDRESS_SPACE_INFO_REPLY_NOT_PRESENT,
                    requested,
                    0,
                    0,
                    0,
                    0,
                    0x01,
                ]);
            }
        }
        reply
    }

    fn handle_reserve_lock<const MAX_EVENTS: usize>(
        &self,
        node: &mut Node<MAX_EVENTS>,
        payload: &[u8],
    ) -> Result<ReplyPayload, ErrorCode> {
        let bytes = payload.get(2..8).ok_or(ErrorCode::InvalidArguments)?;
        let contender = NodeId::from_bytes(bytes);

        match node.owner_node {
            None => node.owner_node = Some(contender),
            Some(_) if contender.is_zero() => node.owner_node = None,
            Some(_) => {}
        }

        let holder = node.owner_node.unwrap_or(NodeId::from_u64(0));
        let mut reply = ReplyPayload::new();
        push_all(&mut reply, &[cmd::CONFIG_MEM_CONFIGURATION, cmd::RESERVE_LOCK_REPLY])?;
        push_all(&mut reply, holder.as_bytes())?;
        Ok(reply)
    }
}

impl<const MAX_EVENTS: usize, I, H> MemConfigHandler<MAX_EVENTS> for Service<I, H>
where
    I: NodeIdentity,
    H: HostCallbacks,
{
    fn handle(
        &mut self,
        node: &mut Node<MAX_EVENTS>,
        _source_alias: Alias,
        payload: &[u8],
    ) -> Result<Option<ReplyPayload>, ErrorCode> {
        let &sub = payload.get(1).ok_or(ErrorCode::InvalidArguments)?;

        if cmd::is_write(sub) {
            return self.handle_write(node, sub, payload);
        }
        if cmd::is_write_under_mask(sub) {
            return self.handle_write_under_mask(node, sub, payload);
        }
        if cmd::is_read(sub) {
            return self.handle_read(node, sub, payload);
        }

        match sub {
            cmd::OPTIONS => Ok(Some(self.handle_options())),
            cmd::GET_ADDRESS_SPACE_INFO => Ok(Some(self.handle_get_address_space_info(node, payload))),
            cmd::RESERVE_LOCK => self.handle_reserve_lock(node, payload).map(Some),
            // Unique ID is a permanent stub in the reference this is
            // grounded on; nothing here ever has one to report.
            cmd::GET_UNIQUE_ID => Err(ErrorCode::NotImplemented),
            // Firmware space is never present, so freeze/unfreeze always
            // falls through to this.
            cmd::FREEZE | cmd::UNFREEZE => Err(ErrorCode::UnknownMtiOrTransportProtocol),
            cmd::UPDATE_COMPLETE => Ok(None),
            cmd::RESET_REBOOT => {
                self.host.reboot(node.node_id);
                Ok(None)
            }
            cmd::FACTORY_RESET => {
                self.host.configuration_memory_factory_reset(node.node_id);
                Ok(None)
            }
            _ => Err(ErrorCode::SubcommandUnknown),
        }
    }
}
