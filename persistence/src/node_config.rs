//! Configuration-memory backed node state (§4.10 ACDI/CDI spaces, §6
//! `configuration_memory_read`/`write` callbacks).
//!
//! Adapted from the teacher's `NodeConfigStorage`/`PersistentNodeConfigStorage`
//! pair: an in-RAM struct that is the single source of truth at runtime, plus
//! a wrapper that mirrors it into an [`embedded_storage::Storage`] device and
//! only touches the device when a field actually changed.

use crate::{PersistentStorage, Storage};
use delegate::delegate;
use embedded_storage::Storage as StorageDriver;
use openlcb_core::event::EventId;
use openlcb_core::ids::{NodeId, NODE_ID_SIZE};
use core::cell::RefCell;
use core::mem::MaybeUninit;
use heapless::FnvIndexMap;
use rclite::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Error indicating that storage has reached its limit
    Exhausted,
    OutOfRange,
    OccupiedEntry,
}

/// One entry in a node's learned producer/consumer event table (§3 Data
/// Model "Node", the `producer_events`/`consumer_events` lists persisted
/// across resets).
pub trait LearnedEvent {
    fn new(index: u16, is_producer: bool) -> Self;
    fn index(&self) -> u16;
    fn is_producer(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaplessLearnedEvent {
    index: u16,
    is_producer: bool,
}

impl LearnedEvent for HeaplessLearnedEvent {
    fn new(index: u16, is_producer: bool) -> Self {
        Self { index, is_producer }
    }

    fn index(&self) -> u16 {
        self.index
    }

    fn is_producer(&self) -> bool {
        self.is_producer
    }
}

/// Per-node configuration-memory-backed state: identity, ACDI user fields,
/// the write-lock owner, and the learned event table.
pub trait NodeConfig {
    type Event: LearnedEvent;
    const MAX_EVENTS: u16;
    const USER_NAME_SIZE: u8;
    const USER_DESCRIPTION_SIZE: u8;

    fn stored_event_count(&self) -> u16;
    /// Learns a new producer or consumer event, or updates the role of an
    /// already-learned one.
    fn save_event(&mut self, evt: EventId, is_producer: bool) -> Result<(), Error>;
    fn has_event_with_index(&self, index: u16) -> bool;
    fn restore_event(&mut self, evt: EventId, data: Self::Event) -> Result<(), Error>;
    fn restore_event_unchecked(&mut self, evt: EventId, data: Self::Event) -> Result<(), Error>;
    fn delete_event(&mut self, evt: &EventId);
    fn get_event(&self, evt: &EventId) -> Option<&Self::Event>;
    fn has_event(&self, evt: &EventId) -> bool;

    fn node_id(&self) -> NodeId;
    fn set_node_id(&mut self, node_id: NodeId);

    /// ACDI user-name space (0xFB, first `USER_NAME_SIZE` bytes).
    fn user_name(&self) -> &[u8];
    fn set_user_name(&mut self, name: &[u8]);
    /// ACDI user-description space, immediately following the user name.
    fn user_description(&self) -> &[u8];
    fn set_user_description(&mut self, description: &[u8]);

    /// The NodeID currently holding the configuration-memory write lock
    /// (§4.11 "Lock/Reserve"), if any.
    fn owner_node(&self) -> Option<NodeId>;
    fn set_owner_node(&mut self, owner: Option<NodeId>);

    fn was_reset(&self) -> bool;
    fn raise_reset_flag(&mut self);
    fn clear_reset_flag(&mut self);
}

pub struct NodeConfigStorage<
    const MAX_EVENTS: usize,
    const USER_NAME_SIZE: usize,
    const USER_DESCRIPTION_SIZE: usize,
> {
    node_id: NodeId,
    owner_node: Option<NodeId>,
    user_name: [u8; USER_NAME_SIZE],
    user_description: [u8; USER_DESCRIPTION_SIZE],
    events: FnvIndexMap<EventId, HeaplessLearnedEvent, MAX_EVENTS>,
    reset_flag: bool,
}

impl<const MAX_EVENTS: usize, const USER_NAME_SIZE: usize, const USER_DESCRIPTION_SIZE: usize> Default
    for NodeConfigStorage<MAX_EVENTS, USER_NAME_SIZE, USER_DESCRIPTION_SIZE>
{
    fn default() -> Self {
        Self {
            node_id: NodeId::default(),
            owner_node: None,
            user_name: [0u8; USER_NAME_SIZE],
            user_description: [0u8; USER_DESCRIPTION_SIZE],
            events: FnvIndexMap::new(),
            reset_flag: false,
        }
    }
}

impl<const MAX_EVENTS: usize, const USER_NAME_SIZE: usize, const USER_DESCRIPTION_SIZE: usize>
    NodeConfigStorage<MAX_EVENTS, USER_NAME_SIZE, USER_DESCRIPTION_SIZE>
{
    fn set_event_item(&mut self, event_id: EventId, item: HeaplessLearnedEvent) {
        let _ = self.events.insert(event_id, item);
    }

    fn find_free_index(&self) -> Option<u16> {
        if self.events.len() == MAX_EVENTS {
            return None;
        }
        let mut i = 0u16;
        if self.events.is_empty() {
            return Some(i);
        }
        while self.events.values().any(|v| v.index == i) {
            i += 1;
        }
        Some(i)
    }
}

impl<const MAX_EVENTS: usize, const USER_NAME_SIZE: usize, const USER_DESCRIPTION_SIZE: usize> Storage
    for NodeConfigStorage<MAX_EVENTS, USER_NAME_SIZE, USER_DESCRIPTION_SIZE>
{
    fn wipe(&mut self) {
        self.events.clear();
        self.node_id = NodeId::default();
        self.owner_node = None;
        self.user_name = [0u8; USER_NAME_SIZE];
        self.user_description = [0u8; USER_DESCRIPTION_SIZE];
        self.reset_flag = true;
    }
}

impl<const MAX_EVENTS: usize, const USER_NAME_SIZE: usize, const USER_DESCRIPTION_SIZE: usize> NodeConfig
    for NodeConfigStorage<MAX_EVENTS, USER_NAME_SIZE, USER_DESCRIPTION_SIZE>
{
    type Event = HeaplessLearnedEvent;
    const MAX_EVENTS: u16 = MAX_EVENTS as u16;
    const USER_NAME_SIZE: u8 = USER_NAME_SIZE as u8;
    const USER_DESCRIPTION_SIZE: u8 = USER_DESCRIPTION_SIZE as u8;

    fn stored_event_count(&self) -> u16 {
        self.events.len() as u16
    }

    fn save_event(&mut self, evt: EventId, is_producer: bool) -> Result<(), Error> {
        if let Some(item) = self.events.get_mut(&evt) {
            item.is_producer = is_producer;
            return Ok(());
        }
        let Some(index) = self.find_free_index() else {
            return Err(Error::Exhausted);
        };
        self.set_event_item(evt, HeaplessLearnedEvent::new(index, is_producer));
        Ok(())
    }

    fn delete_event(&mut self, evt: &EventId) {
        self.events.remove(evt);
    }

    fn get_event(&self, evt: &EventId) -> Option<&Self::Event> {
        self.events.get(evt)
    }

    fn has_event(&self, evt: &EventId) -> bool {
        self.events.contains_key(evt)
    }

    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn set_node_id(&mut self, node_id: NodeId) {
        self.node_id = node_id;
    }

    fn user_name(&self) -> &[u8] {
        &self.user_name
    }

    fn set_user_name(&mut self, name: &[u8]) {
        let len = name.len().min(USER_NAME_SIZE);
        self.user_name[..len].copy_from_slice(&name[..len]);
    }

    fn user_description(&self) -> &[u8] {
        &self.user_description
    }

    fn set_user_description(&mut self, description: &[u8]) {
        let len = description.len().min(USER_DESCRIPTION_SIZE);
        self.user_description[..len].copy_from_slice(&description[..len]);
    }

    fn owner_node(&self) -> Option<NodeId> {
        self.owner_node
    }

    fn set_owner_node(&mut self, owner: Option<NodeId>) {
        self.owner_node = owner;
    }

    fn was_reset(&self) -> bool {
        self.reset_flag
    }

    fn raise_reset_flag(&mut self) {
        self.reset_flag = true;
    }

    fn clear_reset_flag(&mut self) {
        self.reset_flag = false;
    }

    fn has_event_with_index(&self, index: u16) -> bool {
        self.events.values().any(|e| e.index == index)
    }

    fn restore_event_unchecked(&mut self, evt: EventId, data: Self::Event) -> Result<(), Error> {
        self.events.insert(evt, data).map(|_| ()).map_err(|_| Error::Exhausted)
    }

    fn restore_event(&mut self, evt: EventId, data: Self::Event) -> Result<(), Error> {
        if self.has_event_with_index(data.index) {
            return Err(Error::OccupiedEntry);
        }
        self.restore_event_unchecked(evt, data)
    }
}

const UNINITIALISED_VALUE: u8 = 0xff;
const FLAGGED_AS_RESET: u8 = 99;
const RESET_FLAG_CLEARED: u8 = 0;
/// NodeID, owner NodeID, reset flag: the block checked to detect virgin
/// storage before any ACDI/event data is trusted.
const PERSISTENT_BLOCK_SIZE: u8 = (NODE_ID_SIZE * 2 + 1) as u8;

const fn cmax(a: usize, b: usize) -> usize {
    [a, b][(a < b) as usize]
}

/// Bytes an event slot occupies on the storage device: the 8-byte EventID
/// plus one role byte (producer/consumer).
const EVENT_RECORD_SIZE: usize = 9;

/// Mirrors a [`NodeConfigStorage`] into an [`embedded_storage::Storage`]
/// device, flushing only the fields that changed since the last save.
pub struct PersistentNodeConfigStorage<
    D: StorageDriver,
    const OFFSET: usize,
    const MAX_EVENTS: usize,
    const USER_NAME_SIZE: usize,
    const USER_DESCRIPTION_SIZE: usize,
> {
    driver: Rc<RefCell<D>>,
    dirty: bool,
    inner: NodeConfigStorage<MAX_EVENTS, USER_NAME_SIZE, USER_DESCRIPTION_SIZE>,
}

impl<
        D: StorageDriver,
        const OFFSET: usize,
        const MAX_EVENTS: usize,
        const USER_NAME_SIZE: usize,
        const USER_DESCRIPTION_SIZE: usize,
    > PersistentNodeConfigStorage<D, OFFSET, MAX_EVENTS, USER_NAME_SIZE, USER_DESCRIPTION_SIZE>
{
    pub fn new(driver: Rc<RefCell<D>>) -> Self {
        Self {
            driver,
            dirty: false,
            inner: NodeConfigStorage::default(),
        }
    }

    const fn node_id_addr() -> usize {
        OFFSET
    }

    const fn owner_node_addr() -> usize {
        Self::node_id_addr() + NODE_ID_SIZE
    }

    const fn reset_flag_addr() -> usize {
        Self::owner_node_addr() + NODE_ID_SIZE
    }

    const fn persistent_sub_block_end() -> usize {
        OFFSET + PERSISTENT_BLOCK_SIZE as usize - 1
    }

    const fn user_name_addr_start() -> usize {
        Self::persistent_sub_block_end() + 1
    }

    const fn user_description_addr_start() -> usize {
        Self::user_name_addr_start() + USER_NAME_SIZE
    }

    const fn event_addr_start() -> usize {
        Self::user_description_addr_start() + USER_DESCRIPTION_SIZE
    }

    const fn event_addr_end() -> usize {
        Self::event_addr_start() + EVENT_RECORD_SIZE * MAX_EVENTS
    }

    pub const fn block_end() -> usize {
        Self::event_addr_end()
    }

    fn reload_events(&mut self) {
        const UNUSED: [u8; EVENT_RECORD_SIZE] = [UNINITIALISED_VALUE; EVENT_RECORD_SIZE];

        #[allow(unsafe_code, clippy::uninit_assumed_init)]
        let mut buf = unsafe { [const { MaybeUninit::<u8>::uninit().assume_init() }; EVENT_RECORD_SIZE] };

        let mut storage = self.driver.borrow_mut();
        for (index, addr) in (Self::event_addr_start()..Self::event_addr_end())
            .step_by(EVENT_RECORD_SIZE)
            .enumerate()
        {
            let _ = storage.read(addr as u32, &mut buf);
            if buf != UNUSED {
                let event_id = EventId::from_bytes(&buf[..8]);
                let is_producer = buf[8] != 0;
                self.inner
                    .set_event_item(event_id, HeaplessLearnedEvent::new(index as u16, is_producer));
            }
        }
    }

    /// Checks if the module is in its first setup: the node-id/owner/reset
    /// block reads back as all-`0xFF`.
    fn detect_virgin_storage_state(&mut self) -> bool {
        let mut storage = self.driver.borrow_mut();

        #[allow(unsafe_code, clippy::uninit_assumed_init)]
        let mut buf =
            unsafe { [const { MaybeUninit::<u8>::uninit().assume_init() }; PERSISTENT_BLOCK_SIZE as usize] };

        let _ = storage.read(OFFSET as u32, &mut buf);
        buf.iter().all(|v| *v == UNINITIALISED_VALUE)
    }

    #[inline]
    fn mark_as_dirty(&mut self) -> &mut NodeConfigStorage<MAX_EVENTS, USER_NAME_SIZE, USER_DESCRIPTION_SIZE> {
        self.dirty = true;
        &mut self.inner
    }

    fn flush_to_storage(&mut self) {
        let mut storage = self.driver.borrow_mut();

        #[allow(unsafe_code, clippy::uninit_assumed_init)]
        let mut buf = unsafe {
            [const { MaybeUninit::<u8>::uninit().assume_init() }; cmax(NODE_ID_SIZE, USER_DESCRIPTION_SIZE)]
        };

        let _ = storage.read(Self::node_id_addr() as u32, &mut buf[..NODE_ID_SIZE]);
        {
            let node_id = self.inner.node_id().as_bytes();
            if buf[..NODE_ID_SIZE] != *node_id {
                buf[..NODE_ID_SIZE].copy_from_slice(node_id);
                let _ = storage.write(Self::node_id_addr() as u32, &buf[..NODE_ID_SIZE]);
            }
        }

        let mut owner_bytes = [0u8; NODE_ID_SIZE];
        if let Some(owner) = self.inner.owner_node() {
            owner_bytes.copy_from_slice(owner.as_bytes());
        }
        let _ = storage.read(Self::owner_node_addr() as u32, &mut buf[..NODE_ID_SIZE]);
        if buf[..NODE_ID_SIZE] != owner_bytes {
            buf[..NODE_ID_SIZE].copy_from_slice(&owner_bytes);
            let _ = storage.write(Self::owner_node_addr() as u32, &buf[..NODE_ID_SIZE]);
        }

        let _ = storage.read(Self::reset_flag_addr() as u32, &mut buf[..1]);
        {
            let flag = match self.inner.was_reset() {
                true => FLAGGED_AS_RESET,
                false => RESET_FLAG_CLEARED,
            };
            if buf[0] != flag {
                buf[0] = flag;
                let _ = storage.write(Self::reset_flag_addr() as u32, &buf[..1]);
            }
        }

        let _ = storage.read(Self::user_name_addr_start() as u32, &mut buf[..USER_NAME_SIZE]);
        if buf[..USER_NAME_SIZE] != *self.inner.user_name() {
            buf[..USER_NAME_SIZE].copy_from_slice(self.inner.user_name());
            let _ = storage.write(Self::user_name_addr_start() as u32, &buf[..USER_NAME_SIZE]);
        }

        let _ = storage.read(
            Self::user_description_addr_start() as u32,
            &mut buf[..USER_DESCRIPTION_SIZE],
        );
        if buf[..USER_DESCRIPTION_SIZE] != *self.inner.user_description() {
            buf[..USER_DESCRIPTION_SIZE].copy_from_slice(self.inner.user_description());
            let _ = storage.write(Self::user_description_addr_start() as u32, &buf[..USER_DESCRIPTION_SIZE]);
        }
    }
}

impl<
        D: StorageDriver,
        const OFFSET: usize,
        const MAX_EVENTS: usize,
        const USER_NAME_SIZE: usize,
        const USER_DESCRIPTION_SIZE: usize,
    > PersistentStorage for PersistentNodeConfigStorage<D, OFFSET, MAX_EVENTS, USER_NAME_SIZE, USER_DESCRIPTION_SIZE>
{
    #[must_use]
    fn load(&mut self) {
        {
            if self.detect_virgin_storage_state() {
                self.clear_reset_flag();
                self.force_flush();
            }

            let mut storage = self.driver.borrow_mut();

            #[allow(unsafe_code, clippy::uninit_assumed_init)]
            let mut buf = unsafe {
                [const { MaybeUninit::<u8>::uninit().assume_init() }; cmax(NODE_ID_SIZE, USER_DESCRIPTION_SIZE)]
            };

            let _ = storage.read(Self::node_id_addr() as u32, &mut buf[..NODE_ID_SIZE]);
            self.inner.set_node_id(NodeId::from_bytes(&buf[..NODE_ID_SIZE]));

            let _ = storage.read(Self::owner_node_addr() as u32, &mut buf[..NODE_ID_SIZE]);
            let owner = NodeId::from_bytes(&buf[..NODE_ID_SIZE]);
            self.inner.set_owner_node(if owner.is_zero() { None } else { Some(owner) });

            let _ = storage.read(Self::reset_flag_addr() as u32, &mut buf[..1]);
            if buf[0] == FLAGGED_AS_RESET {
                self.inner.raise_reset_flag();
            }

            let _ = storage.read(Self::user_name_addr_start() as u32, &mut buf[..USER_NAME_SIZE]);
            self.inner.set_user_name(&buf[..USER_NAME_SIZE]);

            let _ = storage.read(
                Self::user_description_addr_start() as u32,
                &mut buf[..USER_DESCRIPTION_SIZE],
            );
            self.inner.set_user_description(&buf[..USER_DESCRIPTION_SIZE]);
        }

        self.reload_events();
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        self.flush_to_storage();
        self.dirty = false;
    }

    fn force_flush(&mut self) {
        self.flush_to_storage();
    }
}

impl<
        D: StorageDriver,
        const OFFSET: usize,
        const MAX_EVENTS: usize,
        const USER_NAME_SIZE: usize,
        const USER_DESCRIPTION_SIZE: usize,
    > NodeConfig for PersistentNodeConfigStorage<D, OFFSET, MAX_EVENTS, USER_NAME_SIZE, USER_DESCRIPTION_SIZE>
{
    type Event = HeaplessLearnedEvent;
    const MAX_EVENTS: u16 = MAX_EVENTS as u16;
    const USER_NAME_SIZE: u8 = USER_NAME_SIZE as u8;
    const USER_DESCRIPTION_SIZE: u8 = USER_DESCRIPTION_SIZE as u8;

    delegate! {
        to self.inner {
            fn stored_event_count(&self) -> u16;
            fn has_event_with_index(&self, index: u16) -> bool;
            fn get_event(&self, evt: &EventId) -> Option<&Self::Event>;
            fn has_event(&self, evt: &EventId) -> bool;
            fn node_id(&self) -> NodeId;
            fn user_name(&self) -> &[u8];
            fn user_description(&self) -> &[u8];
            fn owner_node(&self) -> Option<NodeId>;
            fn was_reset(&self) -> bool;
        }
        to self.mark_as_dirty() {
            fn save_event(&mut self, evt: EventId, is_producer: bool) -> Result<(), Error>;
            fn restore_event(&mut self, evt: EventId, data: Self::Event) -> Result<(), Error>;
            fn restore_event_unchecked(&mut self, evt: EventId, data: Self::Event) -> Result<(), Error>;
            fn delete_event(&mut self, evt: &EventId);
            fn set_node_id(&mut self, node_id: NodeId);
            fn set_user_name(&mut self, name: &[u8]);
            fn set_user_description(&mut self, description: &[u8]);
            fn set_owner_node(&mut self, owner: Option<NodeId>);
            fn raise_reset_flag(&mut self);
            fn clear_reset_flag(&mut self);
        }
    }
}

impl<
        D: StorageDriver,
        const OFFSET: usize,
        const MAX_EVENTS: usize,
        const USER_NAME_SIZE: usize,
        const USER_DESCRIPTION_SIZE: usize,
    > Storage for PersistentNodeConfigStorage<D, OFFSET, MAX_EVENTS, USER_NAME_SIZE, USER_DESCRIPTION_SIZE>
{
    fn wipe(&mut self) {
        self.inner.wipe();
        self.dirty = true;
        self.flush();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn in_ram_storage_learns_and_looks_up_events() {
        let mut storage: NodeConfigStorage<4, 63, 64> = NodeConfigStorage::default();
        let event = EventId::from_u64(0x0102_0304_0506_0708);
        storage.save_event(event, true).unwrap();
        assert!(storage.has_event(&event));
        assert!(storage.get_event(&event).unwrap().is_producer());
        assert_eq!(storage.stored_event_count(), 1);
    }

    #[test]
    fn wipe_resets_identity_and_events() {
        let mut storage: NodeConfigStorage<4, 63, 64> = NodeConfigStorage::default();
        storage.set_node_id(NodeId::from_u64(0x42));
        storage.save_event(EventId::from_u64(1), false).unwrap();
        storage.wipe();
        assert!(storage.node_id().is_zero());
        assert_eq!(storage.stored_event_count(), 0);
        assert!(storage.was_reset());
    }

    #[test]
    fn user_name_is_truncated_to_field_size() {
        let mut storage: NodeConfigStorage<1, 4, 4> = NodeConfigStorage::default();
        storage.set_user_name(b"toolong");
        assert_eq!(storage.user_name(), b"tool");
    }
}
