use super::BufferHandle;
use openlcb_core::ids::Alias;
use openlcb_core::mti::Mti;

/// Lookup key for a partially-assembled multi-frame message (§4.2): source
/// and destination alias plus MTI for basic messages, or just the alias
/// pair for datagrams (which carry no MTI on the wire — callers pass a
/// synthetic MTI, per §3's "completed datagram carries synthetic
/// MTI_DATAGRAM").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ListKey {
    pub source_alias: Alias,
    pub dest_alias: Alias,
    pub mti: Mti,
}

struct Entry {
    key: ListKey,
    handle: BufferHandle,
}

/// Fixed array of in-progress multi-frame messages, supporting random
/// access by index and lookup by [`ListKey`].
pub struct BufferList<const CAP: usize> {
    slots: [Option<Entry>; CAP],
}

impl<const CAP: usize> Default for BufferList<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> BufferList<CAP> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Fill the first empty slot. Returns `None` if the list is full.
    pub fn add(&mut self, key: ListKey, handle: BufferHandle) -> Option<usize> {
        let index = self.slots.iter().position(|s| s.is_none())?;
        self.slots[index] = Some(Entry { key, handle });
        Some(index)
    }

    /// Scan linearly for an in-progress message matching `key`.
    ///
    /// A new FIRST frame for an already-open key replaces the partial
    /// message: the sender violated the protocol, but §8's recovery note
    /// says this is handled benignly rather than treated as fatal, so
    /// callers that get a hit here should [`Self::release`] it and start
    /// fresh rather than erroring.
    pub fn find(&self, key: ListKey) -> Option<(usize, BufferHandle)> {
        self.slots
            .iter()
            .enumerate()
            .find_map(|(i, slot)| slot.as_ref().filter(|e| e.key == key).map(|e| (i, e.handle)))
    }

    pub fn get(&self, index: usize) -> Option<BufferHandle> {
        self.slots.get(index).and_then(|s| s.as_ref()).map(|e| e.handle)
    }

    /// Clear the slot without freeing the underlying buffer; the caller
    /// owns the handle's lifetime from here (typically moving it to the
    /// FIFO on LAST, or releasing it back to the store).
    pub fn release(&mut self, index: usize) -> Option<BufferHandle> {
        self.slots.get_mut(index).and_then(Option::take).map(|e| e.handle)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::buffer::BufferHandle;

    fn key(mti: Mti) -> ListKey {
        ListKey {
            source_alias: Alias::new(0x100),
            dest_alias: Alias::new(0x200),
            mti,
        }
    }

    #[test]
    fn add_then_find_round_trips() {
        let mut list: BufferList<4> = BufferList::new();
        let handle = BufferHandle::Basic(0);
        let index = list.add(key(Mti::SimpleNodeIdentInfoReply), handle).unwrap();
        let (found_index, found_handle) = list.find(key(Mti::SimpleNodeIdentInfoReply)).unwrap();
        assert_eq!(found_index, index);
        assert_eq!(found_handle, handle);
    }

    #[test]
    fn release_clears_slot_without_touching_caller_handle() {
        let mut list: BufferList<4> = BufferList::new();
        let handle = BufferHandle::Basic(0);
        let index = list.add(key(Mti::SimpleNodeIdentInfoReply), handle).unwrap();
        assert_eq!(list.release(index), Some(handle));
        assert!(list.find(key(Mti::SimpleNodeIdentInfoReply)).is_none());
    }

    #[test]
    fn full_list_rejects_additional_entries() {
        let mut list: BufferList<1> = BufferList::new();
        list.add(key(Mti::SimpleNodeIdentInfoReply), BufferHandle::Basic(0)).unwrap();
        assert!(list.add(key(Mti::Datagram), BufferHandle::Basic(1)).is_none());
    }
}
