use heapless::Vec;
use openlcb_core::ids::Alias;
use openlcb_core::mti::Mti;

/// Which size class a buffer was allocated from (§3 Data Model "Message").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferKind {
    /// An 8-byte basic OpenLCB message.
    Basic,
    /// A 72-byte datagram payload.
    Datagram,
    /// A ~253-byte SNIP reply payload.
    Snip,
}

/// One allocated message buffer.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Buffer<const N: usize> {
    pub mti: Mti,
    pub source_alias: Alias,
    pub dest_alias: Option<Alias>,
    pub data: Vec<u8, N>,
    refcount: u8,
}

impl<const N: usize> Buffer<N> {
    fn empty() -> Self {
        Self {
            mti: Mti::OptionalInteractionRejected,
            source_alias: Alias::INVALID,
            dest_alias: None,
            data: Vec::new(),
            refcount: 0,
        }
    }

    pub fn refcount(&self) -> u8 {
        self.refcount
    }
}

/// A handle into one of the store's three pools. Opaque to callers; valid
/// only for the [`BufferStore`] it was allocated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferHandle {
    Basic(usize),
    Datagram(usize),
    Snip(usize),
}

impl BufferHandle {
    pub const fn kind(&self) -> BufferKind {
        match self {
            BufferHandle::Basic(_) => BufferKind::Basic,
            BufferHandle::Datagram(_) => BufferKind::Datagram,
            BufferHandle::Snip(_) => BufferKind::Snip,
        }
    }
}

struct Pool<const N: usize, const CAP: usize> {
    slots: [Buffer<N>; CAP],
}

impl<const N: usize, const CAP: usize> Pool<N, CAP> {
    fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Buffer::empty()),
        }
    }

    fn allocate(&mut self, mti: Mti, source_alias: Alias, dest_alias: Option<Alias>) -> Option<usize> {
        let index = self.slots.iter().position(|b| b.refcount == 0)?;
        let slot = &mut self.slots[index];
        slot.mti = mti;
        slot.source_alias = source_alias;
        slot.dest_alias = dest_alias;
        slot.data.clear();
        slot.refcount = 1;
        Some(index)
    }

    fn get(&self, index: usize) -> Option<&Buffer<N>> {
        self.slots.get(index).filter(|b| b.refcount > 0)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut Buffer<N>> {
        self.slots.get_mut(index).filter(|b| b.refcount > 0)
    }

    fn retain(&mut self, index: usize) {
        if let Some(b) = self.slots.get_mut(index) {
            b.refcount = b.refcount.saturating_add(1);
        }
    }

    /// Decrement the refcount, freeing the slot once it reaches zero.
    /// Returns whether the slot was actually freed.
    fn release(&mut self, index: usize) -> bool {
        if let Some(b) = self.slots.get_mut(index) {
            if b.refcount > 0 {
                b.refcount -= 1;
            }
            if b.refcount == 0 {
                b.data.clear();
                return true;
            }
        }
        false
    }
}

/// Fixed pool of message buffers in three size classes, matching §4.1.
pub struct BufferStore<
    const BASIC_CAP: usize,
    const DATAGRAM_CAP: usize,
    const SNIP_CAP: usize,
> {
    basic: Pool<{ openlcb_core::config::BASIC_MAX_PAYLOAD }, BASIC_CAP>,
    datagram: Pool<{ openlcb_core::config::DATAGRAM_MAX_PAYLOAD }, DATAGRAM_CAP>,
    snip: Pool<{ openlcb_core::config::SNIP_MAX_PAYLOAD }, SNIP_CAP>,
}

impl<const BASIC_CAP: usize, const DATAGRAM_CAP: usize, const SNIP_CAP: usize> Default
    for BufferStore<BASIC_CAP, DATAGRAM_CAP, SNIP_CAP>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const BASIC_CAP: usize, const DATAGRAM_CAP: usize, const SNIP_CAP: usize>
    BufferStore<BASIC_CAP, DATAGRAM_CAP, SNIP_CAP>
{
    pub fn new() -> Self {
        Self {
            basic: Pool::new(),
            datagram: Pool::new(),
            snip: Pool::new(),
        }
    }

    /// Allocate a buffer of the given kind. Returns `None` if that pool is
    /// exhausted (§7: surfaced to the caller as `BUFFER_UNAVAILABLE`).
    pub fn allocate(
        &mut self,
        kind: BufferKind,
        mti: Mti,
        source_alias: Alias,
        dest_alias: Option<Alias>,
    ) -> Option<BufferHandle> {
        match kind {
            BufferKind::Basic => self
                .basic
                .allocate(mti, source_alias, dest_alias)
                .map(BufferHandle::Basic),
            BufferKind::Datagram => self
                .datagram
                .allocate(mti, source_alias, dest_alias)
                .map(BufferHandle::Datagram),
            BufferKind::Snip => self
                .snip
                .allocate(mti, source_alias, dest_alias)
                .map(BufferHandle::Snip),
        }
    }

    pub fn retain(&mut self, handle: BufferHandle) {
        match handle {
            BufferHandle::Basic(i) => self.basic.retain(i),
            BufferHandle::Datagram(i) => self.datagram.retain(i),
            BufferHandle::Snip(i) => self.snip.retain(i),
        }
    }

    pub fn release(&mut self, handle: BufferHandle) -> bool {
        match handle {
            BufferHandle::Basic(i) => self.basic.release(i),
            BufferHandle::Datagram(i) => self.datagram.release(i),
            BufferHandle::Snip(i) => self.snip.release(i),
        }
    }

    pub fn basic(&self, handle: BufferHandle) -> Option<&Buffer<{ openlcb_core::config::BASIC_MAX_PAYLOAD }>> {
        match handle {
            BufferHandle::Basic(i) => self.basic.get(i),
            _ => None,
        }
    }

    pub fn basic_mut(
        &mut self,
        handle: BufferHandle,
    ) -> Option<&mut Buffer<{ openlcb_core::config::BASIC_MAX_PAYLOAD }>> {
        match handle {
            BufferHandle::Basic(i) => self.basic.get_mut(i),
            _ => None,
        }
    }

    pub fn datagram(
        &self,
        handle: BufferHandle,
    ) -> Option<&Buffer<{ openlcb_core::config::DATAGRAM_MAX_PAYLOAD }>> {
        match handle {
            BufferHandle::Datagram(i) => self.datagram.get(i),
            _ => None,
        }
    }

    pub fn datagram_mut(
        &mut self,
        handle: BufferHandle,
    ) -> Option<&mut Buffer<{ openlcb_core::config::DATAGRAM_MAX_PAYLOAD }>> {
        match handle {
            BufferHandle::Datagram(i) => self.datagram.get_mut(i),
            _ => None,
        }
    }

    pub fn snip(&self, handle: BufferHandle) -> Option<&Buffer<{ openlcb_core::config::SNIP_MAX_PAYLOAD }>> {
        match handle {
            BufferHandle::Snip(i) => self.snip.get(i),
            _ => None,
        }
    }

    pub fn snip_mut(
        &mut self,
        handle: BufferHandle,
    ) -> Option<&mut Buffer<{ openlcb_core::config::SNIP_MAX_PAYLOAD }>> {
        match handle {
            BufferHandle::Snip(i) => self.snip.get_mut(i),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allocate_and_release_cycles_a_slot() {
        let mut store: BufferStore<2, 2, 2> = BufferStore::new();
        let handle = store
            .allocate(BufferKind::Basic, Mti::VerifyNodeIdGlobal, Alias::new(1), None)
            .unwrap();
        assert!(store.basic(handle).is_some());
        assert!(store.release(handle));
        assert!(store.basic(handle).is_none());
    }

    #[test]
    fn pool_exhaustion_returns_none() {
        let mut store: BufferStore<1, 1, 1> = BufferStore::new();
        let _first = store
            .allocate(BufferKind::Basic, Mti::VerifyNodeIdGlobal, Alias::new(1), None)
            .unwrap();
        assert!(store
            .allocate(BufferKind::Basic, Mti::VerifyNodeIdGlobal, Alias::new(2), None)
            .is_none());
    }

    #[test]
    fn shared_ownership_via_retain_survives_one_release() {
        let mut store: BufferStore<1, 1, 1> = BufferStore::new();
        let handle = store
            .allocate(BufferKind::Datagram, Mti::Datagram, Alias::new(1), None)
            .unwrap();
        store.retain(handle);
        assert!(!store.release(handle));
        assert!(store.datagram(handle).is_some());
        assert!(store.release(handle));
        assert!(store.datagram(handle).is_none());
    }
}
