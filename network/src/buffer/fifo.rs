use super::BufferHandle;
use openlcb_core::mti::Mti;

struct Entry {
    priority: u8,
    mti: Mti,
    handle: BufferHandle,
}

/// Priority queue of completed inbound messages, ordered by OpenLCB MTI
/// priority (the upper 3 bits of the MTI, per §4.2); same-priority messages
/// stay FIFO-ordered.
///
/// Backed by a fixed array rather than a heap, since an insert only ever
/// has to find the first slot whose priority is no higher than the new
/// entry's — a linear scan over a handful of pending messages, not a real
/// heap's `O(log n)` concern.
pub struct Fifo<const CAP: usize> {
    slots: heapless::Vec<Entry, CAP>,
}

impl<const CAP: usize> Default for Fifo<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> Fifo<CAP> {
    pub fn new() -> Self {
        Self {
            slots: heapless::Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Push a completed message. Returns the handle back if the FIFO is
    /// full (caller should release the buffer back to the store).
    pub fn push(&mut self, mti: Mti, handle: BufferHandle) -> Result<(), BufferHandle> {
        let priority = mti.priority();
        let position = self
            .slots
            .iter()
            .position(|e| e.priority > priority)
            .unwrap_or(self.slots.len());
        self.slots
            .insert(position, Entry { priority, mti, handle })
            .map_err(|e| e.handle)
    }

    pub fn pop(&mut self) -> Option<(Mti, BufferHandle)> {
        if self.slots.is_empty() {
            return None;
        }
        let entry = self.slots.remove(0);
        Some((entry.mti, entry.handle))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use openlcb_core::mti::Mti;

    #[test]
    fn higher_priority_mti_pops_first() {
        let mut fifo: Fifo<4> = Fifo::new();
        // IdentifyEventsGlobal has a higher raw value (higher priority
        // field) than InitializationComplete.
        fifo.push(Mti::InitializationComplete, BufferHandle::Basic(0)).unwrap();
        fifo.push(Mti::IdentifyEventsGlobal, BufferHandle::Basic(1)).unwrap();

        let (first_mti, _) = fifo.pop().unwrap();
        assert!(first_mti.priority() >= Mti::InitializationComplete.priority());
    }

    #[test]
    fn same_priority_stays_fifo_ordered() {
        let mut fifo: Fifo<4> = Fifo::new();
        fifo.push(Mti::PcEventReport, BufferHandle::Basic(0)).unwrap();
        fifo.push(Mti::PcEventReport, BufferHandle::Basic(1)).unwrap();

        assert_eq!(fifo.pop().unwrap().1, BufferHandle::Basic(0));
        assert_eq!(fifo.pop().unwrap().1, BufferHandle::Basic(1));
    }

    #[test]
    fn full_fifo_returns_handle_back() {
        let mut fifo: Fifo<1> = Fifo::new();
        fifo.push(Mti::PcEventReport, BufferHandle::Basic(0)).unwrap();
        let err = fifo.push(Mti::PcEventReport, BufferHandle::Basic(1)).unwrap_err();
        assert_eq!(err, BufferHandle::Basic(1));
    }
}
