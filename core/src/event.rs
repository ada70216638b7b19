//! Events and event ranges (§3 Data Model, §4.8, GLOSSARY).
//!
//! Adapted from the teacher's `cbus::EventId`, widened from CBUS's 4-octet
//! node-number+event-number pair to OpenLCB's 8-octet, NodeID-prefixed
//! EventID, and extended with the range-identifier encoding from
//! S-9.7.4.3 (a contiguous run of low-order one-bits marks the "don't care"
//! suffix of a range).

use byteorder::{ByteOrder, NetworkEndian};
use core::fmt;

/// Size of an OpenLCB EventID in octets.
pub const EVENT_ID_SIZE: usize = 8;

/// An eight-octet OpenLCB EventID.
#[derive(Debug, Hash, Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventId([u8; EVENT_ID_SIZE]);

impl EventId {
    pub const fn new(bytes: [u8; EVENT_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; EVENT_ID_SIZE];
        NetworkEndian::write_u64(&mut bytes, value);
        Self(bytes)
    }

    /// # Panics
    /// Panics if `data` is not eight octets long.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut bytes = [0; EVENT_ID_SIZE];
        bytes.copy_from_slice(data);
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_u64(&self) -> u64 {
        NetworkEndian::read_u64(&self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

/// A contiguous event range, as produced/consumed by Producer/Consumer
/// Range Identified (§4.8).
///
/// Per S-9.7.4.3, the low-order bits of the range's EventID that are all 1
/// are "don't care": any event whose high bits match the range's high bits
/// falls inside the range. `one_count` counts that trailing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventRange {
    base: EventId,
    one_count: u32,
}

impl EventRange {
    /// Build a range from its wire EventID: count the trailing one-bits to
    /// recover `one_count`, matching the source of truth rather than taking
    /// a caller-supplied count that could disagree with it.
    pub fn from_event_id(id: EventId) -> Self {
        let value = id.as_u64();
        Self {
            base: id,
            one_count: value.trailing_ones(),
        }
    }

    pub const fn base(&self) -> EventId {
        self.base
    }

    /// Mask covering the range's fixed (non-"don't care") high bits.
    fn fixed_mask(&self) -> u64 {
        !0u64 << self.one_count
    }

    pub fn contains(&self, event: EventId) -> bool {
        let mask = self.fixed_mask();
        (event.as_u64() & mask) == (self.base.as_u64() & mask)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn event_id_round_trips() {
        let id = EventId::from_u64(0x0102_0304_0506_0708);
        assert_eq!(id.as_u64(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn range_matches_members_and_rejects_outsiders() {
        // trailing 4 one-bits => 16-event range starting at a 16-aligned base.
        let range = EventRange::from_event_id(EventId::from_u64(0x0000_0000_0000_002F));
        assert!(range.contains(EventId::from_u64(0x0000_0000_0000_0020)));
        assert!(range.contains(EventId::from_u64(0x0000_0000_0000_002F)));
        assert!(!range.contains(EventId::from_u64(0x0000_0000_0000_0030)));
        assert!(!range.contains(EventId::from_u64(0x0000_0000_0000_001F)));
    }

    #[test]
    fn zero_trailing_ones_is_a_single_event_range() {
        let range = EventRange::from_event_id(EventId::from_u64(0x42));
        assert!(range.contains(EventId::from_u64(0x42)));
        assert!(!range.contains(EventId::from_u64(0x43)));
    }
}
