//! Node and alias identifiers.
//!
//! Modeled on the teacher's `can::VlcbCanId` / `cbus::VlcbNodeNumber`
//! newtype-over-byte-array pattern: fixed-size, `Copy`, constructed either
//! from parts or from a big-endian byte slice.

use byteorder::{ByteOrder, NetworkEndian};
use core::fmt;

/// Size of a 48-bit OpenLCB NodeID in octets.
pub const NODE_ID_SIZE: usize = 6;

/// A globally unique 48-bit NodeID, assigned by the manufacturer.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeId([u8; NODE_ID_SIZE]);

impl NodeId {
    pub const fn new(bytes: [u8; NODE_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Construct a NodeID from its 48-bit integer value.
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; NODE_ID_SIZE];
        // value is 48 bits, so the top two octets of a u64 are always zero.
        let mut full = [0u8; 8];
        NetworkEndian::write_u64(&mut full, value);
        bytes.copy_from_slice(&full[2..]);
        Self(bytes)
    }

    /// Construct a NodeID from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// Panics if `data` is not six octets long.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut bytes = [0; NODE_ID_SIZE];
        bytes.copy_from_slice(data);
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Return the NodeID as a 48-bit integer value (held in the low bits of a `u64`).
    pub fn as_u64(&self) -> u64 {
        let mut full = [0u8; 8];
        full[2..].copy_from_slice(&self.0);
        NetworkEndian::read_u64(&full)
    }

    pub const fn is_zero(&self) -> bool {
        let b = &self.0;
        b[0] == 0 && b[1] == 0 && b[2] == 0 && b[3] == 0 && b[4] == 0 && b[5] == 0
    }
}

impl fmt::Display for NodeId {
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

/// Mask applied to any 16-bit container holding an alias; the top four bits
/// of a CAN identifier's alias field are never part of the alias itself.
pub const ALIAS_MASK: u16 = 0x0FFF;

/// A 12-bit CAN alias, dynamically allocated per node per login session.
///
/// `0x000` is not a valid alias (see [`Alias::is_valid`]).
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alias(u16);

impl Alias {
    pub const INVALID: Alias = Alias(0x000);

    pub fn new(value: u16) -> Self {
        Self(value & ALIAS_MASK)
    }

    pub const fn value(&self) -> u16 {
        self.0
    }

    /// `0x000` is reserved and must never be used as an alias (§4.4).
    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:03X}", self.0)
    }
}

impl From<Alias> for u16 {
    fn from(value: Alias) -> Self {
        value.0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn node_id_round_trips_through_u64() {
        let id = NodeId::from_u64(0x0102_0304_0506);
        assert_eq!(id.as_u64(), 0x0102_0304_0506);
        assert_eq!(id.as_bytes(), &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(id.to_string(), "01.02.03.04.05.06");
    }

    #[test]
    fn node_id_from_bytes_matches_from_u64() {
        let a = NodeId::from_bytes(&[0xAB, 0xCD, 0xEF, 0x01, 0x02, 0x03]);
        let b = NodeId::from_u64(0xABCD_EF01_0203);
        assert_eq!(a, b);
    }

    #[test]
    fn alias_masks_to_twelve_bits() {
        let alias = Alias::new(0xFFFF);
        assert_eq!(alias.value(), 0x0FFF);
        assert!(alias.is_valid());
        assert!(!Alias::INVALID.is_valid());
    }
}
