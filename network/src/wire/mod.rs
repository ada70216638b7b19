use cfg_if::cfg_if;
use core::fmt;
use openlcb_core::ids::Alias;

mod field {
    pub type Field = core::ops::Range<usize>;
    pub type Rest = core::ops::RangeFrom<usize>;
    pub type Until = core::ops::RangeInclusive<usize>;
    pub type Single = usize;
}

mod openlcb;

cfg_if! {
    if #[cfg(feature = "medium-can")] {
        pub(crate) mod can;

        pub use self::can::{
            Frame as CanFrame,
            FrameType,
            DatagramSegment,
            HEADER_LEN as CAN_HEADER_LEN,
        };
    }
}

pub use self::openlcb::{Fragment, FramingBits, Repr as MessageRepr};

/// Parsing of a frame or message failed.
///
/// Either it's malformed, or not supported by this library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Error;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wire::Error")
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// Representation of a hardware address on the configured medium.
///
/// Every medium this workspace targets (S-9.7.2's CAN binding is the only
/// one implemented — see spec Non-goals on multi-transport abstraction)
/// addresses a node by its 12-bit alias.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HardwareAddress(pub Alias);

impl HardwareAddress {
    pub const fn alias(&self) -> Alias {
        self.0
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Alias> for HardwareAddress {
    fn from(addr: Alias) -> Self {
        HardwareAddress(addr)
    }
}

/// Length, in octets, of a raw (unparsed) hardware address: a 12-bit alias
/// fits in two octets.
pub const MAX_HARDWARE_ADDRESS_LEN: usize = 2;

/// Unparsed hardware address, as handed to/from a [`crate::phy::Device`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawHardwareAddress {
    len: u8,
    data: [u8; MAX_HARDWARE_ADDRESS_LEN],
}

impl RawHardwareAddress {
    pub fn from_bytes(addr: &[u8]) -> Self {
        let mut data = [0u8; MAX_HARDWARE_ADDRESS_LEN];
        data[..addr.len()].copy_from_slice(addr);

        Self {
            len: addr.len() as u8,
            data,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub const fn len(&self) -> usize {
        self.len as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn parse(&self) -> Result<HardwareAddress> {
        if self.len() < 2 {
            return Err(Error);
        }
        let value = u16::from_be_bytes([self.data[0], self.data[1]]);
        Ok(HardwareAddress(Alias::new(value)))
    }
}

impl fmt::Display for RawHardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, &b) in self.as_bytes().iter().enumerate() {
            if i != 0 {
                write!(f, ".")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

impl From<HardwareAddress> for RawHardwareAddress {
    fn from(addr: HardwareAddress) -> Self {
        Self::from_bytes(&addr.0.value().to_be_bytes())
    }
}
