use num_enum::{FromPrimitive, IntoPrimitive};

/// Identifies which protocol service a handler belongs to, for logging and
/// for the `services/all` aggregator's dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ServiceId {
    #[num_enum(default)]
    None = 0,
    Datagram = 1,
    MemConfig = 2,
    NodeInfo = 3,
}

/// A handler for one slice of the OpenLCB protocol suite, dispatched to by
/// MTI from the main state machine (§4.7).
pub trait OpenlcbService {
    /// Runs the service's one-time initialization.
    fn init() {}

    /// Returns the service ID.
    ///
    /// By default returns [`ServiceId::None`], meaning the service takes no
    /// part in dispatch (a building block used by another service, not a
    /// dispatch target itself).
    fn service_id() -> ServiceId {
        ServiceId::None
    }

    /// Returns the service's protocol version, for PIP-adjacent reporting.
    fn service_version() -> u8 {
        0
    }
}
