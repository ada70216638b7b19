//! Static node-identity bytes the embedding application supplies: the SNIP
//! reply, the ACDI Manufacturer space, and the CDI byte array (§4.7 SNIP,
//! §4.10-§4.11).
//!
//! Kept separate from the per-node, read-write state in
//! [`crate::service`]/`openlcb-network::node::Node` because these bytes are
//! fixed at build time and usually shared across every virtual node a
//! device hosts.

/// Read-only descriptive data a node reports about itself.
///
/// `openlcb-svc-nodeinfo` serves [`snip`](Self::snip) as the Simple Node
/// Ident Info reply payload; `openlcb-svc-memconfig` serves
/// [`acdi_manufacturer`](Self::acdi_manufacturer) and [`cdi`](Self::cdi) as
/// memory-configuration address spaces 0xFC and 0xFF.
pub trait NodeIdentity {
    /// Simple Node Ident Info payload (S-9.7.4.4): a version byte, four
    /// null-terminated manufacturer strings (manufacturer, model, hardware
    /// version, software version), a second version byte, then two
    /// null-terminated user strings (name, description).
    fn snip(&self) -> &[u8];

    /// The manufacturer half of [`snip`](Self::snip) (its version byte
    /// through the software-version string, exclusive of the user-data
    /// half), served at address space 0xFC.
    fn acdi_manufacturer(&self) -> &[u8];

    /// Configuration Description Information (address space 0xFF): an XML
    /// document describing this node's configuration memory layout.
    fn cdi(&self) -> &[u8];
}
