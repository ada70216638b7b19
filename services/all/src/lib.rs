//! Ties the three protocol services this workspace implements into one
//! [`Dispatch`] a node's main loop can hand every inbound message to.
//!
//! The teacher's aggregator (formerly `services/all`) was an enum over a
//! runtime-selected set of services with an `AnyService` upcast/downcast
//! trait. This workspace's service set is fixed at compile time (every
//! node runs datagram+memory-config and node-identification, never a
//! subset), so a plain struct of the two top-level dispatchers replaces
//! that machinery; `MemConfigHandler` (not a [`Dispatch`] itself) nests
//! inside the datagram service the same way it's wired in
//! `openlcb-svc-datagram`'s own doc example.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

use openlcb_core::identity::NodeIdentity;
use openlcb_core::ids::Alias;
use openlcb_core::mti::Mti;
use openlcb_core::reply::DispatchOutcome;
use openlcb_network::iface::Dispatch;
use openlcb_network::node::Node;
use openlcb_svc_memconfig::HostCallbacks;

/// `I` is the node's static identity bytes (SNIP/ACDI-Manufacturer/CDI),
/// `H` backs configuration memory and ACDI User storage. Both services
/// need `I`; it is required to be cheap to duplicate (the teacher's
/// static SNIP parameter blocks are `Copy` structs of `&'static str`
/// fields, and this follows that shape).
pub struct Services<I, H> {
    pub datagram: openlcb_svc_datagram::Service<openlcb_svc_memconfig::Service<I, H>>,
    pub nodeinfo: openlcb_svc_nodeinfo::Service<I>,
}

impl<I: Clone, H> Services<I, H> {
    pub fn new(identity: I, host: H) -> Self {
        Self {
            datagram: openlcb_svc_datagram::Service::new(openlcb_svc_memconfig::Service::new(identity.clone(), host)),
            nodeinfo: openlcb_svc_nodeinfo::Service::new(identity),
        }
    }
}

impl<const MAX_EVENTS: usize, I, H> Dispatch<MAX_EVENTS> for Services<I, H>
where
    I: NodeIdentity,
    H: HostCallbacks,
{
    fn dispatch(
        &mut self,
        node: &mut Node<MAX_EVENTS>,
        mti: Mti,
        source_alias: Alias,
        payload: &[u8],
    ) -> DispatchOutcome {
        match self.datagram.dispatch(node, mti, source_alias, payload) {
            DispatchOutcome::Unhandled => self.nodeinfo.dispatch(node, mti, source_alias, payload),
            other => other,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use openlcb_core::ids::NodeId;

    #[derive(Clone)]
    struct FakeIdentity;

    impl NodeIdentity for FakeIdentity {
        fn snip(&self) -> &[u8] {
            b"\x04ACME\x00Widget\x00A\x00B\x00\x01Name\x00Desc\x00"
        }

        fn acdi_manufacturer(&self) -> &[u8] {
            b"\x04ACME\x00Widget\x00A\x00B\x00"
        }

        fn cdi(&self) -> &[u8] {
            b"<cdi/>"
        }
    }

    struct FakeHost;

    impl HostCallbacks for FakeHost {
        fn config_memory_highest_address(&self, _node_id: NodeId) -> u32 {
            255
        }

        fn config_memory_read(&mut self, _node_id: NodeId, _address: u32, out: &mut [u8]) -> Result<(), openlcb_core::error::ErrorCode> {
            out.fill(0);
            Ok(())
        }

        fn config_memory_write(&mut self, _node_id: NodeId, _address: u32, _data: &[u8]) -> Result<(), openlcb_core::error::ErrorCode> {
            Ok(())
        }

        fn acdi_user_highest_address(&self, _node_id: NodeId) -> u32 {
            63
        }

        fn acdi_user_read(&mut self, _node_id: NodeId, _address: u32, out: &mut [u8]) -> Result<(), openlcb_core::error::ErrorCode> {
            out.fill(0);
            Ok(())
        }

        fn acdi_user_write(&mut self, _node_id: NodeId, _address: u32, _data: &[u8]) -> Result<(), openlcb_core::error::ErrorCode> {
            Ok(())
        }

        fn reboot(&mut self, _node_id: NodeId) {}
        fn configuration_memory_factory_reset(&mut self, _node_id: NodeId) {}
    }

    #[test]
    fn dispatches_a_nodeinfo_message_through_the_fallback_path() {
        let mut services = Services::new(FakeIdentity, FakeHost);
        let mut node: Node<4> = Node::new(NodeId::from_u64(1));
        let outcome = services.dispatch(&mut node, Mti::VerifyNodeIdGlobal, Alias::new(1), &[]);
        assert!(matches!(outcome, DispatchOutcome::Reply(_)));
    }

    #[test]
    fn dispatches_a_datagram_message_through_the_primary_path() {
        let mut services = Services::new(FakeIdentity, FakeHost);
        let mut node: Node<4> = Node::new(NodeId::from_u64(1));
        let outcome = services.dispatch(&mut node, Mti::Datagram, Alias::new(1), &[0x20, 0xA8]);
        match outcome {
            DispatchOutcome::Reply(reply) => assert_eq!(reply.mti, Mti::DatagramReceivedOk),
            other => panic!("expected a reply, got {other:?}"),
        }
    }
}
