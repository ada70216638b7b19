//! Ties the buffer store, node pool, alias table, interface and protocol
//! services into one struct an application drives from its main loop
//! (the "node" crate described in this workspace's crate layout).
//!
//! Replaces the teacher's `Module<UI, C, S>`: CBUS's push-button FLiM/SLiM
//! mode switch and LED-indicator UI (`vlcb-ui`/`embedded-simple-ui`) have
//! no OpenLCB equivalent and are dropped rather than ported. Likewise
//! `embedded-time`'s wall-clock `Instant<C>` is dropped in favor of the
//! tick-counter convention `openlcb_network::iface::login` already uses
//! internally: the host calls [`OpenlcbNode::poll`] once per
//! [`openlcb_core::config::TIMER_TICK_MS`], it does not read a `Clock`.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

use openlcb_core::ids::NodeId;
use openlcb_network::alias::AliasTable;
use openlcb_network::iface::{Dispatch, Interface, PollContext};
use openlcb_network::node::{Node, NodePool};
use openlcb_network::phy::{Device, DeviceCapabilities};

/// A fully wired OpenLCB node, or a group of virtual nodes sharing one CAN
/// interface (§3 Data Model allows more than one `Node` per physical
/// device): buffer store, reassembly list, priority FIFO, alias table,
/// node pool and protocol services, every capacity fixed at compile time.
pub struct OpenlcbNode<
    D: Device,
    S,
    const MAX_NODES: usize,
    const MAX_EVENTS: usize,
    const ALIAS_CAP: usize,
    const BASIC_CAP: usize,
    const DATAGRAM_CAP: usize,
    const SNIP_CAP: usize,
    const LIST_CAP: usize,
    const FIFO_CAP: usize,
> {
    interface: Interface<D>,
    nodes: NodePool<MAX_NODES, MAX_EVENTS>,
    aliases: AliasTable<ALIAS_CAP>,
    ctx: PollContext<BASIC_CAP, DATAGRAM_CAP, SNIP_CAP, LIST_CAP, FIFO_CAP>,
    services: S,
}

impl<
        D: Device,
        S: Dispatch<MAX_EVENTS>,
        const MAX_NODES: usize,
        const MAX_EVENTS: usize,
        const ALIAS_CAP: usize,
        const BASIC_CAP: usize,
        const DATAGRAM_CAP: usize,
        const SNIP_CAP: usize,
        const LIST_CAP: usize,
        const FIFO_CAP: usize,
    > OpenlcbNode<D, S, MAX_NODES, MAX_EVENTS, ALIAS_CAP, BASIC_CAP, DATAGRAM_CAP, SNIP_CAP, LIST_CAP, FIFO_CAP>
{
    pub fn new(device: D, services: S) -> Self {
        Self {
            interface: Interface::new(device),
            nodes: NodePool::new(),
            aliases: AliasTable::new(),
            ctx: PollContext::default(),
            services,
        }
    }

    /// Host one more virtual node on this interface. It enters the CAN
    /// login state machine from [`RunState::Init`](openlcb_network::node::RunState::Init)
    /// on the next [`poll`](Self::poll); returns the new node so the
    /// caller can seed its producer/consumer event lists before that
    /// first poll.
    pub fn add_node(&mut self, node_id: NodeId) -> Result<&mut Node<MAX_EVENTS>, ()> {
        self.nodes.add(node_id)
    }

    pub fn node(&self, node_id: NodeId) -> Option<&Node<MAX_EVENTS>> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node<MAX_EVENTS>> {
        self.nodes.by_node_id_mut(node_id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn services(&self) -> &S {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut S {
        &mut self.services
    }

    pub fn device_capabilities(&self) -> DeviceCapabilities {
        self.interface.device_capabilities()
    }

    /// Run one tick: advance every hosted node's login/run state machine,
    /// drain and reassemble whatever the CAN device has received, and
    /// dispatch fully reassembled messages to `services`. Call this
    /// roughly every [`openlcb_core::config::TIMER_TICK_MS`].
    pub fn poll(&mut self) {
        self.interface.poll(&mut self.nodes, &mut self.aliases, &mut self.ctx, &mut self.services);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use openlcb_core::ids::Alias;
    use openlcb_core::mti::Mti;
    use openlcb_core::reply::DispatchOutcome;
    use openlcb_network::phy::{RxToken, TxToken};

    struct NullDevice;

    struct NullTxToken;

    impl Clone for NullTxToken {
        fn clone(&self) -> Self {
            NullTxToken
        }
    }

    impl TxToken for NullTxToken {
        fn consume<R, F>(self, len: usize, f: F) -> R
        where
            F: FnOnce(&mut [u8]) -> R,
        {
            let mut buf = heapless::Vec::<u8, 16>::new();
            buf.resize_default(len).unwrap();
            f(&mut buf)
        }
    }

    struct NullRxToken;

    impl RxToken for NullRxToken {
        fn consume<R, F>(self, f: F) -> R
        where
            F: FnOnce(&mut [u8]) -> R,
        {
            let mut buf: [u8; 0] = [];
            f(&mut buf)
        }
    }

    impl Device for NullDevice {
        type RxToken<'a> = NullRxToken;
        type TxToken<'a> = NullTxToken;

        fn receive(&mut self) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
            None
        }

        fn transmit(&mut self) -> Option<Self::TxToken<'_>> {
            Some(NullTxToken)
        }

        fn capabilities(&self) -> DeviceCapabilities {
            DeviceCapabilities::default()
        }
    }

    struct NoopServices;

    impl<const MAX_EVENTS: usize> Dispatch<MAX_EVENTS> for NoopServices {
        fn dispatch(
            &mut self,
            _node: &mut Node<MAX_EVENTS>,
            _mti: Mti,
            _source_alias: Alias,
            _payload: &[u8],
        ) -> DispatchOutcome {
            DispatchOutcome::Unhandled
        }
    }

    type TestNode = OpenlcbNode<NullDevice, NoopServices, 4, 8, 4, 2, 2, 2, 2, 4>;

    #[test]
    fn new_node_has_no_hosted_nodes() {
        let node: TestNode = OpenlcbNode::new(NullDevice, NoopServices);
        assert_eq!(node.node_count(), 0);
    }

    #[test]
    fn add_node_registers_it_for_login() {
        let mut node: TestNode = OpenlcbNode::new(NullDevice, NoopServices);
        node.add_node(NodeId::from_u64(42)).unwrap();
        assert_eq!(node.node_count(), 1);
        assert!(node.node(NodeId::from_u64(42)).is_some());
    }

    #[test]
    fn poll_advances_the_login_state_machine() {
        let mut node: TestNode = OpenlcbNode::new(NullDevice, NoopServices);
        node.add_node(NodeId::from_u64(42)).unwrap();
        for _ in 0..4 {
            node.poll();
        }
        let hosted = node.node(NodeId::from_u64(42)).unwrap();
        assert_ne!(hosted.run_state, openlcb_network::node::RunState::Init);
    }
}
