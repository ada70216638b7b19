//! Node and NodePool (§3 Data Model "Node").

use openlcb_core::event::{EventId, EventRange};
use openlcb_core::flags::NodeFlags;
use openlcb_core::ids::{Alias, NodeId};
use openlcb_core::lfsr::AliasSeed;

use crate::buffer::BufferHandle;

/// The CAN login / OpenLCB login state machine's run state, threaded
/// through one tick at a time by the main dispatcher (§4.4, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunState {
    Init,
    GenerateSeed,
    GenerateAlias,
    LoadCheckId07,
    LoadCheckId06,
    LoadCheckId05,
    LoadCheckId04,
    Wait200Ms,
    LoadReserveId,
    LoadAliasMapDefinition,
    LoadInitializationComplete,
    LoadProducerEvents,
    LoadConsumerEvents,
    Run,
}

/// Enumerator cursor over a node's producer or consumer event list (§4.8,
/// and the range-then-discrete resolution in SPEC_FULL.md §13).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventCursor {
    Range(usize),
    Discrete(usize),
    Done,
}

impl Default for EventCursor {
    fn default() -> Self {
        EventCursor::Range(0)
    }
}

/// One local virtual node (§3 Data Model "Node").
///
/// Event lists and static parameters (SNIP strings, PIP bitmap, CDI/FDI
/// bytes) are supplied by the embedding application through
/// `openlcb-persistence` and `openlcb-svc-nodeinfo`; this struct carries
/// only the protocol-engine state every node needs regardless of what
/// those parameters say.
pub struct Node<const MAX_EVENTS: usize> {
    pub node_id: NodeId,
    pub alias: Alias,
    pub seed: AliasSeed,
    pub run_state: RunState,
    pub flags: NodeFlags,
    pub timer_ticks: u32,

    /// Nonzero (held as `Some`) while a configuration-memory write lock is
    /// held by some other node.
    pub owner_node: Option<NodeId>,

    /// The datagram this node is waiting on a reply for, if any (§4.9).
    pub last_received_datagram: Option<BufferHandle>,
    pub datagram_age_ticks: u32,

    pub producer_ranges: heapless::Vec<EventRange, MAX_EVENTS>,
    pub producer_events: heapless::Vec<EventId, MAX_EVENTS>,
    pub consumer_ranges: heapless::Vec<EventRange, MAX_EVENTS>,
    pub consumer_events: heapless::Vec<EventId, MAX_EVENTS>,

    pub producer_cursor: EventCursor,
    pub consumer_cursor: EventCursor,
}

impl<const MAX_EVENTS: usize> Node<MAX_EVENTS> {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            alias: Alias::INVALID,
            seed: AliasSeed::from_node_id(node_id),
            run_state: RunState::Init,
            flags: NodeFlags::empty(),
            timer_ticks: 0,
            owner_node: None,
            last_received_datagram: None,
            datagram_age_ticks: 0,
            producer_ranges: heapless::Vec::new(),
            producer_events: heapless::Vec::new(),
            consumer_ranges: heapless::Vec::new(),
            consumer_events: heapless::Vec::new(),
            producer_cursor: EventCursor::default(),
            consumer_cursor: EventCursor::default(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.flags.contains(NodeFlags::INITIALIZED)
    }

    /// Whether this node's configuration memory is locked by some other
    /// node's write session (§4.10 "lock").
    pub fn is_locked_by_other(&self, requester: NodeId) -> bool {
        matches!(self.owner_node, Some(owner) if owner != requester)
    }
}

/// Fixed set of local virtual nodes hosted by this protocol engine.
pub struct NodePool<const MAX_NODES: usize, const MAX_EVENTS: usize> {
    nodes: heapless::Vec<Node<MAX_EVENTS>, MAX_NODES>,
}

impl<const MAX_NODES: usize, const MAX_EVENTS: usize> Default for NodePool<MAX_NODES, MAX_EVENTS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_NODES: usize, const MAX_EVENTS: usize> NodePool<MAX_NODES, MAX_EVENTS> {
    pub fn new() -> Self {
        Self { nodes: heapless::Vec::new() }
    }

    pub fn add(&mut self, node_id: NodeId) -> Result<&mut Node<MAX_EVENTS>, ()> {
        self.nodes.push(Node::new(node_id)).map_err(|_| ())?;
        Ok(self.nodes.last_mut().unwrap())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node<MAX_EVENTS>> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node<MAX_EVENTS>> {
        self.nodes.iter_mut()
    }

    pub fn by_alias(&self, alias: Alias) -> Option<&Node<MAX_EVENTS>> {
        self.nodes.iter().find(|n| n.alias == alias)
    }

    pub fn by_alias_mut(&mut self, alias: Alias) -> Option<&mut Node<MAX_EVENTS>> {
        self.nodes.iter_mut().find(|n| n.alias == alias)
    }

    pub fn by_node_id_mut(&mut self, node_id: NodeId) -> Option<&mut Node<MAX_EVENTS>> {
        self.nodes.iter_mut().find(|n| n.node_id == node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
