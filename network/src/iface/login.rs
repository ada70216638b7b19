//! CAN login state machine (§4.4) and OpenLCB login state machine (§4.8).
//!
//! Ported from the reference's ten `state_*` handlers in
//! `can_login_message_handler.c`. Each call to [`step`] advances the node
//! by one main-loop tick and returns at most one frame's worth of work for
//! the caller to transmit — the dispatcher drives this every tick the same
//! way the reference's main loop calls the state handler table.

use heapless::Vec;
use openlcb_core::config::CID_TO_RID_DELAY_TICKS;
use openlcb_core::event::EventRange;
use openlcb_core::flags::NodeFlags;
use openlcb_core::ids::Alias;
use openlcb_core::lfsr::next_alias;
use openlcb_core::mti::Mti;

use crate::alias::AliasTable;
use crate::node::{EventCursor, Node, RunState};

const RESERVED_BIT: u32 = 1 << 28;

/// CID frame numbers, per S-9.7.2: each carries a different 12-bit slice of
/// the 48-bit NodeID alongside the candidate alias.
const CID7: u32 = 0x7;
const CID6: u32 = 0x6;
const CID5: u32 = 0x5;
const CID4: u32 = 0x4;
/// Reserve ID frame: announces the alias is moving from "tentative" to
/// "reserved", 200ms (by default) after the last CID frame.
const RID: u32 = 0x0700;
/// Alias Map Definition: binds the now-permitted alias to its NodeID.
const AMD: u32 = 0x0701;

fn node_id_slice(node_id: u64, shift: u32) -> u32 {
    ((node_id >> shift) & 0xFFF) as u32
}

/// One unit of work produced by [`step`]: either a CAN control/login frame
/// to transmit, or an OpenLCB message to transmit during the post-login
/// enumeration of this node's events.
pub enum Emission {
    /// Emit a CAN identifier with no payload (a control frame).
    ControlFrame { identifier: u32 },
    /// Emit a control frame whose 6-byte payload is the node's NodeID (AMD).
    ControlFrameWithNodeId { identifier: u32 },
    /// Emit an OpenLCB message with no destination.
    Message { mti: Mti },
    /// Emit an OpenLCB message carrying an event range.
    MessageWithRange { mti: Mti, range: EventRange },
    /// Emit an OpenLCB message carrying a single event.
    MessageWithEvent { mti: Mti, event: openlcb_core::event::EventId },
}

/// Advance one node's login/run state by one tick.
///
/// `alias_table` is shared across all nodes hosted by this engine: CID
/// frames must reserve the candidate alias so a sibling node's own login
/// doesn't pick the same one, and the RX path marks `is_duplicate` if
/// another bus participant answers a CID with a frame using that alias.
pub fn step<const MAX_EVENTS: usize, const ALIAS_CAP: usize>(
    node: &mut Node<MAX_EVENTS>,
    alias_table: &mut AliasTable<ALIAS_CAP>,
) -> Option<Emission> {
    match node.run_state {
        RunState::Init => {
            node.run_state = RunState::GenerateSeed;
            None
        }
        RunState::GenerateSeed => {
            node.seed = openlcb_core::lfsr::AliasSeed::from_node_id(node.node_id);
            node.run_state = RunState::GenerateAlias;
            None
        }
        RunState::GenerateAlias => {
            let alias = next_alias(&mut node.seed);
            if !alias.is_valid() {
                // 0x000 must be regenerated (§4.4); stay in this state.
                return None;
            }
            if alias_table.insert(alias, node.node_id).is_err() {
                // Either already reserved by a sibling or the table is
                // full; try another candidate next tick.
                return None;
            }
            node.alias = alias;
            node.run_state = RunState::LoadCheckId07;
            None
        }
        RunState::LoadCheckId07 => {
            node.run_state = RunState::LoadCheckId06;
            emit_cid(node, CID7, 36)
        }
        RunState::LoadCheckId06 => {
            node.run_state = RunState::LoadCheckId05;
            emit_cid(node, CID6, 24)
        }
        RunState::LoadCheckId05 => {
            node.run_state = RunState::LoadCheckId04;
            emit_cid(node, CID5, 12)
        }
        RunState::LoadCheckId04 => {
            node.timer_ticks = 0;
            node.run_state = RunState::Wait200Ms;
            emit_cid(node, CID4, 0)
        }
        RunState::Wait200Ms => {
            node.timer_ticks += 1;
            if node.timer_ticks > CID_TO_RID_DELAY_TICKS {
                if alias_table.is_duplicate(node.alias) {
                    // Another node answered one of our CID frames with a
                    // frame of its own using this alias: start over.
                    alias_table.remove(node.alias);
                    node.alias = Alias::INVALID;
                    node.run_state = RunState::GenerateAlias;
                } else {
                    node.run_state = RunState::LoadReserveId;
                }
            }
            None
        }
        RunState::LoadReserveId => {
            node.run_state = RunState::LoadAliasMapDefinition;
            Some(Emission::ControlFrame {
                identifier: RESERVED_BIT | RID | node.alias.value() as u32,
            })
        }
        RunState::LoadAliasMapDefinition => {
            alias_table.mark_permitted(node.alias);
            node.flags.insert(NodeFlags::PERMITTED);
            node.run_state = RunState::LoadInitializationComplete;
            Some(Emission::ControlFrameWithNodeId {
                identifier: RESERVED_BIT | AMD | node.alias.value() as u32,
            })
        }
        RunState::LoadInitializationComplete => {
            node.flags.insert(NodeFlags::INITIALIZED);
            node.run_state = RunState::LoadProducerEvents;
            Some(Emission::Message {
                mti: Mti::InitializationComplete,
            })
        }
        RunState::LoadProducerEvents => {
            let outcome = step_enumerate(
                &node.producer_ranges,
                &node.producer_events,
                &mut node.producer_cursor,
                Mti::ProducerRangeIdentified,
                Mti::ProducerIdentifiedUnknown,
            );
            if outcome.is_none() {
                node.run_state = RunState::LoadConsumerEvents;
            }
            outcome
        }
        RunState::LoadConsumerEvents => {
            let outcome = step_enumerate(
                &node.consumer_ranges,
                &node.consumer_events,
                &mut node.consumer_cursor,
                Mti::ConsumerRangeIdentified,
                Mti::ConsumerIdentifiedUnknown,
            );
            if outcome.is_none() {
                node.run_state = RunState::Run;
            }
            outcome
        }
        RunState::Run => {
            if alias_table.is_duplicate(node.alias) {
                // A duplicate claim can still surface after AMD (the RX
                // path only learns of it on the next poll): back out and
                // re-login from scratch rather than keep running under a
                // contested alias (SPEC_FULL.md §13).
                alias_table.remove(node.alias);
                node.alias = Alias::INVALID;
                node.flags.remove(NodeFlags::PERMITTED | NodeFlags::INITIALIZED);
                node.run_state = RunState::GenerateSeed;
            }
            None
        }
    }
}

fn emit_cid<const MAX_EVENTS: usize>(node: &Node<MAX_EVENTS>, cid: u32, shift: u32) -> Option<Emission> {
    let slice = node_id_slice(node.node_id.as_u64(), shift);
    let identifier = RESERVED_BIT | (cid << 24) | (slice << 12) | node.alias.value() as u32;
    Some(Emission::ControlFrame { identifier })
}

/// Ranges-then-discretes enumeration logic shared by §4.8's
/// LOAD_PRODUCER_EVENTS / LOAD_CONSUMER_EVENTS states (SPEC_FULL.md §13):
/// emit one Range Identified per range, then one Identified per discrete
/// event, one message per tick, re-entering via `enumerate` until both
/// cursors exhaust (`None` signals "done, advance to the next state").
fn step_enumerate<const N: usize>(
    ranges: &Vec<EventRange, N>,
    events: &Vec<openlcb_core::event::EventId, N>,
    cursor: &mut EventCursor,
    range_mti: Mti,
    discrete_mti: Mti,
) -> Option<Emission> {
    loop {
        match *cursor {
            EventCursor::Range(i) => {
                if i >= ranges.len() {
                    *cursor = EventCursor::Discrete(0);
                    continue;
                }
                *cursor = EventCursor::Range(i + 1);
                return Some(Emission::MessageWithRange { mti: range_mti, range: ranges[i] });
            }
            EventCursor::Discrete(i) => {
                if i >= events.len() {
                    *cursor = EventCursor::Done;
                    continue;
                }
                *cursor = EventCursor::Discrete(i + 1);
                return Some(Emission::MessageWithEvent { mti: discrete_mti, event: events[i] });
            }
            EventCursor::Done => {
                *cursor = EventCursor::Range(0);
                return None;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use openlcb_core::ids::NodeId;

    #[test]
    fn login_progresses_from_init_to_generate_alias() {
        let mut node: Node<4> = Node::new(NodeId::from_u64(0x0102_0304_0506));
        let mut table: AliasTable<4> = AliasTable::new();

        assert!(step(&mut node, &mut table).is_none());
        assert_eq!(node.run_state, RunState::GenerateSeed);

        assert!(step(&mut node, &mut table).is_none());
        assert_eq!(node.run_state, RunState::GenerateAlias);

        step(&mut node, &mut table);
        assert_eq!(node.run_state, RunState::LoadCheckId07);
        assert!(node.alias.is_valid());
    }

    #[test]
    fn late_duplicate_at_run_restarts_login() {
        let mut node: Node<4> = Node::new(NodeId::from_u64(0x0102_0304_0506));
        let mut table: AliasTable<4> = AliasTable::new();
        let original_alias = Alias::new(0x222);
        node.run_state = RunState::Run;
        node.alias = original_alias;
        node.flags.insert(NodeFlags::PERMITTED | NodeFlags::INITIALIZED);
        table.insert(original_alias, node.node_id).unwrap();
        table.mark_duplicate(original_alias);

        assert!(step(&mut node, &mut table).is_none());

        assert_eq!(node.run_state, RunState::GenerateSeed);
        assert_eq!(node.alias, Alias::INVALID);
        assert!(!node.flags.contains(NodeFlags::PERMITTED));
        assert!(!node.flags.contains(NodeFlags::INITIALIZED));
        assert!(!table.contains(original_alias));
    }

    #[test]
    fn cid_frames_set_the_reserved_bit() {
        let mut node: Node<4> = Node::new(NodeId::from_u64(0x0102_0304_0506));
        let mut table: AliasTable<4> = AliasTable::new();
        step(&mut node, &mut table);
        step(&mut node, &mut table);
        step(&mut node, &mut table);

        match step(&mut node, &mut table) {
            Some(Emission::ControlFrame { identifier }) => {
                assert_ne!(identifier & RESERVED_BIT, 0);
            }
            _ => panic!("expected a CID control frame"),
        }
    }
}
