//! Buffer store, buffer list, and priority FIFO (§4.1-4.2).
//!
//! Grounded on `openlcb_buffer_list.c`/`nmra_dcc_buffer_store.c` in
//! `original_source/`: three fixed-capacity pools distinguished by the
//! maximum payload a message of that kind can carry, reference-counted so a
//! message can be shared between the inbound FIFO and a node's retry slot
//! without copying.
//!
//! Unlike the teacher's `phy::can::EmbeddedCan`, which reaches for
//! `rclite::Rc<RefCell<_>>` because it only ever wraps one shared device,
//! these pools are plain fixed arrays addressed by handle index — the
//! REDESIGN FLAGS note calls for an explicit context struct rather than
//! file-scope global state, and a handle-indexed array is the `no_std`
//! idiom for that without pulling in a heap allocator.

mod fifo;
mod list;
mod store;

pub use fifo::Fifo;
pub use list::{BufferList, ListKey};
pub use store::{Buffer, BufferHandle, BufferKind, BufferStore};
