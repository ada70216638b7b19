//! Compile-time tunables for the protocol engine.
//!
//! Mirrors the teacher's `vlcb_network::config` module: constants that the
//! original C reference hard-codes as `#define`s are collected here so a
//! downstream crate can see and, if it forks this one, override them.

/// Minimum delay between the fourth CID frame and the RID frame (S-9.7.2).
pub const CID_TO_RID_DELAY_MS: u32 = 200;

/// Tick period the host's 100 ms timer is expected to fire at.
pub const TIMER_TICK_MS: u32 = 100;

/// Number of [`TIMER_TICK_MS`] ticks that must elapse before RID is sent,
/// i.e. `CID_TO_RID_DELAY_MS / TIMER_TICK_MS`.
pub const CID_TO_RID_DELAY_TICKS: u32 = CID_TO_RID_DELAY_MS / TIMER_TICK_MS;

/// Default timeout before a node gives up waiting for a reply to a
/// datagram it sent (§9 open question, resolved per SPEC_FULL.md §13).
pub const DATAGRAM_RESEND_TIMEOUT_MS: u32 = 3_000;

/// Maximum payload of a single datagram (S-9.7.3).
pub const DATAGRAM_MAX_PAYLOAD: usize = 72;

/// Maximum payload of a SNIP reply buffer.
pub const SNIP_MAX_PAYLOAD: usize = 253;

/// Maximum payload of a basic (non-datagram, non-SNIP) OpenLCB message.
pub const BASIC_MAX_PAYLOAD: usize = 8;

/// Maximum number of bytes memory-config read/write may move per datagram,
/// per §4.10 validation rules.
pub const MEMCONFIG_MAX_COUNT: u8 = 64;
