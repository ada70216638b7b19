#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

#[cfg(any(test, feature = "alloc"))]
extern crate alloc;

#[macro_use]
mod macros;

pub mod phy;
pub mod wire;

pub mod alias;
pub mod buffer;
pub mod node;

pub mod iface;
