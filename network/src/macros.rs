// Tracing macros in the smoltcp lineage this stack is built on: compiled to
// `defmt` under the `defmt` feature, to `log` under the `log` feature, and
// to nothing when neither is enabled. The teacher's crate calls these
// throughout `phy`/`socket`/`iface` but never carries the definitions; this
// fills that gap with the upstream smoltcp pattern those call sites assume.

#![allow(unused_macros)]

macro_rules! net_trace {
    ($($arg:expr),*) => {
        cfg_if::cfg_if! {
            if #[cfg(feature = "defmt")] {
                defmt::trace!($($arg),*)
            } else if #[cfg(feature = "log")] {
                log::trace!($($arg),*)
            } else {
                let _ = ($( &$arg ),*);
            }
        }
    };
}

macro_rules! net_debug {
    ($($arg:expr),*) => {
        cfg_if::cfg_if! {
            if #[cfg(feature = "defmt")] {
                defmt::debug!($($arg),*)
            } else if #[cfg(feature = "log")] {
                log::debug!($($arg),*)
            } else {
                let _ = ($( &$arg ),*);
            }
        }
    };
}
