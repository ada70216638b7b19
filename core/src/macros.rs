// Tracing macros in the smoltcp lineage this workspace is built on: compiled
// to `defmt` under the `defmt` feature, to `log` under the `log` feature,
// and to nothing otherwise. `openlcb-network` carries its own private copy
// for its own call sites; these are the same pattern exported so the
// `services/*` crates (which depend on `openlcb-core` only) can trace
// without depending on the network crate.
#[macro_export]
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

#[macro_export]
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

/// Generic macros for applying mask and inserting a value
#[macro_export]
macro_rules! mask_and_insert_value {
    ($orig:expr, $value:expr, $mask:expr, <<, $shift:expr, $T:ty) => {{
        let orig_cast: $T = $orig.into();
        let value_cast: $T = $value.into();
        let mask_cast: $T = $mask.into();
        ((orig_cast & !(mask_cast << $shift)) | ((value_cast & mask_cast) << $shift))
    }};
    ($orig:expr, $value:expr, $mask:expr, >>, $shift:expr, $T:ty) => {{
        let orig_cast: $T = $orig.into();
        let value_cast: $T = $value.into();
        let mask_cast: $T = $mask.into();
        ((orig_cast & !(mask_cast >> $shift)) | ((value_cast & mask_cast) >> $shift))
    }};
    ($orig:expr, $value:expr, $mask:expr, $T:ty) => {{
        let orig_cast: $T = $orig.into();
        let value_cast: $T = $value.into();
        let mask_cast: $T = $mask.into();
        ((orig_cast & !mask_cast) | (value_cast & mask_cast))
    }};
}
