//! Loop device management.
//!
//! - `MinorAllocator` - picks and reserves `loop<N>` minors by scanning the device directory
//! - `DeviceBinder` - node creation, losetup bind/unbind, label lookup
//! - `LoopBinder` - host implementation of `DeviceBinder`

mod allocator;
mod binder;

pub use allocator::{MinorAllocator, ReservedNode};
pub use binder::{DeviceBinder, LoopBinder, parse_label_lookup};
