//! loopvol shared - common types for the volume library and its CLI
//!
//! This crate contains the error type, loop-device constants and the
//! backing-store layout used by both `loopvol` and `loopvol-cli`.

pub mod constants;
pub mod errors;
pub mod layout;

pub use errors::{LoopvolError, LoopvolResult};
pub use layout::VolumeLayout;
