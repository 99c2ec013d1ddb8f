//! loopvol - named block volumes on Linux loop devices.
//!
//! A volume is a pre-allocated backing file bound to a `loop<N>` device and
//! formatted with ext4, labelled with the volume name. Nothing is persisted
//! besides the backing files and the filesystem labels:
//!
//! - `store` - backing files under the root directory
//! - `loopdev` - minor allocation, node creation, losetup and label lookup
//! - `format` - ext4 creation
//! - `volume` - lifecycle manager tying the above together
//! - `dispatch` - JSON request front end

pub mod dispatch;
pub mod format;
pub mod loopdev;
pub mod runtime;
pub mod store;
pub mod util;
pub mod volume;

pub use loopvol_shared::errors::{LoopvolError, LoopvolResult};
pub use runtime::options::{LoopvolOptions, ToolPaths};
pub use volume::{CreatedVolume, Volume, VolumeManager};
