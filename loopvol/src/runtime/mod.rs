pub mod lock;
pub mod options;

pub use lock::OperationLock;
pub use options::{LoopvolOptions, ToolPaths};
