pub mod attach;
pub mod create;
pub mod detach;
pub mod list;
pub mod rm;
pub mod run;
