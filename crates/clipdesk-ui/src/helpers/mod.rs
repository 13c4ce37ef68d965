// crates/clipdesk-ui/src/helpers/mod.rs

pub mod env;
pub mod format;
pub mod log;
