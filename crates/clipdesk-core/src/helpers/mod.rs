// crates/clipdesk-core/src/helpers/mod.rs

pub mod paths;
pub mod time;
