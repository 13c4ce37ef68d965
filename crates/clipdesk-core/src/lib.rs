// crates/clipdesk-core/src/lib.rs
//
// Plain data shared by clipdesk-media and clipdesk-ui.
// No egui, no ffmpeg; anything in here must be testable without either.

pub mod commands;
pub mod encoding;
pub mod helpers;
pub mod media_types;
pub mod operation;
pub mod state;
pub mod timeline;
pub mod validate;
