// crates/clipdesk-ui/src/modules/mod.rs
//
// Tab registry. To add a new tab:
//   1. Create modules/mytab.rs implementing EditorModule
//   2. Add `pub mod mytab;` below
//   3. Add a field and a match arm in app.rs

pub mod clip_tab;
pub mod convert_tab;
pub mod merge_tab;
pub mod notice;
pub mod widgets;

use clipdesk_core::commands::EditorCommand;
use clipdesk_core::state::EditorState;
use clipdesk_media::OperationController;
use egui::Ui;

/// Every tab implements this trait.
/// Tabs read state, emit commands; they never mutate state directly.
pub trait EditorModule {
    fn name(&self) -> &str;
    fn ui(
        &mut self,
        ui:    &mut Ui,
        state: &EditorState,
        run:   &OperationController,
        cmd:   &mut Vec<EditorCommand>,
    );
}
