// crates/clipdesk-core/src/commands.rs
//
// Every user action in ClipDesk is expressed as an EditorCommand.
// Tabs emit these; app.rs processes them after the UI pass.
// Adding a new action = add a variant here + one match arm in app.rs.

use std::path::PathBuf;
use uuid::Uuid;

use crate::operation::OperationKind;
use crate::state::ConvertOptions;

#[derive(Debug, Clone, PartialEq)]
pub enum EditorCommand {
    // ── Navigation ────────────────────────────────────────────────────────────
    SelectTab(OperationKind),

    // ── Inputs ────────────────────────────────────────────────────────────────
    /// Replace the Clip tab's source file and re-probe it.
    LoadClipInput(PathBuf),
    /// Replace the Convert tab's source file and re-probe it.
    LoadConvertInput(PathBuf),
    /// Append files to the Merge list (non-video paths are dropped).
    AddMergeInputs(Vec<PathBuf>),
    RemoveMergeInput(Uuid),
    /// Swap an entry with its neighbour. `up = true` moves it earlier.
    MoveMergeInput { id: Uuid, up: bool },
    SelectMergeInput(Option<Uuid>),
    /// Check or uncheck a Merge row; unchecked rows are skipped by Start.
    SetMergeIncluded { id: Uuid, included: bool },

    // ── Clip preview ──────────────────────────────────────────────────────────
    /// Move the playhead; clamped to the file's duration.
    SeekClipPreview(f64),
    PlayClipPreview,
    PauseClipPreview,
    /// Pause and rewind to the start of the file.
    StopClipPreview,
    SetClipStartAtPlayhead,
    SetClipEndAtPlayhead,
    ResetClipRange,

    // ── Form fields ───────────────────────────────────────────────────────────
    /// `end_secs = None` keeps the range open to the end of the file.
    SetClipRange { start_secs: f64, end_secs: Option<f64> },
    /// Output path for the Clip or Convert tab.
    SetOutput { tab: OperationKind, path: String },
    SetMergeOutput { dir: String, name: String },
    UpdateConvertOptions(ConvertOptions),

    // ── Operations ────────────────────────────────────────────────────────────
    /// Validate the tab's draft and, if valid, start its worker.
    Start(OperationKind),
    /// Ask the tab's running worker to stop after the current frame.
    Cancel(OperationKind),
    /// Close the success / warning / error card.
    DismissNotice(OperationKind),
}
