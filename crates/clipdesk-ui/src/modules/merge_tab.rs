// crates/clipdesk-ui/src/modules/merge_tab.rs
//
// MergeTab: ordered list of inputs joined end to end.
//
// Rows are selected by clicking; Remove / Up / Down act on the selection.
// Only checked rows are merged. The container check runs again on Start,
// the hint here is only a preview.

use std::path::Path;

use super::widgets::{pick_videos, run_footer, section};
use super::EditorModule;
use clipdesk_core::commands::EditorCommand;
use clipdesk_core::helpers::paths::merge_output;
use clipdesk_core::helpers::time::format_duration;
use clipdesk_core::media_types::{container_of, UNKNOWN};
use clipdesk_core::state::{EditorState, MergeEntry};
use clipdesk_core::validate::check_same_container;
use clipdesk_media::OperationController;
use egui::{RichText, Ui};
use egui_extras::{Column, TableBuilder};
use rfd::FileDialog;

use crate::helpers::format::{file_label, fit_label};
use crate::theme::{TEXT_DIM, WARNING};

const ROW_HEIGHT: f32 = 22.0;
const NAME_COL_PX: f32 = 260.0;

pub struct MergeTab;

impl EditorModule for MergeTab {
    fn name(&self) -> &str { "Merge" }

    fn ui(
        &mut self,
        ui:    &mut Ui,
        state: &EditorState,
        run:   &OperationController,
        cmd:   &mut Vec<EditorCommand>,
    ) {
        let tab = &state.merge;
        let busy = run.is_busy();

        ui.add_enabled_ui(!busy, |ui| {
            section(ui, "INPUTS", |ui| {
                ui.horizontal(|ui| {
                    if ui.button("➕ Add files…").clicked() {
                        if let Some(paths) = pick_videos(state.prefs.last_dir.as_deref()) {
                            cmd.push(EditorCommand::AddMergeInputs(paths));
                        }
                    }
                    let selected = tab.selected;
                    if let Some(id) = selected {
                        let pos = tab.entries.iter().position(|e| e.id == id);
                        let last = tab.entries.len().saturating_sub(1);
                        if ui.button("🗑 Remove").clicked() {
                            cmd.push(EditorCommand::RemoveMergeInput(id));
                        }
                        if ui.add_enabled(pos.is_some_and(|i| i > 0), egui::Button::new("▲ Up")).clicked() {
                            cmd.push(EditorCommand::MoveMergeInput { id, up: true });
                        }
                        if ui.add_enabled(pos.is_some_and(|i| i < last), egui::Button::new("▼ Down")).clicked() {
                            cmd.push(EditorCommand::MoveMergeInput { id, up: false });
                        }
                    }
                });
                ui.add_space(4.0);

                if tab.entries.is_empty() {
                    ui.label(RichText::new("Add or drop two or more videos to join them in order.").color(TEXT_DIM));
                } else {
                    entries_table(ui, &tab.entries, tab.selected, cmd);
                    ui.add_space(4.0);
                    let included = tab.included_paths();
                    ui.label(RichText::new(format!(
                        "{} of {} files checked · total {}",
                        included.len(),
                        tab.entries.len(),
                        format_duration(tab.total_secs()),
                    )).color(TEXT_DIM));
                    if let Err(e) = check_same_container(&included) {
                        ui.label(RichText::new(format!("⚠ {e}")).color(WARNING));
                    }
                }
            });

            ui.add_space(6.0);
            section(ui, "OUTPUT", |ui| output_ui(ui, state, cmd));
        });

        run_footer(ui, run, cmd);
    }
}

fn entries_table(
    ui:       &mut Ui,
    entries:  &[MergeEntry],
    selected: Option<uuid::Uuid>,
    cmd:      &mut Vec<EditorCommand>,
) {
    TableBuilder::new(ui)
        .id_salt("merge_inputs")
        .striped(true)
        .sense(egui::Sense::click())
        .max_scroll_height(220.0)
        .column(Column::exact(24.0))
        .column(Column::exact(28.0))
        .column(Column::remainder().at_least(120.0).clip(true))
        .column(Column::auto().at_least(48.0))
        .column(Column::auto().at_least(64.0))
        .column(Column::auto().at_least(80.0))
        .header(ROW_HEIGHT, |mut header| {
            for title in ["", "#", "File", "Type", "Length", "Size"] {
                header.col(|ui| { ui.strong(title); });
            }
        })
        .body(|mut body| {
            for (i, entry) in entries.iter().enumerate() {
                body.row(ROW_HEIGHT, |mut row| {
                    row.set_selected(selected == Some(entry.id));
                    let desc = entry.descriptor();

                    row.col(|ui| {
                        let mut included = entry.included;
                        if ui.checkbox(&mut included, "").on_hover_text("Include in merge").changed() {
                            cmd.push(EditorCommand::SetMergeIncluded { id: entry.id, included });
                        }
                    });
                    row.col(|ui| { ui.label(format!("{}", i + 1)); });
                    row.col(|ui| {
                        ui.label(fit_label(&file_label(&entry.path), NAME_COL_PX))
                            .on_hover_text(entry.path.display().to_string());
                    });
                    row.col(|ui| {
                        ui.label(container_of(&entry.path).unwrap_or_else(|| UNKNOWN.into()));
                    });
                    row.col(|ui| match (&entry.probe, desc) {
                        (None, _)          => { ui.spinner(); }
                        (_, Some(d))       => { ui.label(format_duration(d.duration_seconds)); }
                        (Some(Err(e)), _)  => { ui.label(UNKNOWN).on_hover_text(e.as_str()); }
                        (Some(Ok(_)), None) => { ui.label(UNKNOWN); }
                    });
                    row.col(|ui| {
                        ui.label(desc.map_or_else(|| UNKNOWN.to_string(), |d| d.resolution_label()));
                    });

                    if row.response().clicked() {
                        let next = (selected != Some(entry.id)).then_some(entry.id);
                        cmd.push(EditorCommand::SelectMergeInput(next));
                    }
                });
            }
        });
}

fn output_ui(ui: &mut Ui, state: &EditorState, cmd: &mut Vec<EditorCommand>) {
    let tab = &state.merge;
    let mut dir = tab.output_dir.clone();
    let mut name = tab.output_name.clone();
    let mut changed = false;

    egui::Grid::new("merge_output_grid")
        .num_columns(2)
        .spacing([12.0, 6.0])
        .show(ui, |ui| {
            ui.label("Folder");
            ui.horizontal(|ui| {
                changed |= ui.add(
                    egui::TextEdit::singleline(&mut dir).desired_width(ui.available_width() - 90.0),
                ).changed();
                if ui.button("Browse…").clicked() {
                    let mut dialog = FileDialog::new().set_title("Output folder");
                    if Path::new(&dir).is_dir() {
                        dialog = dialog.set_directory(&dir);
                    }
                    if let Some(picked) = dialog.pick_folder() {
                        dir = picked.to_string_lossy().into_owned();
                        changed = true;
                    }
                }
            });
            ui.end_row();

            ui.label("File name");
            changed |= ui.add(egui::TextEdit::singleline(&mut name).hint_text("e.g. joined")).changed();
            ui.end_row();
        });

    if changed {
        cmd.push(EditorCommand::SetMergeOutput { dir: dir.clone(), name: name.clone() });
    }

    if !dir.trim().is_empty() && !name.trim().is_empty() {
        let target = merge_output(Path::new(dir.trim()), name.trim());
        ui.label(RichText::new(format!("→ {}", target.display())).small().color(TEXT_DIM));
    }
}
