// crates/clipdesk-ui/src/modules/widgets.rs
//
// Pieces every tab draws the same way: section frames, the source file row,
// the probe summary line, the output path row and the Start / Cancel footer.

use std::path::{Path, PathBuf};

use clipdesk_core::commands::EditorCommand;
use clipdesk_core::media_types::{describe, VIDEO_EXTENSIONS};
use clipdesk_core::operation::OperationKind;
use clipdesk_core::state::ProbeOutcome;
use clipdesk_media::OperationController;
use egui::{Margin, RichText, Ui};
use rfd::FileDialog;

use crate::helpers::format::middle_ellipsis;
use crate::theme::{ACCENT, BG_2, BORDER, ERROR, TEXT_DIM, TRACK_BG};

const PATH_CHARS: usize = 64;

pub fn section<R>(ui: &mut Ui, title: &str, add_contents: impl FnOnce(&mut Ui) -> R) -> R {
    egui::Frame::new()
        .fill(BG_2)
        .stroke(egui::Stroke::new(1.0, BORDER))
        .corner_radius(egui::CornerRadius::same(4))
        .inner_margin(Margin::same(10))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.label(RichText::new(title).size(12.0).strong().color(TEXT_DIM));
            ui.add_space(2.0);
            add_contents(ui)
        })
        .inner
}

fn video_dialog(last_dir: Option<&Path>) -> FileDialog {
    let dialog = FileDialog::new()
        .add_filter("Video", VIDEO_EXTENSIONS)
        .add_filter("All files", &["*"]);
    match last_dir {
        Some(dir) => dialog.set_directory(dir),
        None      => dialog,
    }
}

pub fn pick_video(last_dir: Option<&Path>) -> Option<PathBuf> {
    video_dialog(last_dir).set_title("Select video").pick_file()
}

pub fn pick_videos(last_dir: Option<&Path>) -> Option<Vec<PathBuf>> {
    video_dialog(last_dir).set_title("Select videos").pick_files()
}

/// "Source" row: current path plus a Browse button. Returns the newly
/// picked file, if any.
pub fn source_row(ui: &mut Ui, input: Option<&Path>, last_dir: Option<&Path>) -> Option<PathBuf> {
    let mut picked = None;
    ui.horizontal(|ui| {
        if ui.button("Browse…").clicked() {
            picked = pick_video(last_dir);
        }
        match input {
            Some(p) => {
                ui.label(middle_ellipsis(p, PATH_CHARS)).on_hover_text(p.display().to_string());
            }
            None => {
                ui.label(RichText::new("No file selected. Drop a video here or browse.").color(TEXT_DIM));
            }
        }
    });
    picked
}

/// Metadata line for a loaded file. A pending probe shows a spinner; a failed
/// one shows "unknown" fields plus the reason.
pub fn probe_line(ui: &mut Ui, input: Option<&Path>, probe: Option<&ProbeOutcome>) {
    if input.is_none() {
        return;
    }
    match probe {
        None => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(RichText::new("Reading file info…").color(TEXT_DIM));
            });
        }
        Some(Ok(d)) => {
            ui.label(describe(Some(d)));
        }
        Some(Err(e)) => {
            ui.label(describe(None));
            ui.label(RichText::new(e).small().color(ERROR));
        }
    }
}

/// Output path text field with a save dialog. `ext` is the extension offered
/// as the dialog filter.
pub fn output_row(
    ui:     &mut Ui,
    kind:   OperationKind,
    output: &str,
    ext:    &str,
    cmd:    &mut Vec<EditorCommand>,
) {
    ui.horizontal(|ui| {
        let mut text = output.to_string();
        let field = egui::TextEdit::singleline(&mut text)
            .hint_text("Output file")
            .desired_width(ui.available_width() - 90.0);
        if ui.add(field).changed() {
            cmd.push(EditorCommand::SetOutput { tab: kind, path: text.clone() });
        }
        if ui.button("Save as…").clicked() {
            let current = Path::new(output);
            let mut dialog = FileDialog::new()
                .set_title("Save output as")
                .add_filter(ext.to_uppercase(), &[ext]);
            if let Some(dir) = current.parent().filter(|d| d.is_dir()) {
                dialog = dialog.set_directory(dir);
            }
            if let Some(name) = current.file_name() {
                dialog = dialog.set_file_name(name.to_string_lossy());
            }
            if let Some(path) = dialog.save_file() {
                cmd.push(EditorCommand::SetOutput {
                    tab:  kind,
                    path: path.to_string_lossy().into_owned(),
                });
            }
        }
    });
}

/// Progress bar while running, then Start or Cancel.
pub fn run_footer(ui: &mut Ui, run: &OperationController, cmd: &mut Vec<EditorCommand>) {
    let kind = run.kind();
    ui.add_space(6.0);

    if let Some(p) = run.progress() {
        let bar = egui::ProgressBar::new(f32::from(p) / 100.0)
            .fill(ACCENT)
            .show_percentage()
            .desired_height(14.0);
        ui.scope(|ui| {
            ui.visuals_mut().extreme_bg_color = TRACK_BG;
            ui.add(bar);
        });
    }

    ui.horizontal(|ui| {
        if run.is_busy() {
            if ui.button("✖ Cancel").clicked() {
                cmd.push(EditorCommand::Cancel(kind));
            }
            ui.label(RichText::new(format!("{kind} in progress…")).color(TEXT_DIM));
        } else {
            let start = egui::Button::new(RichText::new(format!("▶ Start {kind}")).strong())
                .min_size(egui::vec2(120.0, 28.0));
            if ui.add(start).clicked() {
                cmd.push(EditorCommand::Start(kind));
            }
        }
    });
}
