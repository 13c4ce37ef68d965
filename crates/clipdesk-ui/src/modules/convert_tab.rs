// crates/clipdesk-ui/src/modules/convert_tab.rs
//
// ConvertTab: re-encode one file into another container / codec set.
//
// Every form change sends the whole ConvertOptions back as one
// UpdateConvertOptions command; app.rs swaps it in and, when the container
// changed, rewrites the default output extension.

use super::widgets::{output_row, probe_line, run_footer, section, source_row};
use super::EditorModule;
use clipdesk_core::commands::EditorCommand;
use clipdesk_core::encoding::{Container, AUDIO_BITRATES, AUDIO_CODECS, VIDEO_BITRATES, VIDEO_CODECS};
use clipdesk_core::operation::OperationKind;
use clipdesk_core::state::{ConvertOptions, EditorState};
use clipdesk_media::OperationController;
use egui::{ComboBox, DragValue, RichText, Ui};

use crate::theme::TEXT_DIM;

const MAX_FPS:    f64 = 120.0;
const MAX_WIDTH:  u32 = 7680;
const MAX_HEIGHT: u32 = 4320;

pub struct ConvertTab;

impl EditorModule for ConvertTab {
    fn name(&self) -> &str { "Convert" }

    fn ui(
        &mut self,
        ui:    &mut Ui,
        state: &EditorState,
        run:   &OperationController,
        cmd:   &mut Vec<EditorCommand>,
    ) {
        let tab = &state.convert;
        let busy = run.is_busy();

        ui.add_enabled_ui(!busy, |ui| {
            section(ui, "SOURCE", |ui| {
                if let Some(p) = source_row(ui, tab.input.as_deref(), state.prefs.last_dir.as_deref()) {
                    cmd.push(EditorCommand::LoadConvertInput(p));
                }
                probe_line(ui, tab.input.as_deref(), tab.probe.as_ref());
            });

            ui.add_space(6.0);
            section(ui, "FORMAT", |ui| {
                let mut options = tab.options.clone();
                let source_size = tab.descriptor().map(|d| (d.width, d.height));
                if options_ui(ui, &mut options, source_size) {
                    cmd.push(EditorCommand::UpdateConvertOptions(options));
                }
            });

            ui.add_space(6.0);
            section(ui, "OUTPUT", |ui| {
                output_row(ui, OperationKind::Convert, &tab.output, tab.options.container.extension(), cmd);
            });
        });

        run_footer(ui, run, cmd);
    }
}

/// Draws the format form. Returns true when any field changed.
fn options_ui(ui: &mut Ui, o: &mut ConvertOptions, source_size: Option<(u32, u32)>) -> bool {
    let mut changed = false;

    egui::Grid::new("convert_options_grid")
        .num_columns(2)
        .spacing([12.0, 6.0])
        .show(ui, |ui| {
            ui.label("Container");
            ComboBox::from_id_salt("convert_container")
                .selected_text(o.container.label())
                .show_ui(ui, |ui| {
                    for c in Container::ALL {
                        changed |= ui.selectable_value(&mut o.container, c, c.label()).changed();
                    }
                });
            ui.end_row();

            ui.label("Video codec");
            changed |= string_combo(ui, "convert_vcodec", &mut o.video_codec, VIDEO_CODECS);
            ui.end_row();

            ui.label("Audio codec");
            changed |= string_combo(ui, "convert_acodec", &mut o.audio_codec, AUDIO_CODECS);
            ui.end_row();

            ui.label("Video bitrate");
            changed |= string_combo(ui, "convert_vbitrate", &mut o.video_bitrate, VIDEO_BITRATES);
            ui.end_row();

            ui.label("Audio bitrate");
            changed |= string_combo(ui, "convert_abitrate", &mut o.audio_bitrate, AUDIO_BITRATES);
            ui.end_row();

            ui.label("Frame rate");
            changed |= ui.add(
                DragValue::new(&mut o.frame_rate)
                    .range(1.0..=MAX_FPS)
                    .speed(0.1)
                    .max_decimals(3)
                    .suffix(" fps"),
            ).changed();
            ui.end_row();

            ui.label("Resolution");
            ui.vertical(|ui| {
                let keep_label = match source_size {
                    Some((w, h)) => format!("Keep original ({w}x{h})"),
                    None         => "Keep original".to_string(),
                };
                changed |= ui.radio_value(&mut o.keep_resolution, true, keep_label).changed();
                ui.horizontal(|ui| {
                    changed |= ui.radio_value(&mut o.keep_resolution, false, "Custom").changed();
                    ui.add_enabled_ui(!o.keep_resolution, |ui| {
                        changed |= ui.add(DragValue::new(&mut o.width).range(2..=MAX_WIDTH)).changed();
                        ui.label("x");
                        changed |= ui.add(DragValue::new(&mut o.height).range(2..=MAX_HEIGHT)).changed();
                    });
                });
                if !o.keep_resolution && (o.width % 2 == 1 || o.height % 2 == 1) {
                    ui.label(RichText::new("Odd sizes are rounded up to even for YUV 4:2:0.").small().color(TEXT_DIM));
                }
            });
            ui.end_row();
        });

    changed
}

fn string_combo(ui: &mut Ui, id: &str, value: &mut String, choices: &[&str]) -> bool {
    let mut changed = false;
    ComboBox::from_id_salt(id)
        .selected_text(value.as_str())
        .show_ui(ui, |ui| {
            for &choice in choices {
                if ui.selectable_label(value.as_str() == choice, choice).clicked() && value.as_str() != choice {
                    *value = choice.to_string();
                    changed = true;
                }
            }
        });
    changed
}
