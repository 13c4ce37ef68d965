// crates/clipdesk-ui/src/modules/clip_tab.rs
//
// ClipTab: cut one time range out of a single file.
//
// A video-only preview sits above the range: a transport bar drives the
// playhead and "Set start" / "Set end" copy it into the range.
//
// The range is edited as minutes + seconds. The end field starts at the
// probed duration; ticking "End of file" sends `end_secs = None`, which the
// worker resolves to the full duration.

use super::widgets::{output_row, probe_line, run_footer, section, source_row};
use super::EditorModule;
use clipdesk_core::commands::EditorCommand;
use clipdesk_core::helpers::time::{format_duration, format_hms, from_min_sec, to_min_sec};
use clipdesk_core::operation::OperationKind;
use clipdesk_core::state::{ClipTabState, EditorState};
use clipdesk_media::{OperationController, PreviewFrame};
use egui::{Color32, DragValue, Pos2, Rect, RichText, Stroke, TextureHandle, Ui, Vec2};

use crate::theme::{ACCENT, BORDER, TEXT_DIM};

/// Minutes cap for the spin fields while the duration is unknown.
const MAX_MINUTES_UNKNOWN: u32 = 999;
/// Preview canvas height; width follows the panel at 16:9.
const CANVAS_MAX_H: f32 = 300.0;
/// Skip buttons, in seconds.
const SKIPS: [f64; 2] = [30.0, 10.0];

#[derive(Default)]
pub struct ClipTab {
    frame: Option<TextureHandle>,
}

impl ClipTab {
    /// Upload the newest preview frame.
    pub fn set_frame(&mut self, ctx: &egui::Context, frame: &PreviewFrame) {
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [frame.width as usize, frame.height as usize],
            &frame.rgba,
        );
        match &mut self.frame {
            Some(tex) => tex.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.frame = Some(ctx.load_texture("clip-preview", image, egui::TextureOptions::LINEAR));
            }
        }
    }

    pub fn clear_frame(&mut self) {
        self.frame = None;
    }
}

impl EditorModule for ClipTab {
    fn name(&self) -> &str { "Clip" }

    fn ui(
        &mut self,
        ui:    &mut Ui,
        state: &EditorState,
        run:   &OperationController,
        cmd:   &mut Vec<EditorCommand>,
    ) {
        let tab = &state.clip;
        let busy = run.is_busy();

        ui.add_enabled_ui(!busy, |ui| {
            section(ui, "SOURCE", |ui| {
                if let Some(p) = source_row(ui, tab.input.as_deref(), state.prefs.last_dir.as_deref()) {
                    cmd.push(EditorCommand::LoadClipInput(p));
                }
                probe_line(ui, tab.input.as_deref(), tab.probe.as_ref());
            });

            ui.add_space(6.0);
            section(ui, "PREVIEW", |ui| {
                self.canvas(ui, tab);
                ui.add_space(4.0);
                transport_ui(ui, tab, cmd);
            });

            ui.add_space(6.0);
            section(ui, "RANGE", |ui| {
                range_ui(ui, state, cmd);
                ui.horizontal(|ui| {
                    let loaded = tab.duration().is_some();
                    if ui.add_enabled(loaded, egui::Button::new("Set start")).clicked() {
                        cmd.push(EditorCommand::SetClipStartAtPlayhead);
                    }
                    if ui.add_enabled(loaded, egui::Button::new("Set end")).clicked() {
                        cmd.push(EditorCommand::SetClipEndAtPlayhead);
                    }
                    if ui.add_enabled(loaded, egui::Button::new("Reset")).clicked() {
                        cmd.push(EditorCommand::ResetClipRange);
                    }
                });
            });

            ui.add_space(6.0);
            section(ui, "OUTPUT", |ui| {
                output_row(ui, OperationKind::Clip, &tab.output, "mp4", cmd);
                ui.label(RichText::new("H.264 video, AAC audio").small().color(TEXT_DIM));
            });
        });

        run_footer(ui, run, cmd);
    }
}

impl ClipTab {
    /// Letterboxed frame on a black canvas, with the range drawn underneath.
    fn canvas(&self, ui: &mut Ui, tab: &ClipTabState) {
        let w = ui.available_width();
        let h = (w * 9.0 / 16.0).min(CANVAS_MAX_H);
        let (outer, _) = ui.allocate_exact_size(Vec2::new(w, h), egui::Sense::hover());
        let painter = ui.painter();
        painter.rect_filled(outer, 3.0, Color32::BLACK);

        let stroke = if tab.playing { Stroke::new(1.5, ACCENT) } else { Stroke::new(1.0, BORDER) };
        painter.rect_stroke(outer, 3.0, stroke, egui::StrokeKind::Outside);

        match &self.frame {
            Some(tex) if tab.input.is_some() => {
                let size = tex.size_vec2();
                let scale = (outer.width() / size.x).min(outer.height() / size.y);
                let rect = Rect::from_center_size(outer.center(), size * scale);
                painter.image(
                    tex.id(),
                    rect,
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
            _ => {
                painter.text(
                    outer.center(),
                    egui::Align2::CENTER_CENTER,
                    if tab.input.is_some() { "Loading…" } else { "No file" },
                    egui::FontId::proportional(13.0),
                    Color32::from_gray(90),
                );
            }
        }
    }
}

fn transport_ui(ui: &mut Ui, tab: &ClipTabState, cmd: &mut Vec<EditorCommand>) {
    let Some(duration) = tab.duration() else {
        ui.label(RichText::new("Preview is available once the file is read").small().color(TEXT_DIM));
        return;
    };
    let pos = tab.playhead_secs;

    ui.horizontal(|ui| {
        for skip in SKIPS {
            if ui.button(format!("«{skip:.0}")).on_hover_text(format!("Back {skip:.0} s")).clicked() {
                cmd.push(EditorCommand::SeekClipPreview(pos - skip));
            }
        }
        let (label, next) = if tab.playing {
            ("⏸ Pause", EditorCommand::PauseClipPreview)
        } else {
            ("▶ Play", EditorCommand::PlayClipPreview)
        };
        if ui.button(label).clicked() {
            cmd.push(next);
        }
        if ui.button("⏹ Stop").clicked() {
            cmd.push(EditorCommand::StopClipPreview);
        }
        for skip in SKIPS.into_iter().rev() {
            if ui.button(format!("{skip:.0}»")).on_hover_text(format!("Forward {skip:.0} s")).clicked() {
                cmd.push(EditorCommand::SeekClipPreview(pos + skip));
            }
        }
        ui.label(
            RichText::new(format!("{} / {}", format_hms(pos), format_hms(duration)))
                .monospace()
                .color(TEXT_DIM),
        );
    });

    let mut scrub = pos;
    let width = ui.available_width();
    ui.spacing_mut().slider_width = width;
    let slider = ui.add(egui::Slider::new(&mut scrub, 0.0..=duration.max(0.0)).show_value(false));
    if slider.changed() {
        cmd.push(EditorCommand::SeekClipPreview(scrub));
    }
    range_marks(ui, slider.rect, tab, duration);
}

/// Range highlight under the scrub bar.
fn range_marks(ui: &Ui, bar: Rect, tab: &ClipTabState, duration: f64) {
    if duration <= 0.0 {
        return;
    }
    let x = |secs: f64| bar.left() + bar.width() * (secs / duration).clamp(0.0, 1.0) as f32;
    let start = x(tab.start_secs);
    let end = x(tab.end_secs.unwrap_or(duration));
    if end <= start {
        return;
    }
    let band = Rect::from_min_max(Pos2::new(start, bar.bottom() - 3.0), Pos2::new(end, bar.bottom()));
    ui.painter().rect_filled(band, 1.0, ACCENT.gamma_multiply(0.6));
}

fn range_ui(ui: &mut Ui, state: &EditorState, cmd: &mut Vec<EditorCommand>) {
    let tab = &state.clip;
    let duration = tab.descriptor().map(|d| d.duration_seconds);
    let max_minutes = duration.map_or(MAX_MINUTES_UNKNOWN, |d| (d / 60.0).ceil() as u32);

    let (mut start_min, mut start_sec) = to_min_sec(tab.start_secs);
    let (mut end_min, mut end_sec) = to_min_sec(tab.end_secs.or(duration).unwrap_or(0.0));
    let mut to_end = tab.end_secs.is_none();

    let mut start_changed = false;
    let mut end_changed = false;
    let mut to_end_changed = false;

    egui::Grid::new("clip_range_grid")
        .num_columns(2)
        .spacing([12.0, 6.0])
        .show(ui, |ui| {
            ui.label("Start");
            ui.horizontal(|ui| {
                start_changed = min_sec(ui, &mut start_min, &mut start_sec, max_minutes);
            });
            ui.end_row();

            ui.label("End");
            ui.horizontal(|ui| {
                ui.add_enabled_ui(!to_end, |ui| {
                    end_changed = min_sec(ui, &mut end_min, &mut end_sec, max_minutes);
                });
                to_end_changed = ui.checkbox(&mut to_end, "End of file").changed();
            });
            ui.end_row();
        });

    if start_changed || end_changed || to_end_changed {
        let start_secs = if start_changed { from_min_sec(start_min, start_sec) } else { tab.start_secs };
        let end_secs = if to_end {
            None
        } else if end_changed {
            Some(from_min_sec(end_min, end_sec))
        } else {
            tab.end_secs.or(duration).or(Some(start_secs))
        };
        cmd.push(EditorCommand::SetClipRange { start_secs, end_secs });
    }

    let length = match tab.selection_secs() {
        Some(s) if s > 0.0 => format!("Selection: {}", format_duration(s)),
        Some(_)            => "Selection: empty".to_string(),
        None               => "Selection: to end of file".to_string(),
    };
    ui.label(RichText::new(length).color(TEXT_DIM));
}

fn min_sec(ui: &mut Ui, minutes: &mut u32, seconds: &mut u32, max_minutes: u32) -> bool {
    let m = ui.add(DragValue::new(minutes).range(0..=max_minutes).suffix(" min")).changed();
    let s = ui.add(DragValue::new(seconds).range(0..=59).suffix(" s")).changed();
    m || s
}
