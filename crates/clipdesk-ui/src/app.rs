// crates/clipdesk-ui/src/app.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use clipdesk_core::commands::EditorCommand;
use clipdesk_core::encoding::TempAudio;
use clipdesk_core::media_types::is_video_path;
use clipdesk_core::operation::OperationKind;
use clipdesk_core::state::{EditorState, Preferences, ProbeTarget};
use clipdesk_core::validate::{clip_request, convert_request, merge_request};
use eframe::egui;
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::helpers::env::keep_temp_audio;
use crate::helpers::format::middle_ellipsis;
use crate::modules::{
    clip_tab::ClipTab, convert_tab::ConvertTab, merge_tab::MergeTab, notice, EditorModule,
};
use crate::theme::{configure_style, ACCENT, TEXT_DIM};

const TABS: [OperationKind; 3] = [OperationKind::Clip, OperationKind::Merge, OperationKind::Convert];

/// Fallback repaint cadence while a run is active, in case a wake is missed.
const BUSY_REPAINT: Duration = Duration::from_millis(250);

#[derive(Serialize, Deserialize, Default)]
struct AppStorage {
    #[serde(default)]
    prefs: Preferences,
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct ClipDeskApp {
    state:        EditorState,
    context:      AppContext,
    active:       OperationKind,
    work_dir:     PathBuf,
    clip:         ClipTab,
    merge:        MergeTab,
    convert:      ConvertTab,
    /// Commands emitted by tabs each frame, processed after the UI pass
    pending_cmds: Vec<EditorCommand>,
}

impl ClipDeskApp {
    pub fn new(cc: &eframe::CreationContext<'_>, work_dir: PathBuf) -> Self {
        configure_style(&cc.egui_ctx);
        cc.egui_ctx.options_mut(|o| {
            o.theme_preference = egui::ThemePreference::Dark;
        });

        let prefs = cc.storage
            .and_then(|s| eframe::get_value::<AppStorage>(s, eframe::APP_KEY))
            .map(|d| d.prefs)
            .unwrap_or_default();

        let temp_audio = TempAudio { dir: work_dir.clone(), remove: !keep_temp_audio() };
        if !temp_audio.remove {
            tracing::info!("[app] keeping temp audio files in {}", work_dir.display());
        }

        Self {
            state:        EditorState::with_preferences(prefs),
            context:      AppContext::new(&cc.egui_ctx, temp_audio),
            active:       OperationKind::Clip,
            work_dir,
            clip:         ClipTab::default(),
            merge:        MergeTab,
            convert:      ConvertTab,
            pending_cmds: Vec::new(),
        }
    }

    fn process_command(&mut self, cmd: EditorCommand) {
        match cmd {
            // ── Navigation ───────────────────────────────────────────────────
            EditorCommand::SelectTab(kind) => {
                self.active = kind;
            }

            // ── Inputs ───────────────────────────────────────────────────────
            EditorCommand::LoadClipInput(path) => {
                self.remember_dir(&path);
                self.context.pause_preview(&mut self.state.clip);
                self.clip.clear_frame();
                self.state.clip.load(path.clone());
                self.context.prober.probe(ProbeTarget::Clip, path);
                self.context.seek_preview(&mut self.state.clip, 0.0);
            }
            EditorCommand::LoadConvertInput(path) => {
                self.remember_dir(&path);
                self.state.convert.load(path.clone());
                self.context.prober.probe(ProbeTarget::Convert, path);
            }
            EditorCommand::AddMergeInputs(paths) => {
                if let Some(first) = paths.first() {
                    self.remember_dir(first);
                }
                for (id, path) in self.state.merge.add(paths) {
                    self.context.prober.probe(ProbeTarget::Merge(id), path);
                }
            }
            EditorCommand::RemoveMergeInput(id) => {
                self.state.merge.remove(id);
            }
            EditorCommand::MoveMergeInput { id, up } => {
                self.state.merge.move_entry(id, up);
            }
            EditorCommand::SelectMergeInput(id) => {
                self.state.merge.selected = id;
            }
            EditorCommand::SetMergeIncluded { id, included } => {
                self.state.merge.set_included(id, included);
            }

            // ── Clip preview ─────────────────────────────────────────────────
            EditorCommand::SeekClipPreview(secs) => {
                self.context.seek_preview(&mut self.state.clip, secs);
            }
            EditorCommand::PlayClipPreview => {
                self.context.play_preview(&mut self.state.clip);
            }
            EditorCommand::PauseClipPreview => {
                self.context.pause_preview(&mut self.state.clip);
            }
            EditorCommand::StopClipPreview => {
                self.context.pause_preview(&mut self.state.clip);
                self.context.seek_preview(&mut self.state.clip, 0.0);
            }
            EditorCommand::SetClipStartAtPlayhead => self.state.clip.mark_start(),
            EditorCommand::SetClipEndAtPlayhead   => self.state.clip.mark_end(),
            EditorCommand::ResetClipRange         => self.state.clip.reset_range(),

            // ── Form fields ──────────────────────────────────────────────────
            EditorCommand::SetClipRange { start_secs, end_secs } => {
                self.state.clip.start_secs = start_secs;
                self.state.clip.end_secs   = end_secs;
            }
            EditorCommand::SetOutput { tab, path } => match tab {
                OperationKind::Clip    => self.state.clip.output = path,
                OperationKind::Convert => self.state.convert.output = path,
                OperationKind::Merge   => {
                    tracing::warn!("[app] SetOutput ignored for Merge; use SetMergeOutput");
                }
            },
            EditorCommand::SetMergeOutput { dir, name } => {
                self.state.merge.output_dir  = dir;
                self.state.merge.output_name = name;
            }
            EditorCommand::UpdateConvertOptions(options) => {
                self.state.convert.set_options(options);
            }

            // ── Operations ───────────────────────────────────────────────────
            EditorCommand::Start(kind) => {
                let request = match kind {
                    OperationKind::Clip    => clip_request(&self.state.clip),
                    OperationKind::Merge   => merge_request(&self.state.merge),
                    OperationKind::Convert => convert_request(&self.state.convert),
                };
                let valid = request.is_ok();
                if self.context.controller_mut(kind).start(request) {
                    tracing::info!("[app] {kind} started");
                }
                if valid && kind == OperationKind::Convert {
                    self.state.prefs.remember_convert(&self.state.convert.options);
                }
            }
            EditorCommand::Cancel(kind) => {
                tracing::info!("[app] {kind} cancel requested");
                self.context.controller(kind).cancel();
            }
            EditorCommand::DismissNotice(kind) => {
                self.context.controller_mut(kind).dismiss_notice();
            }
        }
    }

    fn remember_dir(&mut self, path: &Path) {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            self.state.prefs.last_dir = Some(dir.to_path_buf());
        }
    }

    /// Dropped files go to whichever tab is showing. Ignored while that tab
    /// is running.
    fn handle_drag_and_drop(&mut self, ctx: &egui::Context) {
        let paths: Vec<PathBuf> = ctx.input(|i| {
            i.raw.dropped_files.iter().filter_map(|f| f.path.clone()).collect()
        });
        if paths.is_empty() {
            return;
        }
        if self.context.controller(self.active).is_busy() {
            tracing::debug!("[app] drop ignored: {} is running", self.active);
            return;
        }

        let videos: Vec<PathBuf> = paths.into_iter().filter(|p| is_video_path(p)).collect();
        let Some(first) = videos.first().cloned() else {
            tracing::debug!("[app] drop ignored: no video files");
            return;
        };
        let cmd = match self.active {
            OperationKind::Clip    => EditorCommand::LoadClipInput(first),
            OperationKind::Convert => EditorCommand::LoadConvertInput(first),
            OperationKind::Merge   => EditorCommand::AddMergeInputs(videos),
        };
        self.pending_cmds.push(cmd);
    }

    fn tab_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_centered(|ui| {
            ui.label(egui::RichText::new("🎬 ClipDesk").strong().size(15.0).color(ACCENT));
            ui.separator();
            for kind in TABS {
                let run = self.context.controller(kind);
                let label = match run.progress() {
                    Some(p) => format!("{kind}  {p}%"),
                    None    => kind.to_string(),
                };
                if ui.selectable_label(self.active == kind, label).clicked() {
                    self.pending_cmds.push(EditorCommand::SelectTab(kind));
                }
            }
        });
    }

    fn status_line(&self, ui: &mut egui::Ui) {
        ui.horizontal_centered(|ui| {
            let running: Vec<String> = TABS.iter()
                .filter_map(|&k| self.context.controller(k).progress().map(|p| format!("{k} {p}%")))
                .collect();
            let text = if running.is_empty() {
                "Ready".to_string()
            } else {
                format!("Running: {}", running.join(" · "))
            };
            ui.label(egui::RichText::new(text).size(11.0).color(TEXT_DIM));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(
                    egui::RichText::new(format!("Temp: {}", middle_ellipsis(&self.work_dir, 40)))
                        .size(11.0)
                        .color(TEXT_DIM),
                );
            });
        });
    }
}

// ── eframe::App ───────────────────────────────────────────────────────────────

impl eframe::App for ClipDeskApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, &AppStorage { prefs: self.state.prefs.clone() });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if self.context.any_busy() {
            tracing::warn!("[app] exiting with a run in progress; cancelling");
            self.context.cancel_all();
        }
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_drag_and_drop(ctx);
        self.context.ingest_probe_results(&mut self.state);
        self.context.poll_operations();
        if let Some(frame) = self.context.poll_preview(&mut self.state.clip) {
            self.clip.set_frame(ctx, &frame);
        }

        egui::TopBottomPanel::top("tab_bar")
            .exact_height(38.0)
            .show(ctx, |ui| self.tab_bar(ui));

        egui::TopBottomPanel::bottom("status_line")
            .exact_height(24.0)
            .show(ctx, |ui| self.status_line(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            let run = self.context.controller(self.active);
            let module: &mut dyn EditorModule = match self.active {
                OperationKind::Clip    => &mut self.clip,
                OperationKind::Merge   => &mut self.merge,
                OperationKind::Convert => &mut self.convert,
            };
            // Per-tab scroll offset.
            egui::ScrollArea::vertical()
                .id_salt(module.name())
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    module.ui(ui, &self.state, run, &mut self.pending_cmds);
                });
        });

        // One card at a time: the visible tab's notice wins.
        let order = std::iter::once(self.active).chain(TABS.into_iter().filter(|&k| k != self.active));
        for kind in order {
            if let Some(n) = self.context.controller(kind).notice() {
                notice::show(ctx, kind, n, &mut self.pending_cmds);
                break;
            }
        }

        // ── Process commands emitted by tabs this frame ──────────────────────
        let cmds: Vec<EditorCommand> = self.pending_cmds.drain(..).collect();
        for cmd in cmds {
            self.process_command(cmd);
        }

        if self.state.clip.playing {
            ctx.request_repaint();
        } else if self.context.any_busy() {
            ctx.request_repaint_after(BUSY_REPAINT);
        }
    }
}
