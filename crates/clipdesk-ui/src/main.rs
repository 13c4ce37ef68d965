#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

mod app;
mod context;
mod helpers;
mod instance;
mod modules;
mod playback;
mod theme;

use crate::instance::{InstanceError, InstanceGuard};

fn main() -> eframe::Result {
    let work = helpers::env::work_dir();
    helpers::log::init(&work.path);
    if let Some(reason) = &work.fallback {
        tracing::warn!("[env] {reason}; using system temp dir");
    }
    let work_dir = work.path;

    // Held until main returns; dropping it releases the lock file.
    let _instance = match InstanceGuard::acquire(&work_dir) {
        Ok(guard) => guard,
        Err(InstanceError::AlreadyRunning { pid }) => {
            tracing::warn!("[main] another instance is running (pid {pid:?}), exiting");
            rfd::MessageDialog::new()
                .set_level(rfd::MessageLevel::Info)
                .set_title("ClipDesk")
                .set_description("ClipDesk is already running.")
                .show();
            return Ok(());
        }
        Err(e) => {
            tracing::error!("[main] {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = clipdesk_media::init() {
        tracing::error!("[main] {e:#}");
        rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Error)
            .set_title("ClipDesk")
            .set_description(format!("Could not initialise FFmpeg: {e:#}"))
            .show();
        std::process::exit(1);
    }

    let native_options = eframe::NativeOptions {
        centered: true,
        viewport: egui::ViewportBuilder::default()
            .with_title("ClipDesk")
            .with_inner_size([760.0, 620.0])
            .with_min_inner_size([560.0, 460.0])
            .with_drag_and_drop(true)
            .with_resizable(true),
        ..Default::default()
    };

    tracing::info!("[main] starting, work dir {}", work_dir.display());
    eframe::run_native(
        "ClipDesk",
        native_options,
        Box::new(move |cc| Ok(Box::new(app::ClipDeskApp::new(cc, work_dir)))),
    )
}
