// crates/clipdesk-ui/src/modules/notice.rs
//
// Blocking notice card for a finished or rejected run.
//
// Call from app.rs::update() after all panels so it paints on top. The
// backdrop swallows clicks on the tabs underneath until the card is
// dismissed with OK, Enter, Escape or a click outside.

use clipdesk_core::commands::EditorCommand;
use clipdesk_core::operation::OperationKind;
use clipdesk_media::{Notice, NoticeKind};
use egui::{Color32, Context, Margin, RichText, Stroke};

use crate::theme::{BG_2, ERROR, SUCCESS, TEXT_DIM, WARNING};

const CARD_W: f32 = 420.0;

pub fn show(ctx: &Context, kind: OperationKind, notice: &Notice, cmd: &mut Vec<EditorCommand>) {
    let (icon, border) = match notice.kind {
        NoticeKind::Success => ("✔", SUCCESS),
        NoticeKind::Warning => ("⚠", WARNING),
        NoticeKind::Error   => ("✖", ERROR),
    };

    let frame = egui::Frame::new()
        .fill(BG_2)
        .stroke(Stroke::new(1.5, border))
        .corner_radius(egui::CornerRadius::same(6))
        .inner_margin(Margin::same(20));

    let response = egui::Modal::new(egui::Id::new(("notice", kind)))
        .frame(frame)
        .backdrop_color(Color32::from_black_alpha(128))
        .show(ctx, |ui| {
            ui.set_width(CARD_W);
            ui.horizontal(|ui| {
                ui.label(RichText::new(icon).size(20.0).color(border));
                ui.label(RichText::new(&notice.title).size(16.0).strong());
            });
            ui.add_space(8.0);
            ui.label(RichText::new(&notice.message));
            ui.add_space(4.0);
            ui.label(RichText::new(format!("{kind} tab")).small().color(TEXT_DIM));
            ui.add_space(12.0);

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let ok = ui.add(egui::Button::new("OK").min_size(egui::vec2(80.0, 28.0)));
                ok.clicked() || ui.input(|i| i.key_pressed(egui::Key::Enter))
            })
            .inner
        });

    if response.inner || response.should_close() {
        cmd.push(EditorCommand::DismissNotice(kind));
    }
}
