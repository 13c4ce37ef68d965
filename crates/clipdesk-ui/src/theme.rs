// crates/clipdesk-ui/src/theme.rs
use egui::{Color32, Context, Stroke, Style, Visuals};

// ── Palette ──────────────────────────────────────────────────────────────────
pub const ACCENT:       Color32 = Color32::from_rgb( 64, 156, 255);
pub const ACCENT_DIM:   Color32 = Color32::from_rgb( 32,  98, 176);
pub const ACCENT_HOVER: Color32 = Color32::from_rgb(120, 186, 255);

pub const BG_0:         Color32 = Color32::from_rgb( 15,  16,  19);
pub const BG_1:         Color32 = Color32::from_rgb( 22,  23,  28);
pub const BG_2:         Color32 = Color32::from_rgb( 30,  32,  38);
pub const BG_3:         Color32 = Color32::from_rgb( 41,  43,  51);
pub const BG_4:         Color32 = Color32::from_rgb( 54,  57,  67);

pub const TEXT:         Color32 = Color32::from_rgb(222, 224, 232);
pub const TEXT_DIM:     Color32 = Color32::from_rgb(124, 128, 142);
pub const BORDER:       Color32 = Color32::from_rgb( 58,  61,  72);

// Notice card borders and progress bar.
pub const SUCCESS:      Color32 = Color32::from_rgb( 80, 190, 120);
pub const WARNING:      Color32 = Color32::from_rgb(230, 170,  60);
pub const ERROR:        Color32 = Color32::from_rgb(210,  84,  84);
pub const TRACK_BG:     Color32 = Color32::from_rgb( 35,  36,  42);

pub fn configure_style(ctx: &Context) {
    let mut style = Style::default();

    style.spacing.item_spacing     = egui::vec2(8.0, 6.0);
    style.spacing.window_margin    = egui::Margin::same(12);
    style.spacing.button_padding   = egui::vec2(12.0, 5.0);
    style.spacing.scroll.bar_width = 8.0;
    style.spacing.interact_size.y  = 24.0;

    let cr = egui::CornerRadius::same(4);

    let mut v = Visuals::dark();
    v.panel_fill       = BG_1;
    v.window_fill      = BG_2;
    v.faint_bg_color   = BG_2;
    v.extreme_bg_color = BG_0;
    v.window_stroke    = Stroke::new(1.0, BORDER);

    v.selection.bg_fill = ACCENT_DIM;
    v.selection.stroke  = Stroke::new(1.0, Color32::WHITE);
    v.hyperlink_color   = ACCENT_HOVER;

    v.widgets.noninteractive.bg_fill       = BG_2;
    v.widgets.noninteractive.bg_stroke     = Stroke::new(1.0, BORDER);
    v.widgets.noninteractive.fg_stroke     = Stroke::new(1.0, TEXT_DIM);
    v.widgets.noninteractive.corner_radius = cr;

    v.widgets.inactive.bg_fill             = BG_3;
    v.widgets.inactive.weak_bg_fill        = BG_3;
    v.widgets.inactive.bg_stroke           = Stroke::new(1.0, BORDER);
    v.widgets.inactive.fg_stroke           = Stroke::new(1.0, TEXT);
    v.widgets.inactive.corner_radius       = cr;

    v.widgets.hovered.bg_fill              = BG_4;
    v.widgets.hovered.weak_bg_fill         = BG_4;
    v.widgets.hovered.bg_stroke            = Stroke::new(1.0, ACCENT_DIM);
    v.widgets.hovered.fg_stroke            = Stroke::new(1.5, ACCENT_HOVER);
    v.widgets.hovered.corner_radius        = cr;

    v.widgets.active.bg_fill               = ACCENT_DIM;
    v.widgets.active.weak_bg_fill          = ACCENT_DIM;
    v.widgets.active.bg_stroke             = Stroke::new(1.0, ACCENT);
    v.widgets.active.fg_stroke             = Stroke::new(2.0, Color32::WHITE);
    v.widgets.active.corner_radius         = cr;

    v.widgets.open.bg_fill                 = BG_4;
    v.widgets.open.bg_stroke               = Stroke::new(1.0, ACCENT_DIM);
    v.widgets.open.fg_stroke               = Stroke::new(1.5, ACCENT_HOVER);
    v.widgets.open.corner_radius           = cr;

    v.override_text_color = Some(TEXT);
    v.window_corner_radius = cr;
    v.menu_corner_radius   = cr;

    ctx.set_style(style);
    ctx.set_visuals(v);
}
