// crates/clipdesk-ui/src/helpers/format.rs
//
// String utilities that only make sense on screen.
//
// Time formatting lives in clipdesk_core::helpers::time.

use std::path::Path;

/// Truncates `text` to fit within `max_px` using a per-character width
/// heuristic (≈ 7 px/char at the body font size). Appends "…" when
/// truncated. Avoids egui font measurement, which needs `&mut Fonts`.
pub fn fit_label(text: &str, max_px: f32) -> String {
    const AVG_CHAR_PX: f32 = 7.0;
    const ELLIPSIS: &str = "…";

    let max_chars = (max_px / AVG_CHAR_PX).max(0.0) as usize;
    let char_count = text.chars().count();
    if char_count <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let keep = max_chars.saturating_sub(1);
    text.chars().take(keep).collect::<String>() + ELLIPSIS
}

/// Shortens a path by cutting its middle, so both the drive / root and the
/// file name stay visible: `/home/user/…/holiday.mp4`.
pub fn middle_ellipsis(path: &Path, max_chars: usize) -> String {
    let text = path.display().to_string();
    let count = text.chars().count();
    if count <= max_chars || max_chars < 5 {
        return text;
    }
    let tail_len = (max_chars - 1) * 2 / 3;
    let head_len = max_chars - 1 - tail_len;
    let head: String = text.chars().take(head_len).collect();
    let tail: String = text.chars().skip(count - tail_len).collect();
    format!("{head}…{tail}")
}

/// Display name for a list row: file name, or the whole path when it has none.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
