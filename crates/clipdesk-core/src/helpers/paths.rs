// crates/clipdesk-core/src/helpers/paths.rs
//
// Default output paths proposed by each tab when a file is loaded.

use std::path::{Path, PathBuf};

use crate::encoding::Container;

/// `<dir>/<stem>_clip.mp4`
pub fn default_clip_output(input: &Path) -> PathBuf {
    sibling_with_suffix(input, "_clip", "mp4")
}

/// `<dir>/<stem>_converted.<ext>` for the chosen container.
pub fn default_convert_output(input: &Path, container: Container) -> PathBuf {
    sibling_with_suffix(input, "_converted", container.extension())
}

/// Joins the merge output directory and name, appending `.mp4` when the
/// name carries no such extension.
pub fn merge_output(dir: &Path, name: &str) -> PathBuf {
    let name = name.trim();
    if name.to_lowercase().ends_with(".mp4") {
        dir.join(name)
    } else {
        dir.join(format!("{name}.mp4"))
    }
}

/// Forces `path` to end in `.<ext>`; appends rather than replaces so a name
/// like `take.2` keeps its dot.
pub fn ensure_extension(path: &Path, ext: &str) -> PathBuf {
    let has_ext = path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext));
    if has_ext {
        path.to_path_buf()
    } else {
        let mut s = path.as_os_str().to_owned();
        s.push(".");
        s.push(ext);
        PathBuf::from(s)
    }
}

fn sibling_with_suffix(input: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let dir  = input.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{stem}{suffix}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_output_sits_next_to_input() {
        assert_eq!(
            default_clip_output(Path::new("/videos/holiday.mov")),
            PathBuf::from("/videos/holiday_clip.mp4"),
        );
    }

    #[test]
    fn convert_output_uses_container_extension() {
        assert_eq!(
            default_convert_output(Path::new("/v/a.mp4"), Container::Mkv),
            PathBuf::from("/v/a_converted.mkv"),
        );
    }

    #[test]
    fn merge_output_appends_mp4_once() {
        assert_eq!(merge_output(Path::new("/out"), "joined"), PathBuf::from("/out/joined.mp4"));
        assert_eq!(merge_output(Path::new("/out"), "joined.MP4"), PathBuf::from("/out/joined.MP4"));
    }

    #[test]
    fn ensure_extension_appends_only_when_missing() {
        assert_eq!(ensure_extension(Path::new("/o/take.2"), "avi"), PathBuf::from("/o/take.2.avi"));
        assert_eq!(ensure_extension(Path::new("/o/x.AVI"), "avi"), PathBuf::from("/o/x.AVI"));
    }
}
