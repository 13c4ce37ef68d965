// crates/clipdesk-core/src/helpers/time.rs
//
// Time formatting and the minute/second split used by the Clip tab's
// start/end fields.

/// Format seconds as `HH:MM:SS` (whole seconds, truncated).
///
/// ```
/// use clipdesk_core::helpers::time::format_hms;
/// assert_eq!(format_hms(0.0),    "00:00:00");
/// assert_eq!(format_hms(61.9),   "00:01:01");
/// assert_eq!(format_hms(3725.0), "01:02:05");
/// ```
pub fn format_hms(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Compact human-readable duration.
///
/// | Range     | Format    | Example   |
/// |-----------|-----------|-----------|
/// | ≥ 3600 s  | `H:MM:SS` | `1:04:35` |
/// | ≥ 60 s    | `M:SS`    | `3:07`    |
/// | < 60 s    | `S.Xs`    | `4.2s`    |
///
/// ```
/// use clipdesk_core::helpers::time::format_duration;
/// assert_eq!(format_duration(4.2),    "4.2s");
/// assert_eq!(format_duration(187.0),  "3:07");
/// assert_eq!(format_duration(3875.0), "1:04:35");
/// ```
pub fn format_duration(secs: f64) -> String {
    let whole = secs.max(0.0) as u64;
    match whole {
        3600.. => format!("{}:{:02}:{:02}", whole / 3600, (whole % 3600) / 60, whole % 60),
        60..   => format!("{}:{:02}", whole / 60, whole % 60),
        _      => format!("{:.1}s", secs.max(0.0)),
    }
}

/// Split seconds into the (minutes, seconds) pair shown by the spin fields.
pub fn to_min_sec(secs: f64) -> (u32, u32) {
    let whole = secs.max(0.0) as u32;
    (whole / 60, whole % 60)
}

/// Inverse of [`to_min_sec`].
pub fn from_min_sec(minutes: u32, seconds: u32) -> f64 {
    f64::from(minutes) * 60.0 + f64::from(seconds)
}
