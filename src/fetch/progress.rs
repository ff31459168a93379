//! Parsing of yt-dlp progress output

/// Extract the percentage from a yt-dlp progress line
///
/// Recognizes lines such as `[download]  42.3% of 10.00MiB at 1.20MiB/s ETA 00:07`.
/// Other `[download]` lines (destination, merge notices) yield `None`.
pub fn parse_progress_line(line: &str) -> Option<f32> {
    let rest = line.trim_start().strip_prefix("[download]")?;
    let token = rest.split_whitespace().next()?;
    let percent: f32 = token.strip_suffix('%')?.parse().ok()?;
    if percent.is_nan() {
        return None;
    }
    Some(percent.clamp(0.0, 100.0))
}
