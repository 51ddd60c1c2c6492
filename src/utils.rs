//! Formatting and local-file helpers shared by the client and the CLI.

use std::path::Path;

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

/// Format seconds into human-readable time (e.g., "2m 15s", "1h 5m", "< 1s").
pub fn format_eta(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "--".to_string();
    }

    let secs = seconds.round() as u64;

    if secs == 0 {
        return "< 1s".to_string();
    }

    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let remaining_secs = secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, remaining_secs)
    } else {
        format!("{}s", remaining_secs)
    }
}

/// Render a fixed-width progress bar such as `|█████-----| 50.0%`.
pub fn render_progress_bar(current: u64, total: u64, width: usize) -> String {
    let fraction = if total == 0 {
        1.0
    } else {
        (current as f64 / total as f64).min(1.0)
    };
    let filled = (width as f64 * fraction) as usize;
    format!(
        "|{}{}| {:.1}%",
        "█".repeat(filled),
        "-".repeat(width - filled),
        fraction * 100.0
    )
}

/// MIME type from the file extension, `application/octet-stream` when unknown.
pub fn guess_mime_type<P: AsRef<Path>>(path: P) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

/// True when `path` exists and is a regular file.
pub fn validate_file_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_file()
}
