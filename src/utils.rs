use chrono::Utc;
use std::path::PathBuf;

/// Get reports directory from environment variable or use default
pub fn get_reports_dir() -> PathBuf {
    std::env::var("REPORTS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("reports"))
}

/// Charts subdirectory under the reports directory
pub fn get_charts_dir() -> PathBuf {
    get_reports_dir().join("charts")
}

/// Timestamp embedded in artifact filenames so repeated runs never collide
pub fn artifact_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}
