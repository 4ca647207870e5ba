use once_cell::sync::Lazy;
pub use std::env::*;
use std::path::PathBuf;

pub static CWD: Lazy<PathBuf> = Lazy::new(|| current_dir().unwrap_or_else(|_| PathBuf::from(".")));

pub static HUGO_MANAGER_LOG: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("HUGO_MANAGER_LOG").unwrap_or(log::LevelFilter::Info));
pub static HUGO_MANAGER_LOG_FILE_LEVEL: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("HUGO_MANAGER_LOG_FILE_LEVEL").unwrap_or(*HUGO_MANAGER_LOG));
pub static HUGO_MANAGER_LOG_FILE: Lazy<Option<PathBuf>> =
    Lazy::new(|| var_path("HUGO_MANAGER_LOG_FILE"));

fn var_path(name: &str) -> Option<PathBuf> {
    var(name).map(PathBuf::from).ok()
}

fn var_log_level(name: &str) -> Option<log::LevelFilter> {
    var(name).ok().and_then(|level| level.parse().ok())
}
