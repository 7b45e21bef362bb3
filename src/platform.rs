// Unslop platform paths
// Linux:   $XDG_CONFIG_HOME/unslop, $XDG_DATA_HOME/unslop (defaults under ~/.config and ~/.local/share)
// macOS:   ~/Library/Application Support/Unslop for both
// Windows: %APPDATA%/Unslop for both

use std::env;
use std::path::PathBuf;

/// Environment variable that overrides the data directory on every platform.
pub const DATA_DIR_ENV: &str = "UNSLOP_DATA_DIR";

fn home_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
}

#[cfg(target_os = "linux")]
fn base_dirs() -> (PathBuf, PathBuf) {
    let config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    let data = env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local").join("share"));
    (config.join("unslop"), data.join("unslop"))
}

#[cfg(target_os = "macos")]
fn base_dirs() -> (PathBuf, PathBuf) {
    let dir = home_dir()
        .join("Library")
        .join("Application Support")
        .join("Unslop");
    (dir.clone(), dir)
}

#[cfg(target_os = "windows")]
fn base_dirs() -> (PathBuf, PathBuf) {
    let appdata = env::var("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default\\AppData\\Roaming"));
    let dir = appdata.join("Unslop");
    (dir.clone(), dir)
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn base_dirs() -> (PathBuf, PathBuf) {
    let dir = home_dir().join(".unslop");
    (dir.clone(), dir)
}

/// Returns the directory holding `config.json`.
pub fn get_config_dir() -> PathBuf {
    base_dirs().0
}

/// Returns the directory holding the SQLite database, honoring `$UNSLOP_DATA_DIR`.
pub fn get_data_dir() -> PathBuf {
    match env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => base_dirs().1,
    }
}
