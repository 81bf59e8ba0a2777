use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "proxgate.toml";

/// Per-user config location: `~/.config/proxgate/proxgate.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("proxgate").join(CONFIG_FILE_NAME))
}

/// Log file used when file logging is enabled without an explicit path:
/// `~/.local/share/proxgate/proxgate.log`
pub fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("proxgate")
        .join("proxgate.log")
}

/// Find the config file to load when none was given on the command line.
///
/// Checks the working directory first, then the per-user config dir.
/// Returns `None` when neither exists; the caller then runs on defaults
/// plus environment overrides.
pub fn find_config(cwd: &Path) -> Option<PathBuf> {
    let local = cwd.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    user_config_path().filter(|p| p.is_file())
}
