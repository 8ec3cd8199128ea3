//! Filesystem locations used by configuration and logging.

pub mod xdg_root {
    use std::path::PathBuf;

    /// `$XDG_CONFIG_HOME`, falling back to `~/.config`.
    pub fn config_home() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(dir));
        }
        std::env::var_os("HOME")
            .filter(|v| !v.is_empty())
            .map(|home| PathBuf::from(home).join(".config"))
    }
}
