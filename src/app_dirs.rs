use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "mpulog")
    }

    /// Where session logs go unless configured otherwise.
    ///
    /// Platforms without a state directory (macOS, Windows) use the local
    /// data directory instead.
    pub fn log_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|pd| {
            pd.state_dir()
                .unwrap_or_else(|| pd.data_local_dir())
                .join("logs")
        })
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|pd| pd.config_dir().join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_and_config_live_under_the_project() {
        if let Some(dir) = AppDirs::log_dir() {
            assert!(dir.ends_with("logs"));
            assert!(dir.to_string_lossy().contains("mpulog"));
        }
        if let Some(path) = AppDirs::config_path() {
            assert!(path.ends_with("config.json"));
        }
    }
}
