use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("speedracer"),
            )
        } else {
            ProjectDirs::from("", "", "speedracer").map(|dirs| dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn db_path() -> PathBuf {
        Self::state_dir()
            .map(|d| d.join("state.db"))
            .unwrap_or_else(|| PathBuf::from("speedracer_state.db"))
    }

    pub fn log_path() -> PathBuf {
        Self::state_dir()
            .map(|d| d.join("speedracer.log"))
            .unwrap_or_else(|| PathBuf::from("speedracer.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_side_by_side() {
        let db = AppDirs::db_path();
        let log = AppDirs::log_path();
        assert_eq!(db.file_name().unwrap(), "state.db");
        assert_eq!(log.file_name().unwrap(), "speedracer.log");
        assert_eq!(db.parent(), log.parent());
    }
}
