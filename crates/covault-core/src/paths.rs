//! Data directory resolution.

use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "COVAULT_DATA_DIR";

/// `$COVAULT_DATA_DIR` if set and non-empty, else `~/.covault`.
pub fn default_data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir));
        }
    }
    dirs::home_dir().map(|home| home.join(".covault"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_home_dir() {
        if std::env::var(DATA_DIR_ENV).is_err() {
            let dir = default_data_dir().unwrap();
            assert!(dir.ends_with(".covault"));
        }
    }
}
