use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// App initialization status, persisted as a singleton slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub first_run: bool,
    pub initialized_at: DateTime<Utc>,
    pub storage_exists: bool,
    pub onboarding_shown: bool,
    pub last_opened_at: DateTime<Utc>,
    pub version: String,
}

impl AppConfig {
    pub fn first_run(version: &str) -> Self {
        let now = Utc::now();
        AppConfig {
            first_run: true,
            initialized_at: now,
            storage_exists: true,
            onboarding_shown: false,
            last_opened_at: now,
            version: version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_run_defaults() {
        let cfg = AppConfig::first_run("0.1.0");
        assert!(cfg.first_run);
        assert!(!cfg.onboarding_shown);
        assert_eq!(cfg.version, "0.1.0");
    }
}
