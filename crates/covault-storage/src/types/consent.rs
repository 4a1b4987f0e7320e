use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// GDPR consent record. There is exactly one per installation.
///
/// States: never granted, granted, withdrawn. Re-granting after a
/// withdrawal reopens the granted state without touching stored data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Consent {
    pub consent_given: bool,
    pub consent_timestamp: Option<DateTime<Utc>>,
    pub consent_version: String,
    pub data_processing: bool,
    pub data_storage: bool,
    pub data_encryption: bool,
    pub consent_withdrawn: bool,
    pub withdrawal_date: Option<DateTime<Utc>>,
}

impl Consent {
    /// Initial state: nothing granted yet.
    pub fn none() -> Self {
        Consent {
            consent_given: false,
            consent_timestamp: None,
            consent_version: "1.0".to_string(),
            data_processing: false,
            data_storage: false,
            data_encryption: false,
            consent_withdrawn: false,
            withdrawal_date: None,
        }
    }

    /// Consent currently covers data operations.
    pub fn is_active(&self) -> bool {
        self.consent_given && !self.consent_withdrawn
    }

    /// Grant (or re-grant) consent. Idempotent.
    pub fn grant(&mut self, version: &str) {
        self.consent_given = true;
        self.consent_timestamp = Some(Utc::now());
        self.consent_version = version.to_string();
        self.data_processing = true;
        self.data_storage = true;
        self.data_encryption = true;
        self.consent_withdrawn = false;
        self.withdrawal_date = None;
    }

    /// Withdraw previously granted consent.
    /// Returns false if consent was never granted.
    pub fn withdraw(&mut self) -> bool {
        if !self.consent_given {
            return false;
        }
        self.consent_withdrawn = true;
        self.withdrawal_date = Some(Utc::now());
        true
    }
}

impl Default for Consent {
    fn default() -> Self {
        Self::none()
    }
}
