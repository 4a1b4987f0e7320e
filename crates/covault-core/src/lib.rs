//! Application core of the CV vault: consent-gated, audited access to
//! an encrypted local record store.
//!
//! The [`CvManager`] facade is the only entry point the UI layer
//! talks to. Below it sit the [`Vault`] (key lifecycle and AEAD), the
//! typed [`EncryptedRecords`] layer over a pluggable storage backend,
//! and the audit trail.

mod audit_log;
pub mod error;
mod machine_key;
pub mod manager;
pub mod paths;
pub mod pdf;
pub mod records;
pub mod security;
pub mod vault;

pub use audit_log::RecordAuditLog;
pub use error::CoreError;
pub use machine_key::MASTER_KEY_ENV;
pub use manager::CvManager;
pub use paths::{default_data_dir, DATA_DIR_ENV};
pub use pdf::{PdfError, PdfRenderer, TextSnapshotRenderer};
pub use records::EncryptedRecords;
pub use security::{GdprArticle, SecurityInfo};
pub use vault::{SealStatus, Vault};
