use covault_audit::AuditLogError;
use covault_storage::StoreError;
use thiserror::Error;

use crate::pdf::PdfError;

/// Error taxonomy of the application service facade.
///
/// Every variant is a distinct, testable condition; callers match on
/// the variant rather than on message strings.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Data operation attempted without active consent.
    #[error("consent required")]
    ConsentRequired,

    /// Record or slot does not exist.
    #[error("not found")]
    NotFound,

    /// Ciphertext failed authentication or the plaintext did not parse.
    #[error("data corrupt or tampered")]
    Corrupt,

    /// Password did not match the stored verifier.
    #[error("invalid password")]
    InvalidPassword,

    /// Seal requested but storage is already password-protected.
    #[error("storage already sealed")]
    AlreadySealed,

    /// Unseal or seal removal requested without an existing seal.
    #[error("storage not sealed")]
    NotSealed,

    /// Data operation attempted while the vault key is not in memory.
    #[error("storage sealed")]
    Sealed,

    /// Concurrent writers raced on the same record.
    #[error("write conflict")]
    WriteConflict,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Store(StoreError),

    #[error("audit log error: {0}")]
    Audit(#[from] AuditLogError),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("pdf renderer error: {0}")]
    Pdf(#[from] PdfError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => CoreError::NotFound,
            StoreError::Conflict => CoreError::WriteConflict,
            other => CoreError::Store(other),
        }
    }
}
