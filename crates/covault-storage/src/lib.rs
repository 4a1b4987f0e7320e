//! Storage abstraction for covault.
//!
//! Backend crates (e.g., covault-store-sqlite) implement this trait so
//! `covault-core` doesn't depend on any specific database engine or schema
//! details. The store only ever sees AEAD ciphertext; plaintext never
//! reaches a backend.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod types;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Namespaces for multi-record data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Cv,
    Application,
    Audit,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Cv, RecordKind::Application, RecordKind::Audit];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Cv => "cv",
            RecordKind::Application => "application",
            RecordKind::Audit => "audit",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named singleton slots (at most one value each).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Consent,
    AppConfig,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Consent => "consent",
            Slot::AppConfig => "app_config",
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encrypted value (nonce + ciphertext); no plaintext in storage.
#[derive(Clone, Debug)]
pub struct EncryptedRow {
    pub nonce: Vec<u8>,      // 24 bytes (XChaCha20 nonce)
    pub ciphertext: Vec<u8>, // AEAD ciphertext
}

/// Encrypted record with its key and row metadata.
#[derive(Clone, Debug)]
pub struct RecordRow {
    pub id: String,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The storage trait `covault-core` depends on.
///
/// Every method must be atomic on its own: either the whole change is
/// durable or none of it is. `delete_record` is idempotent.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Upsert a record; returns the new `updated_at`.
    /// `created_at` is preserved when the record already exists.
    async fn put_record(
        &self,
        kind: RecordKind,
        id: &str,
        nonce: &[u8],
        ciphertext: &[u8],
    ) -> Result<DateTime<Utc>, StoreError>;

    /// Fetch a record row.
    async fn get_record(&self, kind: RecordKind, id: &str) -> Result<RecordRow, StoreError>;

    /// Delete a record. Deleting a missing record succeeds.
    async fn delete_record(&self, kind: RecordKind, id: &str) -> Result<(), StoreError>;

    /// List all records of a kind. Order is unspecified.
    async fn list_records(&self, kind: RecordKind) -> Result<Vec<RecordRow>, StoreError>;

    /// Count records of a kind.
    async fn count_records(&self, kind: RecordKind) -> Result<u64, StoreError>;

    /// Upsert a singleton slot value.
    async fn put_slot(&self, slot: Slot, nonce: &[u8], ciphertext: &[u8])
        -> Result<(), StoreError>;

    /// Fetch a singleton slot value.
    async fn get_slot(&self, slot: Slot) -> Result<EncryptedRow, StoreError>;

    /// Delete a singleton slot value. Idempotent.
    async fn delete_slot(&self, slot: Slot) -> Result<(), StoreError>;

    /// Remove every record and slot in one atomic step.
    async fn wipe_all(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tiny compile-time smoke test for trait object usage.
    struct NoopStore;

    #[async_trait::async_trait]
    impl Store for NoopStore {
        async fn put_record(
            &self,
            _kind: RecordKind,
            _id: &str,
            _nonce: &[u8],
            _ciphertext: &[u8],
        ) -> Result<DateTime<Utc>, StoreError> {
            Ok(Utc::now())
        }

        async fn get_record(&self, _kind: RecordKind, _id: &str) -> Result<RecordRow, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn delete_record(&self, _kind: RecordKind, _id: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn list_records(&self, _kind: RecordKind) -> Result<Vec<RecordRow>, StoreError> {
            Ok(vec![])
        }

        async fn count_records(&self, _kind: RecordKind) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn put_slot(
            &self,
            _slot: Slot,
            _nonce: &[u8],
            _ciphertext: &[u8],
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get_slot(&self, _slot: Slot) -> Result<EncryptedRow, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn delete_slot(&self, _slot: Slot) -> Result<(), StoreError> {
            Ok(())
        }

        async fn wipe_all(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn trait_smoke() {
        let s: Box<dyn Store> = Box::new(NoopStore);

        let ts = s
            .put_record(RecordKind::Cv, "id", &[0; 24], &[1, 2, 3])
            .await
            .unwrap();
        assert!(ts <= Utc::now());

        assert!(matches!(
            s.get_record(RecordKind::Cv, "id").await,
            Err(StoreError::NotFound)
        ));
        s.delete_record(RecordKind::Cv, "missing").await.unwrap();
        assert_eq!(s.count_records(RecordKind::Audit).await.unwrap(), 0);
        s.wipe_all().await.unwrap();
    }

    #[test]
    fn kind_and_slot_names_are_stable() {
        assert_eq!(RecordKind::Cv.as_str(), "cv");
        assert_eq!(RecordKind::Application.as_str(), "application");
        assert_eq!(RecordKind::Audit.as_str(), "audit");
        assert_eq!(Slot::Consent.as_str(), "consent");
        assert_eq!(Slot::AppConfig.as_str(), "app_config");
    }
}
