//! Typed encrypted record access on top of a [`Store`] backend.
//!
//! Every record is serialized to JSON and sealed with AEAD. The
//! record key is bound into the associated data, so a ciphertext
//! moved to a different key fails authentication.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use covault_storage::{RecordKind, Slot, Store};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CoreError;
use crate::vault::Vault;

pub struct EncryptedRecords<S> {
    store: S,
    vault: Arc<Vault>,
}

impl<S: Store> EncryptedRecords<S> {
    pub fn new(store: S, vault: Arc<Vault>) -> Self {
        Self { store, vault }
    }

    fn record_aad(kind: RecordKind, id: &str) -> Vec<u8> {
        format!("{kind}:{id}").into_bytes()
    }

    fn slot_aad(slot: Slot) -> Vec<u8> {
        format!("slot:{slot}").into_bytes()
    }

    pub async fn put<T: Serialize>(
        &self,
        kind: RecordKind,
        id: &str,
        value: &T,
    ) -> Result<DateTime<Utc>, CoreError> {
        let plaintext = serde_json::to_vec(value)?;
        let (nonce, ciphertext) = self
            .vault
            .encrypt(&plaintext, &Self::record_aad(kind, id))
            .await?;
        Ok(self.store.put_record(kind, id, &nonce, &ciphertext).await?)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
        id: &str,
    ) -> Result<T, CoreError> {
        let row = self.store.get_record(kind, id).await?;
        self.decode(&row.nonce, &row.ciphertext, &Self::record_aad(kind, id))
            .await
    }

    /// Decrypt and decode every record of a kind.
    ///
    /// Damage is isolated per record: a tampered row comes back as
    /// `Err(Corrupt)` in its slot instead of failing the whole list.
    /// A locked vault still fails the call as a whole.
    pub async fn list<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
    ) -> Result<Vec<(String, Result<T, CoreError>)>, CoreError> {
        let rows = self.store.list_records(kind).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let aad = Self::record_aad(kind, &row.id);
            match self.decode(&row.nonce, &row.ciphertext, &aad).await {
                Err(CoreError::Sealed) => return Err(CoreError::Sealed),
                decoded => out.push((row.id, decoded)),
            }
        }
        Ok(out)
    }

    pub async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), CoreError> {
        Ok(self.store.delete_record(kind, id).await?)
    }

    pub async fn count(&self, kind: RecordKind) -> Result<u64, CoreError> {
        Ok(self.store.count_records(kind).await?)
    }

    pub async fn put_slot<T: Serialize>(&self, slot: Slot, value: &T) -> Result<(), CoreError> {
        let plaintext = serde_json::to_vec(value)?;
        let (nonce, ciphertext) = self.vault.encrypt(&plaintext, &Self::slot_aad(slot)).await?;
        Ok(self.store.put_slot(slot, &nonce, &ciphertext).await?)
    }

    pub async fn get_slot<T: DeserializeOwned>(&self, slot: Slot) -> Result<T, CoreError> {
        let row = self.store.get_slot(slot).await?;
        self.decode(&row.nonce, &row.ciphertext, &Self::slot_aad(slot))
            .await
    }

    pub async fn delete_slot(&self, slot: Slot) -> Result<(), CoreError> {
        Ok(self.store.delete_slot(slot).await?)
    }

    pub async fn wipe_all(&self) -> Result<(), CoreError> {
        Ok(self.store.wipe_all().await?)
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        nonce: &[u8],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<T, CoreError> {
        let plaintext = self.vault.decrypt(ciphertext, nonce, aad).await?;
        serde_json::from_slice(&plaintext).map_err(|_| CoreError::Corrupt)
    }
}
