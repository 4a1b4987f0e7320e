//! SQLite implementation of the covault [`Store`] trait.
//!
//! A single-connection pool serializes all writes, and every statement
//! runs in its own implicit transaction, which gives the atomicity the
//! record store contract requires. `wipe_all` uses an explicit
//! transaction so records and slots disappear together.

use chrono::{DateTime, Utc};
use covault_storage::{EncryptedRow, RecordKind, RecordRow, Slot, Store, StoreError};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

fn ts_to_datetime(secs: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::Backend(format!("invalid timestamp {secs}")))
}

impl SqliteStore {
    /// `~/.covault/store.db` (creates dir with 0700 perms on unix)
    pub async fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::home_dir()
            .ok_or_else(|| StoreError::Backend("no home dir".into()))?
            .join(".covault");
        Self::open_at(&dir).await
    }

    /// Open (or create) `store.db` inside `dir`.
    pub async fn open_at(dir: &std::path::Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::Backend(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let path = dir.join("store.db");
        let url = format!("sqlite://{}?mode=rwc", path.to_string_lossy());
        Self::open(&url).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn put_record(
        &self,
        kind: RecordKind,
        id: &str,
        nonce: &[u8],
        ciphertext: &[u8],
    ) -> Result<DateTime<Utc>, StoreError> {
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO records(kind,id,nonce,ciphertext,created_at,updated_at)
             VALUES(?,?,?,?,?,?)
             ON CONFLICT(kind,id)
             DO UPDATE SET nonce=excluded.nonce,
                           ciphertext=excluded.ciphertext,
                           updated_at=excluded.updated_at",
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(nonce)
        .bind(ciphertext)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        ts_to_datetime(now)
    }

    async fn get_record(&self, kind: RecordKind, id: &str) -> Result<RecordRow, StoreError> {
        let row = sqlx::query_as::<_, (Vec<u8>, Vec<u8>, i64, i64)>(
            "SELECT nonce,ciphertext,created_at,updated_at FROM records WHERE kind=? AND id=?",
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        match row {
            None => Err(StoreError::NotFound),
            Some((nonce, ciphertext, created, updated)) => Ok(RecordRow {
                id: id.to_string(),
                nonce,
                ciphertext,
                created_at: ts_to_datetime(created)?,
                updated_at: ts_to_datetime(updated)?,
            }),
        }
    }

    async fn delete_record(&self, kind: RecordKind, id: &str) -> Result<(), StoreError> {
        // idempotent: deleting a missing record is fine
        sqlx::query("DELETE FROM records WHERE kind=? AND id=?")
            .bind(kind.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn list_records(&self, kind: RecordKind) -> Result<Vec<RecordRow>, StoreError> {
        let rows = sqlx::query_as::<_, (String, Vec<u8>, Vec<u8>, i64, i64)>(
            "SELECT id,nonce,ciphertext,created_at,updated_at FROM records WHERE kind=?",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, nonce, ciphertext, created, updated) in rows {
            out.push(RecordRow {
                id,
                nonce,
                ciphertext,
                created_at: ts_to_datetime(created)?,
                updated_at: ts_to_datetime(updated)?,
            });
        }
        Ok(out)
    }

    async fn count_records(&self, kind: RecordKind) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM records WHERE kind=?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(count as u64)
    }

    async fn put_slot(
        &self,
        slot: Slot,
        nonce: &[u8],
        ciphertext: &[u8],
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO slots(slot,nonce,ciphertext,updated_at)
             VALUES(?,?,?,?)
             ON CONFLICT(slot)
             DO UPDATE SET nonce=excluded.nonce,
                           ciphertext=excluded.ciphertext,
                           updated_at=excluded.updated_at",
        )
        .bind(slot.as_str())
        .bind(nonce)
        .bind(ciphertext)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_slot(&self, slot: Slot) -> Result<EncryptedRow, StoreError> {
        let row = sqlx::query_as::<_, (Vec<u8>, Vec<u8>)>(
            "SELECT nonce,ciphertext FROM slots WHERE slot=?",
        )
        .bind(slot.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        match row {
            None => Err(StoreError::NotFound),
            Some((nonce, ciphertext)) => Ok(EncryptedRow { nonce, ciphertext }),
        }
    }

    async fn delete_slot(&self, slot: Slot) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM slots WHERE slot=?")
            .bind(slot.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn wipe_all(&self) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query("DELETE FROM records")
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query("DELETE FROM slots")
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}
