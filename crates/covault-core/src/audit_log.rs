//! Audit log backed by the encrypted record store.
//!
//! Events live as individual records under [`RecordKind::Audit`], so
//! the trail is encrypted at rest like everything else and disappears
//! with a full wipe.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use covault_audit::{AuditEvent, AuditFilter, AuditLog, AuditLogError, AuditStats};
use covault_storage::{RecordKind, Store};
use tracing::warn;

use crate::records::EncryptedRecords;

pub struct RecordAuditLog<S> {
    records: Arc<EncryptedRecords<S>>,
}

impl<S: Store> RecordAuditLog<S> {
    pub fn new(records: Arc<EncryptedRecords<S>>) -> Self {
        Self { records }
    }

    async fn load_all(&self) -> Result<Vec<AuditEvent>, AuditLogError> {
        let rows = self
            .records
            .list::<AuditEvent>(RecordKind::Audit)
            .await
            .map_err(|e| AuditLogError::Backend(e.to_string()))?;

        let mut events = Vec::with_capacity(rows.len());
        for (id, decoded) in rows {
            match decoded {
                Ok(event) => events.push(event),
                Err(e) => warn!(record_id = %id, error = %e, "skipping undecodable audit record"),
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl<S: Store> AuditLog for RecordAuditLog<S> {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditLogError> {
        self.records
            .put(RecordKind::Audit, &event.id.to_string(), &event)
            .await
            .map_err(|e| AuditLogError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditLogError> {
        let mut events = self.load_all().await?;
        events.retain(|e| filter.matches(e));
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let offset = filter.offset.unwrap_or(0);
        let mut events: Vec<AuditEvent> = events.into_iter().skip(offset).collect();
        if let Some(limit) = filter.limit {
            events.truncate(limit);
        }
        Ok(events)
    }

    async fn count(&self, filter: &AuditFilter) -> Result<u64, AuditLogError> {
        let events = self.load_all().await?;
        Ok(events.iter().filter(|e| filter.matches(e)).count() as u64)
    }

    async fn stats(&self) -> Result<AuditStats, AuditLogError> {
        let events = self.load_all().await?;
        Ok(AuditStats::compute(&events, Utc::now()))
    }

    async fn prune(&self, before: DateTime<Utc>) -> Result<u64, AuditLogError> {
        let events = self.load_all().await?;
        let mut removed = 0u64;
        for event in events.iter().filter(|e| e.timestamp < before) {
            self.records
                .delete(RecordKind::Audit, &event.id.to_string())
                .await
                .map_err(|e| AuditLogError::Backend(e.to_string()))?;
            removed += 1;
        }
        Ok(removed)
    }
}
