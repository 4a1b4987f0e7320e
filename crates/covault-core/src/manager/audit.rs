//! Audit trail queries, audit export, and app config access.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use covault_audit::{
    AuditAction, AuditCategory, AuditEvent, AuditFilter, AuditLog, AuditStats,
};
use covault_storage::types::AppConfig;
use covault_storage::{Slot, Store};

use super::{export_stamp, write_private, CvManager};
use crate::error::CoreError;

impl<S: Store> CvManager<S> {
    pub async fn get_audit_events(
        &self,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEvent>, CoreError> {
        Ok(self.audit.query(filter).await?)
    }

    pub async fn get_audit_stats(&self) -> Result<AuditStats, CoreError> {
        Ok(self.audit.stats().await?)
    }

    pub async fn get_audit_events_by_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<Vec<AuditEvent>, CoreError> {
        let filter = AuditFilter::new().resource(resource_type, resource_id);
        Ok(self.audit.query(&filter).await?)
    }

    /// Write the matching audit events as JSON into the exports
    /// directory and return the file path.
    pub async fn export_audit_events(&self, filter: &AuditFilter) -> Result<PathBuf, CoreError> {
        let events = self.audit.query(filter).await?;

        let dir = self.exports_dir()?;
        let path = dir.join(format!("audit_export_{}.json", export_stamp()));
        write_private(&path, &serde_json::to_vec_pretty(&events)?)?;

        self.audit_event(
            AuditEvent::builder(AuditAction::Export, AuditCategory::DataExport)
                .resource("audit_log", "export")
                .metadata(serde_json::json!({
                    "path": path.display().to_string(),
                    "count": events.len(),
                }))
                .build(),
        )
        .await;
        Ok(path)
    }

    /// Remove audit events older than the retention window. Returns
    /// the number removed.
    pub async fn delete_old_audit_logs(&self, retention_days: i64) -> Result<u64, CoreError> {
        let before = Utc::now() - Duration::days(retention_days);
        Ok(self.audit.prune(before).await?)
    }

    pub async fn get_app_config(&self) -> Result<AppConfig, CoreError> {
        match self.records.get_slot::<AppConfig>(Slot::AppConfig).await {
            Ok(config) => Ok(config),
            Err(CoreError::NotFound) => {
                let config = AppConfig::first_run(env!("CARGO_PKG_VERSION"));
                self.records.put_slot(Slot::AppConfig, &config).await?;
                Ok(config)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn mark_onboarding_completed(&self) -> Result<AppConfig, CoreError> {
        let mut config = self.get_app_config().await?;
        config.onboarding_shown = true;
        self.records.put_slot(Slot::AppConfig, &config).await?;
        Ok(config)
    }
}
