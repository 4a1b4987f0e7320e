//! Consent lifecycle, compliance view, and the GDPR export and
//! erasure paths.

use std::path::PathBuf;

use chrono::Utc;
use covault_audit::{
    AuditAction, AuditCategory, AuditEvent, AuditFilter, AuditLog, ComplianceEntry,
};
use covault_storage::types::{Consent, Cv, JobApplication};
use covault_storage::{RecordKind, Store};
use serde::Serialize;
use tracing::{info, warn};

use super::{export_stamp, write_private, CvManager, CONSENT_VERSION};
use crate::error::CoreError;
use crate::security::{security_info, SecurityInfo};

/// Everything the installation knows, for the data portability export.
#[derive(Serialize)]
struct GdprExport {
    exported_at: chrono::DateTime<chrono::Utc>,
    app_version: String,
    consent: Consent,
    cvs: Vec<Cv>,
    applications: Vec<JobApplication>,
    audit_log: Vec<AuditEvent>,
}

impl<S: Store> CvManager<S> {
    pub async fn get_consent(&self) -> Result<Consent, CoreError> {
        self.consent_state().await
    }

    /// Grant (or re-grant) consent. Stored data is untouched, so a
    /// grant after a withdrawal makes everything accessible again.
    pub async fn grant_consent(&self) -> Result<Consent, CoreError> {
        let mut consent = self.consent_state().await?;
        consent.grant(CONSENT_VERSION);
        self.set_consent(consent.clone()).await?;

        self.audit_event(
            AuditEvent::builder(AuditAction::ConsentGrant, AuditCategory::Settings)
                .resource("consent", "user-consent")
                .build(),
        )
        .await;
        info!("consent granted");
        Ok(consent)
    }

    /// Withdraw consent. Data stays stored but becomes inaccessible
    /// until consent is granted again.
    pub async fn withdraw_consent(&self) -> Result<Consent, CoreError> {
        let mut consent = self.consent_state().await?;
        if !consent.withdraw() {
            self.audit_event(
                AuditEvent::builder(AuditAction::ConsentWithdraw, AuditCategory::Settings)
                    .resource("consent", "user-consent")
                    .failure("consent was never granted")
                    .build(),
            )
            .await;
            return Err(CoreError::ConsentRequired);
        }
        self.set_consent(consent.clone()).await?;

        self.audit_event(
            AuditEvent::builder(AuditAction::ConsentWithdraw, AuditCategory::Settings)
                .resource("consent", "user-consent")
                .build(),
        )
        .await;
        info!("consent withdrawn");
        Ok(consent)
    }

    /// Static description of the encryption setup and the GDPR
    /// articles it addresses. Not consent-gated: it contains no
    /// personal data.
    pub fn get_security_info(&self) -> SecurityInfo {
        security_info(&self.data_dir)
    }

    /// The audit trail mapped to GDPR legal bases, oldest first.
    pub async fn get_compliance_log(&self) -> Result<Vec<ComplianceEntry>, CoreError> {
        let mut events = self.audit.query(&AuditFilter::new()).await?;
        events.reverse();
        Ok(events.iter().map(ComplianceEntry::from_event).collect())
    }

    /// Art. 20 data portability: write every record, the consent state
    /// and the audit trail as one JSON document.
    pub async fn export_all_data_gdpr(&self) -> Result<PathBuf, CoreError> {
        self.require_consent(AuditAction::Export, "all_data", "full-export")
            .await?;

        let consent = self.consent_state().await?;
        let cvs = self.decoded_records::<Cv>(RecordKind::Cv).await?;
        let applications = self
            .decoded_records::<JobApplication>(RecordKind::Application)
            .await?;
        let audit_log = self.audit.query(&AuditFilter::new()).await?;

        let export = GdprExport {
            exported_at: Utc::now(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            consent,
            cvs,
            applications,
            audit_log,
        };

        let path = self
            .data_dir
            .join(format!("gdpr_export_{}.json", export_stamp()));
        write_private(&path, &serde_json::to_vec_pretty(&export)?)?;

        self.audit_event(
            AuditEvent::builder(AuditAction::Export, AuditCategory::DataExport)
                .resource("all_data", "full-export")
                .metadata(serde_json::json!({ "path": path.display().to_string() }))
                .build(),
        )
        .await;
        info!(path = %path.display(), "gdpr export written");
        Ok(path)
    }

    /// Art. 17 erasure: wipe every record and slot, replace the
    /// encryption key, and reset consent to the never-granted state.
    ///
    /// The erasure intent is appended before the wipe so a partial
    /// failure still leaves a trace; a completed wipe takes the old
    /// trail with it, and a fresh completion entry documents the
    /// erasure afterwards.
    pub async fn delete_all_data_gdpr(&self) -> Result<(), CoreError> {
        self.require_consent(AuditAction::Delete, "all_data", "full-deletion")
            .await?;

        self.audit_event(
            AuditEvent::builder(AuditAction::Delete, AuditCategory::DataExport)
                .resource("all_data", "full-deletion")
                .metadata(serde_json::json!({ "phase": "intent" }))
                .build(),
        )
        .await;

        self.records.wipe_all().await?;
        self.vault.reset().await?;
        *self.consent.write().await = Some(Consent::none());

        self.audit_event(
            AuditEvent::builder(AuditAction::Delete, AuditCategory::DataExport)
                .resource("all_data", "full-deletion")
                .metadata(serde_json::json!({ "phase": "completed" }))
                .build(),
        )
        .await;
        info!("all user data erased");
        Ok(())
    }

    async fn decoded_records<T: serde::de::DeserializeOwned>(
        &self,
        kind: RecordKind,
    ) -> Result<Vec<T>, CoreError> {
        let mut out = Vec::new();
        for (id, decoded) in self.records.list::<T>(kind).await? {
            match decoded {
                Ok(value) => out.push(value),
                Err(e) => warn!(record_id = %id, error = %e, "skipping damaged record in export"),
            }
        }
        Ok(out)
    }
}
