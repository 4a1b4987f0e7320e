//! The application service facade.
//!
//! Every data operation goes through [`CvManager`]: it gates on
//! consent, talks to the encrypted record store, and appends to the
//! audit trail. Audit writes are best effort; a failed append is
//! logged and never fails the main operation.

mod applications;
mod audit;
mod cvs;
mod gdpr;
mod seal;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use covault_audit::{AuditAction, AuditCategory, AuditEvent, AuditLog};
use covault_storage::types::{AppConfig, Consent};
use covault_storage::{Slot, Store};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::audit_log::RecordAuditLog;
use crate::error::CoreError;
use crate::pdf::PdfRenderer;
use crate::records::EncryptedRecords;
use crate::vault::Vault;

pub(crate) const CONSENT_VERSION: &str = "1.0";

pub struct CvManager<S> {
    vault: Arc<Vault>,
    records: Arc<EncryptedRecords<S>>,
    audit: RecordAuditLog<S>,
    consent: RwLock<Option<Consent>>,
    data_dir: PathBuf,
    pdf: Box<dyn PdfRenderer>,
}

impl<S: Store> CvManager<S> {
    /// Open the vault in `data_dir` and wire the facade together.
    ///
    /// A sealed vault opens in the locked state; everything except
    /// seal status and unseal fails with [`CoreError::Sealed`] until
    /// the user provides the password.
    pub async fn open(
        store: S,
        data_dir: impl AsRef<Path>,
        pdf: Box<dyn PdfRenderer>,
    ) -> Result<Self, CoreError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let vault = Arc::new(Vault::open(&data_dir).await?);
        let records = Arc::new(EncryptedRecords::new(store, vault.clone()));
        let audit = RecordAuditLog::new(records.clone());

        let mgr = Self {
            vault,
            records,
            audit,
            consent: RwLock::new(None),
            data_dir,
            pdf,
        };

        if mgr.vault.is_locked().await {
            info!("storage sealed, session state deferred until unseal");
        } else {
            mgr.load_session_state().await?;
        }
        Ok(mgr)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Drop the in-memory key and cached consent; used on shutdown.
    pub async fn lock(&self) {
        self.vault.lock().await;
        *self.consent.write().await = None;
    }

    /// Load consent and app config from their slots.
    ///
    /// Called on open and again after a successful unseal.
    pub(crate) async fn load_session_state(&self) -> Result<(), CoreError> {
        let consent = match self.records.get_slot::<Consent>(Slot::Consent).await {
            Ok(consent) => consent,
            Err(CoreError::NotFound) => Consent::none(),
            Err(e) => return Err(e),
        };
        *self.consent.write().await = Some(consent);

        let config = match self.records.get_slot::<AppConfig>(Slot::AppConfig).await {
            Ok(mut config) => {
                config.first_run = false;
                config.last_opened_at = Utc::now();
                config
            }
            Err(CoreError::NotFound) => AppConfig::first_run(env!("CARGO_PKG_VERSION")),
            Err(e) => return Err(e),
        };
        self.records.put_slot(Slot::AppConfig, &config).await?;
        Ok(())
    }

    pub(crate) async fn consent_state(&self) -> Result<Consent, CoreError> {
        if let Some(consent) = self.consent.read().await.as_ref() {
            return Ok(consent.clone());
        }
        if self.vault.is_locked().await {
            return Err(CoreError::Sealed);
        }
        self.load_session_state().await?;
        Ok(self
            .consent
            .read()
            .await
            .clone()
            .unwrap_or_else(Consent::none))
    }

    pub(crate) async fn set_consent(&self, consent: Consent) -> Result<(), CoreError> {
        self.records.put_slot(Slot::Consent, &consent).await?;
        *self.consent.write().await = Some(consent);
        Ok(())
    }

    /// Consent gate. Rejections are themselves audited as failures.
    pub(crate) async fn require_consent(
        &self,
        action: AuditAction,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<(), CoreError> {
        if self.consent_state().await?.is_active() {
            return Ok(());
        }
        self.audit_event(
            AuditEvent::builder(action, AuditCategory::CvManagement)
                .resource(resource_type, resource_id)
                .failure("consent required")
                .build(),
        )
        .await;
        Err(CoreError::ConsentRequired)
    }

    pub(crate) async fn audit_event(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(event).await {
            warn!(error = %e, "failed to record audit event");
        }
    }

    pub(crate) fn exports_dir(&self) -> Result<PathBuf, CoreError> {
        let dir = self.data_dir.join("exports");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Write a file readable only by the owner.
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> Result<(), CoreError> {
    std::fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

pub(crate) fn export_stamp() -> String {
    Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}
