//! Seal operations: password protection of the stored key.

use covault_audit::{AuditAction, AuditCategory, AuditEvent};
use covault_storage::Store;

use super::CvManager;
use crate::error::CoreError;
use crate::vault::SealStatus;

impl<S: Store> CvManager<S> {
    pub async fn get_seal_status(&self) -> SealStatus {
        self.vault.status().await
    }

    /// Protect the stored key with a password.
    ///
    /// The current session keeps working; the protection bites on the
    /// next start (or after [`CvManager::lock`]).
    pub async fn seal_storage(&self, password: &str) -> Result<(), CoreError> {
        if password.trim().is_empty() {
            return Err(CoreError::Validation(
                "password must not be empty".to_string(),
            ));
        }

        match self.vault.seal(password).await {
            Ok(()) => {
                self.audit_event(
                    AuditEvent::builder(AuditAction::Seal, AuditCategory::Auth)
                        .resource("storage", "seal")
                        .build(),
                )
                .await;
                Ok(())
            }
            Err(e) => {
                self.audit_event(
                    AuditEvent::builder(AuditAction::Seal, AuditCategory::Auth)
                        .resource("storage", "seal")
                        .failure(e.to_string())
                        .build(),
                )
                .await;
                Err(e)
            }
        }
    }

    /// Verify the password and load the key for this session.
    pub async fn unseal_storage(&self, password: &str) -> Result<(), CoreError> {
        if let Err(e) = self.vault.unseal(password).await {
            // Audit append needs the key, so a failed unseal can only
            // be traced once the vault is open again.
            self.audit_event(
                AuditEvent::builder(AuditAction::Unseal, AuditCategory::Auth)
                    .resource("storage", "unseal")
                    .failure(e.to_string())
                    .build(),
            )
            .await;
            return Err(e);
        }

        self.load_session_state().await?;
        self.audit_event(
            AuditEvent::builder(AuditAction::Unseal, AuditCategory::Auth)
                .resource("storage", "unseal")
                .build(),
        )
        .await;
        Ok(())
    }

    /// Verify the password and return to the machine-bound mode.
    pub async fn remove_seal(&self, password: &str) -> Result<(), CoreError> {
        self.vault.remove_seal(password).await?;
        if self.consent.read().await.is_none() {
            self.load_session_state().await?;
        }
        self.audit_event(
            AuditEvent::builder(AuditAction::Seal, AuditCategory::Auth)
                .resource("storage", "seal")
                .metadata(serde_json::json!({ "removed": true }))
                .build(),
        )
        .await;
        Ok(())
    }
}
