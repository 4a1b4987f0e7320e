//! CV lifecycle operations.

use std::path::PathBuf;

use chrono::Utc;
use covault_audit::{AuditAction, AuditCategory, AuditEvent};
use covault_storage::types::{Cv, CvSummary, Statistics};
use covault_storage::{RecordKind, Store};
use tracing::warn;

use super::CvManager;
use crate::error::CoreError;
use crate::manager::export_stamp;

const RESOURCE: &str = "cv";

impl<S: Store> CvManager<S> {
    pub async fn create_cv(&self) -> Result<Cv, CoreError> {
        self.require_consent(AuditAction::Create, RESOURCE, "new")
            .await?;

        let cv = Cv::new();
        self.records.put(RecordKind::Cv, &cv.id, &cv).await?;
        self.audit_event(
            AuditEvent::builder(AuditAction::Create, AuditCategory::CvManagement)
                .resource(RESOURCE, &cv.id)
                .build(),
        )
        .await;
        Ok(cv)
    }

    /// Fetch a CV and bump its view counter.
    ///
    /// The counter update does not touch `updated_at`, so viewing a CV
    /// never reorders the dashboard.
    pub async fn get_cv(&self, id: &str) -> Result<Cv, CoreError> {
        self.require_consent(AuditAction::Read, RESOURCE, id).await?;

        let mut cv = match self.records.get::<Cv>(RecordKind::Cv, id).await {
            Ok(cv) => cv,
            Err(e) => {
                self.audit_event(
                    AuditEvent::builder(AuditAction::Read, AuditCategory::CvManagement)
                        .resource(RESOURCE, id)
                        .failure(e.to_string())
                        .build(),
                )
                .await;
                return Err(e);
            }
        };

        cv.view_count += 1;
        cv.last_viewed = Some(Utc::now());
        self.records.put(RecordKind::Cv, id, &cv).await?;

        self.audit_event(
            AuditEvent::builder(AuditAction::Read, AuditCategory::CvManagement)
                .resource(RESOURCE, id)
                .build(),
        )
        .await;
        Ok(cv)
    }

    /// Summaries of all CVs, newest update first.
    ///
    /// A damaged record is skipped with a warning instead of hiding
    /// the healthy ones.
    pub async fn get_all_cvs(&self) -> Result<Vec<CvSummary>, CoreError> {
        self.require_consent(AuditAction::Read, RESOURCE, "all")
            .await?;

        let mut summaries = Vec::new();
        for (id, decoded) in self.records.list::<Cv>(RecordKind::Cv).await? {
            match decoded {
                Ok(cv) => summaries.push(cv.to_summary()),
                Err(e) => warn!(record_id = %id, error = %e, "skipping damaged cv record"),
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        self.audit_event(
            AuditEvent::builder(AuditAction::Read, AuditCategory::CvManagement)
                .resource(RESOURCE, "all")
                .metadata(serde_json::json!({ "count": summaries.len() }))
                .build(),
        )
        .await;
        Ok(summaries)
    }

    pub async fn save_cv(&self, mut cv: Cv) -> Result<Cv, CoreError> {
        self.require_consent(AuditAction::Update, RESOURCE, &cv.id)
            .await?;

        if cv.id.trim().is_empty() {
            let err = "cv id must not be empty";
            self.audit_event(
                AuditEvent::builder(AuditAction::Update, AuditCategory::CvManagement)
                    .resource(RESOURCE, "invalid")
                    .failure(err)
                    .build(),
            )
            .await;
            return Err(CoreError::Validation(err.to_string()));
        }

        cv.normalize_tags();
        cv.updated_at = Utc::now();
        self.records.put(RecordKind::Cv, &cv.id, &cv).await?;

        self.audit_event(
            AuditEvent::builder(AuditAction::Update, AuditCategory::CvManagement)
                .resource(RESOURCE, &cv.id)
                .build(),
        )
        .await;
        Ok(cv)
    }

    /// Delete a CV. Deleting a missing CV succeeds.
    pub async fn delete_cv(&self, id: &str) -> Result<(), CoreError> {
        self.require_consent(AuditAction::Delete, RESOURCE, id)
            .await?;

        self.records.delete(RecordKind::Cv, id).await?;
        self.audit_event(
            AuditEvent::builder(AuditAction::Delete, AuditCategory::CvManagement)
                .resource(RESOURCE, id)
                .build(),
        )
        .await;
        Ok(())
    }

    /// Delete several CVs; keeps going on individual failures and
    /// reports the last one.
    pub async fn bulk_delete_cvs(&self, ids: &[String]) -> Result<(), CoreError> {
        let mut last_err = None;
        for id in ids {
            if let Err(e) = self.delete_cv(id).await {
                warn!(record_id = %id, error = %e, "bulk delete: cv failed");
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Flip the favorite flag and return the new value.
    pub async fn toggle_favorite(&self, id: &str) -> Result<bool, CoreError> {
        self.require_consent(AuditAction::Update, RESOURCE, id)
            .await?;

        let mut cv = self.records.get::<Cv>(RecordKind::Cv, id).await?;
        cv.is_favorite = !cv.is_favorite;
        self.records.put(RecordKind::Cv, id, &cv).await?;

        self.audit_event(
            AuditEvent::builder(AuditAction::Update, AuditCategory::CvManagement)
                .resource(RESOURCE, id)
                .changed_fields(vec!["is_favorite".to_string()])
                .build(),
        )
        .await;
        Ok(cv.is_favorite)
    }

    pub async fn get_favorite_cvs(&self) -> Result<Vec<CvSummary>, CoreError> {
        let mut summaries = self.get_all_cvs().await?;
        summaries.retain(|s| s.is_favorite);
        Ok(summaries)
    }

    /// Case-insensitive search over names, titles, targets and tags.
    pub async fn search_cvs(&self, query: &str) -> Result<Vec<CvSummary>, CoreError> {
        self.require_consent(AuditAction::Read, RESOURCE, "search")
            .await?;

        let needle = query.trim().to_lowercase();
        let mut summaries = Vec::new();
        for (id, decoded) in self.records.list::<Cv>(RecordKind::Cv).await? {
            match decoded {
                Ok(cv) => {
                    if needle.is_empty() || cv_matches(&cv, &needle) {
                        summaries.push(cv.to_summary());
                    }
                }
                Err(e) => warn!(record_id = %id, error = %e, "skipping damaged cv record"),
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    pub async fn get_statistics(&self) -> Result<Statistics, CoreError> {
        self.require_consent(AuditAction::Read, RESOURCE, "statistics")
            .await?;

        let cvs: Vec<Cv> = self
            .records
            .list::<Cv>(RecordKind::Cv)
            .await?
            .into_iter()
            .filter_map(|(_, decoded)| decoded.ok())
            .collect();
        Ok(Statistics::compute(&cvs))
    }

    /// Render a CV through the configured renderer and bump its export
    /// counter. Returns the path of the written file.
    pub async fn export_pdf(&self, id: &str) -> Result<PathBuf, CoreError> {
        self.require_consent(AuditAction::Export, RESOURCE, id)
            .await?;

        let mut cv = match self.records.get::<Cv>(RecordKind::Cv, id).await {
            Ok(cv) => cv,
            Err(e) => {
                self.audit_event(
                    AuditEvent::builder(AuditAction::Export, AuditCategory::CvManagement)
                        .resource(RESOURCE, id)
                        .failure(e.to_string())
                        .build(),
                )
                .await;
                return Err(e);
            }
        };

        let dir = self.exports_dir()?;
        let filename = format!("{}_{}.pdf", sanitize_filename(&cv.display_name()), export_stamp());
        let path = dir.join(filename);
        self.pdf.render(&cv, &path)?;

        cv.export_count += 1;
        cv.last_exported = Some(Utc::now());
        self.records.put(RecordKind::Cv, id, &cv).await?;

        self.audit_event(
            AuditEvent::builder(AuditAction::Export, AuditCategory::CvManagement)
                .resource(RESOURCE, id)
                .metadata(serde_json::json!({ "path": path.display().to_string() }))
                .build(),
        )
        .await;
        Ok(path)
    }
}

fn cv_matches(cv: &Cv, needle: &str) -> bool {
    let haystacks = [
        cv.display_name(),
        cv.job_title.clone(),
        cv.email.clone(),
        cv.target_job.clone(),
        cv.target_company.clone(),
    ];
    if haystacks.iter().any(|h| h.to_lowercase().contains(needle)) {
        return true;
    }
    cv.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
