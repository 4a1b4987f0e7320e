//! Job application tracking.

use chrono::Utc;
use covault_audit::{AuditAction, AuditCategory, AuditEvent};
use covault_storage::types::{
    ApplicationStatus, ApplicationsStatistics, Cv, JobApplication, JOB_PORTALS,
};
use covault_storage::{RecordKind, Store};
use tracing::warn;

use super::CvManager;
use crate::error::CoreError;

const RESOURCE: &str = "application";

impl<S: Store> CvManager<S> {
    pub async fn create_application(&self) -> Result<JobApplication, CoreError> {
        self.require_consent(AuditAction::Create, RESOURCE, "new")
            .await?;

        let app = JobApplication::new();
        self.records
            .put(RecordKind::Application, &app.id, &app)
            .await?;
        self.audit_event(
            AuditEvent::builder(AuditAction::Create, AuditCategory::CvManagement)
                .resource(RESOURCE, &app.id)
                .build(),
        )
        .await;
        Ok(app)
    }

    pub async fn get_application(&self, id: &str) -> Result<JobApplication, CoreError> {
        self.require_consent(AuditAction::Read, RESOURCE, id).await?;

        match self
            .records
            .get::<JobApplication>(RecordKind::Application, id)
            .await
        {
            Ok(app) => Ok(app),
            Err(e) => {
                self.audit_event(
                    AuditEvent::builder(AuditAction::Read, AuditCategory::CvManagement)
                        .resource(RESOURCE, id)
                        .failure(e.to_string())
                        .build(),
                )
                .await;
                Err(e)
            }
        }
    }

    /// All applications, newest update first. Damaged records are
    /// skipped with a warning.
    pub async fn get_all_applications(&self) -> Result<Vec<JobApplication>, CoreError> {
        self.require_consent(AuditAction::Read, RESOURCE, "all")
            .await?;

        let mut apps = Vec::new();
        for (id, decoded) in self
            .records
            .list::<JobApplication>(RecordKind::Application)
            .await?
        {
            match decoded {
                Ok(app) => apps.push(app),
                Err(e) => {
                    warn!(record_id = %id, error = %e, "skipping damaged application record")
                }
            }
        }
        apps.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(apps)
    }

    pub async fn save_application(
        &self,
        mut app: JobApplication,
    ) -> Result<JobApplication, CoreError> {
        self.require_consent(AuditAction::Update, RESOURCE, &app.id)
            .await?;

        if app.id.trim().is_empty() {
            return Err(CoreError::Validation(
                "application id must not be empty".to_string(),
            ));
        }
        if app.priority < 1 || app.priority > 5 {
            return Err(CoreError::Validation(
                "priority must be between 1 and 5".to_string(),
            ));
        }

        // The CV may be deleted later, so the display name is frozen
        // into the application when one is linked.
        if !app.cv_id.is_empty() && app.cv_snapshot.is_empty() {
            if let Ok(cv) = self.records.get::<Cv>(RecordKind::Cv, &app.cv_id).await {
                app.cv_snapshot = cv.display_name();
            }
        }

        app.updated_at = Utc::now();
        self.records
            .put(RecordKind::Application, &app.id, &app)
            .await?;

        self.audit_event(
            AuditEvent::builder(AuditAction::Update, AuditCategory::CvManagement)
                .resource(RESOURCE, &app.id)
                .build(),
        )
        .await;
        Ok(app)
    }

    /// Delete an application. Deleting a missing one succeeds.
    pub async fn delete_application(&self, id: &str) -> Result<(), CoreError> {
        self.require_consent(AuditAction::Delete, RESOURCE, id)
            .await?;

        self.records.delete(RecordKind::Application, id).await?;
        self.audit_event(
            AuditEvent::builder(AuditAction::Delete, AuditCategory::CvManagement)
                .resource(RESOURCE, id)
                .build(),
        )
        .await;
        Ok(())
    }

    /// Move an application to a new status, recording the transition
    /// in its timeline.
    pub async fn update_application_status(
        &self,
        id: &str,
        status: ApplicationStatus,
        details: &str,
    ) -> Result<JobApplication, CoreError> {
        self.require_consent(AuditAction::Update, RESOURCE, id)
            .await?;

        let mut app = self
            .records
            .get::<JobApplication>(RecordKind::Application, id)
            .await?;
        let old_status = app.status;
        app.update_status(status, details);
        app.updated_at = Utc::now();
        self.records
            .put(RecordKind::Application, id, &app)
            .await?;

        self.audit_event(
            AuditEvent::builder(AuditAction::Update, AuditCategory::CvManagement)
                .resource(RESOURCE, id)
                .changed_fields(vec!["status".to_string()])
                .metadata(serde_json::json!({
                    "from": old_status.as_str(),
                    "to": status.as_str(),
                }))
                .build(),
        )
        .await;
        Ok(app)
    }

    pub async fn add_application_timeline_event(
        &self,
        id: &str,
        kind: &str,
        title: &str,
        details: &str,
    ) -> Result<JobApplication, CoreError> {
        self.require_consent(AuditAction::Update, RESOURCE, id)
            .await?;

        let mut app = self
            .records
            .get::<JobApplication>(RecordKind::Application, id)
            .await?;
        app.add_timeline_event(kind, title, details);
        app.updated_at = Utc::now();
        self.records
            .put(RecordKind::Application, id, &app)
            .await?;

        self.audit_event(
            AuditEvent::builder(AuditAction::Update, AuditCategory::CvManagement)
                .resource(RESOURCE, id)
                .changed_fields(vec!["timeline".to_string()])
                .build(),
        )
        .await;
        Ok(app)
    }

    pub async fn add_application_feedback(
        &self,
        id: &str,
        kind: &str,
        title: &str,
        content: &str,
        rating: u8,
    ) -> Result<JobApplication, CoreError> {
        self.require_consent(AuditAction::Update, RESOURCE, id)
            .await?;

        if rating > 5 {
            return Err(CoreError::Validation(
                "rating must be between 0 and 5".to_string(),
            ));
        }

        let mut app = self
            .records
            .get::<JobApplication>(RecordKind::Application, id)
            .await?;
        app.add_feedback(kind, title, content, rating);
        app.updated_at = Utc::now();
        self.records
            .put(RecordKind::Application, id, &app)
            .await?;

        self.audit_event(
            AuditEvent::builder(AuditAction::Update, AuditCategory::CvManagement)
                .resource(RESOURCE, id)
                .changed_fields(vec!["feedback".to_string()])
                .build(),
        )
        .await;
        Ok(app)
    }

    pub async fn get_applications_by_cv(
        &self,
        cv_id: &str,
    ) -> Result<Vec<JobApplication>, CoreError> {
        let mut apps = self.get_all_applications().await?;
        apps.retain(|a| a.cv_id == cv_id);
        Ok(apps)
    }

    pub async fn get_applications_statistics(&self) -> Result<ApplicationsStatistics, CoreError> {
        self.require_consent(AuditAction::Read, RESOURCE, "statistics")
            .await?;

        let apps: Vec<JobApplication> = self
            .records
            .list::<JobApplication>(RecordKind::Application)
            .await?
            .into_iter()
            .filter_map(|(_, decoded)| decoded.ok())
            .collect();
        Ok(ApplicationsStatistics::compute(&apps))
    }

    /// The known job portal names, "Andere" last.
    pub fn job_portals(&self) -> &'static [&'static str] {
        &JOB_PORTALS
    }
}
