//! Audit logging abstraction for covault.
//!
//! This crate defines the `AuditLog` trait for persisting audit events,
//! the types representing auditable actions, query filters, aggregate
//! statistics, and the GDPR compliance projection shown in the Privacy
//! view.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for an audit log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditEventId(pub Uuid);

impl AuditEventId {
    /// Generate a new audit event ID using UUID v7 (time-ordered)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AuditEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuditEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AuditEventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kinds of auditable actions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Read,
    Update,
    Delete,
    Export,
    ConsentGrant,
    ConsentWithdraw,
    Seal,
    Unseal,
    Error,
}

impl AuditAction {
    pub const ALL: [AuditAction; 10] = [
        AuditAction::Create,
        AuditAction::Read,
        AuditAction::Update,
        AuditAction::Delete,
        AuditAction::Export,
        AuditAction::ConsentGrant,
        AuditAction::ConsentWithdraw,
        AuditAction::Seal,
        AuditAction::Unseal,
        AuditAction::Error,
    ];
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Create => "create",
            AuditAction::Read => "read",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Export => "export",
            AuditAction::ConsentGrant => "consent_grant",
            AuditAction::ConsentWithdraw => "consent_withdraw",
            AuditAction::Seal => "seal",
            AuditAction::Unseal => "unseal",
            AuditAction::Error => "error",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(AuditAction::Create),
            "read" => Ok(AuditAction::Read),
            "update" => Ok(AuditAction::Update),
            "delete" => Ok(AuditAction::Delete),
            "export" => Ok(AuditAction::Export),
            "consent_grant" => Ok(AuditAction::ConsentGrant),
            "consent_withdraw" => Ok(AuditAction::ConsentWithdraw),
            "seal" => Ok(AuditAction::Seal),
            "unseal" => Ok(AuditAction::Unseal),
            "error" => Ok(AuditAction::Error),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

/// Functional area an event belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    CvManagement,
    Auth,
    Settings,
    DataExport,
    Error,
}

impl std::fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditCategory::CvManagement => "cv_management",
            AuditCategory::Auth => "auth",
            AuditCategory::Settings => "settings",
            AuditCategory::DataExport => "data_export",
            AuditCategory::Error => "error",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for AuditCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cv_management" => Ok(AuditCategory::CvManagement),
            "auth" => Ok(AuditCategory::Auth),
            "settings" => Ok(AuditCategory::Settings),
            "data_export" => Ok(AuditCategory::DataExport),
            "error" => Ok(AuditCategory::Error),
            _ => Err(format!("Unknown audit category: {}", s)),
        }
    }
}

/// An audit log entry representing a single auditable action.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier for this audit entry
    pub id: AuditEventId,
    /// When the action occurred
    pub timestamp: DateTime<Utc>,
    /// The action that was performed
    pub action: AuditAction,
    /// Functional area
    pub category: AuditCategory,
    /// Type of resource affected (e.g., "cv", "application", "consent")
    pub resource_type: Option<String>,
    /// Identifier of the affected resource
    pub resource_id: Option<String>,
    /// Single-user desktop app; kept for future multi-user support
    pub user_id: String,
    /// Whether the action succeeded
    pub success: bool,
    /// Error message if the action failed
    pub error_message: Option<String>,
    /// Additional context-specific data
    pub metadata: Option<serde_json::Value>,
    /// Changed field names for update operations
    pub changed_fields: Option<Vec<String>>,
}

impl AuditEvent {
    pub fn builder(action: AuditAction, category: AuditCategory) -> AuditEventBuilder {
        AuditEventBuilder::new(action, category)
    }
}

/// Builder for constructing audit events
pub struct AuditEventBuilder {
    action: AuditAction,
    category: AuditCategory,
    resource_type: Option<String>,
    resource_id: Option<String>,
    success: bool,
    error_message: Option<String>,
    metadata: Option<serde_json::Value>,
    changed_fields: Option<Vec<String>>,
}

impl AuditEventBuilder {
    pub fn new(action: AuditAction, category: AuditCategory) -> Self {
        Self {
            action,
            category,
            resource_type: None,
            resource_id: None,
            success: true,
            error_message: None,
            metadata: None,
            changed_fields: None,
        }
    }

    pub fn resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn failure(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(message.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn changed_fields(mut self, fields: Vec<String>) -> Self {
        self.changed_fields = Some(fields);
        self
    }

    pub fn build(self) -> AuditEvent {
        AuditEvent {
            id: AuditEventId::new(),
            timestamp: Utc::now(),
            action: self.action,
            category: self.category,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            user_id: "local_user".to_string(),
            success: self.success,
            error_message: self.error_message,
            metadata: self.metadata,
            changed_fields: self.changed_fields,
        }
    }
}

/// Filter for querying audit events
#[derive(Clone, Debug, Default)]
pub struct AuditFilter {
    /// Start timestamp (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// End timestamp (exclusive)
    pub to: Option<DateTime<Utc>>,
    /// Restrict to these actions (empty = all)
    pub actions: Vec<AuditAction>,
    /// Restrict to these categories (empty = all)
    pub categories: Vec<AuditCategory>,
    /// Filter by resource type
    pub resource_type: Option<String>,
    /// Filter by resource ID
    pub resource_id: Option<String>,
    /// Only successful events
    pub success_only: bool,
    /// Only failed events
    pub failure_only: bool,
    /// Maximum number of results to return
    pub limit: Option<usize>,
    /// Number of results to skip (for pagination)
    pub offset: Option<usize>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn category(mut self, category: AuditCategory) -> Self {
        self.categories.push(category);
        self
    }

    pub fn resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn success_only(mut self) -> Self {
        self.success_only = true;
        self
    }

    pub fn failure_only(mut self) -> Self {
        self.failure_only = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Does an event pass this filter (pagination aside)?
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(from) = self.from {
            if event.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if event.timestamp >= to {
                return false;
            }
        }
        if !self.actions.is_empty() && !self.actions.contains(&event.action) {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&event.category) {
            return false;
        }
        if let Some(rt) = &self.resource_type {
            if event.resource_type.as_deref() != Some(rt.as_str()) {
                return false;
            }
        }
        if let Some(rid) = &self.resource_id {
            if event.resource_id.as_deref() != Some(rid.as_str()) {
                return false;
            }
        }
        if self.success_only && !event.success {
            return false;
        }
        if self.failure_only && event.success {
            return false;
        }
        true
    }
}

/// Aggregate statistics over audit events
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuditStats {
    pub total_events: u64,
    pub events_by_action: BTreeMap<String, u64>,
    pub events_by_category: BTreeMap<String, u64>,
    /// Percentage of successful events
    pub success_rate: f64,
    pub failure_count: u64,
    pub first_event: Option<DateTime<Utc>>,
    pub last_event: Option<DateTime<Utc>>,
    pub last_hour_count: u64,
    pub today_count: u64,
    pub this_week_count: u64,
    pub this_month_count: u64,
}

impl AuditStats {
    pub fn compute(events: &[AuditEvent], now: DateTime<Utc>) -> Self {
        let mut stats = AuditStats {
            total_events: events.len() as u64,
            ..Default::default()
        };

        let hour_ago = now - Duration::hours(1);
        let week_ago = now - Duration::days(7);
        let mut successes = 0u64;

        for event in events {
            *stats
                .events_by_action
                .entry(event.action.to_string())
                .or_default() += 1;
            *stats
                .events_by_category
                .entry(event.category.to_string())
                .or_default() += 1;

            if event.success {
                successes += 1;
            } else {
                stats.failure_count += 1;
            }

            stats.first_event = match stats.first_event {
                Some(ts) if ts <= event.timestamp => Some(ts),
                _ => Some(event.timestamp),
            };
            stats.last_event = match stats.last_event {
                Some(ts) if ts >= event.timestamp => Some(ts),
                _ => Some(event.timestamp),
            };

            if event.timestamp >= hour_ago {
                stats.last_hour_count += 1;
            }
            if event.timestamp.date_naive() == now.date_naive() {
                stats.today_count += 1;
            }
            if event.timestamp >= week_ago {
                stats.this_week_count += 1;
            }
            if event.timestamp.year() == now.year() && event.timestamp.month() == now.month() {
                stats.this_month_count += 1;
            }
        }

        if !events.is_empty() {
            stats.success_rate = successes as f64 / events.len() as f64 * 100.0;
        }

        stats
    }
}

/// One line of the GDPR compliance log shown in the Privacy view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComplianceEntry {
    pub timestamp: DateTime<Utc>,
    /// CREATE, READ, UPDATE, DELETE, EXPORT, CONSENT_GRANTED, ...
    pub operation: String,
    pub data_type: String,
    pub record_id: String,
    /// e.g. "Art. 6(1)(a) GDPR - Consent"
    pub legal_basis: String,
    pub description: String,
}

impl ComplianceEntry {
    /// Project an audit event onto the compliance view.
    pub fn from_event(event: &AuditEvent) -> Self {
        let (operation, legal_basis) = match event.action {
            AuditAction::Create => ("CREATE", "Art. 6(1)(a) GDPR - Consent"),
            AuditAction::Read => ("READ", "Art. 6(1)(a) GDPR - Consent"),
            AuditAction::Update => ("UPDATE", "Art. 6(1)(a) GDPR - Consent"),
            AuditAction::Delete => ("DELETE", "Art. 17 GDPR - Right to erasure"),
            AuditAction::Export => ("EXPORT", "Art. 20 GDPR - Right to data portability"),
            AuditAction::ConsentGrant => ("CONSENT_GRANTED", "Art. 6(1)(a) GDPR - Consent"),
            AuditAction::ConsentWithdraw => (
                "CONSENT_WITHDRAWN",
                "Art. 7(3) GDPR - Right to withdraw consent",
            ),
            AuditAction::Seal => ("SEAL", "Art. 32 GDPR - Security of processing"),
            AuditAction::Unseal => ("UNSEAL", "Art. 32 GDPR - Security of processing"),
            AuditAction::Error => ("ERROR", "Art. 32 GDPR - Security of processing"),
        };

        let data_type = event
            .resource_type
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let record_id = event.resource_id.clone().unwrap_or_default();

        let description = match &event.error_message {
            Some(msg) => format!("{} {} failed: {}", event.action, data_type, msg),
            None => format!("{} {} {}", event.action, data_type, record_id)
                .trim_end()
                .to_string(),
        };

        ComplianceEntry {
            timestamp: event.timestamp,
            operation: operation.to_string(),
            data_type,
            record_id,
            legal_basis: legal_basis.to_string(),
            description,
        }
    }
}

/// Error type for audit log operations
#[derive(Debug, Error)]
pub enum AuditLogError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("audit event not found: {0}")]
    NotFound(AuditEventId),
}

/// Trait for audit log persistence.
///
/// Implementations store audit events and provide query capabilities
/// for the activity and privacy views.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record an audit event.
    ///
    /// This should be called after each auditable operation completes.
    /// Failures to record audit events should be logged but should not
    /// fail the main operation.
    async fn record(&self, event: AuditEvent) -> Result<(), AuditLogError>;

    /// Query audit events, ordered by timestamp descending.
    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditLogError>;

    /// Count audit events matching the filter criteria.
    async fn count(&self, filter: &AuditFilter) -> Result<u64, AuditLogError>;

    /// Aggregate statistics over all events.
    async fn stats(&self) -> Result<AuditStats, AuditLogError>;

    /// Delete events older than `before`. Returns the number removed.
    async fn prune(&self, before: DateTime<Utc>) -> Result<u64, AuditLogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_display() {
        assert_eq!(AuditAction::Create.to_string(), "create");
        assert_eq!(AuditAction::ConsentWithdraw.to_string(), "consent_withdraw");
        assert_eq!(AuditCategory::CvManagement.to_string(), "cv_management");
    }

    #[test]
    fn action_all_variants_roundtrip() {
        for action in AuditAction::ALL {
            let display = action.to_string();
            let parsed: AuditAction = display.parse().unwrap();
            assert_eq!(action, parsed, "Roundtrip failed for {:?}", action);
        }
        assert!("invalid".parse::<AuditAction>().is_err());
    }

    #[test]
    fn category_parse() {
        assert_eq!(
            "data_export".parse::<AuditCategory>().unwrap(),
            AuditCategory::DataExport
        );
        assert!("nope".parse::<AuditCategory>().is_err());
    }

    #[test]
    fn builder_defaults_to_success_local_user() {
        let event = AuditEvent::builder(AuditAction::Create, AuditCategory::CvManagement)
            .resource("cv", "abc")
            .build();

        assert!(event.success);
        assert_eq!(event.user_id, "local_user");
        assert_eq!(event.resource_type.as_deref(), Some("cv"));
        assert_eq!(event.resource_id.as_deref(), Some("abc"));
        assert!(event.error_message.is_none());
    }

    #[test]
    fn builder_failure_sets_message() {
        let event = AuditEvent::builder(AuditAction::Read, AuditCategory::CvManagement)
            .resource("cv", "abc")
            .failure("consent required")
            .build();

        assert!(!event.success);
        assert_eq!(event.error_message.as_deref(), Some("consent required"));
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = AuditEvent::builder(AuditAction::Export, AuditCategory::DataExport)
            .resource("all_data", "full-export")
            .metadata(serde_json::json!({"path": "/tmp/export.json"}))
            .build();

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"export\""));
        assert!(json.contains("\"data_export\""));

        let back: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.action, event.action);
        assert_eq!(back.id, event.id);
    }

    #[test]
    fn filter_matches_action_and_window() {
        let event = AuditEvent::builder(AuditAction::Create, AuditCategory::CvManagement)
            .resource("cv", "abc")
            .build();

        assert!(AuditFilter::new().matches(&event));
        assert!(AuditFilter::new().action(AuditAction::Create).matches(&event));
        assert!(!AuditFilter::new().action(AuditAction::Delete).matches(&event));
        assert!(!AuditFilter::new()
            .from(event.timestamp + Duration::seconds(1))
            .matches(&event));
        assert!(!AuditFilter::new().to(event.timestamp).matches(&event));
        assert!(AuditFilter::new().resource("cv", "abc").matches(&event));
        assert!(!AuditFilter::new().resource("cv", "other").matches(&event));
    }

    #[test]
    fn filter_success_failure_split() {
        let ok = AuditEvent::builder(AuditAction::Read, AuditCategory::CvManagement).build();
        let failed = AuditEvent::builder(AuditAction::Read, AuditCategory::CvManagement)
            .failure("boom")
            .build();

        assert!(AuditFilter::new().success_only().matches(&ok));
        assert!(!AuditFilter::new().success_only().matches(&failed));
        assert!(AuditFilter::new().failure_only().matches(&failed));
        assert!(!AuditFilter::new().failure_only().matches(&ok));
    }

    #[test]
    fn stats_counts_and_rates() {
        let now = Utc::now();
        let mut events = vec![
            AuditEvent::builder(AuditAction::Create, AuditCategory::CvManagement).build(),
            AuditEvent::builder(AuditAction::Read, AuditCategory::CvManagement).build(),
            AuditEvent::builder(AuditAction::Read, AuditCategory::CvManagement)
                .failure("consent required")
                .build(),
        ];
        // one old event outside the hour/day windows
        let mut old = AuditEvent::builder(AuditAction::Export, AuditCategory::DataExport).build();
        old.timestamp = now - Duration::days(40);
        events.push(old);

        let stats = AuditStats::compute(&events, now);
        assert_eq!(stats.total_events, 4);
        assert_eq!(stats.events_by_action["read"], 2);
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.success_rate, 75.0);
        assert_eq!(stats.last_hour_count, 3);
        assert_eq!(stats.today_count, 3);
        assert_eq!(stats.first_event, Some(now - Duration::days(40)));
        assert!(stats.last_event.unwrap() >= stats.first_event.unwrap());
    }

    #[test]
    fn stats_empty_input() {
        let stats = AuditStats::compute(&[], Utc::now());
        assert_eq!(stats.total_events, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert!(stats.first_event.is_none());
    }

    #[test]
    fn compliance_projection_maps_legal_basis() {
        let event = AuditEvent::builder(AuditAction::Delete, AuditCategory::CvManagement)
            .resource("cv", "abc")
            .build();
        let entry = ComplianceEntry::from_event(&event);
        assert_eq!(entry.operation, "DELETE");
        assert_eq!(entry.legal_basis, "Art. 17 GDPR - Right to erasure");
        assert_eq!(entry.data_type, "cv");
        assert_eq!(entry.record_id, "abc");

        let withdraw =
            AuditEvent::builder(AuditAction::ConsentWithdraw, AuditCategory::Settings)
                .resource("consent", "user-consent")
                .build();
        let entry = ComplianceEntry::from_event(&withdraw);
        assert_eq!(entry.operation, "CONSENT_WITHDRAWN");
        assert_eq!(
            entry.legal_basis,
            "Art. 7(3) GDPR - Right to withdraw consent"
        );
    }

    #[test]
    fn compliance_projection_mentions_failure() {
        let event = AuditEvent::builder(AuditAction::Read, AuditCategory::CvManagement)
            .resource("cv", "abc")
            .failure("consent required")
            .build();
        let entry = ComplianceEntry::from_event(&event);
        assert!(entry.description.contains("failed"));
        assert!(entry.description.contains("consent required"));
    }

    #[test]
    fn event_id_is_v7_and_unique() {
        let id1 = AuditEventId::new();
        let id2 = AuditEventId::new();
        assert_ne!(id1, id2);
        assert_eq!(id1.0.get_version_num(), 7);
    }
}
