use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job portals offered in the UI picker.
pub const JOB_PORTALS: [&str; 10] = [
    "Indeed",
    "LinkedIn",
    "StepStone",
    "XING",
    "Glassdoor",
    "kununu",
    "Monster.de",
    "Jobware",
    "Firmen-Website",
    "Andere",
];

/// Status of a job application.
///
/// `Unknown` absorbs values written by other versions so one odd record
/// never breaks listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Draft,
    Applied,
    UnderReview,
    InterviewScheduled,
    Interviewed,
    SecondRound,
    Offer,
    Accepted,
    Rejected,
    Withdrawn,
    NoResponse,
    #[serde(other)]
    Unknown,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::InterviewScheduled => "interview_scheduled",
            ApplicationStatus::Interviewed => "interviewed",
            ApplicationStatus::SecondRound => "second_round",
            ApplicationStatus::Offer => "offer",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
            ApplicationStatus::NoResponse => "no_response",
            ApplicationStatus::Unknown => "unknown",
        }
    }

    /// The company reacted in some way.
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::UnderReview
                | ApplicationStatus::InterviewScheduled
                | ApplicationStatus::Interviewed
                | ApplicationStatus::SecondRound
                | ApplicationStatus::Offer
                | ApplicationStatus::Accepted
                | ApplicationStatus::Rejected
        )
    }

    /// The process reached at least one interview.
    pub fn reached_interview(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::InterviewScheduled
                | ApplicationStatus::Interviewed
                | ApplicationStatus::SecondRound
                | ApplicationStatus::Offer
                | ApplicationStatus::Accepted
        )
    }

    pub fn is_offer(&self) -> bool {
        matches!(self, ApplicationStatus::Offer | ApplicationStatus::Accepted)
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event in the application journey.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: String,
    /// applied, interview, feedback, status_change, email, note
    pub kind: String,
    pub title: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// Feedback from the company or own notes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicationFeedback {
    pub id: String,
    /// company_response, interview_notes, self_reflection
    pub kind: String,
    pub title: String,
    pub content: String,
    /// 0 = unrated, otherwise 1-5 stars
    pub rating: u8,
    pub timestamp: DateTime<Utc>,
}

/// A tracked job application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// CV used for this application; the referenced CV may have been
    /// deleted since, which is why a name snapshot is kept.
    #[serde(default)]
    pub cv_id: String,
    #[serde(default)]
    pub cv_snapshot: String,

    // Job details
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub company_website: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub salary: String,
    #[serde(default)]
    pub job_type: String,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub hybrid: bool,

    // Application details
    #[serde(default)]
    pub portal: String,
    #[serde(default)]
    pub portal_url: String,
    #[serde(default)]
    pub application_url: String,
    #[serde(default)]
    pub applied_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ApplicationStatus,
    /// 1-5 (1 = low, 5 = high)
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,

    // Contact person
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: String,

    // Timeline & feedback, append-only
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
    #[serde(default)]
    pub feedback: Vec<ApplicationFeedback>,

    #[serde(default)]
    pub documents_submitted: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub color: String,
}

impl JobApplication {
    pub fn new() -> Self {
        let now = Utc::now();
        JobApplication {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            cv_id: String::new(),
            cv_snapshot: String::new(),
            job_title: String::new(),
            company: String::new(),
            company_website: String::new(),
            job_description: String::new(),
            location: String::new(),
            salary: String::new(),
            job_type: String::new(),
            remote: false,
            hybrid: false,
            portal: "Andere".to_string(),
            portal_url: String::new(),
            application_url: String::new(),
            applied_date: None,
            status: ApplicationStatus::Draft,
            priority: 3,
            deadline: None,
            contact_name: String::new(),
            contact_email: String::new(),
            contact_phone: String::new(),
            timeline: vec![],
            feedback: vec![],
            documents_submitted: vec![],
            tags: vec![],
            notes: String::new(),
            color: String::new(),
        }
    }

    /// Append an event to the timeline.
    pub fn add_timeline_event(&mut self, kind: &str, title: &str, details: &str) {
        let now = Utc::now();
        self.timeline.push(TimelineEvent {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            title: title.to_string(),
            details: details.to_string(),
            timestamp: now,
        });
        self.updated_at = now;
    }

    /// Append feedback.
    pub fn add_feedback(&mut self, kind: &str, title: &str, content: &str, rating: u8) {
        let now = Utc::now();
        self.feedback.push(ApplicationFeedback {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            rating,
            timestamp: now,
        });
        self.updated_at = now;
    }

    /// Change status and record the transition in the timeline.
    pub fn update_status(&mut self, new_status: ApplicationStatus, details: &str) {
        let old = self.status;
        self.status = new_status;
        let title = format!("{} → {}", old, new_status);
        self.add_timeline_event("status_change", &title, details);
        if new_status == ApplicationStatus::Applied && self.applied_date.is_none() {
            self.applied_date = Some(Utc::now());
        }
    }
}

impl Default for JobApplication {
    fn default() -> Self {
        Self::new()
    }
}

/// Funnel statistics over all applications. Rates are percentages of
/// submitted (non-draft) applications.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationsStatistics {
    pub total_applications: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub portal_counts: BTreeMap<String, usize>,
    pub response_rate: f64,
    pub interview_rate: f64,
    pub offer_rate: f64,
    /// Days from applied_date to the first company response or interview.
    pub avg_response_time: f64,
    pub total_interviews: usize,
    pub total_offers: usize,
}

impl ApplicationsStatistics {
    pub fn compute(apps: &[JobApplication]) -> Self {
        let mut stats = ApplicationsStatistics {
            total_applications: apps.len(),
            ..Default::default()
        };

        let mut submitted = 0usize;
        let mut responded = 0usize;
        let mut response_days = Vec::new();

        for app in apps {
            *stats
                .status_counts
                .entry(app.status.as_str().to_string())
                .or_default() += 1;
            if !app.portal.is_empty() {
                *stats.portal_counts.entry(app.portal.clone()).or_default() += 1;
            }

            if app.status != ApplicationStatus::Draft {
                submitted += 1;
            }
            if app.status.is_response() {
                responded += 1;
            }
            if app.status.reached_interview() {
                stats.total_interviews += 1;
            }
            if app.status.is_offer() {
                stats.total_offers += 1;
            }

            if let Some(applied) = app.applied_date {
                let first_response = app
                    .timeline
                    .iter()
                    .filter(|e| e.kind == "company_response" || e.kind == "interview")
                    .map(|e| e.timestamp)
                    .min();
                if let Some(ts) = first_response {
                    let days = (ts - applied).num_seconds() as f64 / 86_400.0;
                    if days >= 0.0 {
                        response_days.push(days);
                    }
                }
            }
        }

        if submitted > 0 {
            stats.response_rate = responded as f64 / submitted as f64 * 100.0;
            stats.interview_rate = stats.total_interviews as f64 / submitted as f64 * 100.0;
            stats.offer_rate = stats.total_offers as f64 / submitted as f64 * 100.0;
        }
        if !response_days.is_empty() {
            stats.avg_response_time =
                response_days.iter().sum::<f64>() / response_days.len() as f64;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_application_has_defaults() {
        let app = JobApplication::new();
        assert_eq!(app.status, ApplicationStatus::Draft);
        assert_eq!(app.priority, 3);
        assert_eq!(app.portal, "Andere");
        assert!(app.timeline.is_empty());
    }

    #[test]
    fn update_status_records_transition() {
        let mut app = JobApplication::new();
        app.update_status(ApplicationStatus::Applied, "submitted via portal");

        assert_eq!(app.status, ApplicationStatus::Applied);
        assert!(app.applied_date.is_some());
        let last = app.timeline.last().unwrap();
        assert_eq!(last.kind, "status_change");
        assert_eq!(last.title, "draft → applied");
        assert_eq!(last.details, "submitted via portal");
    }

    #[test]
    fn timeline_and_feedback_bump_updated_at() {
        let mut app = JobApplication::new();
        let before = app.updated_at;
        app.add_timeline_event("note", "called HR", "");
        assert!(app.updated_at >= before);
        app.add_feedback("interview_notes", "first round", "went well", 4);
        assert_eq!(app.feedback.len(), 1);
        assert_eq!(app.feedback[0].rating, 4);
    }

    #[test]
    fn unknown_status_deserializes_as_fallback() {
        let json = serde_json::to_string(&JobApplication::new())
            .unwrap()
            .replace("\"draft\"", "\"ghosted\"");
        let app: JobApplication = serde_json::from_str(&json).unwrap();
        assert_eq!(app.status, ApplicationStatus::Unknown);
    }

    #[test]
    fn statistics_rates_over_submitted() {
        let mut a = JobApplication::new();
        a.update_status(ApplicationStatus::Applied, "");
        let mut b = JobApplication::new();
        b.update_status(ApplicationStatus::Offer, "");
        let mut c = JobApplication::new();
        c.update_status(ApplicationStatus::Rejected, "");
        let d = JobApplication::new(); // draft, not submitted

        let stats = ApplicationsStatistics::compute(&[a, b, c, d]);
        assert_eq!(stats.total_applications, 4);
        assert_eq!(stats.status_counts["draft"], 1);
        assert_eq!(stats.total_offers, 1);
        assert_eq!(stats.total_interviews, 1);
        // 2 of 3 submitted got a response
        assert!((stats.response_rate - 66.666).abs() < 0.1);
    }

    #[test]
    fn avg_response_time_uses_first_response_event() {
        let mut app = JobApplication::new();
        app.applied_date = Some(Utc::now() - chrono::Duration::days(10));
        app.status = ApplicationStatus::UnderReview;
        app.add_timeline_event("company_response", "got an email", "");

        let stats = ApplicationsStatistics::compute(&[app]);
        assert!((stats.avg_response_time - 10.0).abs() < 0.1);
    }
}
