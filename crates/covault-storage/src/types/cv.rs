use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A job/position entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub id: String,
    pub position: String,
    pub company: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub tasks: Vec<String>,
}

/// An education entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub id: String,
    pub degree: String,
    pub institution: String,
    pub start_date: String,
    pub end_date: String,
    pub gpa: String,
    pub description: String,
}

/// A skill with proficiency level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    /// 0.0 to 1.0
    pub level: f64,
    pub category: String,
}

/// A language with proficiency.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageSkill {
    pub id: String,
    pub name: String,
    /// 1 to 5
    pub level: u8,
}

/// Lifecycle status of a CV.
///
/// `Unknown` catches values written by older versions so a legacy
/// record still deserializes instead of failing the whole load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CvStatus {
    #[default]
    Draft,
    Ready,
    Submitted,
    Archived,
    #[serde(other)]
    Unknown,
}

impl CvStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CvStatus::Draft => "draft",
            CvStatus::Ready => "ready",
            CvStatus::Submitted => "submitted",
            CvStatus::Archived => "archived",
            CvStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CvStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete CV/resume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cv {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Personal info
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub github: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub photo_path: String,
    #[serde(default)]
    pub summary: String,

    // Collections
    #[serde(default)]
    pub work_experience: Vec<WorkExperience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub languages: Vec<LanguageSkill>,
    #[serde(default)]
    pub documents: Vec<String>,

    // Metadata
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub target_job: String,
    #[serde(default)]
    pub target_company: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub status: CvStatus,
    #[serde(default)]
    pub color_scheme: String,
    #[serde(default)]
    pub language: String,

    // Analytics
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub last_viewed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_exported: Option<DateTime<Utc>>,
    #[serde(default)]
    pub export_count: u64,

    #[serde(default)]
    pub is_favorite: bool,
}

impl Cv {
    /// A fresh CV with default template and status.
    pub fn new() -> Self {
        let now = Utc::now();
        Cv {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            firstname: String::new(),
            lastname: String::new(),
            job_title: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            city: String::new(),
            country: String::new(),
            postal_code: String::new(),
            linkedin: String::new(),
            github: String::new(),
            website: String::new(),
            photo_path: String::new(),
            summary: String::new(),
            work_experience: vec![],
            education: vec![],
            skills: vec![],
            languages: vec![],
            documents: vec![],
            template: "modern".to_string(),
            target_job: String::new(),
            target_company: String::new(),
            notes: String::new(),
            tags: vec![],
            category: String::new(),
            status: CvStatus::Draft,
            color_scheme: "blue".to_string(),
            language: "DE".to_string(),
            view_count: 0,
            last_viewed: None,
            last_exported: None,
            export_count: 0,
            is_favorite: false,
        }
    }

    /// Display name for lists and exports.
    pub fn display_name(&self) -> String {
        let mut name = format!("{} {}", self.firstname, self.lastname);
        if name.trim().is_empty() {
            name = "Untitled CV".to_string();
        } else {
            name = name.trim().to_string();
        }
        if !self.target_job.is_empty() {
            name.push_str(" - ");
            name.push_str(&self.target_job);
        }
        name
    }

    /// Canonicalize tags: trimmed, non-empty, sorted, unique.
    pub fn normalize_tags(&mut self) {
        let set: BTreeSet<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self.tags = set.into_iter().collect();
    }

    pub fn to_summary(&self) -> CvSummary {
        CvSummary {
            id: self.id.clone(),
            name: self.display_name(),
            job_title: self.job_title.clone(),
            status: self.status,
            category: self.category.clone(),
            tags: self.tags.clone(),
            target_job: self.target_job.clone(),
            target_company: self.target_company.clone(),
            updated_at: self.updated_at,
            work_count: self.work_experience.len(),
            education_count: self.education.len(),
            skills_count: self.skills.len(),
            is_favorite: self.is_favorite,
        }
    }
}

impl Default for Cv {
    fn default() -> Self {
        Self::new()
    }
}

/// Compact CV projection for dashboard cards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub id: String,
    pub name: String,
    pub job_title: String,
    pub status: CvStatus,
    pub category: String,
    pub tags: Vec<String>,
    pub target_job: String,
    pub target_company: String,
    pub updated_at: DateTime<Utc>,
    pub work_count: usize,
    pub education_count: usize,
    pub skills_count: usize,
    pub is_favorite: bool,
}

/// Aggregate CV statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_cvs: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub category_counts: BTreeMap<String, usize>,
    pub template_counts: BTreeMap<String, usize>,
    pub all_tags: Vec<String>,
    pub total_work_experience: usize,
    pub total_education: usize,
    pub total_skills: usize,
    pub avg_work_per_cv: f64,
    pub avg_education_per_cv: f64,
    pub avg_skills_per_cv: f64,
}

impl Statistics {
    pub fn compute(cvs: &[Cv]) -> Self {
        let mut stats = Statistics {
            total_cvs: cvs.len(),
            ..Default::default()
        };

        let mut tags = BTreeSet::new();
        for cv in cvs {
            *stats
                .status_counts
                .entry(cv.status.as_str().to_string())
                .or_default() += 1;
            if !cv.category.is_empty() {
                *stats.category_counts.entry(cv.category.clone()).or_default() += 1;
            }
            if !cv.template.is_empty() {
                *stats.template_counts.entry(cv.template.clone()).or_default() += 1;
            }
            tags.extend(cv.tags.iter().cloned());
            stats.total_work_experience += cv.work_experience.len();
            stats.total_education += cv.education.len();
            stats.total_skills += cv.skills.len();
        }
        stats.all_tags = tags.into_iter().collect();

        if !cvs.is_empty() {
            let n = cvs.len() as f64;
            stats.avg_work_per_cv = stats.total_work_experience as f64 / n;
            stats.avg_education_per_cv = stats.total_education as f64 / n;
            stats.avg_skills_per_cv = stats.total_skills as f64 / n;
        }

        stats
    }
}
