//! Plaintext domain types. These are what get serialized, encrypted,
//! and handed to a [`crate::Store`] as opaque ciphertext.

mod application;
mod config;
mod consent;
mod cv;

pub use application::{
    ApplicationFeedback, ApplicationStatus, ApplicationsStatistics, JobApplication, TimelineEvent,
    JOB_PORTALS,
};
pub use config::AppConfig;
pub use consent::Consent;
pub use cv::{Cv, CvStatus, CvSummary, Education, LanguageSkill, Skill, Statistics, WorkExperience};
