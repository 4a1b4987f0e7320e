//! Rendering seam for CV exports.
//!
//! The facade only depends on the [`PdfRenderer`] trait; the actual
//! layout engine plugs in behind it. [`TextSnapshotRenderer`] is a
//! deterministic stand-in used by tests and headless builds.

use std::path::Path;

use covault_storage::types::Cv;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("render failed: {0}")]
    Render(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait PdfRenderer: Send + Sync {
    fn render(&self, cv: &Cv, output: &Path) -> Result<(), PdfError>;
}

/// Writes a plain-text snapshot of the CV instead of a typeset page.
#[derive(Debug, Default)]
pub struct TextSnapshotRenderer;

impl PdfRenderer for TextSnapshotRenderer {
    fn render(&self, cv: &Cv, output: &Path) -> Result<(), PdfError> {
        let mut out = String::new();
        out.push_str(&cv.display_name());
        out.push('\n');
        if !cv.job_title.is_empty() {
            out.push_str(&cv.job_title);
            out.push('\n');
        }
        if !cv.email.is_empty() {
            out.push_str(&cv.email);
            out.push('\n');
        }
        if !cv.summary.is_empty() {
            out.push('\n');
            out.push_str(&cv.summary);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&format!(
            "experience: {}, education: {}, skills: {}\n",
            cv.work_experience.len(),
            cv.education.len(),
            cv.skills.len()
        ));
        std::fs::write(output, out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_contains_display_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut cv = Cv::new();
        cv.firstname = "Max".into();
        cv.lastname = "Mustermann".into();
        let path = dir.path().join("out.pdf");
        TextSnapshotRenderer.render(&cv, &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Max Mustermann"));
    }
}
