//! Static security and GDPR compliance description for the privacy view.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GdprArticle {
    pub article: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub compliance: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecurityInfo {
    pub encryption_algorithm: String,
    pub encryption_key_size: u32,
    pub database_type: String,
    pub data_location: String,
    pub encryption_status: String,
    pub compliance_status: String,
    pub gdpr_articles: Vec<GdprArticle>,
}

pub fn security_info(data_location: &Path) -> SecurityInfo {
    SecurityInfo {
        encryption_algorithm: "XChaCha20-Poly1305".to_string(),
        encryption_key_size: 256,
        database_type: "SQLite (AEAD-encrypted records)".to_string(),
        data_location: data_location.display().to_string(),
        encryption_status: "ACTIVE - All data encrypted at rest".to_string(),
        compliance_status: "GDPR/DSGVO Compliant".to_string(),
        gdpr_articles: gdpr_articles(),
    }
}

fn gdpr_articles() -> Vec<GdprArticle> {
    let articles = [
        (
            "Art. 6(1)(a)",
            "Lawfulness of processing - Consent",
            "All data processing happens only after explicit user consent.",
            "https://gdpr-info.eu/art-6-gdpr/",
            "✓ Explicit consent gate before every data operation",
        ),
        (
            "Art. 7",
            "Conditions for consent",
            "Consent can be withdrawn at any time, as easily as it was given.",
            "https://gdpr-info.eu/art-7-gdpr/",
            "✓ One-click consent withdrawal, data preserved",
        ),
        (
            "Art. 13",
            "Information to be provided",
            "The user is informed what data is stored, where, and how it is protected.",
            "https://gdpr-info.eu/art-13-gdpr/",
            "✓ Full transparency via security and privacy view",
        ),
        (
            "Art. 15",
            "Right of access",
            "The user can inspect all stored personal data at any time.",
            "https://gdpr-info.eu/art-15-gdpr/",
            "✓ Complete local access to all records",
        ),
        (
            "Art. 17",
            "Right to erasure",
            "All personal data can be permanently deleted on request.",
            "https://gdpr-info.eu/art-17-gdpr/",
            "✓ Full data erasure including encryption keys",
        ),
        (
            "Art. 20",
            "Right to data portability",
            "All data can be exported in a structured, machine-readable format.",
            "https://gdpr-info.eu/art-20-gdpr/",
            "✓ Complete JSON export of all stored data",
        ),
        (
            "Art. 32",
            "Security of processing",
            "Personal data is protected by state-of-the-art encryption.",
            "https://gdpr-info.eu/art-32-gdpr/",
            "✓ XChaCha20-Poly1305 encryption, Argon2id key derivation",
        ),
    ];

    articles
        .into_iter()
        .map(|(article, title, description, link, compliance)| GdprArticle {
            article: article.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            link: link.to_string(),
            compliance: compliance.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_core_gdpr_articles() {
        let info = security_info(Path::new("/tmp/covault"));
        assert_eq!(info.encryption_key_size, 256);
        assert_eq!(info.gdpr_articles.len(), 7);
        let articles: Vec<&str> = info
            .gdpr_articles
            .iter()
            .map(|a| a.article.as_str())
            .collect();
        assert!(articles.contains(&"Art. 17"));
        assert!(articles.contains(&"Art. 20"));
        assert!(articles.contains(&"Art. 32"));
    }
}
