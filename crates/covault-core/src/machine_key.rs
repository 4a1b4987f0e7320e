//! Machine-bound master secret for the passwordless (unsealed) mode.
//!
//! Resolution order: explicit environment override, then a stored key
//! file in the data directory, then a key derived from stable machine
//! identifiers. The derived key is persisted so a later change of
//! hostname or username does not lock the user out.

use std::path::Path;

use tracing::{info, warn};

/// Overrides every other key source when set and non-empty.
pub const MASTER_KEY_ENV: &str = "COVAULT_MASTER_KEY";

const KEY_FILE: &str = ".key";
const VERSION_SALT: &str = "covault-v1";
const MIN_STORED_KEY_LEN: usize = 32;

pub fn master_secret(data_dir: &Path) -> String {
    if let Ok(key) = std::env::var(MASTER_KEY_ENV) {
        if !key.is_empty() {
            info!("using master key from environment");
            return key;
        }
    }
    stored_or_generated_key(data_dir)
}

fn stored_or_generated_key(data_dir: &Path) -> String {
    let key_file = data_dir.join(KEY_FILE);
    if let Ok(data) = std::fs::read_to_string(&key_file) {
        let stored = data.trim().to_string();
        if stored.len() >= MIN_STORED_KEY_LEN {
            return stored;
        }
        warn!("stored machine key too short, regenerating");
    }

    let key = generate_machine_key();
    if let Err(e) = persist_key(data_dir, &key_file, &key) {
        // Not fatal: the same key is re-derived next start as long as
        // the machine identifiers are stable.
        warn!(error = %e, "could not persist machine key");
    }
    key
}

fn persist_key(data_dir: &Path, key_file: &Path, key: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(data_dir)?;
    std::fs::write(key_file, key)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(key_file, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn generate_machine_key() -> String {
    let identifiers = [
        username(),
        home_dir(),
        hostname(),
        machine_id(),
        os_info(),
        VERSION_SALT.to_string(),
    ];
    let combined = identifiers.join("|");
    hex::encode(covault_crypto::hash_sha256(combined.as_bytes()))
}

fn username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "default-user".to_string())
}

fn home_dir() -> String {
    dirs_home().unwrap_or_else(|| "default-home".to_string())
}

fn dirs_home() -> Option<String> {
    std::env::var("HOME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| std::env::var("USERPROFILE").ok().filter(|h| !h.is_empty()))
}

fn hostname() -> String {
    if let Ok(name) = std::fs::read_to_string("/etc/hostname") {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    std::env::var("HOSTNAME").unwrap_or_else(|_| "default-host".to_string())
}

fn machine_id() -> String {
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
        if let Ok(id) = std::fs::read_to_string(path) {
            let id = id.trim();
            if !id.is_empty() {
                return id.to_string();
            }
        }
    }
    "default-machine-id".to_string()
}

fn os_info() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_is_hex_sha256() {
        let key = generate_machine_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_key_is_stable() {
        assert_eq!(generate_machine_key(), generate_machine_key());
    }

    #[test]
    fn stored_key_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let first = stored_or_generated_key(dir.path());
        let second = stored_or_generated_key(dir.path());
        assert_eq!(first, second);
        assert!(dir.path().join(KEY_FILE).exists());
    }

    #[test]
    fn short_stored_key_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(KEY_FILE), "short").unwrap();
        let key = stored_or_generated_key(dir.path());
        assert!(key.len() >= MIN_STORED_KEY_LEN);
    }
}
