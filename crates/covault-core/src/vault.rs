//! Key lifecycle: machine-bound passwordless mode, optional password
//! seal, and the in-memory data encryption key (DEK).
//!
//! The DEK never touches disk in the clear. The keystore file next to
//! the database holds it wrapped under a key encryption key (KEK),
//! derived either from the machine secret or from the user's seal
//! password. Sealing persists until the seal is explicitly removed;
//! unsealing only loads the DEK into memory for the running process.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use covault_crypto::{Dek, Kek, Nonce};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use zeroize::Zeroizing;

use crate::error::CoreError;
use crate::machine_key;

const KEYSTORE_FILE: &str = "keystore.json";
const DEK_AAD: &[u8] = b"covault:dek";

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Keystore {
    kdf_salt: String,
    dek_wrapped: String,
    dek_nonce: String,
    sealed: bool,
    password_verifier: Option<String>,
    verifier_salt: Option<String>,
    created_at: DateTime<Utc>,
    sealed_at: Option<DateTime<Utc>>,
    unsealed_at: Option<DateTime<Utc>>,
}

/// Snapshot of the seal state for the UI layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SealStatus {
    /// The key is not in memory; data operations fail until unsealed.
    pub is_sealed: bool,
    /// The DEK is wrapped under a password rather than the machine key.
    pub requires_password: bool,
    pub sealed_at: Option<DateTime<Utc>>,
    pub unsealed_at: Option<DateTime<Utc>>,
}

struct VaultState {
    keystore: Keystore,
    dek: Option<Dek>,
}

pub struct Vault {
    dir: PathBuf,
    state: RwLock<VaultState>,
}

impl Vault {
    /// Open or initialize the vault in `dir`.
    ///
    /// A sealed vault opens in the locked state; data operations fail
    /// with [`CoreError::Sealed`] until [`Vault::unseal`] succeeds.
    pub async fn open(dir: &Path) -> Result<Self, CoreError> {
        std::fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
        }

        let path = dir.join(KEYSTORE_FILE);
        let (keystore, dek) = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            let keystore: Keystore =
                serde_json::from_str(&data).map_err(|_| CoreError::Corrupt)?;
            if keystore.sealed {
                info!("vault is sealed, waiting for password");
                (keystore, None)
            } else {
                let dek = unwrap_with_machine_key(dir, &keystore)?;
                (keystore, Some(dek))
            }
        } else {
            let dek = covault_crypto::generate_dek();
            let keystore = wrap_under_machine_key(dir, &dek, Utc::now())?;
            write_keystore(&path, &keystore)?;
            info!("initialized new vault");
            (keystore, Some(dek))
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            state: RwLock::new(VaultState { keystore, dek }),
        })
    }

    fn keystore_path(&self) -> PathBuf {
        self.dir.join(KEYSTORE_FILE)
    }

    /// Re-wrap the DEK under a password-derived KEK.
    ///
    /// The key stays loaded; protection takes effect once the key is
    /// dropped (process exit or [`Vault::lock`]).
    pub async fn seal(&self, password: &str) -> Result<(), CoreError> {
        let mut st = self.state.write().await;
        if st.keystore.sealed {
            return Err(CoreError::AlreadySealed);
        }
        let dek = st.dek.as_ref().ok_or(CoreError::Sealed)?;

        let salt = covault_crypto::generate_salt();
        let kek = covault_crypto::derive_kek(password.as_bytes(), &salt)
            .map_err(|e| CoreError::Crypto(e.to_string()))?;
        let (nonce, wrapped) = covault_crypto::wrap_dek(dek, &kek, DEK_AAD)
            .map_err(|e| CoreError::Crypto(e.to_string()))?;

        let verifier_salt = covault_crypto::generate_salt();
        let verifier = covault_crypto::verifier_hash(password.as_bytes(), &verifier_salt)
            .map_err(|e| CoreError::Crypto(e.to_string()))?;

        st.keystore.kdf_salt = hex::encode(salt);
        st.keystore.dek_wrapped = hex::encode(&wrapped.0);
        st.keystore.dek_nonce = hex::encode(nonce.0);
        st.keystore.sealed = true;
        st.keystore.password_verifier = Some(verifier);
        st.keystore.verifier_salt = Some(hex::encode(verifier_salt));
        st.keystore.sealed_at = Some(Utc::now());
        write_keystore(&self.keystore_path(), &st.keystore)?;
        info!("storage sealed");
        Ok(())
    }

    /// Verify the password and load the DEK into memory.
    ///
    /// The seal itself persists; the next process start is locked
    /// again until unsealed.
    pub async fn unseal(&self, password: &str) -> Result<(), CoreError> {
        let mut st = self.state.write().await;
        if !st.keystore.sealed {
            return Err(CoreError::NotSealed);
        }
        check_password(&st.keystore, password)?;

        let salt = decode_hex(&st.keystore.kdf_salt)?;
        let kek = covault_crypto::derive_kek(password.as_bytes(), &salt)
            .map_err(|e| CoreError::Crypto(e.to_string()))?;
        // Verifier already matched, so an AEAD failure here means the
        // wrapped key itself is damaged.
        let dek = unwrap_keystore_dek(&st.keystore, &kek)?;

        st.dek = Some(dek);
        st.keystore.unsealed_at = Some(Utc::now());
        write_keystore(&self.keystore_path(), &st.keystore)?;
        info!("storage unsealed");
        Ok(())
    }

    /// Verify the password and return to the machine-bound mode.
    pub async fn remove_seal(&self, password: &str) -> Result<(), CoreError> {
        let mut st = self.state.write().await;
        if !st.keystore.sealed {
            return Err(CoreError::NotSealed);
        }
        check_password(&st.keystore, password)?;

        let dek = match st.dek.take() {
            Some(dek) => dek,
            None => {
                let salt = decode_hex(&st.keystore.kdf_salt)?;
                let kek = covault_crypto::derive_kek(password.as_bytes(), &salt)
                    .map_err(|e| CoreError::Crypto(e.to_string()))?;
                unwrap_keystore_dek(&st.keystore, &kek)?
            }
        };

        let created_at = st.keystore.created_at;
        let mut keystore = wrap_under_machine_key(&self.dir, &dek, created_at)?;
        keystore.unsealed_at = Some(Utc::now());
        write_keystore(&self.keystore_path(), &keystore)?;
        st.keystore = keystore;
        st.dek = Some(dek);
        info!("seal removed");
        Ok(())
    }

    pub async fn status(&self) -> SealStatus {
        let st = self.state.read().await;
        SealStatus {
            is_sealed: st.keystore.sealed && st.dek.is_none(),
            requires_password: st.keystore.sealed,
            sealed_at: st.keystore.sealed_at,
            unsealed_at: st.keystore.unsealed_at,
        }
    }

    pub async fn is_locked(&self) -> bool {
        self.state.read().await.dek.is_none()
    }

    /// Drop the in-memory key. The `Dek` zeroizes on drop.
    pub async fn lock(&self) {
        let mut st = self.state.write().await;
        st.dek = None;
    }

    /// Replace the DEK with a fresh one under the machine key.
    ///
    /// Existing ciphertext becomes permanently undecryptable; used by
    /// the full data erasure path after the record store is wiped.
    pub async fn reset(&self) -> Result<(), CoreError> {
        let mut st = self.state.write().await;
        let dek = covault_crypto::generate_dek();
        let keystore = wrap_under_machine_key(&self.dir, &dek, Utc::now())?;
        write_keystore(&self.keystore_path(), &keystore)?;
        st.keystore = keystore;
        st.dek = Some(dek);
        info!("vault key reset");
        Ok(())
    }

    pub async fn encrypt(
        &self,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), CoreError> {
        let st = self.state.read().await;
        let dek = st.dek.as_ref().ok_or(CoreError::Sealed)?;
        let (nonce, ciphertext) = covault_crypto::encrypt(plaintext, dek, aad)
            .map_err(|e| CoreError::Crypto(e.to_string()))?;
        Ok((nonce.0.to_vec(), ciphertext.0))
    }

    pub async fn decrypt(
        &self,
        ciphertext: &[u8],
        nonce: &[u8],
        aad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CoreError> {
        let st = self.state.read().await;
        let dek = st.dek.as_ref().ok_or(CoreError::Sealed)?;
        let nonce = Nonce::from_slice(nonce).map_err(|_| CoreError::Corrupt)?;
        covault_crypto::decrypt(ciphertext, &nonce, dek, aad).map_err(|_| CoreError::Corrupt)
    }
}

fn machine_kek(dir: &Path, salt: &[u8]) -> Result<Kek, CoreError> {
    let secret = machine_key::master_secret(dir);
    covault_crypto::derive_kek(secret.as_bytes(), salt)
        .map_err(|e| CoreError::Crypto(e.to_string()))
}

fn wrap_under_machine_key(
    dir: &Path,
    dek: &Dek,
    created_at: DateTime<Utc>,
) -> Result<Keystore, CoreError> {
    let salt = covault_crypto::generate_salt();
    let kek = machine_kek(dir, &salt)?;
    let (nonce, wrapped) = covault_crypto::wrap_dek(dek, &kek, DEK_AAD)
        .map_err(|e| CoreError::Crypto(e.to_string()))?;
    Ok(Keystore {
        kdf_salt: hex::encode(salt),
        dek_wrapped: hex::encode(&wrapped.0),
        dek_nonce: hex::encode(nonce.0),
        sealed: false,
        password_verifier: None,
        verifier_salt: None,
        created_at,
        sealed_at: None,
        unsealed_at: None,
    })
}

fn unwrap_with_machine_key(dir: &Path, keystore: &Keystore) -> Result<Dek, CoreError> {
    let salt = decode_hex(&keystore.kdf_salt)?;
    let kek = machine_kek(dir, &salt)?;
    unwrap_keystore_dek(keystore, &kek)
}

fn unwrap_keystore_dek(keystore: &Keystore, kek: &Kek) -> Result<Dek, CoreError> {
    let wrapped = decode_hex(&keystore.dek_wrapped)?;
    let nonce_bytes = decode_hex(&keystore.dek_nonce)?;
    let nonce = Nonce::from_slice(&nonce_bytes).map_err(|_| CoreError::Corrupt)?;
    covault_crypto::unwrap_dek(&wrapped, &nonce, kek, DEK_AAD).map_err(|_| CoreError::Corrupt)
}

fn check_password(keystore: &Keystore, password: &str) -> Result<(), CoreError> {
    let (verifier, verifier_salt) = match (&keystore.password_verifier, &keystore.verifier_salt) {
        (Some(v), Some(s)) => (v, s),
        _ => return Err(CoreError::Corrupt),
    };
    let salt = decode_hex(verifier_salt)?;
    let ok = covault_crypto::verify_hash(password.as_bytes(), &salt, verifier)
        .map_err(|e| CoreError::Crypto(e.to_string()))?;
    if !ok {
        return Err(CoreError::InvalidPassword);
    }
    Ok(())
}

fn decode_hex(s: &str) -> Result<Vec<u8>, CoreError> {
    hex::decode(s).map_err(|_| CoreError::Corrupt)
}

fn write_keystore(path: &Path, keystore: &Keystore) -> Result<(), CoreError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(keystore)?)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_roundtrips_data_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let (nonce, ct) = {
            let vault = Vault::open(dir.path()).await.unwrap();
            vault.encrypt(b"secret cv data", b"cv:1").await.unwrap()
        };

        let vault = Vault::open(dir.path()).await.unwrap();
        let plaintext = vault.decrypt(&ct, &nonce, b"cv:1").await.unwrap();
        assert_eq!(&*plaintext, b"secret cv data");
    }

    #[tokio::test]
    async fn wrong_aad_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::open(dir.path()).await.unwrap();
        let (nonce, ct) = vault.encrypt(b"payload", b"cv:1").await.unwrap();
        let err = vault.decrypt(&ct, &nonce, b"cv:2").await.unwrap_err();
        assert!(matches!(err, CoreError::Corrupt));
    }

    #[tokio::test]
    async fn seal_keeps_key_loaded_until_lock() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::open(dir.path()).await.unwrap();
        vault.seal("hunter2-hunter2").await.unwrap();

        let status = vault.status().await;
        assert!(status.requires_password);
        assert!(!status.is_sealed);

        // Data operations still work until the key is dropped.
        vault.encrypt(b"x", b"cv:1").await.unwrap();

        vault.lock().await;
        let status = vault.status().await;
        assert!(status.is_sealed);
        let err = vault.encrypt(b"x", b"cv:1").await.unwrap_err();
        assert!(matches!(err, CoreError::Sealed));
    }

    #[tokio::test]
    async fn sealed_vault_unseals_across_restart() {
        let dir = tempfile::tempdir().unwrap();

        let (nonce, ct) = {
            let vault = Vault::open(dir.path()).await.unwrap();
            let pair = vault.encrypt(b"persistent", b"cv:1").await.unwrap();
            vault.seal("correct horse").await.unwrap();
            pair
        };

        let vault = Vault::open(dir.path()).await.unwrap();
        assert!(vault.is_locked().await);

        let err = vault.unseal("wrong password").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidPassword));

        vault.unseal("correct horse").await.unwrap();
        let plaintext = vault.decrypt(&ct, &nonce, b"cv:1").await.unwrap();
        assert_eq!(&*plaintext, b"persistent");

        // Unsealing does not remove the protection.
        assert!(vault.status().await.requires_password);
    }

    #[tokio::test]
    async fn seal_twice_is_already_sealed() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::open(dir.path()).await.unwrap();
        vault.seal("first password").await.unwrap();
        let err = vault.seal("second password").await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadySealed));
    }

    #[tokio::test]
    async fn unseal_without_seal_is_not_sealed() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::open(dir.path()).await.unwrap();
        let err = vault.unseal("anything").await.unwrap_err();
        assert!(matches!(err, CoreError::NotSealed));
    }

    #[tokio::test]
    async fn remove_seal_restores_passwordless_open() {
        let dir = tempfile::tempdir().unwrap();

        let (nonce, ct) = {
            let vault = Vault::open(dir.path()).await.unwrap();
            let pair = vault.encrypt(b"keep me", b"cv:1").await.unwrap();
            vault.seal("temporary").await.unwrap();
            vault.remove_seal("temporary").await.unwrap();
            pair
        };

        // No password needed on the next open.
        let vault = Vault::open(dir.path()).await.unwrap();
        assert!(!vault.is_locked().await);
        assert!(!vault.status().await.requires_password);
        let plaintext = vault.decrypt(&ct, &nonce, b"cv:1").await.unwrap();
        assert_eq!(&*plaintext, b"keep me");
    }

    #[tokio::test]
    async fn reset_discards_old_ciphertext() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::open(dir.path()).await.unwrap();
        let (nonce, ct) = vault.encrypt(b"doomed", b"cv:1").await.unwrap();
        vault.reset().await.unwrap();
        let err = vault.decrypt(&ct, &nonce, b"cv:1").await.unwrap_err();
        assert!(matches!(err, CoreError::Corrupt));
    }
}
