//! Encrypted credential storage in the local settings file
//!
//! The settings document is a small JSON object. The credential is kept in
//! `encryptedApiToken` as base64 of `nonce(12) || ciphertext+tag`, sealed
//! with AES-256-GCM under a key derived from a fixed label with SHA-256.
//! Files written by older releases may carry a plaintext `apiToken`, which
//! is still read.
//!
//! Other fields in the document are preserved on every write.

use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use savesync_core::domain::{Credential, SyncError};
use savesync_core::ports::ICredentialStore;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// Field holding the sealed credential
pub const ENCRYPTED_FIELD: &str = "encryptedApiToken";

/// Plaintext field written by older releases
pub const LEGACY_FIELD: &str = "apiToken";

const KEY_LABEL: &[u8] = b"SaveManagerSecKey.v1";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

fn cipher() -> Aes256Gcm {
    let key = Sha256::digest(KEY_LABEL);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key))
}

/// Seals `plaintext` into the base64 settings representation
pub fn seal(plaintext: &str) -> Result<String, SyncError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher()
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| SyncError::Settings("credential encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(out))
}

/// Opens a value produced by [`seal`]
pub fn open(sealed: &str) -> Result<String, SyncError> {
    let data = STANDARD
        .decode(sealed.trim())
        .map_err(|e| SyncError::Settings(format!("credential is not valid base64: {}", e)))?;
    if data.len() < NONCE_LEN + TAG_LEN {
        return Err(SyncError::Settings("credential payload too short".to_string()));
    }
    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    let plain = cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| SyncError::Settings("credential failed authentication".to_string()))?;
    String::from_utf8(plain).map_err(|_| SyncError::Settings("credential is not UTF-8".to_string()))
}

/// `ICredentialStore` backed by the JSON settings file
#[derive(Debug, Clone)]
pub struct SettingsCredentialStore {
    path: PathBuf,
}

impl SettingsCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>, SyncError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(SyncError::Settings("settings file is not a JSON object".to_string())),
            Err(e) => Err(SyncError::Settings(format!("settings file is not valid JSON: {}", e))),
        }
    }

    fn write_document(&self, doc: &Map<String, Value>) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| SyncError::Settings(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        restrict_permissions(&self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), SyncError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), SyncError> {
    Ok(())
}

impl ICredentialStore for SettingsCredentialStore {
    fn load(&self) -> Result<Option<Credential>, SyncError> {
        let doc = self.read_document()?;

        if let Some(sealed) = doc.get(ENCRYPTED_FIELD).and_then(Value::as_str) {
            if !sealed.trim().is_empty() {
                let plain = open(sealed)?;
                return Credential::new(plain)
                    .map(Some)
                    .map_err(|e| SyncError::Settings(e.to_string()));
            }
        }

        match doc.get(LEGACY_FIELD).and_then(Value::as_str) {
            Some(token) if !token.trim().is_empty() => {
                warn!(path = %self.path.display(), "Using legacy plaintext credential");
                Credential::new(token)
                    .map(Some)
                    .map_err(|e| SyncError::Settings(e.to_string()))
            }
            _ => {
                debug!(path = %self.path.display(), "No stored credential");
                Ok(None)
            }
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), SyncError> {
        let mut doc = self.read_document().unwrap_or_else(|e| {
            warn!(error = %e, "Replacing unreadable settings file");
            Map::new()
        });
        doc.insert(ENCRYPTED_FIELD.to_string(), Value::String(seal(credential.expose())?));
        doc.remove(LEGACY_FIELD);
        self.write_document(&doc)?;
        info!(path = %self.path.display(), "Credential saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), SyncError> {
        let mut doc = self.read_document()?;
        doc.remove(ENCRYPTED_FIELD);
        doc.remove(LEGACY_FIELD);

        if doc.is_empty() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        } else {
            self.write_document(&doc)?;
        }
        info!(path = %self.path.display(), "Credential cleared");
        Ok(())
    }
}
