//! Stored OAuth credential and its on-disk store.
//!
//! The whole credential is one JSON object at a fixed per-user path. Writes
//! go to a temp file in the same directory and are renamed over the target,
//! so a reader never sees a partial record. Reads never lock: anything that
//! cannot be read back cleanly loads as the unauthenticated sentinel.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Placeholder access token meaning "no credential present".
pub const SENTINEL_TOKEN: &str = "unauthenticated";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Credential {
    /// The sentinel credential, used wherever no record is stored.
    pub fn unauthenticated() -> Self {
        Self {
            access_token: SENTINEL_TOKEN.to_string(),
            refresh_token: None,
            expires_at: None,
            token_type: default_token_type(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token != SENTINEL_TOKEN
    }

    /// A credential without an expiry never expires.
    pub fn has_expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if at <= Utc::now())
    }
}

pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential.
    ///
    /// Never fails: a missing, unreadable or malformed file is the
    /// unauthenticated state, which also covers reading concurrently with an
    /// in-progress write.
    pub fn load(&self) -> Credential {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Credential::unauthenticated();
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "credential file unreadable");
                return Credential::unauthenticated();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(credential) => credential,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "credential file malformed");
                Credential::unauthenticated()
            }
        }
    }

    /// Persist the credential, replacing any previous record atomically.
    pub fn save(&self, credential: &Credential) -> io::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, credential)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&self.path).map_err(|err| err.error)?;
        debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    /// Remove the stored credential. `Ok(false)` when nothing was stored.
    pub fn delete(&self) -> io::Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store_in(dir: &Path) -> CredentialStore {
        CredentialStore::new(dir.join("auth.json"))
    }

    #[test]
    fn test_load_missing_file_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let credential = store_in(dir.path()).load();
        assert_eq!(credential.access_token, SENTINEL_TOKEN);
        assert!(!credential.is_authenticated());
        assert!(!credential.has_expired());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let credential = Credential {
            access_token: "tok-123".to_string(),
            refresh_token: Some("refresh-456".to_string()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            token_type: "Bearer".to_string(),
        };
        store.save(&credential).unwrap();

        let loaded = store.load();
        assert_eq!(loaded, credential);
        assert!(loaded.is_authenticated());
        assert!(!loaded.has_expired());
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("nested").join("deep").join("auth.json"));
        store.save(&Credential::unauthenticated()).unwrap();
        assert!(store.path().is_file());
    }

    #[test]
    fn test_load_malformed_file_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        std::fs::write(store.path(), b"{not json").unwrap();
        assert!(!store.load().is_authenticated());
    }

    #[test]
    fn test_expiry_in_past_is_expired() {
        let credential = Credential {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() - Duration::hours(1)),
            token_type: "Bearer".to_string(),
        };
        assert!(credential.has_expired());
    }

    #[test]
    fn test_delete_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(!store.delete().unwrap());

        store.save(&Credential::unauthenticated()).unwrap();
        assert!(store.delete().unwrap());
        assert!(!store.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.save(&Credential::unauthenticated()).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
