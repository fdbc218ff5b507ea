//! Versioned signature store.
//!
//! Signatures are append-only: re-analyzing a user creates version N+1 and
//! never touches earlier versions. The store keeps an in-memory index and,
//! when opened with a root directory, mirrors every record to
//! `{root}/{user}/v{N}.json` as pretty-printed JSON so records stay
//! hand-inspectable.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::signature::AuthorialSignature;

/// Thread-safe signature registry with optional disk persistence.
pub struct SignatureStore {
    root: Option<PathBuf>,
    /// user -> signatures sorted by ascending version.
    index: RwLock<HashMap<String, Vec<AuthorialSignature>>>,
}

impl SignatureStore {
    /// Volatile store; nothing survives the process.
    pub fn in_memory() -> Self {
        Self {
            root: None,
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Open (creating if needed) a store rooted at `root` and load every
    /// record found under it. Unparseable files are skipped with a warning
    /// rather than failing the whole store.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let mut index: HashMap<String, Vec<AuthorialSignature>> = HashMap::new();

        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let user = entry.file_name().to_string_lossy().to_string();
            let mut versions = load_user_dir(&entry.path());
            versions.sort_by_key(|s| s.version);
            if !versions.is_empty() {
                index.insert(user, versions);
            }
        }

        log::info!(
            "signature store opened at {} ({} user(s))",
            root.display(),
            index.len()
        );
        Ok(Self {
            root: Some(root),
            index: RwLock::new(index),
        })
    }

    /// Next version number for `user`: 1 for a new user, otherwise
    /// latest + 1.
    pub fn next_version(&self, user: &str) -> u32 {
        let index = self.index.read().unwrap_or_else(|e| e.into_inner());
        index
            .get(user)
            .and_then(|v| v.last())
            .map(|s| s.version + 1)
            .unwrap_or(1)
    }

    /// Append a signature. The record's version must be exactly the user's
    /// next version; anything else is rejected so history stays gapless and
    /// immutable.
    pub fn append(&self, signature: AuthorialSignature) -> Result<()> {
        validate_user(&signature.user)?;
        let expected = self.next_version(&signature.user);
        if signature.version != expected {
            return Err(Error::InvalidInput(format!(
                "version {} out of sequence for user '{}' (expected {expected})",
                signature.version, signature.user
            )));
        }

        if let Some(root) = &self.root {
            write_record(root, &signature)?;
        }

        log::info!(
            "stored signature v{} for user '{}' ({} sample(s), {} words)",
            signature.version,
            signature.user,
            signature.sample_count,
            signature.sample_words
        );
        let mut index = self.index.write().unwrap_or_else(|e| e.into_inner());
        index
            .entry(signature.user.clone())
            .or_default()
            .push(signature);
        Ok(())
    }

    /// Fetch a signature: a specific version, or the latest when `version`
    /// is `None`.
    pub fn get(&self, user: &str, version: Option<u32>) -> Result<AuthorialSignature> {
        let index = self.index.read().unwrap_or_else(|e| e.into_inner());
        let versions = index.get(user).ok_or_else(|| Error::SignatureNotFound {
            user: user.to_string(),
            version,
        })?;
        let found = match version {
            Some(v) => versions.iter().find(|s| s.version == v),
            None => versions.last(),
        };
        found.cloned().ok_or_else(|| Error::SignatureNotFound {
            user: user.to_string(),
            version,
        })
    }

    /// All stored versions for `user`, ascending. Empty for unknown users.
    pub fn versions(&self, user: &str) -> Vec<u32> {
        let index = self.index.read().unwrap_or_else(|e| e.into_inner());
        index
            .get(user)
            .map(|v| v.iter().map(|s| s.version).collect())
            .unwrap_or_default()
    }

    /// All known users, sorted.
    pub fn users(&self) -> Vec<String> {
        let index = self.index.read().unwrap_or_else(|e| e.into_inner());
        let mut users: Vec<String> = index.keys().cloned().collect();
        users.sort();
        users
    }
}

/// User IDs double as directory names, so keep them path-safe.
pub fn validate_user(user: &str) -> Result<()> {
    if user.is_empty() {
        return Err(Error::InvalidInput("user id must not be empty".to_string()));
    }
    if !user
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(Error::InvalidInput(format!(
            "user id '{user}' contains characters outside [A-Za-z0-9._-]"
        )));
    }
    if user.starts_with('.') {
        return Err(Error::InvalidInput(format!(
            "user id '{user}' must not start with '.'"
        )));
    }
    Ok(())
}

fn load_user_dir(dir: &Path) -> Vec<AuthorialSignature> {
    let mut out = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(err) => {
            log::warn!("cannot read {}: {err}", dir.display());
            return out;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match fs::read_to_string(&path)
            .map_err(Error::from)
            .and_then(|s| serde_json::from_str(&s).map_err(Error::from))
        {
            Ok(sig) => out.push(sig),
            Err(err) => log::warn!("skipping {}: {err}", path.display()),
        }
    }
    out
}

fn write_record(root: &Path, signature: &AuthorialSignature) -> Result<()> {
    let dir = root.join(&signature.user);
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("v{}.json", signature.version));
    let json = serde_json::to_string_pretty(signature)?;
    fs::write(&path, json)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SignatureBuilder;

    const SAMPLE: &str = "The harbor master kept two ledgers, one for the port \
        authority and one for himself. Ships came and went; the numbers rarely \
        agreed. Nobody asked why. In thirty years of service he had learned that \
        the tide forgives what the paperwork cannot, and he wrote accordingly, \
        in a small careful hand that outlived him by decades.";

    fn make_sig(user: &str, version: u32) -> AuthorialSignature {
        let mut b = SignatureBuilder::new(user).with_min_words(1);
        b.add_text(SAMPLE).unwrap();
        b.build(version).unwrap()
    }

    // -----------------------------------------------------------------------
    // In-memory behavior
    // -----------------------------------------------------------------------

    #[test]
    fn test_append_and_get_latest() {
        let store = SignatureStore::in_memory();
        assert_eq!(store.next_version("ada"), 1);
        store.append(make_sig("ada", 1)).unwrap();
        store.append(make_sig("ada", 2)).unwrap();
        let latest = store.get("ada", None).unwrap();
        assert_eq!(latest.version, 2);
        let first = store.get("ada", Some(1)).unwrap();
        assert_eq!(first.version, 1);
    }

    #[test]
    fn test_get_missing_user() {
        let store = SignatureStore::in_memory();
        let err = store.get("ghost", None).unwrap_err();
        assert!(matches!(err, Error::SignatureNotFound { .. }));
    }

    #[test]
    fn test_get_missing_version() {
        let store = SignatureStore::in_memory();
        store.append(make_sig("ada", 1)).unwrap();
        let err = store.get("ada", Some(9)).unwrap_err();
        assert!(matches!(
            err,
            Error::SignatureNotFound {
                version: Some(9),
                ..
            }
        ));
    }

    #[test]
    fn test_append_rejects_version_gap() {
        let store = SignatureStore::in_memory();
        store.append(make_sig("ada", 1)).unwrap();
        assert!(store.append(make_sig("ada", 3)).is_err());
        // Re-appending an existing version is also rejected.
        assert!(store.append(make_sig("ada", 1)).is_err());
        assert_eq!(store.versions("ada"), vec![1]);
    }

    #[test]
    fn test_users_and_versions_listing() {
        let store = SignatureStore::in_memory();
        store.append(make_sig("zoe", 1)).unwrap();
        store.append(make_sig("ada", 1)).unwrap();
        store.append(make_sig("ada", 2)).unwrap();
        assert_eq!(store.users(), vec!["ada".to_string(), "zoe".to_string()]);
        assert_eq!(store.versions("ada"), vec![1, 2]);
        assert!(store.versions("ghost").is_empty());
    }

    #[test]
    fn test_validate_user() {
        assert!(validate_user("ada_lovelace-01").is_ok());
        assert!(validate_user("a.b").is_ok());
        assert!(validate_user("").is_err());
        assert!(validate_user("../escape").is_err());
        assert!(validate_user(".hidden").is_err());
        assert!(validate_user("with space").is_err());
    }

    // -----------------------------------------------------------------------
    // Disk persistence
    // -----------------------------------------------------------------------

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SignatureStore::open(dir.path()).unwrap();
            store.append(make_sig("ada", 1)).unwrap();
            store.append(make_sig("ada", 2)).unwrap();
            store.append(make_sig("zoe", 1)).unwrap();
        }
        let reloaded = SignatureStore::open(dir.path()).unwrap();
        assert_eq!(reloaded.users(), vec!["ada".to_string(), "zoe".to_string()]);
        assert_eq!(reloaded.versions("ada"), vec![1, 2]);
        assert_eq!(reloaded.next_version("ada"), 3);
        let sig = reloaded.get("ada", Some(2)).unwrap();
        assert_eq!(sig.user, "ada");
        assert_eq!(sig.version, 2);
    }

    #[test]
    fn test_record_files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SignatureStore::open(dir.path()).unwrap();
        store.append(make_sig("ada", 1)).unwrap();
        let path = dir.path().join("ada").join("v1.json");
        assert!(path.exists());
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("\"version\": 1"));
    }

    #[test]
    fn test_corrupt_record_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SignatureStore::open(dir.path()).unwrap();
            store.append(make_sig("ada", 1)).unwrap();
        }
        fs::write(dir.path().join("ada").join("v2.json"), "not json").unwrap();
        let reloaded = SignatureStore::open(dir.path()).unwrap();
        assert_eq!(reloaded.versions("ada"), vec![1]);
    }
}
