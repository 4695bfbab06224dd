use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::CacheError;

/// A stored value together with the hash of the input it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub data: Value,
}

impl CacheEntry {
    /// An entry is current when no hash is requested, or when the requested
    /// hash equals the stored one.
    fn matches(&self, hash: Option<&str>) -> bool {
        match hash {
            None => true,
            Some(expected) => self.hash.as_deref() == Some(expected),
        }
    }
}

/// Key/value store for per-node analysis results.
///
/// Entries live in namespaces (one per analyzer). A miss is `Ok(None)`, not
/// an error.
pub trait CacheDriver: std::fmt::Debug {
    fn store(
        &mut self,
        namespace: &str,
        key: &str,
        data: Value,
        hash: Option<&str>,
    ) -> Result<(), CacheError>;

    /// Fetch an entry; `None` when absent or when `hash` does not match.
    fn restore(
        &self,
        namespace: &str,
        key: &str,
        hash: Option<&str>,
    ) -> Result<Option<Value>, CacheError>;

    /// Delete `key` and every `key.*` entry from all namespaces.
    fn remove(&mut self, key_or_prefix: &str) -> Result<(), CacheError>;
}

/// Cache driver shared between the analyzers of one run.
pub type SharedCache = Rc<RefCell<dyn CacheDriver>>;

/// A driver bound to one namespace.
pub struct CacheScope<'a> {
    driver: &'a mut dyn CacheDriver,
    namespace: String,
}

impl<'a> CacheScope<'a> {
    pub fn new(driver: &'a mut dyn CacheDriver, namespace: &str) -> Self {
        Self {
            driver,
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn store(&mut self, key: &str, data: Value, hash: Option<&str>) -> Result<(), CacheError> {
        self.driver.store(&self.namespace, key, data, hash)
    }

    pub fn restore(&self, key: &str, hash: Option<&str>) -> Result<Option<Value>, CacheError> {
        self.driver.restore(&self.namespace, key, hash)
    }

    pub fn remove(&mut self, key_or_prefix: &str) -> Result<(), CacheError> {
        self.driver.remove(key_or_prefix)
    }
}

fn matches_prefix(key: &str, key_or_prefix: &str) -> bool {
    key == key_or_prefix
        || key
            .strip_prefix(key_or_prefix)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    namespaces: HashMap<String, HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheDriver for MemoryCache {
    fn store(
        &mut self,
        namespace: &str,
        key: &str,
        data: Value,
        hash: Option<&str>,
    ) -> Result<(), CacheError> {
        self.namespaces.entry(namespace.to_string()).or_default().insert(
            key.to_string(),
            CacheEntry {
                hash: hash.map(str::to_string),
                data,
            },
        );
        Ok(())
    }

    fn restore(
        &self,
        namespace: &str,
        key: &str,
        hash: Option<&str>,
    ) -> Result<Option<Value>, CacheError> {
        Ok(self
            .namespaces
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .filter(|entry| entry.matches(hash))
            .map(|entry| entry.data.clone()))
    }

    fn remove(&mut self, key_or_prefix: &str) -> Result<(), CacheError> {
        for entries in self.namespaces.values_mut() {
            entries.retain(|key, _| !matches_prefix(key, key_or_prefix));
        }
        Ok(())
    }
}

/// Cache persisted as one JSON file per entry under `<root>/<namespace>/`.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.root
            .join(sanitize(namespace))
            .join(format!("{}.json", sanitize(key)))
    }
}

/// Keep file names portable; dots survive so prefix removal still works.
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl CacheDriver for FileCache {
    fn store(
        &mut self,
        namespace: &str,
        key: &str,
        data: Value,
        hash: Option<&str>,
    ) -> Result<(), CacheError> {
        let path = self.entry_path(namespace, key);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let entry = CacheEntry {
            hash: hash.map(str::to_string),
            data,
        };
        std::fs::write(&path, serde_json::to_string(&entry)?)?;
        Ok(())
    }

    fn restore(
        &self,
        namespace: &str,
        key: &str,
        hash: Option<&str>,
    ) -> Result<Option<Value>, CacheError> {
        let path = self.entry_path(namespace, key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let entry: CacheEntry = serde_json::from_str(&content)?;
        Ok(entry.matches(hash).then_some(entry.data))
    }

    fn remove(&mut self, key_or_prefix: &str) -> Result<(), CacheError> {
        if !self.root.exists() {
            return Ok(());
        }
        let prefix = sanitize(key_or_prefix);
        for namespace in std::fs::read_dir(&self.root)? {
            let namespace = namespace?;
            if !namespace.file_type()?.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(namespace.path())? {
                let path = entry?.path();
                let matches = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|stem| matches_prefix(stem, &prefix));
                if matches {
                    std::fs::remove_file(&path)?;
                }
            }
        }
        Ok(())
    }
}

/// Compute SHA-256 hash of the given content.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
