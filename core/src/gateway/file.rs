//! YAML file gateway.
//!
//! All namespaces live in one YAML document, each under its own top-level
//! key:
//!
//! ```yaml
//! groups:
//!   default:
//!     permissions: [modifyworld.*]
//! users:
//!   steve:
//!     group: [default]
//! ```
//!
//! Writes are atomic (write to a temporary file in the same directory, then
//! rename). The mtime of our last read or write is recorded so that edits
//! made by hand while the process runs can be detected.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::debug;

use super::PersistenceGateway;
use crate::error::{StoreError, StoreResult};
use crate::namespace::node::map_to_yaml;
use crate::namespace::{Node, NodeMap};


/// A single YAML document holding every namespace.
#[derive(Debug)]
pub struct YamlFileGateway {
    path: PathBuf,
    normalized: HashSet<String>,
    /// Top-level keys of the whole file.
    document: Mutex<NodeMap>,
    /// Mtime recorded after our last read or write.
    last_mtime: Mutex<Option<SystemTime>>,
}

impl YamlFileGateway {
    /// Open (or prepare to create) the document at `path`.
    ///
    /// A missing file is treated as an empty document; it is created on the
    /// first save.
    pub fn open<I, S>(path: impl Into<PathBuf>, normalized: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = path.into();
        let document = read_document(&path)?;
        let gateway = YamlFileGateway {
            normalized: normalized.into_iter().map(Into::into).collect(),
            document: Mutex::new(document),
            last_mtime: Mutex::new(file_mtime(&path)),
            path,
        };
        debug!(path = %gateway.path.display(), "opened permissions document");
        Ok(gateway)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_document(&self, document: &NodeMap) -> StoreResult<()> {
        let yaml = serde_yaml::to_string(&map_to_yaml(document)).map_err(|e| {
            StoreError::Serialization {
                path: self.path.clone(),
                message: e.to_string(),
            }
        })?;

        let io_err = |source| StoreError::Io {
            target: self.path.display().to_string(),
            source,
        };
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "permissions.yml".into());
        let tmp_path = parent.join(format!(".{}.tmp", file_name));
        fs::write(&tmp_path, yaml).map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).map_err(io_err)?;

        *self.last_mtime.lock() = file_mtime(&self.path);
        Ok(())
    }
}

impl PersistenceGateway for YamlFileGateway {
    fn load(&self, namespace: &str) -> StoreResult<NodeMap> {
        match self.document.lock().get(namespace) {
            None => Ok(NodeMap::new()),
            Some(Node::Map(entities)) => Ok(entities.clone()),
            Some(_) => Err(StoreError::malformed(namespace, "a map")),
        }
    }

    fn save(&self, namespace: &str, entities: &NodeMap) -> StoreResult<()> {
        let mut document = self.document.lock();
        document.insert(namespace.to_string(), Node::Map(entities.clone()));
        self.write_document(&document)?;
        debug!(namespace, path = %self.path.display(), "namespace written");
        Ok(())
    }

    fn is_case_normalized(&self, namespace: &str) -> bool {
        self.normalized.contains(namespace)
    }

    fn refresh(&self) -> StoreResult<()> {
        let fresh = read_document(&self.path)?;
        *self.document.lock() = fresh;
        *self.last_mtime.lock() = file_mtime(&self.path);
        Ok(())
    }

    fn externally_modified(&self) -> bool {
        let recorded = *self.last_mtime.lock();
        match (file_mtime(&self.path), recorded) {
            (Some(current), Some(recorded)) => current > recorded,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}


fn read_document(path: &Path) -> StoreResult<NodeMap> {
    if !path.exists() {
        return Ok(NodeMap::new());
    }
    let contents = fs::read_to_string(path).map_err(|source| StoreError::Io {
        target: path.display().to_string(),
        source,
    })?;
    let value: serde_yaml::Value =
        serde_yaml::from_str(&contents).map_err(|e| StoreError::Serialization {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    match Node::from_yaml(&value) {
        None => Ok(NodeMap::new()),
        Some(Node::Map(document)) => Ok(document),
        Some(other) => Err(StoreError::malformed(
            format!("{} ({})", path.display(), other.describe()),
            "a map",
        )),
    }
}


fn file_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
