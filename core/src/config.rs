//! Store configuration, read from `config.yml` in the config directory.
//!
//! ```yaml
//! file: permissions.yml
//! contexts_key: worlds
//! users:
//!   base_path: users
//!   case_normalized: true
//!   parents_key: group
//! groups:
//!   base_path: groups
//!   parents_key: inheritance
//! ```
//!
//! Every field is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::entity::overlay::ContextOverlay;
use crate::error::{StoreError, StoreResult};


/// Top-level store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Permissions document, relative to the config directory unless
    /// absolute.
    pub file: PathBuf,

    /// Key holding the per-context attribute sets of an entity.
    pub contexts_key: String,

    pub users: NamespaceConfig,

    pub groups: NamespaceConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            file: PathBuf::from("permissions.yml"),
            contexts_key: "contexts".into(),
            users: NamespaceConfig {
                base_path: "users".into(),
                case_normalized: true,
                parents_key: "group".into(),
            },
            groups: NamespaceConfig {
                base_path: "groups".into(),
                case_normalized: false,
                parents_key: "inheritance".into(),
            },
        }
    }
}


/// Settings of one namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NamespaceConfig {
    /// Top-level key of the namespace in the document.
    pub base_path: String,

    /// Store identifiers lowercased and look them up case-insensitively.
    #[serde(default)]
    pub case_normalized: bool,

    /// Attribute key the parents list is stored under.
    #[serde(default = "default_parents_key")]
    pub parents_key: String,
}

impl NamespaceConfig {
    pub fn overlay(&self, contexts_key: &str) -> ContextOverlay {
        ContextOverlay::new(contexts_key, self.parents_key.as_str())
    }
}


fn default_parents_key() -> String {
    "parents".into()
}


impl StoreConfig {
    /// The document path, resolved against `config_dir`.
    pub fn document_path(&self, config_dir: &Path) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            config_dir.join(&self.file)
        }
    }

    /// Reject configurations the store cannot work with.
    pub fn validate(&self) -> StoreResult<()> {
        let keys = [
            ("contexts_key", self.contexts_key.as_str()),
            ("users.base_path", self.users.base_path.as_str()),
            ("users.parents_key", self.users.parents_key.as_str()),
            ("groups.base_path", self.groups.base_path.as_str()),
            ("groups.parents_key", self.groups.parents_key.as_str()),
        ];
        for (field, value) in keys {
            if value.trim().is_empty() {
                return Err(StoreError::Config(format!("{} must not be empty", field)));
            }
            if value.contains(crate::namespace::path::SEPARATOR) {
                return Err(StoreError::Config(format!(
                    "{} must be a single key, got '{}'",
                    field, value
                )));
            }
        }
        if self.users.base_path == self.groups.base_path {
            return Err(StoreError::Config(format!(
                "users and groups share base path '{}'",
                self.users.base_path
            )));
        }
        for ns in [&self.users, &self.groups] {
            if ns.parents_key == self.contexts_key {
                return Err(StoreError::Config(format!(
                    "parents key '{}' collides with the contexts key",
                    ns.parents_key
                )));
            }
        }
        Ok(())
    }
}


/// Load a configuration file.
pub fn load(path: &Path) -> StoreResult<StoreConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StoreError::Io {
        target: path.display().to_string(),
        source: e,
    })?;
    parse(&content)
}


/// Load `path` if it exists, otherwise the defaults.
pub fn load_or_default(path: &Path) -> StoreResult<StoreConfig> {
    if path.exists() {
        load(path)
    } else {
        Ok(StoreConfig::default())
    }
}


/// Parse and validate a configuration from a YAML string. An empty
/// document yields the defaults.
pub fn parse(content: &str) -> StoreResult<StoreConfig> {
    let config: StoreConfig = if content.trim().is_empty() {
        StoreConfig::default()
    } else {
        serde_yaml::from_str(content)
            .map_err(|e| StoreError::Config(format!("invalid store config: {}", e)))?
    };
    config.validate()?;
    Ok(config)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg, StoreConfig::default());
        assert!(cfg.users.case_normalized);
        assert!(!cfg.groups.case_normalized);
        assert_eq!(cfg.users.parents_key, "group");
        assert_eq!(cfg.groups.parents_key, "inheritance");
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let cfg = parse("contexts_key: worlds\nfile: perms.yml\n").unwrap();
        assert_eq!(cfg.contexts_key, "worlds");
        assert_eq!(cfg.file, PathBuf::from("perms.yml"));
        assert_eq!(cfg.users.base_path, "users");
    }

    #[test]
    fn namespace_fields_default() {
        let cfg = parse("groups:\n  base_path: ranks\n").unwrap();
        assert_eq!(cfg.groups.base_path, "ranks");
        assert!(!cfg.groups.case_normalized);
        assert_eq!(cfg.groups.parents_key, "parents");
    }

    #[test]
    fn unknown_field_rejected() {
        let err = parse("colour: blue\n").unwrap_err();
        assert!(err.to_string().contains("invalid store config"));
    }

    #[test]
    fn empty_key_rejected() {
        assert!(parse("contexts_key: ''\n").is_err());
    }

    #[test]
    fn slashed_key_rejected() {
        let err = parse("contexts_key: a/b\n").unwrap_err();
        assert!(err.to_string().contains("single key"));
    }

    #[test]
    fn shared_base_path_rejected() {
        let yaml = "users:\n  base_path: all\ngroups:\n  base_path: all\n";
        assert!(parse(yaml).is_err());
    }

    #[test]
    fn document_path_resolution() {
        let cfg = StoreConfig::default();
        assert_eq!(
            cfg.document_path(Path::new("/etc/permstore")),
            PathBuf::from("/etc/permstore/permissions.yml")
        );
        let abs = StoreConfig { file: PathBuf::from("/srv/p.yml"), ..StoreConfig::default() };
        assert_eq!(abs.document_path(Path::new("/etc/permstore")), PathBuf::from("/srv/p.yml"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = load(Path::new("/nonexistent/permstore/config.yml")).unwrap_err();
        assert!(err.is_persistence_failure());
        assert!(load_or_default(Path::new("/nonexistent/permstore/config.yml")).is_ok());
    }

    #[test]
    fn overlay_uses_namespace_parents_key() {
        let cfg = StoreConfig::default();
        let overlay = cfg.groups.overlay(&cfg.contexts_key);
        assert_eq!(overlay.parents_key(), "inheritance");
        assert_eq!(overlay.contexts_key(), "contexts");
    }
}
