//! The `users` and `groups` namespaces of one store.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::entity::EntityRecord;
use crate::error::StoreResult;
use crate::events::EventSink;
use crate::gateway::{PersistenceGateway, YamlFileGateway};
use crate::namespace::{FlushStatus, Namespace};


/// Which namespace an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Group,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Group => "group",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(EntityKind::User),
            "group" => Ok(EntityKind::Group),
            other => Err(format!("unknown entity kind: '{}'", other)),
        }
    }
}


/// Owns both namespaces over a shared gateway and hands out records.
pub struct PermissionBackend {
    config: StoreConfig,
    gateway: Arc<dyn PersistenceGateway>,
    users: Arc<Namespace>,
    groups: Arc<Namespace>,
}

impl PermissionBackend {
    /// Build both namespaces from `gateway`.
    pub fn open(
        config: StoreConfig,
        gateway: Arc<dyn PersistenceGateway>,
        events: EventSink,
    ) -> StoreResult<Self> {
        config.validate()?;
        let users = Namespace::open(
            &config.users.base_path,
            config.users.overlay(&config.contexts_key),
            gateway.clone(),
            events.clone(),
        )?;
        let groups = Namespace::open(
            &config.groups.base_path,
            config.groups.overlay(&config.contexts_key),
            gateway.clone(),
            events,
        )?;
        info!(
            users = users.entity_names().len(),
            groups = groups.entity_names().len(),
            "permission backend opened"
        );
        Ok(PermissionBackend { config, gateway, users, groups })
    }

    /// Open the YAML document named by `config`, relative to `config_dir`.
    pub fn open_file(config_dir: &Path, config: StoreConfig, events: EventSink) -> StoreResult<Self> {
        let path = config.document_path(config_dir);
        let normalized: Vec<&str> = [&config.users, &config.groups]
            .into_iter()
            .filter(|ns| ns.case_normalized)
            .map(|ns| ns.base_path.as_str())
            .collect();
        let gateway = YamlFileGateway::open(path, normalized)?;
        PermissionBackend::open(config, Arc::new(gateway), events)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn namespace(&self, kind: EntityKind) -> &Arc<Namespace> {
        match kind {
            EntityKind::User => &self.users,
            EntityKind::Group => &self.groups,
        }
    }

    pub fn entity(&self, kind: EntityKind, name: &str) -> EntityRecord {
        EntityRecord::new(self.namespace(kind).clone(), name)
    }

    pub fn user(&self, name: &str) -> EntityRecord {
        self.entity(EntityKind::User, name)
    }

    pub fn group(&self, name: &str) -> EntityRecord {
        self.entity(EntityKind::Group, name)
    }

    pub fn names(&self, kind: EntityKind) -> Vec<String> {
        self.namespace(kind).entity_names()
    }

    /// Persisted user identifiers, sorted.
    pub fn user_names(&self) -> Vec<String> {
        self.names(EntityKind::User)
    }

    /// Persisted group identifiers, sorted.
    pub fn group_names(&self) -> Vec<String> {
        self.names(EntityKind::Group)
    }

    /// Re-read the backing document and replace both namespaces' state.
    /// Unflushed changes are lost.
    pub fn reload(&self) -> StoreResult<()> {
        self.gateway.refresh()?;
        self.users.reload()?;
        self.groups.reload()?;
        info!("permissions reloaded");
        Ok(())
    }

    /// Reload only if the backing document was edited externally. Returns
    /// whether a reload happened.
    pub fn reload_if_changed(&self) -> StoreResult<bool> {
        if !self.gateway.externally_modified() {
            return Ok(false);
        }
        debug!("backing document changed externally");
        self.reload()?;
        Ok(true)
    }

    /// Flush whichever namespaces hold unflushed changes. The first failure
    /// is returned; the other namespace is still attempted.
    pub fn save_all(&self) -> FlushStatus {
        let users = self.users.flush_if_dirty();
        let groups = self.groups.flush_if_dirty();
        match (users, groups) {
            (FlushStatus::Failed(e), _) | (_, FlushStatus::Failed(e)) => FlushStatus::Failed(e),
            _ => FlushStatus::Flushed,
        }
    }
}

impl fmt::Debug for PermissionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionBackend")
            .field("users", &self.users)
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;

    fn backend(gw: Arc<MemoryGateway>) -> PermissionBackend {
        PermissionBackend::open(StoreConfig::default(), gw, EventSink::disabled()).unwrap()
    }

    fn memory() -> Arc<MemoryGateway> {
        Arc::new(MemoryGateway::new().with_normalized("users"))
    }

    #[test]
    fn entity_kind_parsing() {
        assert_eq!("user".parse::<EntityKind>().unwrap(), EntityKind::User);
        assert_eq!("group".parse::<EntityKind>().unwrap(), EntityKind::Group);
        assert!("world".parse::<EntityKind>().is_err());
        assert_eq!(EntityKind::Group.to_string(), "group");
    }

    #[test]
    fn users_and_groups_are_separate() {
        let b = backend(memory());
        b.user("admin").set_permissions(None, ["a"]).unwrap().into_result().unwrap();
        assert_eq!(b.user_names(), vec!["admin"]);
        assert!(b.group_names().is_empty());
        assert!(b.group("admin").is_virtual());
    }

    #[test]
    fn namespace_policies_follow_gateway() {
        let b = backend(memory());
        assert!(b.namespace(EntityKind::User).is_case_normalized());
        assert!(!b.namespace(EntityKind::Group).is_case_normalized());
        assert_eq!(b.user("Steve").identifier(), "steve");
        assert_eq!(b.group("Admin").identifier(), "Admin");
    }

    #[test]
    fn parents_use_namespace_key() {
        let gw = memory();
        let b = backend(gw.clone());
        b.user("steve").set_parents(None, ["vip"]).unwrap().into_result().unwrap();
        b.group("vip").set_parents(None, ["default"]).unwrap().into_result().unwrap();
        assert!(gw.document("users").unwrap()["steve"].as_map().unwrap().contains_key("group"));
        assert!(gw.document("groups").unwrap()["vip"].as_map().unwrap().contains_key("inheritance"));
    }

    #[test]
    fn save_all_retries_failed_flush() {
        let gw = memory();
        let b = backend(gw.clone());
        gw.fail_saves(true);
        let status = b.user("steve").set_permissions(None, ["a"]).unwrap();
        assert!(!status.is_flushed());
        assert!(!b.save_all().is_flushed());

        gw.fail_saves(false);
        assert!(b.save_all().is_flushed());
        assert!(gw.document("users").unwrap().contains_key("steve"));
    }

    #[test]
    fn reload_discards_memory_state() {
        let gw = memory();
        let b = backend(gw.clone());
        gw.fail_saves(true);
        let _ = b.user("steve").set_permissions(None, ["a"]).unwrap();
        gw.fail_saves(false);
        b.reload().unwrap();
        assert!(b.user_names().is_empty());
    }

    #[test]
    fn memory_gateway_never_reports_external_edits() {
        let b = backend(memory());
        assert!(!b.reload_if_changed().unwrap());
    }

    #[test]
    fn invalid_config_rejected() {
        let mut cfg = StoreConfig::default();
        cfg.groups.base_path = "users".into();
        assert!(PermissionBackend::open(cfg, memory(), EventSink::disabled()).is_err());
    }
}
