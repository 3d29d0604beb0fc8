//! End-to-end tests over a YAML permissions file.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use permstore_core::config::{self, StoreConfig};
use permstore_core::{ChangeKind, EventSink, PermissionBackend};
use pretty_assertions::assert_eq;

fn open(dir: &Path) -> PermissionBackend {
    PermissionBackend::open_file(dir, StoreConfig::default(), EventSink::disabled()).unwrap()
}

fn read_yaml(path: &Path) -> serde_yaml::Value {
    serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn writes_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let backend = open(dir.path());
        let steve = backend.user("Steve");
        steve.set_permissions(None, ["chat.*", "-build.*"]).unwrap().into_result().unwrap();
        steve.set_option(Some("nether"), "prefix", Some("[N]")).unwrap().into_result().unwrap();
        steve.set_parents(None, ["vip"]).unwrap().into_result().unwrap();
        backend.group("vip").set_parents(None, ["default"]).unwrap().into_result().unwrap();
    }

    let backend = open(dir.path());
    let steve = backend.user("STEVE");
    assert!(!steve.is_virtual());
    assert_eq!(steve.permissions(None), vec!["chat.*", "-build.*"]);
    assert_eq!(steve.option(Some("nether"), "prefix").as_deref(), Some("[N]"));
    assert_eq!(steve.parents(None), vec!["vip"]);
    assert_eq!(backend.group("vip").parents(None), vec!["default"]);
}

#[test]
fn document_layout_matches_overlay() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open(dir.path());
    backend.user("steve").set_permissions(Some("nether"), ["fly"]).unwrap().into_result().unwrap();
    backend.user("steve").set_parents(None, ["vip"]).unwrap().into_result().unwrap();

    let expected: serde_yaml::Value = serde_yaml::from_str(
        "users:\n  steve:\n    contexts:\n      nether:\n        permissions: [fly]\n    group: [vip]\n",
    )
    .unwrap();
    assert_eq!(read_yaml(&dir.path().join("permissions.yml")), expected);
}

#[test]
fn legacy_worlds_layout() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("permissions.yml"),
        "\
groups:
  Admin:
    permissions: ['*']
    worlds:
      creative:
        permissions: [gamemode.*]
        inheritance: [builder]
users:
  steve:
    group: [Admin]
",
    )
    .unwrap();
    let cfg = config::parse("contexts_key: worlds\n").unwrap();
    let backend = PermissionBackend::open_file(dir.path(), cfg, EventSink::disabled()).unwrap();

    let admin = backend.group("admin");
    assert_eq!(admin.identifier(), "Admin");
    assert_eq!(admin.contexts().into_iter().collect::<Vec<_>>(), vec!["creative"]);
    assert_eq!(admin.permissions(Some("creative")), vec!["gamemode.*"]);
    assert_eq!(admin.parents(Some("creative")), vec!["builder"]);
    assert_eq!(backend.user("Steve").parents(None), vec!["Admin"]);
}

#[test]
fn emptied_entity_disappears_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open(dir.path());
    let steve = backend.user("steve");
    steve.set_permissions(Some("end"), ["a"]).unwrap().into_result().unwrap();
    steve.clear_permissions(Some("end")).unwrap().into_result().unwrap();

    let reopened = open(dir.path());
    assert!(reopened.user_names().is_empty());
    assert!(reopened.user("steve").is_virtual());
}

#[test]
fn virtual_lookups_never_touch_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open(dir.path());
    let ghost = backend.user("ghost");
    assert!(ghost.permissions(Some("nether")).is_empty());
    assert!(ghost.options_map()[&None].is_empty());
    assert!(!dir.path().join("permissions.yml").exists());
}

#[test]
fn external_edit_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permissions.yml");
    let backend = open(dir.path());
    backend.group("default").set_permissions(None, ["chat"]).unwrap().into_result().unwrap();
    assert!(!backend.reload_if_changed().unwrap());

    thread::sleep(Duration::from_millis(50));
    fs::write(&path, "groups:\n  default:\n    permissions: [chat, mail]\n").unwrap();

    assert!(backend.reload_if_changed().unwrap());
    assert_eq!(backend.group("default").permissions(None), vec!["chat", "mail"]);
    assert!(!backend.reload_if_changed().unwrap());
}

#[test]
fn failed_write_keeps_memory_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permissions.yml");
    // A directory where the temp file should go makes every write fail.
    fs::create_dir(dir.path().join(".permissions.yml.tmp")).unwrap();
    let backend = open(dir.path());

    let status = backend.user("steve").set_permissions(None, ["a"]).unwrap();
    let err = status.into_result().unwrap_err();
    assert!(err.is_persistence_failure());
    assert_eq!(backend.user("steve").permissions(None), vec!["a"]);
    assert!(!path.exists());

    fs::remove_dir(dir.path().join(".permissions.yml.tmp")).unwrap();
    assert!(backend.save_all().is_flushed());
    assert!(path.exists());
}

#[test]
fn concurrent_records_do_not_lose_writes() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(open(dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let backend = Arc::clone(&backend);
            thread::spawn(move || {
                let record = backend.group("shared");
                for j in 0..10 {
                    record
                        .add_permission(Some("w"), &format!("p{}.{}", i, j))
                        .unwrap()
                        .into_result()
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let perms = backend.group("shared").permissions(Some("w"));
    assert_eq!(perms.len(), 80);

    let reopened = open(dir.path());
    assert_eq!(reopened.group("shared").permissions(Some("w")).len(), 80);
}

#[test]
fn rename_is_visible_to_other_records() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open(dir.path());
    let a = backend.group("vip");
    a.set_permissions(None, ["fly"]).unwrap().into_result().unwrap();
    let b = backend.group("vip");

    assert!(a.set_identifier("donor"));
    // `b` still resolves "vip", which is gone.
    assert!(b.is_virtual());
    assert_eq!(backend.group("donor").permissions(None), vec!["fly"]);
    assert_eq!(open(dir.path()).group_names(), vec!["donor"]);
}

#[test]
fn change_events_reach_receiver() {
    let dir = tempfile::tempdir().unwrap();
    let (sink, rx) = EventSink::channel();
    let backend = PermissionBackend::open_file(dir.path(), StoreConfig::default(), sink).unwrap();
    backend.user("steve").add_permission(None, "a").unwrap().into_result().unwrap();
    backend.group("vip").save().unwrap().into_result().unwrap();

    let events: Vec<_> = rx.try_iter().map(|e| (e.namespace, e.entity, e.change)).collect();
    assert_eq!(
        events,
        vec![
            ("users".to_string(), "steve".to_string(), ChangeKind::Permissions),
            ("groups".to_string(), "vip".to_string(), ChangeKind::Saved),
        ]
    );
}
