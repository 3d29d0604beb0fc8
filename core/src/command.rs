//! Command — the typed interface for all store administration operations.
//!
//! Every operation that can be dispatched through `Sys::execute()` is a
//! variant of the `Command` enum. Commands are serialized as JSON objects
//! with a `"command"` discriminant:
//!
//! ```json
//! {"command": "entity.list", "kind": "group"}
//! {"command": "permission.add", "kind": "user", "name": "steve", "permission": "build.*", "context": "nether"}
//! {"command": "entity.rename", "kind": "group", "name": "vip", "new_name": "donor"}
//! ```
//!
//! | Group | Commands |
//! |-------|----------|
//! | Entity | `entity.list`, `entity.show`, `entity.rename`, `entity.delete` |
//! | Permission | `permission.add`, `permission.remove` |
//! | Option | `option.get`, `option.set` |
//! | Parent | `parent.add`, `parent.remove`, `parent.set` |
//! | Help | `help` |

use serde::{Deserialize, Serialize};

use crate::backend::EntityKind;


/// A typed store command.
///
/// Each variant corresponds to exactly one operation in `Sys::execute()`.
/// `context` is `None` for the common context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command")]
pub enum Command {
    // -----------------------------------------------------------------
    // Entity commands
    // -----------------------------------------------------------------

    /// List persisted entities of one kind.
    #[serde(rename = "entity.list")]
    EntityList {
        kind: EntityKind,
        /// "json" for a JSON array.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },

    /// Show every context of one entity.
    #[serde(rename = "entity.show")]
    EntityShow {
        kind: EntityKind,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },

    /// Rename an entity; fails if the new name is taken.
    #[serde(rename = "entity.rename")]
    EntityRename {
        kind: EntityKind,
        name: String,
        new_name: String,
    },

    /// Remove an entity with all its contexts.
    #[serde(rename = "entity.delete")]
    EntityDelete {
        kind: EntityKind,
        name: String,
    },

    // -----------------------------------------------------------------
    // Permission commands
    // -----------------------------------------------------------------

    /// Grant a permission (or a `-` negation) ahead of existing ones.
    #[serde(rename = "permission.add")]
    PermissionAdd {
        kind: EntityKind,
        name: String,
        permission: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },

    #[serde(rename = "permission.remove")]
    PermissionRemove {
        kind: EntityKind,
        name: String,
        permission: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },

    // -----------------------------------------------------------------
    // Option commands
    // -----------------------------------------------------------------

    #[serde(rename = "option.get")]
    OptionGet {
        kind: EntityKind,
        name: String,
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },

    /// Set an option; `value: None` removes it.
    #[serde(rename = "option.set")]
    OptionSet {
        kind: EntityKind,
        name: String,
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },

    // -----------------------------------------------------------------
    // Parent commands
    // -----------------------------------------------------------------

    /// Append parents that are not already present.
    #[serde(rename = "parent.add")]
    ParentAdd {
        kind: EntityKind,
        name: String,
        parents: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },

    #[serde(rename = "parent.remove")]
    ParentRemove {
        kind: EntityKind,
        name: String,
        parents: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },

    /// Replace the parent list; an empty list clears it.
    #[serde(rename = "parent.set")]
    ParentSet {
        kind: EntityKind,
        name: String,
        parents: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },

    // -----------------------------------------------------------------
    // Help
    // -----------------------------------------------------------------

    #[serde(rename = "help")]
    Help {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
    },
}


/// Outcome of a command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { output: String },
    Error { message: String },
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_uses_command_tag() {
        let cmd = Command::PermissionAdd {
            kind: EntityKind::User,
            name: "steve".into(),
            permission: "build.*".into(),
            context: None,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "command": "permission.add",
                "kind": "user",
                "name": "steve",
                "permission": "build.*"
            })
        );
    }

    #[test]
    fn optional_fields_default_on_decode() {
        let cmd: Command = serde_json::from_str(
            r#"{"command": "option.set", "kind": "group", "name": "vip", "key": "prefix"}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::OptionSet {
                kind: EntityKind::Group,
                name: "vip".into(),
                key: "prefix".into(),
                value: None,
                context: None,
            }
        );
    }

    #[test]
    fn unknown_command_rejected() {
        assert!(serde_json::from_str::<Command>(r#"{"command": "entity.explode"}"#).is_err());
    }

    #[test]
    fn response_tags() {
        let ok = serde_json::to_string(&Response::Ok { output: "done".into() }).unwrap();
        assert!(ok.contains("\"status\":\"ok\""));
        let err = serde_json::to_string(&Response::Error { message: "no".into() }).unwrap();
        assert!(err.contains("\"status\":\"error\""));
    }
}
