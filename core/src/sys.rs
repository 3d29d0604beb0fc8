use std::fmt::Write as _;
use std::path::Path;

use tracing::warn;

use crate::backend::{EntityKind, PermissionBackend};
use crate::command::{Command, Response};
use crate::config;
use crate::entity::EntityRecord;
use crate::error::StoreResult;
use crate::events::EventSink;
use crate::help::help_text;
use crate::namespace::FlushStatus;


/// Command runtime. Owns the backend and dispatches commands.
#[derive(Debug)]
pub struct Sys {
    backend: PermissionBackend,
}


impl Sys {
    /// Open the store described by `config.yml` in `config_dir` (defaults if
    /// the file is absent).
    pub fn new(config_dir: &Path) -> Result<Sys, String> {
        let config = config::load_or_default(&config_dir.join("config.yml"))
            .map_err(|e| e.to_string())?;
        let backend = PermissionBackend::open_file(config_dir, config, EventSink::disabled())
            .map_err(|e| e.to_string())?;
        Ok(Sys { backend })
    }

    /// Create a Sys from a pre-built backend. Useful for testing.
    pub fn from_backend(backend: PermissionBackend) -> Sys {
        Sys { backend }
    }

    pub fn backend(&self) -> &PermissionBackend {
        &self.backend
    }

    /// The single dispatch method. Every command enters here.
    pub fn execute(&self, cmd: Command) -> Response {
        if let Err(e) = self.backend.reload_if_changed() {
            warn!(error = %e, "could not reload externally edited permissions");
        }
        match cmd {
            Command::EntityList { kind, format } => self.cmd_entity_list(kind, format),
            Command::EntityShow { kind, name, format } => self.cmd_entity_show(kind, name, format),
            Command::EntityRename { kind, name, new_name } => self.cmd_entity_rename(kind, name, new_name),
            Command::EntityDelete { kind, name } => self.cmd_entity_delete(kind, name),
            Command::PermissionAdd { kind, name, permission, context } => {
                self.cmd_permission_add(kind, name, permission, context)
            }
            Command::PermissionRemove { kind, name, permission, context } => {
                self.cmd_permission_remove(kind, name, permission, context)
            }
            Command::OptionGet { kind, name, key, context } => self.cmd_option_get(kind, name, key, context),
            Command::OptionSet { kind, name, key, value, context } => {
                self.cmd_option_set(kind, name, key, value, context)
            }
            Command::ParentAdd { kind, name, parents, context } => self.cmd_parent_add(kind, name, parents, context),
            Command::ParentRemove { kind, name, parents, context } => {
                self.cmd_parent_remove(kind, name, parents, context)
            }
            Command::ParentSet { kind, name, parents, context } => self.cmd_parent_set(kind, name, parents, context),
            Command::Help { topic } => Response::Ok { output: help_text(topic.as_deref()) },
        }
    }

    // -----------------------------------------------------------------
    // Entity commands
    // -----------------------------------------------------------------

    fn cmd_entity_list(&self, kind: EntityKind, format: Option<String>) -> Response {
        let names = self.backend.names(kind);
        if format.as_deref() == Some("json") {
            let json = serde_json::to_string_pretty(&names).unwrap_or_else(|_| "[]".into());
            return Response::Ok { output: json };
        }
        if names.is_empty() {
            return Response::Ok { output: format!("No {}s", kind) };
        }
        Response::Ok { output: names.join("\n") }
    }

    fn cmd_entity_show(&self, kind: EntityKind, name: String, format: Option<String>) -> Response {
        let record = self.backend.entity(kind, &name);
        if format.as_deref() == Some("json") {
            let json = serde_json::to_string_pretty(&record.snapshot()).unwrap_or_else(|_| "null".into());
            return Response::Ok { output: json };
        }
        Response::Ok { output: describe(kind, &record) }
    }

    fn cmd_entity_rename(&self, kind: EntityKind, name: String, new_name: String) -> Response {
        let record = self.backend.entity(kind, &name);
        let old = record.identifier();
        match record.rename(&new_name) {
            None => Response::Error {
                message: format!("a {} named '{}' already exists", kind, new_name),
            },
            Some(status) => finish(Ok(status), format!("{} {} renamed to {}", kind, old, record.identifier())),
        }
    }

    fn cmd_entity_delete(&self, kind: EntityKind, name: String) -> Response {
        let record = self.backend.entity(kind, &name);
        let existed = !record.is_virtual();
        let status = record.remove();
        let message = if existed {
            format!("{} {} deleted", kind, record.identifier())
        } else {
            format!("{} {} was not stored", kind, record.identifier())
        };
        finish(Ok(status), message)
    }

    // -----------------------------------------------------------------
    // Attribute commands
    // -----------------------------------------------------------------

    fn cmd_permission_add(
        &self,
        kind: EntityKind,
        name: String,
        permission: String,
        context: Option<String>,
    ) -> Response {
        let record = self.backend.entity(kind, &name);
        let result = record.add_permission(context.as_deref(), &permission);
        finish(result, format!("{} {}: added {}{}", kind, record.identifier(), permission, scope(&context)))
    }

    fn cmd_permission_remove(
        &self,
        kind: EntityKind,
        name: String,
        permission: String,
        context: Option<String>,
    ) -> Response {
        let record = self.backend.entity(kind, &name);
        if !record.permissions(context.as_deref()).contains(&permission) {
            return Response::Error {
                message: format!("{} {} has no permission '{}'{}", kind, record.identifier(), permission, scope(&context)),
            };
        }
        let result = record.remove_permission(context.as_deref(), &permission);
        finish(result, format!("{} {}: removed {}{}", kind, record.identifier(), permission, scope(&context)))
    }

    fn cmd_option_get(&self, kind: EntityKind, name: String, key: String, context: Option<String>) -> Response {
        let record = self.backend.entity(kind, &name);
        Response::Ok {
            output: record.option(context.as_deref(), &key).unwrap_or_default(),
        }
    }

    fn cmd_option_set(
        &self,
        kind: EntityKind,
        name: String,
        key: String,
        value: Option<String>,
        context: Option<String>,
    ) -> Response {
        let record = self.backend.entity(kind, &name);
        let result = record.set_option(context.as_deref(), &key, value.as_deref());
        let message = match &value {
            Some(v) => format!("{} {}: {} = {}{}", kind, record.identifier(), key, v, scope(&context)),
            None => format!("{} {}: {} unset{}", kind, record.identifier(), key, scope(&context)),
        };
        finish(result, message)
    }

    fn cmd_parent_add(&self, kind: EntityKind, name: String, parents: Vec<String>, context: Option<String>) -> Response {
        let record = self.backend.entity(kind, &name);
        let result = record.add_parents(context.as_deref(), &parents);
        let message = format!("{} {}: added parents {}{}", kind, record.identifier(), parents.join(", "), scope(&context));
        finish(result, message)
    }

    fn cmd_parent_remove(
        &self,
        kind: EntityKind,
        name: String,
        parents: Vec<String>,
        context: Option<String>,
    ) -> Response {
        let record = self.backend.entity(kind, &name);
        let result = record.remove_parents(context.as_deref(), &parents);
        let message = format!("{} {}: removed parents {}{}", kind, record.identifier(), parents.join(", "), scope(&context));
        finish(result, message)
    }

    fn cmd_parent_set(&self, kind: EntityKind, name: String, parents: Vec<String>, context: Option<String>) -> Response {
        let record = self.backend.entity(kind, &name);
        let result = record.set_parents(context.as_deref(), &parents);
        let message = if parents.is_empty() {
            format!("{} {}: parents cleared{}", kind, record.identifier(), scope(&context))
        } else {
            format!("{} {}: parents = {}{}", kind, record.identifier(), parents.join(", "), scope(&context))
        };
        finish(result, message)
    }
}


/// Turn a mutation outcome into a response. A failed flush still reports
/// success, with a warning: the change is live in memory.
fn finish(result: StoreResult<FlushStatus>, message: String) -> Response {
    match result {
        Err(e) => Response::Error { message: e.to_string() },
        Ok(FlushStatus::Flushed) => Response::Ok { output: message },
        Ok(FlushStatus::Failed(e)) => Response::Ok {
            output: format!("{}\nwarning: change not saved: {}", message, e),
        },
    }
}


fn scope(context: &Option<String>) -> String {
    match context.as_deref().map(str::trim) {
        Some(c) if !c.is_empty() => format!(" in {}", c),
        _ => String::new(),
    }
}


/// Plain-text rendering of every context of an entity.
fn describe(kind: EntityKind, record: &EntityRecord) -> String {
    let mut out = String::new();
    if record.is_virtual() {
        let _ = write!(out, "{} {} (not stored)", kind, record.identifier());
        return out;
    }
    let _ = writeln!(out, "{} {}", kind, record.identifier());

    let permissions = record.permissions_map();
    let options = record.options_map();
    let parents = record.parents_map();
    for (context, perms) in &permissions {
        match context {
            None => {}
            Some(name) => {
                let _ = writeln!(out, "context {}:", name);
            }
        }
        if !perms.is_empty() {
            let _ = writeln!(out, "  permissions: {}", perms.join(", "));
        }
        if let Some(opts) = options.get(context).filter(|o| !o.is_empty()) {
            let pairs: Vec<String> = opts.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            let _ = writeln!(out, "  options: {}", pairs.join(", "));
        }
        if let Some(ps) = parents.get(context).filter(|p| !p.is_empty()) {
            let _ = writeln!(out, "  parents: {}", ps.join(", "));
        }
    }
    out.trim_end().to_string()
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
