//! Help system — usage text for the `permstore` commands.
//!
//! 1. **Overview** (`permstore help`) lists every command
//! 2. **Topic help** (`permstore help option`) details one group


/// Generate help text for a given topic.
pub fn help_text(topic: Option<&str>) -> String {
    match topic {
        None => overview(),
        Some(t) => match topic_help(t) {
            Some(text) => text,
            None => format!(
                "Unknown help topic: '{}'. Run 'permstore help' for a list of commands.",
                t
            ),
        },
    }
}


fn overview() -> String {
    "\
permstore — administer a context-scoped permissions file

Usage: permstore <user|group> <name> <action> [args...] [--context <c>]

Entity commands:
  <kind> list [--json]                 List stored users or groups
  <kind> <name> [show] [--json]        Show all contexts of an entity
  <kind> <name> rename <new>           Rename, keeping every context
  <kind> <name> delete                 Remove the entity entirely

Permission commands:
  <kind> <name> add <perm>             Grant a permission (first match wins)
  <kind> <name> remove <perm>          Drop a permission

Option commands:
  <kind> <name> option <key> [value]   Read or set an option
  <kind> <name> unset <key>            Remove an option

Parent commands:
  <kind> <name> parent add <p>...      Append parents
  <kind> <name> parent remove <p>...   Drop parents
  <kind> <name> parent set [<p>...]    Replace parents (none clears)

  help [topic]                         Show help (topics: entity, permission, option, parent, context)

<kind> is 'user' or 'group'. Without --context a command works on the
common context, which applies in every world.

Environment:
  PERMSTORE_CONFIG_DIR   Config directory (default ~/.config/permstore)
  PERMSTORE_LOG          Log filter, e.g. 'debug' (default 'warn')"
        .into()
}


fn topic_help(topic: &str) -> Option<String> {
    let text = match topic {
        "entity" | "user" | "group" => "\
Entity commands

  <kind> list [--json]
    Stored identifiers, sorted. Entities that were only looked up and
    never given any data are not stored and do not appear.

  <kind> <name> [show] [--json]
    Permissions, options and parents of the common context followed by
    each named context. --json prints the raw entity tree.

  <kind> <name> rename <new>
    Move the entity and all its contexts to a new name. Fails if an entity
    with that name already exists. User names are compared without case.

  <kind> <name> delete
    Remove the entity. Deleting an unknown entity succeeds.",

        "permission" | "add" | "remove" => "\
Permission commands

  <kind> <name> add <permission> [--context <c>]
    Put the permission first in the list (moving it if present). Prefix
    with '-' to deny. The first matching entry wins.

  <kind> <name> remove <permission> [--context <c>]
    Drop the permission. A list left empty is removed, and an entity left
    with no data is deleted.",

        "option" | "unset" => "\
Option commands

  <kind> <name> option <key> [--context <c>]
    Print the option value, or nothing if unset.

  <kind> <name> option <key> <value>... [--context <c>]
    Set the option. Several words are joined with spaces.

  <kind> <name> unset <key> [--context <c>]
    Remove the option.",

        "parent" => "\
Parent commands

  <kind> <name> parent add <parent>... [--context <c>]
  <kind> <name> parent remove <parent>... [--context <c>]
  <kind> <name> parent set [<parent>...] [--context <c>]
    Order is significant. 'set' with no parents clears the list.",

        "context" => "\
Contexts

  Every attribute lives either in the common context or in a named
  context (usually a world name) given with --context. A blank context
  name is the common context. Contexts left empty are removed from the
  file automatically.",

        _ => return None,
    };
    Some(text.into())
}
