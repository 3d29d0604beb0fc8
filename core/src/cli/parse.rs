use crate::backend::EntityKind;
use crate::command::Command;


/// Parse CLI arguments into a typed Command enum.
///
/// The first argument is the entity kind (`user`, `group`) or `help`.
/// Entity commands name the entity next and then the action:
/// `user steve add build.* --context nether`.
///
/// Arguments are expected WITHOUT the program name (i.e., `args` should
/// be `["group", "list"]`, not `["permstore", "group", "list"]`).
pub fn parse_args(args: &[&str]) -> Result<Command, String> {
    if args.is_empty() {
        return Err("No command specified. Run 'permstore help' for usage.".into());
    }

    match args[0] {
        "help" | "--help" | "-h" => parse_help(args),
        "user" => parse_entity(EntityKind::User, args),
        "group" => parse_entity(EntityKind::Group, args),
        _ => Err(format!("Unknown command: '{}'", args[0])),
    }
}


// ---------------------------------------------------------------------------
// Sub-parsers
// ---------------------------------------------------------------------------

/// `permstore help [topic]`
fn parse_help(args: &[&str]) -> Result<Command, String> {
    let topic = if args.len() > 1 {
        Some(args[1..].join(" "))
    } else {
        None
    };
    Ok(Command::Help { topic })
}

/// `permstore <user|group> list` or `permstore <user|group> <name> <action> ...`
fn parse_entity(kind: EntityKind, args: &[&str]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err(format!(
            "Usage: permstore {} <list | <name> <show|add|remove|option|unset|parent|rename|delete>>",
            kind
        ));
    }
    if args[1] == "list" {
        let (positional, flags) = split_flags(&args[2..])?;
        expect_none(&positional, "list")?;
        flags.reject_context("list")?;
        return Ok(Command::EntityList { kind, format: flags.format });
    }

    let name = args[1].to_string();
    let action = args.get(2).copied().unwrap_or("show");
    let rest = if args.len() > 3 { &args[3..] } else { &[][..] };
    match action {
        "show" => parse_show(kind, name, rest),
        "add" => parse_permission(kind, name, rest, true),
        "remove" => parse_permission(kind, name, rest, false),
        "option" => parse_option(kind, name, rest),
        "unset" => parse_unset(kind, name, rest),
        "parent" => parse_parent(kind, name, rest),
        "rename" => parse_rename(kind, name, rest),
        "delete" => parse_delete(kind, name, rest),
        other => Err(format!("Unknown {} action: '{}'", kind, other)),
    }
}

/// `<kind> <name> show [--json]`
fn parse_show(kind: EntityKind, name: String, rest: &[&str]) -> Result<Command, String> {
    let (positional, flags) = split_flags(rest)?;
    expect_none(&positional, "show")?;
    flags.reject_context("show")?;
    Ok(Command::EntityShow { kind, name, format: flags.format })
}

/// `<kind> <name> add|remove <permission> [--context <c>]`
fn parse_permission(kind: EntityKind, name: String, rest: &[&str], add: bool) -> Result<Command, String> {
    let verb = if add { "add" } else { "remove" };
    let (positional, flags) = split_flags(rest)?;
    if positional.len() != 1 {
        return Err(format!("Usage: permstore {} <name> {} <permission> [--context <c>]", kind, verb));
    }
    let permission = positional[0].to_string();
    let context = flags.context;
    if add {
        Ok(Command::PermissionAdd { kind, name, permission, context })
    } else {
        Ok(Command::PermissionRemove { kind, name, permission, context })
    }
}

/// `<kind> <name> option <key> [<value>] [--context <c>]`
fn parse_option(kind: EntityKind, name: String, rest: &[&str]) -> Result<Command, String> {
    let (positional, flags) = split_flags(rest)?;
    let context = flags.context;
    if let Some(key) = positional.first() {
        check_option_key(key)?;
    }
    match positional.as_slice() {
        [key] => Ok(Command::OptionGet { kind, name, key: key.to_string(), context }),
        [key, value @ ..] if !value.is_empty() => Ok(Command::OptionSet {
            kind,
            name,
            key: key.to_string(),
            value: Some(value.join(" ")),
            context,
        }),
        _ => Err(format!("Usage: permstore {} <name> option <key> [<value>] [--context <c>]", kind)),
    }
}

/// `<kind> <name> unset <key> [--context <c>]`
fn parse_unset(kind: EntityKind, name: String, rest: &[&str]) -> Result<Command, String> {
    let (positional, flags) = split_flags(rest)?;
    if positional.len() != 1 {
        return Err(format!("Usage: permstore {} <name> unset <key> [--context <c>]", kind));
    }
    check_option_key(positional[0])?;
    Ok(Command::OptionSet {
        kind,
        name,
        key: positional[0].to_string(),
        value: None,
        context: flags.context,
    })
}

fn check_option_key(key: &str) -> Result<(), String> {
    if key.trim().is_empty() {
        return Err("option key must not be blank".to_string());
    }
    Ok(())
}

/// `<kind> <name> parent add|remove|set <parent>... [--context <c>]`
fn parse_parent(kind: EntityKind, name: String, rest: &[&str]) -> Result<Command, String> {
    let usage = || format!("Usage: permstore {} <name> parent <add|remove|set> <parent>... [--context <c>]", kind);
    let Some((&sub, rest)) = rest.split_first() else {
        return Err(usage());
    };
    let (positional, flags) = split_flags(rest)?;
    let parents: Vec<String> = positional.iter().map(|p| p.to_string()).collect();
    let context = flags.context;
    match sub {
        "add" | "remove" if parents.is_empty() => Err(usage()),
        "add" => Ok(Command::ParentAdd { kind, name, parents, context }),
        "remove" => Ok(Command::ParentRemove { kind, name, parents, context }),
        "set" => Ok(Command::ParentSet { kind, name, parents, context }),
        other => Err(format!("Unknown parent subcommand: '{}'", other)),
    }
}

/// `<kind> <name> rename <new_name>`
fn parse_rename(kind: EntityKind, name: String, rest: &[&str]) -> Result<Command, String> {
    let (positional, flags) = split_flags(rest)?;
    flags.reject_context("rename")?;
    if positional.len() != 1 {
        return Err(format!("Usage: permstore {} <name> rename <new_name>", kind));
    }
    Ok(Command::EntityRename { kind, name, new_name: positional[0].to_string() })
}

/// `<kind> <name> delete`
fn parse_delete(kind: EntityKind, name: String, rest: &[&str]) -> Result<Command, String> {
    let (positional, flags) = split_flags(rest)?;
    expect_none(&positional, "delete")?;
    flags.reject_context("delete")?;
    Ok(Command::EntityDelete { kind, name })
}


// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Flags {
    context: Option<String>,
    format: Option<String>,
}

impl Flags {
    fn reject_context(&self, action: &str) -> Result<(), String> {
        match self.context {
            Some(_) => Err(format!("--context is not valid for {}", action)),
            None => Ok(()),
        }
    }
}


/// Separate `--context`, `--format` and `--json` from positional
/// arguments.
fn split_flags<'a>(args: &[&'a str]) -> Result<(Vec<&'a str>, Flags), String> {
    let mut positional = Vec::new();
    let mut flags = Flags::default();
    let mut i = 0;
    while i < args.len() {
        match args[i] {
            "--context" | "-c" => {
                i += 1;
                flags.context = Some(take_arg(args, i, "--context")?);
            }
            "--format" => {
                i += 1;
                flags.format = Some(take_arg(args, i, "--format")?);
            }
            "--json" => flags.format = Some("json".into()),
            other if other.starts_with("--") => return Err(format!("Unknown flag: '{}'", other)),
            other => positional.push(other),
        }
        i += 1;
    }
    Ok((positional, flags))
}


fn expect_none(positional: &[&str], action: &str) -> Result<(), String> {
    match positional.first() {
        Some(extra) => Err(format!("Unexpected argument for {}: '{}'", action, extra)),
        None => Ok(()),
    }
}


fn take_arg(args: &[&str], index: usize, flag: &str) -> Result<String, String> {
    if index >= args.len() {
        return Err(format!("{} requires a value", flag));
    }
    Ok(args[index].into())
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
