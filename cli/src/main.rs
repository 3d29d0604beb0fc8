//! permstore — command-line administration of a permissions file.
//!
//! # Usage
//!
//! ```text
//! permstore group list
//! permstore user steve add -build.* --context nether
//! permstore group vip option prefix [VIP]
//! permstore group vip parent set default
//! permstore user steve rename alex
//! ```

use std::path::{Path, PathBuf};
use std::process;

use permstore_core::cli::parse_args;
use permstore_core::command::{Command, Response};
use permstore_core::sys::Sys;
use tracing::debug;
use tracing_subscriber::EnvFilter;


fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let arg_refs: Vec<&str> = args[1..].iter().map(|s| s.as_str()).collect();

    let cmd = match parse_args(&arg_refs) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("permstore: {}", e);
            process::exit(1);
        }
    };

    let config_dir = resolve_config_dir();
    debug!(config_dir = %config_dir.display(), "resolved config directory");
    match execute_local(&config_dir, cmd) {
        Response::Ok { output } => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Response::Error { message } => {
            eprintln!("permstore error: {}", message);
            process::exit(1);
        }
    }
}


fn init_logging() {
    let filter = EnvFilter::try_from_env("PERMSTORE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}


fn resolve_config_dir() -> PathBuf {
    config_dir_from(
        std::env::var("PERMSTORE_CONFIG_DIR").ok(),
        std::env::var("HOME").ok(),
    )
}


/// `PERMSTORE_CONFIG_DIR` if set, else `~/.config/permstore`.
fn config_dir_from(explicit: Option<String>, home: Option<String>) -> PathBuf {
    if let Some(dir) = explicit {
        return PathBuf::from(dir);
    }
    let home = home.unwrap_or_else(|| "/tmp".into());
    PathBuf::from(home).join(".config").join("permstore")
}


fn execute_local(config_dir: &Path, cmd: Command) -> Response {
    // Help needs no store.
    if let Command::Help { topic } = &cmd {
        return Response::Ok {
            output: permstore_core::help::help_text(topic.as_deref()),
        };
    }
    match Sys::new(config_dir) {
        Ok(sys) => sys.execute(cmd),
        Err(e) => Response::Error {
            message: format!("Failed to open permissions: {}", e),
        },
    }
}
