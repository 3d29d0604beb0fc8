//! Command-line parsing for the `permstore` binary.

pub mod parse;

pub use parse::parse_args;
