//! `hdcrypt` command-line front end.
//!
//! Thin layer over [`hdcrypt_core`]: parses keys and session flags, runs one
//! operation, and writes the result to stdout. Logs go to stderr.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod error;

pub use commands::{Command, KeyArgs, SessionArgs, run};
pub use error::CliError;
