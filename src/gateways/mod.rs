//! Gateways to the process environment: shell commands and the local filesystem.

mod filesystem;
mod shell;

pub use filesystem::*;
pub use shell::*;
