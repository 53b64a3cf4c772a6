//! CLI command implementations.

pub mod install;

pub use install::cmd_install;
