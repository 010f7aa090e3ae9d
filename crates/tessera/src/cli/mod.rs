//! CLI subcommand implementations.

pub mod discover;
pub mod reconcile;
pub mod validate;
