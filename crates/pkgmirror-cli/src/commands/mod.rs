//! CLI commands

pub mod mirror;
