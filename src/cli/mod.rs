//! CLI module for devstack - command-line interface definition.

pub mod commands;

pub use commands::Cli;
