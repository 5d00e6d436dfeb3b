//! dbkit CLI - create, migrate and set up the databases of workspace projects.
//!
//! This crate provides the `dbkit` binary acting as the host of the
//! provisioning operations: it locates the workspace, picks the invoking
//! project and renders the logger output in the terminal.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
