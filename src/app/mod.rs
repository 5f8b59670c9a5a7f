//! Host application: CLI, configuration and the stdin-driven queue host

pub mod cli;
pub mod commands;
pub mod config;
pub mod host;
pub mod startup;
