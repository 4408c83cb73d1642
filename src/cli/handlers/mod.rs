// src/cli/handlers/mod.rs

// One module per CLI command, plus the helpers they share.

pub mod commons;
pub mod init;
pub mod list;
pub mod run;
