//! I/O collaborators for postflow commands.

pub mod archive;
pub mod brand;
pub mod config;
pub mod init;
pub mod outputs;
pub mod process;
pub mod prompt;
pub mod provider;
pub mod publisher;
pub mod renderer;
pub mod run_log;
