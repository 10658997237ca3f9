//! Command implementations

pub mod completions;
pub mod install;
pub mod list;
mod report;
pub mod update;
pub mod version;
