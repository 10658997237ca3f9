//! Shared helpers used across the install pipeline

pub mod fs;
