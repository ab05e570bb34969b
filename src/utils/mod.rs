/// Shared helpers for external commands and polling
pub mod command;
pub mod polling;
