//! CLI commands

pub mod debug_dump;
pub mod install;
pub mod uninstall;
pub mod verify;
