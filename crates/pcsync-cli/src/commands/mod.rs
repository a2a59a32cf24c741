//! Subcommands of the `pcsync` binary

pub mod compare;
pub mod list_actions;
pub mod md5;
pub mod reset;
pub mod service;
pub mod time;
pub mod transfer;
pub mod update;
