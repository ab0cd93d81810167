//! CLI module for the photo-matte tool
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;
mod replay;

pub use main_impl::{main, Cli, CliOutputFormat, CliResampleFilter, Command, CompositeArgs, ReplayArgs};
pub use replay::{CaptureScript, ReplayReport, ScriptEvent};
