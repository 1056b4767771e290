//! Experiment runner for the C-SMC evaluation engine.
//!
//! This library exposes the settings, output and command modules used by the
//! `csmc-bench` CLI binary.

pub mod commands;
pub mod io;
pub mod settings;
