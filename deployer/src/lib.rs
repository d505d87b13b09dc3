//! reldeploy library
//!
//! Deploys a Git revision into a timestamped release directory, swaps the
//! `current` symlink to it, appends an audit log line and prunes old
//! releases. All host-side work goes through a [`deploy::executor::RemoteExecutor`].

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod shell;
pub mod storage;
pub mod utils;
