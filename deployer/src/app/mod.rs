//! Application wiring for the binary

pub mod args;
pub mod options;
pub mod run;
