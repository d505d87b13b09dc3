//! Local state: settings and per-target locks

pub mod lock;
pub mod settings;
