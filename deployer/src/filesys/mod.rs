//! Remote filesystem commands

pub mod dir;
pub mod file;
pub mod link;
