//! Deployment module

pub mod audit;
pub mod executor;
pub mod fsm;
pub mod git;
pub mod layout;
pub mod pipeline;
pub mod release;
pub mod retention;
