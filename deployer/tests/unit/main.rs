//! Integration tests for reldeploy

mod test_local;
mod test_pipeline;
