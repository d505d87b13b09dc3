//! Utility functions

use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::DeployError;

/// Version information for the deployer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Hex-encoded SHA256 of data
pub fn sha256_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Name of the user running this process, as recorded in the audit log
pub fn invoking_user() -> String {
    ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|name| sanitize_word(&name))
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Collapse whitespace so the value stays a single audit log field
pub fn sanitize_word(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Read a JSON file into `T`
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DeployError> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        DeployError::ConfigError(format!("Unable to read {}: {}", path.display(), e))
    })?;
    let value = serde_json::from_str(&contents)?;
    Ok(value)
}
