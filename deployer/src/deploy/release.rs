//! Release identifiers

use std::fmt;

use chrono::{DateTime, Utc};

/// A `YYYYMMDDHHMMSS` UTC timestamp naming one release
///
/// Fixed width and zero padded, so lexical order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReleaseId(String);

impl ReleaseId {
    pub const LEN: usize = 14;

    pub fn from_instant(at: DateTime<Utc>) -> Self {
        Self(at.format("%Y%m%d%H%M%S").to_string())
    }

    pub fn now() -> Self {
        Self::from_instant(Utc::now())
    }

    /// Accept an existing directory name if it has the release id shape
    pub fn parse(name: &str) -> Option<Self> {
        if name.len() == Self::LEN && name.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(name.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ReleaseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
