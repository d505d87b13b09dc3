//! Audit log entries
//!
//! One line per successful deploy, appended to `<deployDir>/revisions.log`:
//!
//! ```text
//! 2024-01-02T03:04:05Z deploy git@host:org/app.git v2.0 <sha> 20240102030400
//! ```

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub repository: String,
    pub revision: String,
    pub commit: String,
    pub release: String,
}

impl AuditLogEntry {
    /// Render the log line, without trailing newline
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.user,
            self.repository,
            self.revision,
            self.commit,
            self.release
        )
    }

    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [timestamp, user, repository, revision, commit, release] = fields.as_slice() else {
            return None;
        };

        let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
            .ok()?
            .and_utc();

        Some(Self {
            timestamp,
            user: user.to_string(),
            repository: repository.to_string(),
            revision: revision.to_string(),
            commit: commit.to_string(),
            release: release.to_string(),
        })
    }
}

impl fmt::Display for AuditLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// SHA-1 or SHA-256 object name as printed by `git rev-parse`
pub fn is_object_id(value: &str) -> bool {
    matches!(value.len(), 40 | 64) && value.bytes().all(|b| b.is_ascii_hexdigit())
}
