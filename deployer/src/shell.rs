//! Structured remote shell commands
//!
//! Every command the pipeline sends to a host is assembled from argument
//! vectors and joined with a small set of shell operators. Arguments are
//! quoted at render time, so configuration values (repository URLs,
//! revisions, paths) never reach the remote shell unescaped.

use std::fmt;
use std::path::Path;

/// Characters that force an argument into single quotes
const SHELL_META: &[char] = &[
    ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}', '<',
    '>', '|', '&', ';', '#', '~', '^',
];

/// Escape a value for use inside single quotes.
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for POSIX `sh`.
///
/// Plain words are passed through untouched; anything carrying a shell
/// metacharacter is wrapped in single quotes with embedded quotes escaped.
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Argv(Vec<String>),
    And,
    Or,
    Pipe,
    AppendTo(String),
}

/// A shell command line built from argument lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    segments: Vec<Segment>,
}

impl RemoteCommand {
    /// Start a command line with `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Argv(vec![program.into()])],
        }
    }

    /// Append one argument to the most recent program
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(Segment::Argv(argv)) = self.segments.last_mut() {
            argv.push(arg.into());
        }
        self
    }

    /// Append a path argument to the most recent program
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    /// Append several arguments to the most recent program
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// `<previous> && program`
    pub fn and(self, program: impl Into<String>) -> Self {
        self.chain(Segment::And, program)
    }

    /// `<previous> || program`
    pub fn or(self, program: impl Into<String>) -> Self {
        self.chain(Segment::Or, program)
    }

    /// `<previous> | program`
    pub fn pipe(self, program: impl Into<String>) -> Self {
        self.chain(Segment::Pipe, program)
    }

    /// Redirect the stdout of the most recent program, appending to `path`
    pub fn append_to(mut self, path: &Path) -> Self {
        self.segments
            .push(Segment::AppendTo(path.to_string_lossy().into_owned()));
        self
    }

    fn chain(mut self, op: Segment, program: impl Into<String>) -> Self {
        self.segments.push(op);
        self.segments.push(Segment::Argv(vec![program.into()]));
        self
    }

    /// Every program invoked by this command line, in order
    pub fn programs(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Argv(argv) => argv.first().map(String::as_str),
                _ => None,
            })
            .collect()
    }

    /// Render the command line for `sh -c`
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Argv(argv) => {
                    let quoted: Vec<String> = argv.iter().map(|a| quote_arg(a)).collect();
                    out.push_str(&quoted.join(" "));
                }
                Segment::And => out.push_str(" && "),
                Segment::Or => out.push_str(" || "),
                Segment::Pipe => out.push_str(" | "),
                Segment::AppendTo(path) => {
                    out.push_str(" >> ");
                    out.push_str(&quote_arg(path));
                }
            }
        }
        out
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
