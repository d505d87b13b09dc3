//! Git commands run against the shared checkout

use std::path::Path;

use crate::shell::RemoteCommand;

/// `<revision>^{commit}`, so tags and branches resolve to a commit
fn commitish(revision: &str) -> String {
    format!("{}^{{commit}}", revision)
}

/// Side-effect-free check that `repo_dir` already holds a clone
pub fn probe_checkout(repo_dir: &Path) -> RemoteCommand {
    RemoteCommand::new("git")
        .arg(format!("--git-dir={}", repo_dir.join(".git").display()))
        .args(["rev-parse", "--git-dir"])
}

/// Clone without checking out a working tree
pub fn clone(repository: &str, repo_dir: &Path) -> RemoteCommand {
    RemoteCommand::new("git")
        .args(["clone", "--quiet", "--no-checkout", "--", repository])
        .path_arg(repo_dir)
}

/// Refresh every remote's refs; the working state is left alone
pub fn fetch(repo_dir: &Path) -> RemoteCommand {
    RemoteCommand::new("git")
        .arg("-C")
        .path_arg(repo_dir)
        .args(["fetch", "--all", "--quiet"])
}

/// Print the commit `revision` resolves to, or exit non-zero
pub fn resolve_commit(repo_dir: &Path, revision: &str) -> RemoteCommand {
    RemoteCommand::new("git")
        .arg("-C")
        .path_arg(repo_dir)
        .args(["rev-parse", "--verify", "--quiet"])
        .arg(commitish(revision))
}

/// Write the tree at `revision` into a fresh, empty `release_dir`
///
/// The revision is verified first so an unknown ref fails before the
/// release directory exists. `mkdir` without `-p` refuses to reuse a
/// directory left by an earlier run.
pub fn extract(repo_dir: &Path, revision: &str, release_dir: &Path) -> RemoteCommand {
    resolve_commit(repo_dir, revision)
        .and("mkdir")
        .arg("--")
        .path_arg(release_dir)
        .and("git")
        .arg("-C")
        .path_arg(repo_dir)
        .args(["archive", "--format=tar", revision])
        .pipe("tar")
        .args(["-x", "-f", "-", "-C"])
        .path_arg(release_dir)
}
