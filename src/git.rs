//! Reading a file's history out of a git repository.

use std::process::Command;

use tracing::{debug, info};

use crate::GitCommandError;

/// Flatten a repository path into a single file name component
pub fn sanitize_path(path: &str) -> String {
    path.replace(['/', '\\'], "_")
}

/// File name a commit's patch for `path` is stored under
pub fn patch_file_name(commit: &str, path: &str) -> String {
    format!("{}-{}.patch", commit, sanitize_path(path))
}

/// Run git in `repo` and return its standard output
fn run(repo: &str, args: &[&str]) -> Result<String, GitCommandError> {
    let command = format!("git {}", args.join(" "));
    debug!(%command, "running");

    let output = Command::new("git")
        .args(["-C", repo])
        .args(args)
        .output()
        .map_err(|e| GitCommandError::SpawnFailed {
            command: command.clone(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitCommandError::ExitError {
            command,
            stderr: stderr.trim_end().to_string(),
        });
    }

    String::from_utf8(output.stdout).map_err(|e| GitCommandError::InvalidUtf8 {
        command,
        message: e.to_string(),
    })
}

/// Non-merge commits in `from..to` that touch `path`, oldest first.
///
/// Without `from`, the whole history reachable from `to` is listed.
pub fn commits_touching(
    repo: &str,
    path: &str,
    from: Option<&str>,
    to: &str,
) -> Result<Vec<String>, GitCommandError> {
    let range = match from {
        Some(from) => format!("{from}..{to}"),
        None => to.to_string(),
    };
    let output = run(
        repo,
        &["log", "--reverse", "--no-merges", "--format=%H", &range, "--", path],
    )?;
    Ok(output.lines().map(str::to_string).collect())
}

/// The changes `commit` makes to `path`, as unified diff text
pub fn commit_patch(repo: &str, commit: &str, path: &str) -> Result<String, GitCommandError> {
    run(
        repo,
        &[
            "show",
            "--format=",
            "--no-color",
            "--no-ext-diff",
            "--src-prefix=a/",
            "--dst-prefix=b/",
            commit,
            "--",
            path,
        ],
    )
}

/// Content of `path` at revision `rev`
pub fn file_at(repo: &str, rev: &str, path: &str) -> Result<String, GitCommandError> {
    run(repo, &["show", &format!("{rev}:{path}")])
}

/// Full hash of `rev`
pub fn resolve(repo: &str, rev: &str) -> Result<String, GitCommandError> {
    Ok(run(repo, &["rev-parse", "--verify", &format!("{rev}^{{commit}}")])?
        .trim()
        .to_string())
}

/// Whether a commit's patch text carries content changes.
///
/// Mode changes and binary files produce a diff header but no hunks.
pub fn has_hunks(commit: &str, text: &str) -> bool {
    let found = text.lines().any(|line| line.starts_with("@@ "));
    if !found {
        info!(commit, "no textual changes, skipping");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn sanitize_flattens_separators() {
        assert_eq!(sanitize_path("src/diff/mod.rs"), "src_diff_mod.rs");
        assert_eq!(sanitize_path("dir\\file.txt"), "dir_file.txt");
        assert_eq!(sanitize_path("plain.txt"), "plain.txt");
    }

    #[test]
    fn patch_names_are_keyed_by_commit() {
        assert_eq!(
            patch_file_name("3f2a9c1", "home/gtk.nix"),
            "3f2a9c1-home_gtk.nix.patch"
        );
    }

    #[test]
    fn hunkless_patches_are_detected() {
        assert!(has_hunks("abc", "--- a/x\n+++ b/x\n@@ -1 +1 @@\n-a\n+b\n"));
        assert!(!has_hunks("abc", "diff --git a/x b/x\nold mode 100644\nnew mode 100755\n"));
    }
}
