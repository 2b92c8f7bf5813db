//! Reading unified diffs into files, hunks and line changes.
//!
//! Accepts the output of `git show`, `git diff`, `git format-patch` and
//! `diff -u`. Anything outside a `--- `/`+++ ` file section (commit
//! headers, `diff --git` and `index` lines, mail preambles) is skipped.

pub mod file;
pub mod hunk;

use std::fmt;

use error_set::error_set;

pub use file::FilePatch;
pub use hunk::{Change, Hunk, Range};

error_set! {
    /// Errors from reading unified diff text
    ParseError := {
        /// No `--- `/`+++ ` file section was found
        #[display("Patch contains no file sections")]
        NoFiles,
        /// Hunk header does not have the `@@ -a,b +c,d @@` shape
        #[display("Line {line}: invalid hunk header '{header}'")]
        InvalidHunkHeader { line: usize, header: String },
        /// Input ended before the counts of a hunk header were satisfied
        #[display("Line {line}: hunk ends early, header announces {expected_old} old and {expected_new} new lines")]
        TruncatedHunk { line: usize, expected_old: u32, expected_new: u32 },
        /// A body line that neither fits the header counts nor is a diff line
        #[display("Line {line}: unexpected hunk content '{content}'")]
        UnexpectedLine { line: usize, content: String },
        /// Hunk starts before the previous hunk of the same file ends
        #[display("Line {line}: hunk overlaps the previous hunk")]
        OverlappingHunks { line: usize },
        /// A `--- ` header is not followed by its `+++ ` header
        #[display("Line {line}: '---' header without a matching '+++' header")]
        MissingNewHeader { line: usize },
        /// Hunk header outside any file section
        #[display("Line {line}: hunk found before any file header")]
        OrphanHunk { line: usize },
    }
}

/// A parsed patch, possibly spanning several files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub files: Vec<FilePatch>,
}

impl Patch {
    /// Parse unified diff text.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if no file section is present or a hunk is
    /// malformed.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line))
            .peekable();
        let mut files = Vec::new();

        while let Some((number, line)) = lines.next() {
            if let Some(old_header) = line.strip_prefix("--- ") {
                // Mail patches use "---" alone as a separator, and commit
                // messages may quote diffs; only a header pair opens a file
                if lines
                    .peek()
                    .is_some_and(|(_, next)| next.starts_with("+++ "))
                {
                    files.push(FilePatch::parse(number, old_header, &mut lines)?);
                }
            } else if line.starts_with("@@ ") {
                return Err(ParseError::OrphanHunk { line: number });
            }
        }

        if files.is_empty() {
            return Err(ParseError::NoFiles);
        }

        Ok(Patch { files })
    }

    /// The file section touching `path`, if any
    pub fn file(&self, path: &str) -> Option<&FilePatch> {
        self.files.iter().find(|file| file.touches(path))
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.files {
            write!(f, "{}", file)?;
        }
        Ok(())
    }
}

/// Format a patch for display with explicit line numbers.
///
/// Context lines carry their old line number, deletions the old line number
/// and additions the new one:
/// ```text
/// flake.nix:
///   @@ -136,2 +136,3 @@
///    136:	  inputs = {
///   +137:	    debug = true;
///    137:	  };
/// ```
pub fn format_patch(patch: &Patch) -> String {
    let mut result = String::new();

    for file in &patch.files {
        if !result.is_empty() {
            result.push('\n');
        }
        result.push_str(&file.label());
        result.push_str(":\n");

        for hunk in &file.hunks {
            result.push_str(&format!("  @@ -{} +{} @@\n", hunk.old, hunk.new));
            for change in &hunk.changes {
                let line = match change {
                    Change::Context {
                        old_line, content, ..
                    } => format!("   {}:\t{}\n", old_line, content),
                    Change::Delete { old_line, content } => {
                        format!("  -{}:\t{}\n", old_line, content)
                    }
                    Change::Add { new_line, content } => {
                        format!("  +{}:\t{}\n", new_line, content)
                    }
                };
                result.push_str(&line);
            }
        }
    }

    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    const GIT_SHOW: &str = r#"commit 3f2a9c1d6b8e4f7a0c5d2e9b1a4f6c8d0e2b4a6c
Author: Test User <test@example.com>
Date:   Fri Feb 13 23:31:30 2009 +0000

    tune settings

diff --git a/gtk.nix b/gtk.nix
index 2ce966d..93d8dbc 100644
--- a/gtk.nix
+++ b/gtk.nix
@@ -9,3 +9,4 @@ line 8
   {
-    gtk.theme.name = "Adwaita";
+    # Theme managed by Stylix
+    gtk.cursorTheme.size = 24;
   }
diff --git a/zsh.nix b/zsh.nix
index 6f2e06d..110fff0 100644
--- a/zsh.nix
+++ b/zsh.nix
@@ -15 +14,0 @@ line 14
-      enableAutosuggestions = true;
"#;

    #[test]
    fn parse_git_show_output() {
        let patch = Patch::parse(GIT_SHOW).unwrap();
        assert_eq!(patch.files.len(), 2);
        assert_eq!(patch.files[0].path(), Some("gtk.nix"));
        assert_eq!(patch.files[0].hunks[0].changes.len(), 5);
        assert_eq!(patch.files[1].path(), Some("zsh.nix"));
        assert_eq!(
            patch.files[1].hunks[0].changes,
            vec![Change::Delete {
                old_line: 15,
                content: "      enableAutosuggestions = true;".to_string()
            }]
        );
    }

    #[test]
    fn find_file_section() {
        let patch = Patch::parse(GIT_SHOW).unwrap();
        assert!(patch.file("zsh.nix").is_some());
        assert!(patch.file("missing.nix").is_none());
    }

    #[test]
    fn mail_separator_is_not_a_header() {
        let text = "Subject: [PATCH] fix\n---\n x | 2 +-\n\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n-a\n+b\n";
        let patch = Patch::parse(text).unwrap();
        assert_eq!(patch.files.len(), 1);
    }

    #[test]
    fn empty_input_has_no_files() {
        assert!(matches!(Patch::parse(""), Err(ParseError::NoFiles)));
        assert!(matches!(
            Patch::parse("commit abc\n\n    message only\n"),
            Err(ParseError::NoFiles)
        ));
    }

    #[test]
    fn hunk_without_file_header() {
        let result = Patch::parse("@@ -1 +1 @@\n-a\n+b\n");
        assert!(matches!(result, Err(ParseError::OrphanHunk { line: 1 })));
    }

    #[test]
    fn huge_line_numbers_are_a_parse_error() {
        let result = Patch::parse("--- a/x\n+++ b/x\n@@ -4294967295,2 +1,2 @@\n a\n b\n");
        assert!(matches!(
            result,
            Err(ParseError::InvalidHunkHeader { line: 3, .. })
        ));
    }

    #[test]
    fn format_single_file() {
        let text = "--- a/notes.txt\n+++ b/notes.txt\n@@ -1,3 +1,3 @@\n first\n-second\n+SECOND\n third\n";
        let formatted = format_patch(&Patch::parse(text).unwrap());
        insta::assert_snapshot!(formatted, @r"
        notes.txt:
          @@ -1,3 +1,3 @@
           1:	first
          -2:	second
          +2:	SECOND
           3:	third
        ");
    }

    #[test]
    fn format_multiple_files() {
        let formatted = format_patch(&Patch::parse(GIT_SHOW).unwrap());
        assert!(formatted.starts_with("gtk.nix:\n  @@ -9,3 +9,4 @@\n"));
        assert!(formatted.contains("\nzsh.nix:\n  @@ -15 +14,0 @@\n  -15:\t      enableAutosuggestions = true;\n"));
    }
}
