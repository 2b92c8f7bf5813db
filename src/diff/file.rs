use std::fmt;
use std::iter::Peekable;

use super::ParseError;
use super::hunk::Hunk;

/// All hunks a patch carries for a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    /// Path from the `--- a/path` header, `None` for `/dev/null`
    pub old_path: Option<String>,
    /// Path from the `+++ b/path` header, `None` for `/dev/null`
    pub new_path: Option<String>,
    pub hunks: Vec<Hunk>,
}

impl FilePatch {
    /// Parse a file section starting at its `--- ` header (line `number`).
    ///
    /// `old_header` is the text after `--- `. The following line must be the
    /// `+++ ` header; every `@@ ` section after it belongs to this file.
    pub(crate) fn parse<'a, I>(
        number: usize,
        old_header: &str,
        lines: &mut Peekable<I>,
    ) -> Result<Self, ParseError>
    where
        I: Iterator<Item = (usize, &'a str)>,
    {
        let new_header = match lines.next() {
            Some((_, line)) => line
                .strip_prefix("+++ ")
                .ok_or(ParseError::MissingNewHeader { line: number })?,
            None => return Err(ParseError::MissingNewHeader { line: number }),
        };

        let mut hunks: Vec<Hunk> = Vec::new();
        while let Some(&(line_number, line)) = lines.peek() {
            if !line.starts_with("@@ ") {
                break;
            }
            lines.next();
            let hunk = Hunk::parse(line_number, line, lines)?;
            if hunks
                .last()
                .is_some_and(|previous| hunk.old.position() < previous.old.end())
            {
                return Err(ParseError::OverlappingHunks { line: line_number });
            }
            hunks.push(hunk);
        }

        Ok(FilePatch {
            old_path: header_path(old_header, "a/"),
            new_path: header_path(new_header, "b/"),
            hunks,
        })
    }

    /// The path this patch leaves behind, or the removed path for deletions
    pub fn path(&self) -> Option<&str> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }

    /// Whether either side of the patch names `path`
    pub fn touches(&self, path: &str) -> bool {
        self.old_path.as_deref() == Some(path) || self.new_path.as_deref() == Some(path)
    }

    /// Human-readable name used when listing patches
    pub fn label(&self) -> String {
        match (self.old_path.as_deref(), self.new_path.as_deref()) {
            (Some(old), Some(new)) if old == new => old.to_string(),
            (Some(old), Some(new)) => format!("{old} -> {new}"),
            (None, Some(new)) => format!("{new} (new file)"),
            (Some(old), None) => format!("{old} (deleted)"),
            (None, None) => "/dev/null".to_string(),
        }
    }
}

/// Extract a path from a `---`/`+++` header value.
///
/// Drops a trailing tab-separated timestamp, surrounding quotes and the
/// `a/`/`b/` prefix git adds.
fn header_path(raw: &str, prefix: &str) -> Option<String> {
    let raw = raw.split('\t').next().unwrap_or(raw).trim_end();
    if raw == "/dev/null" {
        return None;
    }
    let raw = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw);
    Some(raw.strip_prefix(prefix).unwrap_or(raw).to_string())
}

impl fmt::Display for FilePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.old_path {
            Some(path) => writeln!(f, "--- a/{}", path)?,
            None => writeln!(f, "--- /dev/null")?,
        }
        match &self.new_path {
            Some(path) => writeln!(f, "+++ b/{}", path)?,
            None => writeln!(f, "+++ /dev/null")?,
        }

        for hunk in &self.hunks {
            write!(f, "{}", hunk)?;
        }

        Ok(())
    }
}
