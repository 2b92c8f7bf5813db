//! Merging a file patch into a [`LineStore`].
//!
//! Hunks are anchored at the position their old range names, shifted by a
//! running offset that only changes when a hunk turns out to be applied
//! already. Each hunk is then handled in one of three ways:
//!
//! - **already applied**: the hunk's new side is present at its new range
//!   position. For hunks that add lines this also requires every added line
//!   to carry the patch's own flag; for hunks that only delete, the store
//!   must still hold the deleted lines as removed by this patch. Nothing is
//!   re-applied.
//! - **clean**: the old side (context and deleted lines) matches at the
//!   anchor. Deleted lines are marked removed, added lines are inserted.
//! - **mismatch**: anything else.
//!
//! Without [`ApplyOptions::tolerate_conflicts`] only clean hunks succeed.
//! With it, target lines that disagree with a hunk are marked and kept, and
//! each is returned once as a [`Conflict`].

use std::collections::HashSet;
use std::fmt;

use error_set::error_set;
use tracing::{debug, warn};

use crate::diff::{Change, FilePatch, Hunk};
use crate::line::{Line, LineStore};

error_set! {
    /// Errors from applying a file patch without conflict tolerance
    ApplyError := {
        /// Target content differs from the line the hunk expects
        #[display("Hunk {hunk}, line {index}: expected '{expected}', found '{found}'")]
        Mismatch { hunk: usize, index: usize, expected: String, found: String },
        /// Hunk expects lines past the end of the target
        #[display("Hunk {hunk}, line {index}: expected '{expected}' past the end of the file ({len} lines)")]
        OutOfRange { hunk: usize, index: usize, expected: String, len: usize },
        /// The hunk's result is already present
        #[display("Hunk {hunk}, line {index}: already applied by {patch}")]
        AlreadyApplied { hunk: usize, index: usize, patch: String },
        /// Hunk is anchored before the end of the previous hunk
        #[display("Hunk {hunk} starts inside the previous hunk")]
        HunkOverlap { hunk: usize },
    }
}

/// How a patch is merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Provenance given to every line the patch inserts, removes or touches
    pub flag: String,
    /// Record mismatches as conflicts instead of failing
    pub tolerate_conflicts: bool,
}

impl ApplyOptions {
    pub fn strict(flag: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            tolerate_conflicts: false,
        }
    }

    pub fn tolerant(flag: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            tolerate_conflicts: true,
        }
    }
}

/// Why a line was recorded as conflicting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    /// The hunk expected different content at this line
    Mismatch { expected: String },
    /// The hunk expected a line past the end of the file
    Missing { expected: String },
    /// The line was introduced by a hunk that was applied before
    Reapplied,
    /// A hunk applied before already removed `content`. The conflict line is
    /// the removed line itself when the store still holds it, else the line
    /// that follows the deletion.
    Redeleted { content: String },
}

/// A target line flagged during a conflicting apply.
///
/// `line` is a snapshot taken when the conflict was found, so its index is
/// the position in the store the patch was applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub line: Line,
    pub reason: ConflictReason,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ConflictReason::Mismatch { expected } => write!(
                f,
                "line {}: expected '{}', found '{}' ({})",
                self.line.index,
                expected,
                self.line.content,
                self.line.flag_label()
            ),
            ConflictReason::Missing { expected } => write!(
                f,
                "line {}: expected '{}' past the end of the file",
                self.line.index, expected
            ),
            ConflictReason::Reapplied => write!(
                f,
                "line {}: '{}' already applied ({})",
                self.line.index,
                self.line.content,
                self.line.flag_label()
            ),
            ConflictReason::Redeleted { content } if !self.line.status => write!(
                f,
                "line {}: '{}' already removed ({})",
                self.line.index,
                content,
                self.line.flag_label()
            ),
            ConflictReason::Redeleted { content } => write!(
                f,
                "line {}: '{}' already removed before '{}'",
                self.line.index, content, self.line.content
            ),
        }
    }
}

/// Result of a successful apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub lines: LineStore,
    pub conflicts: Vec<Conflict>,
}

/// Apply `patch` to `target`, returning the new store and its conflicts.
///
/// # Errors
///
/// Without conflict tolerance, returns the first [`ApplyError`] found. With
/// it, only a hunk anchored inside an earlier one can still fail, and only
/// when the running offset cannot place it.
pub fn apply_changes(
    target: &LineStore,
    patch: &FilePatch,
    options: &ApplyOptions,
) -> Result<Applied, ApplyError> {
    let mut merge = Merge::new(target, options);
    let mut offset: isize = 0;

    for (i, hunk) in patch.hunks.iter().enumerate() {
        merge.hunk(i + 1, hunk, &mut offset)?;
    }

    let applied = merge.finish(patch);
    debug!(
        flag = %options.flag,
        lines = applied.lines.len(),
        conflicts = applied.conflicts.len(),
        "patch merged"
    );
    Ok(applied)
}

/// Working state of one apply.
///
/// Lines are addressed by their position among the active lines of the
/// target (`pos`); `active` maps positions to arena slots of `work`.
struct Merge<'a> {
    options: &'a ApplyOptions,
    work: Vec<Line>,
    active: Vec<usize>,
    out: Vec<Line>,
    /// Next arena slot not yet copied to `out`
    next: usize,
    /// Next position not yet consumed
    cursor: usize,
    conflicts: Vec<Conflict>,
    recorded: HashSet<usize>,
    missing_final_newline: bool,
}

impl<'a> Merge<'a> {
    fn new(target: &LineStore, options: &'a ApplyOptions) -> Self {
        let work = target.lines().to_vec();
        let active = work
            .iter()
            .enumerate()
            .filter(|(_, line)| line.status)
            .map(|(slot, _)| slot)
            .collect();

        Self {
            options,
            work,
            active,
            out: Vec::new(),
            next: 0,
            cursor: 0,
            conflicts: Vec::new(),
            recorded: HashSet::new(),
            missing_final_newline: target.missing_final_newline(),
        }
    }

    fn line(&self, pos: usize) -> Option<&Line> {
        self.active.get(pos).map(|&slot| &self.work[slot])
    }

    fn content_at(&self, pos: usize) -> Option<&str> {
        self.line(pos).map(|line| line.content.as_str())
    }

    fn hunk(&mut self, number: usize, hunk: &Hunk, offset: &mut isize) -> Result<(), ApplyError> {
        let expected = hunk.old.position() as isize + *offset;
        let at = if expected < self.cursor as isize {
            if !self.options.tolerate_conflicts {
                return Err(ApplyError::HunkOverlap { hunk: number });
            }
            debug!(hunk = number, "hunk anchored inside the previous one, moving it");
            self.cursor
        } else {
            expected as usize
        };

        let new_at = hunk.new.position();
        let may_be_applied = new_at >= self.cursor;

        if hunk.has_additions() && may_be_applied && self.new_side_present(hunk, new_at) {
            return self.reapplied(number, hunk, new_at, offset);
        }
        if !hunk.has_additions()
            && may_be_applied
            && self.new_side_present(hunk, new_at)
            && self.deletions_recorded(hunk, new_at)
        {
            return self.reapplied(number, hunk, new_at, offset);
        }
        if self.old_side_matches(hunk, at) {
            debug!(hunk = number, line = at + 1, "hunk applies cleanly");
            return self.merge(number, hunk, at);
        }
        if !hunk.has_additions()
            && hunk.has_context()
            && may_be_applied
            && self.new_side_present(hunk, new_at)
        {
            return self.reapplied(number, hunk, new_at, offset);
        }

        debug!(hunk = number, line = at + 1, "hunk does not match");
        self.merge(number, hunk, at)
    }

    fn old_side_matches(&self, hunk: &Hunk, at: usize) -> bool {
        hunk.old_lines()
            .enumerate()
            .all(|(i, content)| self.content_at(at + i) == Some(content))
    }

    fn new_side_present(&self, hunk: &Hunk, at: usize) -> bool {
        let mut pos = at;
        for change in &hunk.changes {
            let present = match change {
                Change::Delete { .. } => continue,
                Change::Context { content, .. } => self.content_at(pos) == Some(content.as_str()),
                Change::Add { content, .. } => self.line(pos).is_some_and(|line| {
                    line.content == *content
                        && line.flag.as_deref() == Some(self.options.flag.as_str())
                }),
            };
            if !present {
                return false;
            }
            pos += 1;
        }
        true
    }

    /// First arena slot after the active line preceding position `pos`
    fn gap_start(&self, pos: usize) -> usize {
        match pos.checked_sub(1) {
            None => 0,
            Some(prev) => self.active.get(prev).map_or(self.work.len(), |&slot| slot + 1),
        }
    }

    /// A line removed by this patch with `content`, between slot `from` and
    /// the active line at `pos`
    fn tombstone(&self, from: usize, pos: usize, content: &str) -> Option<usize> {
        let end = self.active.get(pos).copied().unwrap_or(self.work.len());
        (from..end).find(|&slot| {
            let line = &self.work[slot];
            !line.status
                && line.content == content
                && line.flag.as_deref() == Some(self.options.flag.as_str())
        })
    }

    /// Whether every line the hunk deletes is still in the store as removed by
    /// this patch, in the place the hunk's new side puts it
    fn deletions_recorded(&self, hunk: &Hunk, at: usize) -> bool {
        let mut deletes = false;
        let mut pos = at;
        let mut slot = self.gap_start(at);
        for change in &hunk.changes {
            match change {
                Change::Delete { content, .. } => match self.tombstone(slot, pos, content) {
                    Some(found) => {
                        deletes = true;
                        slot = found + 1;
                    }
                    None => return false,
                },
                Change::Context { .. } | Change::Add { .. } => {
                    match self.active.get(pos) {
                        Some(&found) => slot = found + 1,
                        None => return false,
                    }
                    pos += 1;
                }
            }
        }
        deletes
    }

    /// Walk a hunk whose result is already in the target, flagging the lines
    /// it introduced instead of inserting them again.
    fn reapplied(
        &mut self,
        number: usize,
        hunk: &Hunk,
        at: usize,
        offset: &mut isize,
    ) -> Result<(), ApplyError> {
        if !self.options.tolerate_conflicts {
            return Err(ApplyError::AlreadyApplied {
                hunk: number,
                index: at + 1,
                patch: self.options.flag.clone(),
            });
        }
        warn!(hunk = number, line = at + 1, flag = %self.options.flag, "hunk already applied");

        // Mark first: a deletion at the end of the file flags the line
        // before it, which is copied before the walk reaches the deletion
        let mut marks = Vec::new();
        let mut pos = at;
        let mut slot = self.gap_start(at);
        for change in &hunk.changes {
            match change {
                Change::Context { .. } => {
                    slot = self.active.get(pos).map_or(slot, |&found| found + 1);
                    pos += 1;
                }
                Change::Add { .. } => {
                    if let Some(&found) = self.active.get(pos) {
                        marks.push((found, ConflictReason::Reapplied));
                        slot = found + 1;
                    }
                    pos += 1;
                }
                Change::Delete { content, .. } => {
                    let reason = ConflictReason::Redeleted {
                        content: content.clone(),
                    };
                    if let Some(found) = self.tombstone(slot, pos, content) {
                        marks.push((found, reason));
                        slot = found + 1;
                    } else if !self.active.is_empty() {
                        marks.push((self.active[pos.min(self.active.len() - 1)], reason));
                    }
                }
            }
        }
        for (mark, reason) in marks {
            self.record_slot(mark, reason);
        }

        self.copy_until(at);
        for taken in at..pos {
            self.take(taken, |_| {});
        }

        // Later hunks sit where this hunk's new side ends
        *offset = hunk.new.end() as isize - hunk.old.end() as isize;
        Ok(())
    }

    /// Apply a hunk at `at`, recording mismatches when tolerated.
    fn merge(&mut self, number: usize, hunk: &Hunk, at: usize) -> Result<(), ApplyError> {
        let old_side: Vec<&str> = hunk.old_lines().collect();
        let mut seen = 0;

        self.copy_until(at);
        let mut pos = at;

        for change in &hunk.changes {
            let expected = match change {
                Change::Add { content, .. } => {
                    self.insert(content);
                    continue;
                }
                Change::Context { content, .. } | Change::Delete { content, .. } => content,
            };
            seen += 1;

            let Some((index, found)) = self.line(pos).map(|l| (l.index, l.content.clone())) else {
                if !self.options.tolerate_conflicts {
                    return Err(ApplyError::OutOfRange {
                        hunk: number,
                        index: pos + 1,
                        expected: expected.clone(),
                        len: self.active.len(),
                    });
                }
                self.record_missing(expected);
                continue;
            };

            if found == *expected {
                if matches!(change, Change::Delete { .. }) {
                    let flag = self.options.flag.clone();
                    self.take(pos, |line| {
                        line.status = false;
                        line.flag = Some(flag);
                    });
                } else {
                    self.take(pos, |_| {});
                }
                pos += 1;
                continue;
            }

            if !self.options.tolerate_conflicts {
                return Err(ApplyError::Mismatch {
                    hunk: number,
                    index,
                    expected: expected.clone(),
                    found,
                });
            }

            self.record(
                pos,
                ConflictReason::Mismatch {
                    expected: expected.clone(),
                },
            );
            // A later old-side line matching this one means the expected line
            // is simply gone; leave this line for that change to consume
            if !old_side[seen..].contains(&found.as_str()) {
                self.take(pos, |_| {});
                pos += 1;
            }
        }

        Ok(())
    }

    /// Copy every untouched slot that precedes position `pos`
    fn copy_until(&mut self, pos: usize) {
        let end = self.active.get(pos).copied().unwrap_or(self.work.len());
        while self.next < end {
            self.out.push(self.work[self.next].clone());
            self.next += 1;
        }
        self.cursor = self.cursor.max(pos);
    }

    /// Move the line at `pos` to the output, adjusted by `update`
    fn take(&mut self, pos: usize, update: impl FnOnce(&mut Line)) {
        self.copy_until(pos);
        let slot = self.active[pos];
        let mut line = self.work[slot].clone();
        update(&mut line);
        self.out.push(line);
        self.next = slot + 1;
        self.cursor = pos + 1;
    }

    fn insert(&mut self, content: &str) {
        let mut line = Line::new(0, content);
        line.flag = Some(self.options.flag.clone());
        self.out.push(line);
    }

    /// Mark the line at `pos` and record it once
    fn record(&mut self, pos: usize, reason: ConflictReason) {
        self.record_slot(self.active[pos], reason);
    }

    fn record_slot(&mut self, slot: usize, reason: ConflictReason) {
        self.work[slot].conflict = true;
        if self.recorded.insert(slot) {
            self.conflicts.push(Conflict {
                line: self.work[slot].clone(),
                reason,
            });
        }
    }

    fn record_missing(&mut self, expected: &str) {
        let line = Line {
            index: self.active.len() + 1,
            content: String::new(),
            status: false,
            flag: None,
            conflict: true,
        };
        self.conflicts.push(Conflict {
            line,
            reason: ConflictReason::Missing {
                expected: expected.to_string(),
            },
        });
    }

    fn finish(mut self, patch: &FilePatch) -> Applied {
        self.copy_until(self.active.len());

        for hunk in &patch.hunks {
            if hunk.new_missing_newline {
                self.missing_final_newline = true;
            } else if hunk.old_missing_newline {
                self.missing_final_newline = false;
            }
        }

        if !self.conflicts.is_empty() {
            warn!(
                flag = %self.options.flag,
                conflicts = self.conflicts.len(),
                "patch applied with conflicts"
            );
        }

        Applied {
            lines: LineStore::from_parts(self.out, self.missing_final_newline),
            conflicts: self.conflicts,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::diff::Patch;
    use similar_asserts::assert_eq;

    fn file_patch(text: &str) -> FilePatch {
        Patch::parse(text).unwrap().files.remove(0)
    }

    fn apply(target: &LineStore, text: &str, options: &ApplyOptions) -> Result<Applied, ApplyError> {
        apply_changes(target, &file_patch(text), options)
    }

    const DELETE_SECOND: &str = "--- a/f\n+++ b/f\n@@ -2 +1,0 @@\n-b\n";

    #[test]
    fn delete_middle_line_of_three() {
        let target = LineStore::from_text("a\nb\nc\n");
        let applied = apply(&target, DELETE_SECOND, &ApplyOptions::strict("p1")).unwrap();

        assert_eq!(applied.lines.contents(), vec!["a", "c"]);
        assert_eq!(applied.lines.len(), 2);
        assert!(applied.conflicts.is_empty());

        let removed = &applied.lines.lines()[1];
        assert!(!removed.status);
        assert_eq!(removed.index, 2);
        assert_eq!(removed.flag.as_deref(), Some("p1"));
    }

    #[test]
    fn insertions_carry_the_patch_flag() {
        let target = LineStore::from_text("a\nb\n");
        let applied = apply(
            &target,
            "--- a/f\n+++ b/f\n@@ -1,2 +1,3 @@\n a\n+x\n b\n",
            &ApplyOptions::strict("p1"),
        )
        .unwrap();

        let lines: Vec<_> = applied
            .lines
            .active()
            .map(|l| (l.index, l.content.as_str(), l.flag_label()))
            .collect();
        assert_eq!(lines, vec![(1, "a", "-"), (2, "x", "p1"), (3, "b", "-")]);
    }

    #[test]
    fn hunks_without_context_follow_shifted_lines() {
        let target = LineStore::from_text("1\n2\n3\n4\n5\n6\n");
        let applied = apply(
            &target,
            "--- a/f\n+++ b/f\n@@ -1,0 +2,2 @@\n+a\n+b\n@@ -5 +6,0 @@\n-5\n",
            &ApplyOptions::strict("p1"),
        )
        .unwrap();
        assert_eq!(applied.lines.contents(), vec!["1", "a", "b", "2", "3", "4", "6"]);
    }

    #[test]
    fn creation_patch_fills_empty_store() {
        let applied = apply(
            &LineStore::default(),
            "--- /dev/null\n+++ b/f\n@@ -0,0 +1,2 @@\n+one\n+two\n",
            &ApplyOptions::strict("p1"),
        )
        .unwrap();
        assert_eq!(applied.lines.to_text(), "one\ntwo\n");
    }

    const TO_X: &str = "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+x\n c\n";
    const TO_Y: &str = "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+y\n c\n";

    #[test]
    fn same_line_changed_twice_is_one_conflict() {
        let base = LineStore::from_text("a\nb\nc\n");
        let first = apply(&base, TO_X, &ApplyOptions::strict("p1")).unwrap();
        let second = apply(&first.lines, TO_Y, &ApplyOptions::tolerant("p2")).unwrap();

        assert_eq!(second.conflicts.len(), 1);
        let conflict = &second.conflicts[0];
        assert_eq!(conflict.line.index, 2);
        assert_eq!(conflict.line.content, "x");
        assert_eq!(
            conflict.reason,
            ConflictReason::Mismatch {
                expected: "b".to_string()
            }
        );

        // The conflicting line survives next to the new one
        assert_eq!(second.lines.contents(), vec!["a", "x", "y", "c"]);
        assert!(second.lines.active().nth(1).unwrap().conflict);
    }

    #[test]
    fn same_line_changed_twice_fails_when_strict() {
        let base = LineStore::from_text("a\nb\nc\n");
        let first = apply(&base, TO_X, &ApplyOptions::strict("p1")).unwrap();
        let result = apply(&first.lines, TO_Y, &ApplyOptions::strict("p2"));

        let err = result.unwrap_err();
        assert!(matches!(err, ApplyError::Mismatch { hunk: 1, index: 2, .. }));
        assert_eq!(err.to_string(), "Hunk 1, line 2: expected 'b', found 'x'");
    }

    #[test]
    fn reapplying_insertion_is_detected() {
        let patch = "--- a/f\n+++ b/f\n@@ -1,0 +2,2 @@\n+x\n+y\n";
        let base = LineStore::from_text("a\nb\n");
        let first = apply(&base, patch, &ApplyOptions::strict("p1")).unwrap();

        let second = apply(&first.lines, patch, &ApplyOptions::tolerant("p1")).unwrap();
        let indices: Vec<_> = second.conflicts.iter().map(|c| c.line.index).collect();
        assert_eq!(indices, vec![2, 3]);
        assert!(second
            .conflicts
            .iter()
            .all(|c| c.reason == ConflictReason::Reapplied));
        assert_eq!(second.lines.contents(), vec!["a", "x", "y", "b"]);

        let strict = apply(&first.lines, patch, &ApplyOptions::strict("p1"));
        assert!(matches!(
            strict,
            Err(ApplyError::AlreadyApplied { index: 2, .. })
        ));
    }

    #[test]
    fn identical_insertion_from_another_patch_applies() {
        let patch = "--- a/f\n+++ b/f\n@@ -1,0 +2 @@\n+x\n";
        let base = LineStore::from_text("a\nb\n");
        let first = apply(&base, patch, &ApplyOptions::strict("p1")).unwrap();
        let second = apply(&first.lines, patch, &ApplyOptions::strict("p2")).unwrap();
        assert_eq!(second.lines.contents(), vec!["a", "x", "x", "b"]);
    }

    #[test]
    fn reapplying_deletion_with_context_is_detected() {
        let patch = "--- a/f\n+++ b/f\n@@ -1,3 +1,2 @@\n a\n-b\n c\n";
        let base = LineStore::from_text("a\nb\nc\n");
        let first = apply(&base, patch, &ApplyOptions::strict("p1")).unwrap();

        let second = apply(&first.lines, patch, &ApplyOptions::tolerant("p1")).unwrap();
        assert_eq!(second.conflicts.len(), 1);
        let conflict = &second.conflicts[0];
        assert_eq!(conflict.line.content, "b");
        assert!(!conflict.line.status);
        assert_eq!(
            conflict.reason,
            ConflictReason::Redeleted {
                content: "b".to_string()
            }
        );
        assert_eq!(conflict.to_string(), "line 2: 'b' already removed (p1)");
        assert_eq!(second.lines.contents(), vec!["a", "c"]);
    }

    #[test]
    fn reapplying_zero_context_deletion_among_repeated_lines() {
        let patch = "--- a/f\n+++ b/f\n@@ -2 +1,0 @@\n-b\n";
        let base = LineStore::from_text("a\nb\nb\nc\n");
        let first = apply(&base, patch, &ApplyOptions::strict("p1")).unwrap();
        assert_eq!(first.lines.contents(), vec!["a", "b", "c"]);

        let second = apply(&first.lines, patch, &ApplyOptions::tolerant("p1")).unwrap();
        assert_eq!(second.lines.contents(), vec!["a", "b", "c"]);
        assert_eq!(second.conflicts.len(), 1);
        assert_eq!(second.conflicts[0].line.index, 2);
        assert_eq!(
            second.conflicts[0].reason,
            ConflictReason::Redeleted {
                content: "b".to_string()
            }
        );

        let strict = apply(&first.lines, patch, &ApplyOptions::strict("p1"));
        assert!(matches!(
            strict,
            Err(ApplyError::AlreadyApplied { index: 2, .. })
        ));

        // The same deletion from another patch removes the next copy
        let other = apply(&first.lines, patch, &ApplyOptions::strict("p2")).unwrap();
        assert_eq!(other.lines.contents(), vec!["a", "c"]);
    }

    #[test]
    fn redeleted_without_removed_line_names_the_deleted_content() {
        // Provenance reloaded from a sidecar has no removed lines left
        let patch = "--- a/f\n+++ b/f\n@@ -1,3 +1,2 @@\n a\n-b\n c\n";
        let target = LineStore::from_text("a\nc\n");
        let applied = apply(&target, patch, &ApplyOptions::tolerant("p1")).unwrap();

        assert_eq!(applied.conflicts.len(), 1);
        assert_eq!(
            applied.conflicts[0].to_string(),
            "line 2: 'b' already removed before 'c'"
        );
    }

    #[test]
    fn vanished_context_line_is_skipped_over() {
        // Another patch already removed "b"; the change to "c" still lands
        let target = LineStore::from_text("a\nc\nd\n");
        let applied = apply(
            &target,
            "--- a/f\n+++ b/f\n@@ -1,4 +1,4 @@\n a\n b\n-c\n+z\n d\n",
            &ApplyOptions::tolerant("p2"),
        )
        .unwrap();

        assert_eq!(applied.lines.contents(), vec!["a", "z", "d"]);
        assert_eq!(applied.conflicts.len(), 1);
        assert_eq!(applied.conflicts[0].line.content, "c");
    }

    #[test]
    fn hunk_past_end_of_file() {
        let target = LineStore::from_text("a\n");
        let patch = "--- a/f\n+++ b/f\n@@ -2 +2 @@\n-b\n+c\n";

        let strict = apply(&target, patch, &ApplyOptions::strict("p1"));
        assert!(matches!(
            strict,
            Err(ApplyError::OutOfRange { index: 2, len: 1, .. })
        ));

        let tolerant = apply(&target, patch, &ApplyOptions::tolerant("p1")).unwrap();
        assert_eq!(tolerant.conflicts.len(), 1);
        assert_eq!(
            tolerant.conflicts[0].reason,
            ConflictReason::Missing {
                expected: "b".to_string()
            }
        );
        assert_eq!(tolerant.lines.contents(), vec!["a", "c"]);
    }

    #[test]
    fn missing_newline_markers_update_store() {
        let target = LineStore::from_text("a\nb\n");
        let dropped = apply(
            &target,
            "--- a/f\n+++ b/f\n@@ -2 +2 @@\n-b\n+b\n\\ No newline at end of file\n",
            &ApplyOptions::strict("p1"),
        )
        .unwrap();
        assert_eq!(dropped.lines.to_text(), "a\nb");

        let restored = apply(
            &dropped.lines,
            "--- a/f\n+++ b/f\n@@ -2 +2,2 @@\n-b\n\\ No newline at end of file\n+b\n+c\n",
            &ApplyOptions::strict("p2"),
        )
        .unwrap();
        assert_eq!(restored.lines.to_text(), "a\nb\nc\n");
    }

    #[test]
    fn conflict_display() {
        let base = LineStore::from_text("a\nb\nc\n");
        let first = apply(&base, TO_X, &ApplyOptions::strict("p1")).unwrap();
        let second = apply(&first.lines, TO_Y, &ApplyOptions::tolerant("p2")).unwrap();
        assert_eq!(
            second.conflicts[0].to_string(),
            "line 2: expected 'b', found 'x' (p1)"
        );
    }
}
