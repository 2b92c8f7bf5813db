//! Line records with provenance, and the store that owns them.
//!
//! A [`LineStore`] is an arena: lines are never dropped, a removal only
//! clears [`Line::status`]. Active lines are numbered 1..=n after every
//! change; removed lines keep the index they had when they were removed.
//!
//! The store renders two files: the plain text, and a sidecar annotation
//! with one `index\tflag\tcontent` record per active line.

/// Flag written to sidecars for lines that came from the original file
pub const BASE_FLAG: &str = "-";

/// Suffix appended to the sidecar flag of lines marked as conflicting
pub const CONFLICT_MARK: char = '*';

/// A line of the tracked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based position in the file
    pub index: usize,
    pub content: String,
    /// Whether the line is still part of the file
    pub status: bool,
    /// Id of the patch that introduced or last touched this line
    pub flag: Option<String>,
    /// Set when a conflicting apply marked this line for manual resolution
    pub conflict: bool,
}

impl Line {
    pub fn new(index: usize, content: impl Into<String>) -> Self {
        Self {
            index,
            content: content.into(),
            status: true,
            flag: None,
            conflict: false,
        }
    }

    /// Provenance as written to the sidecar
    pub fn flag_label(&self) -> &str {
        self.flag.as_deref().unwrap_or(BASE_FLAG)
    }
}

/// Ordered arena of every line a file has had
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineStore {
    lines: Vec<Line>,
    missing_final_newline: bool,
}

impl LineStore {
    /// Load file content; every line starts with base provenance.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .enumerate()
                .map(|(i, content)| Line::new(i + 1, content))
                .collect(),
            missing_final_newline: !text.is_empty() && !text.ends_with('\n'),
        }
    }

    /// Load file content together with provenance from its sidecar.
    ///
    /// Returns `None` when the sidecar is malformed or does not describe
    /// `text` line for line, e.g. because the file was edited afterwards.
    pub fn from_annotated(text: &str, sidecar: &str) -> Option<Self> {
        let mut store = Self::from_text(text);
        let mut records = sidecar.lines();

        for line in &mut store.lines {
            let mut fields = records.next()?.splitn(3, '\t');
            let index: usize = fields.next()?.parse().ok()?;
            let flag = fields.next()?;
            let content = fields.next()?;
            if index != line.index || content != line.content {
                return None;
            }

            let (flag, conflict) = match flag.strip_suffix(CONFLICT_MARK) {
                Some(flag) => (flag, true),
                None => (flag, false),
            };
            line.flag = (flag != BASE_FLAG).then(|| flag.to_string());
            line.conflict = conflict;
        }

        match records.next() {
            Some(_) => None,
            None => Some(store),
        }
    }

    /// Build a store from applicator output, numbering the active lines.
    pub(crate) fn from_parts(lines: Vec<Line>, missing_final_newline: bool) -> Self {
        let mut store = Self {
            lines,
            missing_final_newline,
        };
        store.reindex();
        store
    }

    fn reindex(&mut self) {
        for (i, line) in self.lines.iter_mut().filter(|l| l.status).enumerate() {
            line.index = i + 1;
        }
    }

    /// Every line ever tracked, removed ones included, in file order
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Lines still part of the file
    pub fn active(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter().filter(|l| l.status)
    }

    /// Number of active lines
    pub fn len(&self) -> usize {
        self.active().count()
    }

    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }

    pub fn missing_final_newline(&self) -> bool {
        self.missing_final_newline
    }

    /// Contents of the active lines
    pub fn contents(&self) -> Vec<&str> {
        self.active().map(|l| l.content.as_str()).collect()
    }

    /// Render the file text
    pub fn to_text(&self) -> String {
        let mut text = self.contents().join("\n");
        if !text.is_empty() && !self.missing_final_newline {
            text.push('\n');
        }
        text
    }

    /// Render the sidecar annotation
    pub fn annotate(&self) -> String {
        let mut out = String::new();
        for line in self.active() {
            let mark = if line.conflict {
                CONFLICT_MARK.to_string()
            } else {
                String::new()
            };
            out.push_str(&format!(
                "{}\t{}{}\t{}\n",
                line.index,
                line.flag_label(),
                mark,
                line.content
            ));
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn load_numbers_lines_from_one() {
        let store = LineStore::from_text("a\nb\nc\n");
        let indices: Vec<_> = store.lines().iter().map(|l| l.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(store.contents(), vec!["a", "b", "c"]);
        assert!(store.active().all(|l| l.flag.is_none() && l.status));
    }

    #[test]
    fn text_round_trips_final_newline_state() {
        assert_eq!(LineStore::from_text("a\nb\n").to_text(), "a\nb\n");
        assert_eq!(LineStore::from_text("a\nb").to_text(), "a\nb");
        assert_eq!(LineStore::from_text("").to_text(), "");
        assert!(LineStore::from_text("").is_empty());
    }

    #[test]
    fn removed_lines_keep_their_index() {
        let mut lines = LineStore::from_text("a\nb\nc\n").lines().to_vec();
        lines[0].status = false;
        let store = LineStore::from_parts(lines, false);

        assert_eq!(store.len(), 2);
        assert_eq!(store.lines()[0].index, 1);
        assert_eq!(store.lines()[1].index, 1);
        assert_eq!(store.lines()[2].index, 2);
        assert_eq!(store.to_text(), "b\nc\n");
    }

    #[test]
    fn annotate_lists_active_lines_with_flags() {
        let mut lines = LineStore::from_text("keep\ngone\nnew\n").lines().to_vec();
        lines[1].status = false;
        lines[2].flag = Some("3f2a9c1".to_string());
        lines[2].conflict = true;
        let store = LineStore::from_parts(lines, false);

        insta::assert_snapshot!(store.annotate(), @r"
        1	-	keep
        2	3f2a9c1*	new
        ");
    }

    #[test]
    fn annotated_load_restores_provenance() {
        let sidecar = "1\t-\tkeep\n2\t3f2a9c1*\twith\ttabs\n";
        let store = LineStore::from_annotated("keep\nwith\ttabs\n", sidecar).unwrap();
        let lines = store.lines();
        assert_eq!(lines[0].flag, None);
        assert_eq!(lines[1].flag.as_deref(), Some("3f2a9c1"));
        assert!(lines[1].conflict);
        assert_eq!(store.annotate(), sidecar);
    }

    #[test]
    fn annotated_load_rejects_stale_sidecar() {
        assert!(LineStore::from_annotated("a\nb\n", "1\t-\ta\n2\t-\tchanged\n").is_none());
        assert!(LineStore::from_annotated("a\n", "1\t-\ta\n2\t-\tb\n").is_none());
        assert!(LineStore::from_annotated("a\nb\n", "1\t-\ta\n").is_none());
        assert!(LineStore::from_annotated("a\n", "one\t-\ta\n").is_none());
    }
}
