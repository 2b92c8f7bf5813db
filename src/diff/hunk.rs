use std::fmt;
use std::iter::Peekable;

use nom::bytes::complete::tag;
use nom::character::complete::{self as ch, char};
use nom::combinator::opt;
use nom::sequence::preceded;
use nom::{IResult, Parser};

use super::ParseError;

/// One side of a hunk header (`-start,count` or `+start,count`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: u32,
    pub count: u32,
}

impl Range {
    /// Zero-based index of the first line this range covers.
    ///
    /// Empty ranges name the line after which content is inserted, so their
    /// position is the index of the line that follows the insertion point.
    pub fn position(&self) -> usize {
        if self.count == 0 {
            self.start as usize
        } else {
            self.start.saturating_sub(1) as usize
        }
    }

    /// Zero-based index one past the last covered line
    pub fn end(&self) -> usize {
        self.position() + self.count as usize
    }

    /// Whether every covered line has a 1-based number that fits in `u32`
    fn is_addressable(&self) -> bool {
        match self.count {
            0 => true,
            count => self.start > 0 && self.start.checked_add(count - 1).is_some(),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count {
            1 => write!(f, "{}", self.start),
            n => write!(f, "{},{}", self.start, n),
        }
    }
}

/// A single line operation inside a hunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Unchanged line present on both sides
    Context {
        old_line: u32,
        new_line: u32,
        content: String,
    },
    /// Line removed from the old side
    Delete { old_line: u32, content: String },
    /// Line introduced on the new side
    Add { new_line: u32, content: String },
}

impl Change {
    pub fn content(&self) -> &str {
        match self {
            Change::Context { content, .. }
            | Change::Delete { content, .. }
            | Change::Add { content, .. } => content,
        }
    }

    /// Whether the line exists in the file the hunk applies to
    pub fn is_old_side(&self) -> bool {
        !matches!(self, Change::Add { .. })
    }

    fn marker(&self) -> char {
        match self {
            Change::Context { .. } => ' ',
            Change::Delete { .. } => '-',
            Change::Add { .. } => '+',
        }
    }
}

/// A single hunk from a unified diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old: Range,
    pub new: Range,
    pub changes: Vec<Change>,
    pub old_missing_newline: bool,
    pub new_missing_newline: bool,
}

/// Which side the last body line belonged to, for "\ No newline" markers
#[derive(Clone, Copy)]
enum LastSide {
    None,
    Old,
    New,
    Both,
}

impl Hunk {
    /// Parse the `@@ -a,b +c,d @@` header line, ignoring any section heading.
    pub fn parse_header(header: &str) -> Option<(Range, Range)> {
        hunk_header(header).ok().map(|(_, ranges)| ranges)
    }

    /// Parse a hunk whose header is `header` (found on line `number`) and
    /// whose body is read from `lines`.
    ///
    /// The header counts decide where the body ends, so content lines that
    /// look like file headers (`--- x`) are read as content.
    pub(crate) fn parse<'a, I>(
        number: usize,
        header: &str,
        lines: &mut Peekable<I>,
    ) -> Result<Self, ParseError>
    where
        I: Iterator<Item = (usize, &'a str)>,
    {
        let invalid_header = || ParseError::InvalidHunkHeader {
            line: number,
            header: header.to_string(),
        };
        let (old, new) = Self::parse_header(header).ok_or_else(invalid_header)?;
        if !old.is_addressable() || !new.is_addressable() {
            return Err(invalid_header());
        }

        let mut changes = Vec::new();
        let (mut old_seen, mut new_seen) = (0u32, 0u32);
        let mut old_missing_newline = false;
        let mut new_missing_newline = false;
        let mut last = LastSide::None;

        while old_seen < old.count || new_seen < new.count {
            let Some((line_number, line)) = lines.next() else {
                return Err(ParseError::TruncatedHunk {
                    line: number,
                    expected_old: old.count,
                    expected_new: new.count,
                });
            };
            let unexpected = || ParseError::UnexpectedLine {
                line: line_number,
                content: line.to_string(),
            };

            if line.starts_with('\\') {
                mark_missing_newline(last, &mut old_missing_newline, &mut new_missing_newline);
                continue;
            }

            // Some tools strip the trailing space of blank context lines
            let (marker, content) = match line.chars().next() {
                Some(marker) => (marker, &line[marker.len_utf8()..]),
                None => (' ', ""),
            };

            match marker {
                ' ' => {
                    if old_seen >= old.count || new_seen >= new.count {
                        return Err(unexpected());
                    }
                    changes.push(Change::Context {
                        old_line: old.start + old_seen,
                        new_line: new.start + new_seen,
                        content: content.to_string(),
                    });
                    old_seen += 1;
                    new_seen += 1;
                    last = LastSide::Both;
                }
                '-' => {
                    if old_seen >= old.count {
                        return Err(unexpected());
                    }
                    changes.push(Change::Delete {
                        old_line: old.start + old_seen,
                        content: content.to_string(),
                    });
                    old_seen += 1;
                    last = LastSide::Old;
                }
                '+' => {
                    if new_seen >= new.count {
                        return Err(unexpected());
                    }
                    changes.push(Change::Add {
                        new_line: new.start + new_seen,
                        content: content.to_string(),
                    });
                    new_seen += 1;
                    last = LastSide::New;
                }
                _ => return Err(unexpected()),
            }
        }

        // A marker may trail the final body line
        if lines.peek().is_some_and(|(_, line)| line.starts_with('\\')) {
            lines.next();
            mark_missing_newline(last, &mut old_missing_newline, &mut new_missing_newline);
        }

        Ok(Hunk {
            old,
            new,
            changes,
            old_missing_newline,
            new_missing_newline,
        })
    }

    pub fn has_additions(&self) -> bool {
        self.changes.iter().any(|c| matches!(c, Change::Add { .. }))
    }

    pub fn has_context(&self) -> bool {
        self.changes
            .iter()
            .any(|c| matches!(c, Change::Context { .. }))
    }

    /// Contents the hunk expects to find in the target, in order
    pub fn old_lines(&self) -> impl Iterator<Item = &str> {
        self.changes
            .iter()
            .filter(|c| c.is_old_side())
            .map(Change::content)
    }
}

fn mark_missing_newline(last: LastSide, old: &mut bool, new: &mut bool) {
    match last {
        LastSide::Old => *old = true,
        LastSide::New => *new = true,
        LastSide::Both => {
            *old = true;
            *new = true;
        }
        LastSide::None => {}
    }
}

fn range(input: &str) -> IResult<&str, Range> {
    (ch::u32, opt(preceded(char(','), ch::u32)))
        .map(|(start, count)| Range {
            start,
            count: count.unwrap_or(1),
        })
        .parse(input)
}

fn hunk_header(input: &str) -> IResult<&str, (Range, Range)> {
    (
        preceded(tag("@@ -"), range),
        preceded(tag(" +"), range),
        tag(" @@"),
    )
        .map(|(old, new, _)| (old, new))
        .parse(input)
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "@@ -{} +{} @@", self.old, self.new)?;

        let last_old = self.changes.iter().rposition(Change::is_old_side);
        let last_new = self
            .changes
            .iter()
            .rposition(|c| !matches!(c, Change::Delete { .. }));

        for (i, change) in self.changes.iter().enumerate() {
            writeln!(f, "{}{}", change.marker(), change.content())?;
            let ends_old = self.old_missing_newline && last_old == Some(i);
            let ends_new = self.new_missing_newline && last_new == Some(i);
            if ends_old || ends_new {
                writeln!(f, "\\ No newline at end of file")?;
            }
        }

        Ok(())
    }
}
