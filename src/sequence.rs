//! Applying a chain of patches to one file in commit order.

use error_set::error_set;
use tracing::{debug, error, info, warn};

use crate::apply::{ApplyError, ApplyOptions, Conflict, apply_changes};
use crate::diff::{ParseError, Patch};
use crate::line::LineStore;

error_set! {
    /// Reasons a sequence stops
    StepError := {
        /// A previous patch already stopped the sequence
        #[display("Sequence halted at patch {patch}")]
        Halted { patch: String },
        #[display("Patch {patch} has no changes for {path}")]
        NoMatchingFile { patch: String, path: String },
        #[display("Patch {patch} could not be read: {message}")]
        Unreadable { patch: String, message: String },
        ParseError(ParseError),
        ApplyError(ApplyError),
    }
}

/// Where the sequencer stands.
///
/// `Applied` and `ConflictRecorded` hold until the next patch arrives and
/// accept it the same way `Idle` does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// No patch applied yet
    Idle,
    /// A patch is being merged
    Applying { patch: String },
    /// The last patch went in cleanly
    Applied { patch: String },
    /// The last patch went in with this many conflicts
    ConflictRecorded { patch: String, conflicts: usize },
    /// A patch failed; no further patch is accepted
    Halted { patch: String },
}

/// How a patch went in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    ConflictRecorded(Vec<Conflict>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub patch: String,
    pub outcome: Outcome,
}

impl PatchReport {
    pub fn conflicts(&self) -> &[Conflict] {
        match &self.outcome {
            Outcome::Applied => &[],
            Outcome::ConflictRecorded(conflicts) => conflicts,
        }
    }
}

/// The patch that stopped a sequence, and why
#[derive(Debug)]
pub struct Halt {
    pub patch: String,
    pub error: StepError,
}

/// Result of running a sequence: the lines reached, one report per applied
/// patch, and the halt if the sequence did not finish.
#[derive(Debug)]
pub struct Trace {
    pub lines: LineStore,
    pub reports: Vec<PatchReport>,
    pub halted: Option<Halt>,
}

impl Trace {
    pub fn conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.reports.iter().flat_map(PatchReport::conflicts)
    }

    pub fn is_complete(&self) -> bool {
        self.halted.is_none()
    }
}

/// Feeds patches for `path` one at a time, each into the output of the last.
#[derive(Debug)]
pub struct Sequencer {
    path: String,
    lines: LineStore,
    tolerate_conflicts: bool,
    state: State,
    reports: Vec<PatchReport>,
}

impl Sequencer {
    pub fn new(path: impl Into<String>, base: LineStore, tolerate_conflicts: bool) -> Self {
        Self {
            path: path.into(),
            lines: base,
            tolerate_conflicts,
            state: State::Idle,
            reports: Vec::new(),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Lines after the last successful patch
    pub fn lines(&self) -> &LineStore {
        &self.lines
    }

    pub fn reports(&self) -> &[PatchReport] {
        &self.reports
    }

    /// Apply the patch `text`, identified by `patch`.
    ///
    /// # Errors
    ///
    /// Any failure halts the sequencer; the lines stay as they were after the
    /// previous patch.
    pub fn step(&mut self, patch: &str, text: &str) -> Result<&PatchReport, StepError> {
        if let State::Halted { patch } = &self.state {
            return Err(StepError::Halted {
                patch: patch.clone(),
            });
        }
        self.state = State::Applying {
            patch: patch.to_string(),
        };
        debug!(patch, path = %self.path, "applying patch");

        match self.merge(patch, text) {
            Ok(report) => {
                self.state = match &report.outcome {
                    Outcome::Applied => {
                        info!(patch, "applied");
                        State::Applied {
                            patch: patch.to_string(),
                        }
                    }
                    Outcome::ConflictRecorded(conflicts) => {
                        for conflict in conflicts {
                            warn!(patch, "conflict: {conflict}");
                        }
                        State::ConflictRecorded {
                            patch: patch.to_string(),
                            conflicts: conflicts.len(),
                        }
                    }
                };
                self.reports.push(report);
                Ok(&self.reports[self.reports.len() - 1])
            }
            Err(err) => {
                error!(patch, "{err}");
                self.state = State::Halted {
                    patch: patch.to_string(),
                };
                Err(err)
            }
        }
    }

    fn merge(&mut self, patch: &str, text: &str) -> Result<PatchReport, StepError> {
        let parsed = Patch::parse(text)?;
        let file = parsed
            .file(&self.path)
            .ok_or_else(|| StepError::NoMatchingFile {
                patch: patch.to_string(),
                path: self.path.clone(),
            })?;

        let options = ApplyOptions {
            flag: patch.to_string(),
            tolerate_conflicts: self.tolerate_conflicts,
        };
        let applied = apply_changes(&self.lines, file, &options)?;
        self.lines = applied.lines;

        let outcome = if applied.conflicts.is_empty() {
            Outcome::Applied
        } else {
            Outcome::ConflictRecorded(applied.conflicts)
        };
        Ok(PatchReport {
            patch: patch.to_string(),
            outcome,
        })
    }

    /// Halt on a patch that never reached [`Sequencer::step`], e.g. because
    /// it could not be read.
    pub fn abort(&mut self, patch: &str, message: impl Into<String>) -> StepError {
        let err = StepError::Unreadable {
            patch: patch.to_string(),
            message: message.into(),
        };
        error!(patch, "{err}");
        self.state = State::Halted {
            patch: patch.to_string(),
        };
        err
    }

    /// Apply every `(patch, text)` pair in order, stopping at the first
    /// failure.
    pub fn run<'a, I>(mut self, patches: I) -> Trace
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (patch, text) in patches {
            if let Err(error) = self.step(patch, text).map(|_| ()) {
                return self.into_trace(Some(Halt {
                    patch: patch.to_string(),
                    error,
                }));
            }
        }
        self.into_trace(None)
    }

    pub fn into_trace(self, halted: Option<Halt>) -> Trace {
        Trace {
            lines: self.lines,
            reports: self.reports,
            halted,
        }
    }
}
