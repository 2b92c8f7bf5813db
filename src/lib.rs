use error_set::error_set;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod apply;
pub mod config;
pub mod diff;
pub mod git;
pub mod line;
pub mod sequence;

pub use apply::{
    ApplyError, ApplyOptions, Applied, Conflict, ConflictReason, apply_changes,
};
pub use config::{CONFIG_FILE, Config, ConfigError};
pub use diff::{ParseError, Patch, format_patch};
pub use line::{Line, LineStore};
pub use sequence::{Halt, Outcome, PatchReport, Sequencer, State, StepError, Trace};

error_set! {
    /// Top-level error for ppatch operations
    PpatchError := {
        #[display("Failed to read {path}: {message}")]
        ReadFailed { path: String, message: String },
        #[display("Failed to write {path}: {message}")]
        WriteFailed { path: String, message: String },
        #[display("Patch {patch} has no changes for {path}")]
        NoMatchingFile { patch: String, path: String },
        ParseError(ParseError),
        ApplyError(ApplyError),
        ConfigError(ConfigError),
    } || GitCommandError

    /// Errors from git command execution
    GitCommandError := {
        #[display("Failed to run {command}: {message}")]
        SpawnFailed { command: String, message: String },
        #[display("{command} failed: {stderr}")]
        ExitError { command: String, stderr: String },
        #[display("Invalid UTF-8 in {command} output: {message}")]
        InvalidUtf8 { command: String, message: String },
    }
}

/// Outcome of [`Ppatch::trace`]
#[derive(Debug)]
pub struct TraceReport {
    pub trace: Trace,
    /// File the lines were written to; the partial file when the trace halted
    pub output: PathBuf,
}

/// Main interface for ppatch operations
pub struct Ppatch<'a> {
    repo_path: &'a str,
    config: Config,
}

impl<'a> Ppatch<'a> {
    /// Create a new Ppatch for the given repository path
    pub fn new(repo_path: &'a str, config: Config) -> Self {
        Self { repo_path, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory patches are exported to and traced files written into
    pub fn patch_dir(&self) -> PathBuf {
        Path::new(self.repo_path).join(&self.config.patch_dir)
    }

    /// Provenance sidecar that belongs to `path`
    pub fn sidecar_path(&self, path: &Path) -> PathBuf {
        with_extension(path, &self.config.sidecar_extension)
    }

    /// Read a patch file and format it with explicit line numbers
    pub fn show(&self, patch: &Path) -> Result<String, PpatchError> {
        Ok(format_patch(&Patch::parse(&read(patch)?)?))
    }

    /// Apply one patch file to `target`.
    ///
    /// Provenance is taken from the target's sidecar when the sidecar still
    /// describes the target. The result goes to `output` (default: the
    /// target itself) together with a fresh sidecar. Lines the patch touches
    /// are flagged with `flag`, or with the commit hash the patch file name
    /// starts with.
    ///
    /// # Examples
    /// ```no_run
    /// # use ppatch::{Config, Ppatch};
    /// # use std::path::Path;
    /// let ppatch = Ppatch::new(".", Config::default());
    /// let applied = ppatch
    ///     .apply(Path::new("patches/3f2a9c1-notes.txt.patch"), Path::new("notes.txt"), None, None)
    ///     .unwrap();
    /// for conflict in &applied.conflicts {
    ///     println!("{conflict}");
    /// }
    /// ```
    pub fn apply(
        &self,
        patch: &Path,
        target: &Path,
        output: Option<&Path>,
        flag: Option<&str>,
    ) -> Result<Applied, PpatchError> {
        let parsed = Patch::parse(&read(patch)?)?;
        let target_name = target.to_string_lossy();
        let file = match parsed.files.as_slice() {
            [only] => only,
            _ => parsed
                .file(&target_name)
                .ok_or_else(|| PpatchError::NoMatchingFile {
                    patch: patch.display().to_string(),
                    path: target_name.to_string(),
                })?,
        };

        let flag = flag.map_or_else(|| patch_flag(patch), str::to_string);
        let options = ApplyOptions {
            flag,
            tolerate_conflicts: self.config.tolerate_conflicts,
        };

        let applied = apply_changes(&self.load(target)?, file, &options)?;
        self.write(output.unwrap_or(target), &applied.lines)?;
        Ok(applied)
    }

    /// Export the patch every commit in `from..to` makes to `path`.
    ///
    /// Patches already in the patch directory are kept. Returns the patch
    /// files, oldest first.
    pub fn get_patches(
        &self,
        path: &str,
        from: Option<&str>,
        to: &str,
    ) -> Result<Vec<PathBuf>, PpatchError> {
        Ok(self
            .fetch_patches(path, from, to)?
            .into_iter()
            .map(|(_, file)| file)
            .collect())
    }

    fn fetch_patches(
        &self,
        path: &str,
        from: Option<&str>,
        to: &str,
    ) -> Result<Vec<(String, PathBuf)>, PpatchError> {
        let from = from
            .map(|rev| git::resolve(self.repo_path, rev))
            .transpose()?;
        let to = git::resolve(self.repo_path, to)?;

        let dir = self.patch_dir();
        create_dir(&dir)?;

        let mut patches = Vec::new();
        for commit in git::commits_touching(self.repo_path, path, from.as_deref(), &to)? {
            let file = dir.join(git::patch_file_name(&commit, path));
            if !file.exists() {
                let text = git::commit_patch(self.repo_path, &commit, path)?;
                if !git::has_hunks(&commit, &text) {
                    continue;
                }
                fs::write(&file, text).map_err(|e| write_failed(&file, e))?;
                info!(patch = %file.display(), "exported");
            }
            patches.push((commit, file));
        }
        Ok(patches)
    }

    /// Rebuild `path` as of `to`, starting from its content at `from` and
    /// applying each commit's patch in between.
    ///
    /// Writes the result and its sidecar to `output` (default: the sanitized
    /// path inside the patch directory). A halted trace writes the lines it
    /// reached to the partial file instead and is still returned as `Ok`.
    ///
    /// # Examples
    /// ```no_run
    /// # use ppatch::{Config, Ppatch};
    /// let ppatch = Ppatch::new(".", Config::default());
    /// let report = ppatch.trace("src/main.rs", "v1.0", "HEAD", None).unwrap();
    /// println!("{} conflicts", report.trace.conflicts().count());
    /// ```
    pub fn trace(
        &self,
        path: &str,
        from: &str,
        to: &str,
        output: Option<&Path>,
    ) -> Result<TraceReport, PpatchError> {
        let from = git::resolve(self.repo_path, from)?;
        let base = LineStore::from_text(&git::file_at(self.repo_path, &from, path)?);
        let patches = self.fetch_patches(path, Some(&from), to)?;
        info!(path, patches = patches.len(), "tracing");

        let mut sequencer = Sequencer::new(path, base, self.config.tolerate_conflicts);
        let mut halted = None;
        for (commit, file) in &patches {
            let step = match fs::read_to_string(file) {
                Ok(text) => sequencer.step(commit, &text).map(|_| ()),
                Err(e) => Err(sequencer.abort(commit, e.to_string())),
            };
            if let Err(error) = step {
                halted = Some(Halt {
                    patch: commit.clone(),
                    error,
                });
                break;
            }
        }
        let trace = sequencer.into_trace(halted);

        let output = output.map_or_else(
            || self.patch_dir().join(git::sanitize_path(path)),
            Path::to_path_buf,
        );
        let output = if trace.is_complete() {
            output
        } else {
            with_extension(&output, &self.config.partial_suffix)
        };
        self.write(&output, &trace.lines)?;

        Ok(TraceReport { trace, output })
    }

    /// Load `target` with the provenance its sidecar records
    fn load(&self, target: &Path) -> Result<LineStore, PpatchError> {
        let text = match fs::read_to_string(target) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(target = %target.display(), "target does not exist, starting empty");
                return Ok(LineStore::default());
            }
            Err(e) => return Err(read_failed(target, e)),
        };

        let sidecar = self.sidecar_path(target);
        match fs::read_to_string(&sidecar) {
            Ok(annotation) => Ok(LineStore::from_annotated(&text, &annotation).unwrap_or_else(|| {
                warn!(sidecar = %sidecar.display(), "sidecar does not match the file, ignoring it");
                LineStore::from_text(&text)
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(LineStore::from_text(&text)),
            Err(e) => Err(read_failed(&sidecar, e)),
        }
    }

    /// Write the file text and its sidecar
    fn write(&self, output: &Path, lines: &LineStore) -> Result<(), PpatchError> {
        if let Some(parent) = output.parent() {
            create_dir(parent)?;
        }
        fs::write(output, lines.to_text()).map_err(|e| write_failed(output, e))?;

        let sidecar = self.sidecar_path(output);
        fs::write(&sidecar, lines.annotate()).map_err(|e| write_failed(&sidecar, e))?;
        info!(output = %output.display(), lines = lines.len(), "written");
        Ok(())
    }
}

/// Default provenance for a patch file: the commit hash its name starts
/// with, else the whole file stem.
fn patch_flag(patch: &Path) -> String {
    let stem = patch
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.split_once('-') {
        Some((hash, _)) if !hash.is_empty() && hash.chars().all(|c| c.is_ascii_hexdigit()) => {
            hash.to_string()
        }
        _ => stem,
    }
}

/// `path` with `.extension` appended, keeping any extension it has
fn with_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

fn read(path: &Path) -> Result<String, PpatchError> {
    fs::read_to_string(path).map_err(|e| read_failed(path, e))
}

fn create_dir(dir: &Path) -> Result<(), PpatchError> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| write_failed(dir, e))
}

fn read_failed(path: &Path, e: std::io::Error) -> PpatchError {
    PpatchError::ReadFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn write_failed(path: &Path, e: std::io::Error) -> PpatchError {
    PpatchError::WriteFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
