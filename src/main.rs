use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use ppatch::{Config, Outcome, Ppatch, PpatchError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ppatch")]
#[command(about = "Trace line provenance through a file's patch history")]
#[command(version)]
struct Cli {
    /// Repository to work in
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    repo: String,

    /// Configuration file (default: ppatch.toml in the repository)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v info, -vv debug, -vvv trace); PPATCH_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the hunks of a patch file with explicit line numbers
    Show {
        /// Patch file
        patch: PathBuf,
    },
    /// Apply one patch file to a file, tracking line provenance
    Apply {
        /// Patch file
        patch: PathBuf,
        /// File to patch; a missing file is created
        target: PathBuf,
        /// Write the result here instead of over the target
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Provenance for touched lines (default: commit hash from the patch name)
        #[arg(long)]
        flag: Option<String>,
        /// Record mismatching lines as conflicts instead of failing
        #[arg(long)]
        tolerate_conflicts: bool,
    },
    /// Rebuild a file by applying every commit that touched it
    Trace {
        /// File path within the repository
        path: String,
        /// Revision whose content is the starting point
        #[arg(long)]
        from: String,
        /// Last revision to apply
        #[arg(long, default_value = "HEAD")]
        to: String,
        /// Where to write the result (default: inside the patch directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Record mismatching lines as conflicts instead of halting
        #[arg(long)]
        tolerate_conflicts: bool,
    },
    /// Export the patch of every commit that touched a file
    #[command(name = "getpatches")]
    GetPatches {
        /// File path within the repository
        path: String,
        /// Exclusive start of the commit range (default: the whole history)
        #[arg(long)]
        from: Option<String>,
        /// Last revision to export
        #[arg(long, default_value = "HEAD")]
        to: String,
    },
    /// Print shell completions
    Completions {
        shell: Shell,
    },
    /// Print the man page
    Man,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path),
        None => Config::discover(std::path::Path::new(&cli.repo)),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(cli.verbose, &config.log_level);

    match run(cli, config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, configured: &str) {
    let level = match verbose {
        0 => configured,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("PPATCH_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli, mut config: Config) -> Result<ExitCode, PpatchError> {
    match cli.command {
        Commands::Show { patch } => {
            print!("{}", Ppatch::new(&cli.repo, config).show(&patch)?);
        }
        Commands::Apply {
            patch,
            target,
            output,
            flag,
            tolerate_conflicts,
        } => {
            config.tolerate_conflicts |= tolerate_conflicts;
            let applied = Ppatch::new(&cli.repo, config).apply(
                &patch,
                &target,
                output.as_deref(),
                flag.as_deref(),
            )?;
            for conflict in &applied.conflicts {
                println!("{conflict}");
            }
            if !applied.conflicts.is_empty() {
                return Ok(ExitCode::from(1));
            }
        }
        Commands::Trace {
            path,
            from,
            to,
            output,
            tolerate_conflicts,
        } => {
            config.tolerate_conflicts |= tolerate_conflicts;
            let report =
                Ppatch::new(&cli.repo, config).trace(&path, &from, &to, output.as_deref())?;

            for patch in &report.trace.reports {
                match &patch.outcome {
                    Outcome::Applied => println!("{}: applied", patch.patch),
                    Outcome::ConflictRecorded(conflicts) => {
                        println!("{}: {} conflicts", patch.patch, conflicts.len());
                        for conflict in conflicts {
                            println!("  {conflict}");
                        }
                    }
                }
            }
            if let Some(halt) = &report.trace.halted {
                println!("{}: halted: {}", halt.patch, halt.error);
            }
            println!("{}", report.output.display());

            if !report.trace.is_complete() || report.trace.conflicts().next().is_some() {
                return Ok(ExitCode::from(1));
            }
        }
        Commands::GetPatches { path, from, to } => {
            let patches =
                Ppatch::new(&cli.repo, config).get_patches(&path, from.as_deref(), &to)?;
            for patch in patches {
                println!("{}", patch.display());
            }
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "ppatch", &mut io::stdout());
        }
        Commands::Man => {
            clap_mangen::Man::new(Cli::command())
                .render(&mut io::stdout())
                .map_err(|e| PpatchError::WriteFailed {
                    path: "stdout".to_string(),
                    message: e.to_string(),
                })?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
