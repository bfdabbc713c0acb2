use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::{CommandFactory as _, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use porter::config::Overrides;
use porter::{
    Outcome, PatchMode, PorterConfig, SetupOptions, Warning, Workspace, WorkspaceError, WorkspaceLayout,
    telemetry,
};

/// Maintain per-branch patch sets on top of an upstream git tree
///
/// porter keeps a pristine copy of an upstream commit in upstream/, rebuilds
/// one working copy per porting branch in workspace/<branch> by applying
/// patches/<branch>, and regenerates those patches from your edits.
///
/// TYPICAL CYCLE:
///
///   porter setup          # upstream/ + workspace/<b> from the pinned commit
///   porter split          # copy workspace/<b> to <b>/ for editing
///   # ... edit <b>/ ...
///   porter generate       # patches/<b> from <b>/ vs upstream/
///
///   porter rebuild        # move every branch onto the latest upstream
///
/// Configuration is read from porter.toml in the project root.
#[derive(Parser)]
#[command(name = "porter")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'porter <command> --help' for more information on a specific command.")]
struct Cli {
    /// Project root
    #[arg(short = 'C', long = "root", global = true, default_value = ".", env = "PORTER_ROOT")]
    root: PathBuf,

    /// Configuration file (default: <root>/porter.toml)
    #[arg(long, global = true, env = "PORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Upstream reference, overriding [upstream] reference
    #[arg(long, global = true)]
    upstream: Option<String>,

    /// Porting branch, overriding [porting] branches (repeatable)
    #[arg(long = "branch", global = true)]
    branches: Vec<String>,

    /// Patch application mode, overriding [porting] mode
    #[arg(long, global = true, value_enum)]
    mode: Option<ModeArg>,

    /// More log output (-v debug, -vv trace). PORTER_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Exact,
    Fuzzy,
}

impl From<ModeArg> for PatchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Exact => Self::Exact,
            ModeArg::Fuzzy => Self::Fuzzy,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum StatusFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Materialize upstream/ and apply every branch's patches
    ///
    /// Uses the commit in commit.sha when present, otherwise resolves the
    /// upstream reference and pins the result. Rejected hunks land in
    /// rejects/<branch>/.
    Setup {
        /// Materialize this revision instead (commit.sha is left alone)
        #[arg(long)]
        commit: Option<String>,
    },

    /// Remove upstream/, workspace/ and tmp/
    Clean,

    /// Pin the current tip of the upstream reference in commit.sha
    ///
    /// Also rebuilds upstream/ from it.
    #[command(name = "update-ref")]
    UpdateRef,

    /// Copy each workspace/<branch> to <branch>/ for editing
    Split,

    /// Regenerate patches/<branch> from <branch>/ against upstream/
    ///
    /// Falls back to workspace/<branch> for branches that were not split.
    Generate,

    /// Carry every branch onto the latest upstream commit
    ///
    /// clean, update-ref, setup, overlay <branch>/ onto workspace/<branch>,
    /// generate, clean.
    Rebuild,

    /// Show the project state
    Status {
        #[arg(long, value_enum, default_value_t)]
        format: StatusFormat,
    },

    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    telemetry::init(default_level);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<WorkspaceError>()
                .map_or(2, WorkspaceError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "porter", &mut io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| WorkspaceLayout::new(&cli.root).config_path());
    let config = PorterConfig::load(&config_path)
        .map_err(WorkspaceError::from)
        .with_context(|| format!("loading {}", config_path.display()))?
        .with_overrides(Overrides {
            upstream: cli.upstream,
            branches: cli.branches,
            mode: cli.mode.map(PatchMode::from),
        });
    let ws = Workspace::new(cli.root, config);

    let outcome = match cli.command {
        Commands::Setup { commit } => ws.setup(&SetupOptions { commit })?,
        Commands::Clean => ws.clean()?,
        Commands::UpdateRef => ws.update_commit_ref()?,
        Commands::Split => ws.split_sources()?,
        Commands::Generate => ws.generate_patches()?,
        Commands::Rebuild => ws.rebuild_patches()?,
        Commands::Status { format } => {
            let report = ws.status()?;
            match format {
                StatusFormat::Text => print!("{report}"),
                StatusFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            Outcome::Ok
        }
        Commands::Completions { .. } => Outcome::Ok,
    };

    Ok(report_outcome(&outcome))
}

/// Print warnings; rejected hunks make the run exit 1.
fn report_outcome(outcome: &Outcome) -> ExitCode {
    for warning in outcome.warnings() {
        eprintln!("warning: {warning}");
    }
    let rejects = outcome
        .warnings()
        .iter()
        .any(|w| matches!(w, Warning::Rejects { .. }));
    if rejects {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
