#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tl: hierarchical task lists with dependency-aware scheduling",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Database file (overrides TASKLIST_DB and config).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a tasklist project",
        long_about = "Create .tasklist/ with a config template and an empty database.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    tl init"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Lists",
        about = "Create, show or remove lists",
        after_help = "EXAMPLES:\n    # Create a list\n    tl list create launch --title \"Launch v2\"\n\n    # Show every list\n    tl list show\n\n    # Show one list as a tree\n    tl list show launch"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Items",
        about = "Add an item to a list",
        after_help = "EXAMPLES:\n    # Add a root item\n    tl add launch A \"Prepare release\"\n\n    # Add a subitem\n    tl add launch A1 \"Draft notes\" --parent A"
    )]
    Add(cmd::item::AddArgs),

    #[command(
        next_help_heading = "Items",
        about = "Move an existing item under a new parent",
        after_help = "EXAMPLES:\n    # Make B a subitem of A\n    tl subitem launch B A"
    )]
    Subitem(cmd::item::SubitemArgs),

    #[command(
        next_help_heading = "Items",
        about = "Remove an item and its subtree",
        after_help = "EXAMPLES:\n    # Delete A1 and everything below it\n    tl rm launch A1"
    )]
    Rm(cmd::item::RmArgs),

    #[command(
        next_help_heading = "Items",
        about = "Record a partial-completion marker on an item",
        after_help = "EXAMPLES:\n    # Note that review was requested\n    tl mark launch A2 review requested"
    )]
    Mark(cmd::item::MarkArgs),

    #[command(
        next_help_heading = "Status",
        about = "Change an item's status",
        long_about = "Change an item's status and propagate the result to its ancestors.",
        after_help = "EXAMPLES:\n    # Start an item\n    tl status launch A in_progress\n\n    # Complete a parent with open subitems\n    tl status launch A completed --force"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Status",
        about = "Show the next item to work on",
        after_help = "EXAMPLES:\n    # Next item\n    tl next launch\n\n    # Full ranked candidate list\n    tl next launch --all"
    )]
    Next(cmd::next::NextArgs),

    #[command(
        next_help_heading = "Dependencies",
        about = "Manage dependencies between items",
        after_help = "EXAMPLES:\n    # launch/B requires launch/A\n    tl dep add launch/B launch/A\n\n    # Inspect an item's dependencies\n    tl dep show launch/B"
    )]
    Dep(cmd::dep::DepArgs),

    #[command(
        next_help_heading = "Reporting",
        about = "Show progress counters for a list",
        after_help = "EXAMPLES:\n    tl progress launch --json"
    )]
    Progress(cmd::progress::ProgressArgs),

    #[command(
        next_help_heading = "Reporting",
        about = "Check stored hierarchy and dependencies for cycles",
        after_help = "EXAMPLES:\n    tl verify"
    )]
    Verify,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TASKLIST_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "tasklist=debug,info"
        } else {
            "tasklist=info,warn"
        })
    });

    let format = env::var("TASKLIST_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli, output: OutputMode) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;
    let db = cli.db.as_deref();

    match cli.command {
        Commands::Init(args) => cmd::init::run_init(&args, db, output, &project_root),
        Commands::List(args) => cmd::list::run_list(args, db, output, &project_root),
        Commands::Add(args) => cmd::item::run_add(&args, db, output, &project_root),
        Commands::Subitem(args) => cmd::item::run_subitem(&args, db, output, &project_root),
        Commands::Rm(args) => cmd::item::run_rm(&args, db, output, &project_root),
        Commands::Mark(args) => cmd::item::run_mark(&args, db, output, &project_root),
        Commands::Status(args) => cmd::status::run_status(&args, db, output, &project_root),
        Commands::Next(args) => cmd::next::run_next(&args, db, output, &project_root),
        Commands::Dep(args) => cmd::dep::run_dep(args, db, output, &project_root),
        Commands::Progress(args) => {
            cmd::progress::run_progress(&args, db, output, &project_root)
        }
        Commands::Verify => cmd::verify::run_verify(db, output, &project_root),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::debug!(command = ?cli.command, "starting");

    let output = cli.output_mode();
    match run(cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let cli_error = CliError::from_anyhow(&err);
            if render_error(output, &cli_error).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
