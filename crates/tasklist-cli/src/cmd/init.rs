use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use tasklist_core::config::PROJECT_DIR;

use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the config template even if `.tasklist/` already exists.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[hierarchy]\n\
    # Deeper nesting is reported by `tl progress`, never rejected.\n\
    recommended_max_depth = 3\n\
    \n\
    [storage]\n\
    # path = \".tasklist/tasklist.db\"\n\
    busy_timeout_ms = 5000\n";

const GITIGNORE: &str = "tasklist.db\ntasklist.db-wal\ntasklist.db-shm\n";

#[derive(Debug, Serialize)]
struct InitReport {
    project_dir: String,
    config: String,
    database: String,
}

/// Execute `tl init`. Creates the project skeleton:
///
/// ```text
/// .tasklist/
///   config.toml   (default config template)
///   .gitignore    (database files)
///   tasklist.db   (unless --db / TASKLIST_DB point elsewhere)
/// ```
///
/// # Errors
///
/// Returns an error if `.tasklist/` already exists and `--force` is not set,
/// or if any filesystem or database operation fails.
pub fn run_init(
    args: &InitArgs,
    db: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let project_dir = project_root.join(PROJECT_DIR);
    if project_dir.exists() && !args.force {
        anyhow::bail!("{PROJECT_DIR}/ already exists. Use `tl init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&project_dir)
        .with_context(|| format!("Failed to create {}", project_dir.display()))?;

    let config_path = project_dir.join("config.toml");
    std::fs::write(&config_path, CONFIG_TOML)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = project_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    // Opening runs the schema migrations.
    let engine = super::open_engine(db, project_root)?;
    let database = engine
        .store()
        .connection()
        .path()
        .map_or_else(|| ":memory:".to_string(), str::to_string);
    tracing::info!(dir = %project_dir.display(), "initialized tasklist project");

    let report = InitReport {
        project_dir: project_dir.display().to_string(),
        config: config_path.display().to_string(),
        database,
    };
    render(output, &report, |r, w: &mut dyn Write| {
        writeln!(w, "Initialized {}", r.project_dir)?;
        writeln!(w, "  config:   {}", r.config)?;
        writeln!(w, "  database: {}", r.database)?;
        writeln!(w)?;
        writeln!(w, "Next: tl list create <key> --title \"...\"")
    })
}
