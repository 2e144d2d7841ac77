use anyhow::Result;
use clap::Args;
use std::io::Write;
use std::path::Path;

use tasklist_core::model::{Item, Status};

use crate::output::{OutputMode, render, status_marker};

#[derive(Args, Debug)]
pub struct StatusArgs {
    pub list: String,
    pub key: String,

    /// pending, in_progress, completed or failed.
    pub status: Status,

    /// Complete even when subitems are unfinished.
    #[arg(long)]
    pub force: bool,
}

/// Execute `tl status`. Ancestors are recomputed in the same transaction.
///
/// # Errors
///
/// Fails with the engine's `IncompleteChildren` error when completing a
/// parent with open subitems and `--force` is not given.
pub fn run_status(
    args: &StatusArgs,
    db: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let mut engine = super::open_engine(db, project_root)?;
    let item = engine.update_status(&args.list, &args.key, args.status, args.force)?;
    let tree = engine.tree(&args.list)?;
    let ancestors: Vec<&Item> = tree.ancestors(item.id);

    render(output, &item, |item, w: &mut dyn Write| {
        writeln!(w, "{} {}  {}", status_marker(item.status), item.key, item.status)?;
        for ancestor in ancestors {
            writeln!(w, "  parent {} is {}", ancestor.key, ancestor.status)?;
        }
        Ok(())
    })
}

