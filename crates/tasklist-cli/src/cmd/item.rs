//! Item commands: `tl add`, `tl subitem`, `tl rm`, `tl mark`.

use anyhow::Result;
use clap::Args;
use std::io::Write;
use std::path::Path;

use tasklist_core::DeleteSummary;
use tasklist_core::model::Item;

use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct AddArgs {
    pub list: String,
    /// Item key, unique within the list.
    pub key: String,
    pub content: String,

    /// Key of the parent item in the same list.
    #[arg(long, short)]
    pub parent: Option<String>,
}

#[derive(Args, Debug)]
pub struct SubitemArgs {
    pub list: String,
    /// Item to move.
    pub key: String,
    /// New parent.
    pub parent: String,
}

#[derive(Args, Debug)]
pub struct RmArgs {
    pub list: String,
    pub key: String,
}

#[derive(Args, Debug)]
pub struct MarkArgs {
    pub list: String,
    pub key: String,
    /// Marker name, e.g. `review`.
    pub name: String,
    pub value: String,
}

fn item_summary(item: &Item, w: &mut dyn Write, verb: &str) -> std::io::Result<()> {
    writeln!(w, "{verb} {} [{}] {}", item.key, item.status, item.content)
}

pub fn run_add(
    args: &AddArgs,
    db: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let mut engine = super::open_engine(db, project_root)?;
    let item = engine.add_item(&args.list, &args.key, &args.content, args.parent.as_deref())?;
    render(output, &item, |item, w: &mut dyn Write| item_summary(item, w, "Added"))
}

pub fn run_subitem(
    args: &SubitemArgs,
    db: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let mut engine = super::open_engine(db, project_root)?;
    let item = engine.convert_to_subitem(&args.list, &args.key, &args.parent)?;
    render(output, &item, |item, w: &mut dyn Write| {
        writeln!(w, "Moved {} under {} (position {})", item.key, args.parent, item.position)
    })
}

pub fn run_rm(
    args: &RmArgs,
    db: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let mut engine = super::open_engine(db, project_root)?;
    let summary = engine.delete_item(&args.list, &args.key)?;
    render(output, &summary, |s: &DeleteSummary, w: &mut dyn Write| {
        writeln!(
            w,
            "Deleted {} ({} item(s), {} dependency edge(s))",
            args.key, s.removed_items, s.removed_edges
        )?;
        for change in &s.propagated {
            writeln!(w, "  {}: {} -> {}", change.key, change.from, change.to)?;
        }
        Ok(())
    })
}

pub fn run_mark(
    args: &MarkArgs,
    db: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let mut engine = super::open_engine(db, project_root)?;
    let item = engine.set_completion_state(&args.list, &args.key, &args.name, &args.value)?;
    render(output, &item, |item, w: &mut dyn Write| {
        writeln!(w, "{}: {} = {}", item.key, args.name, args.value)
    })
}
