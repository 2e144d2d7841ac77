//! `tl dep`: manage dependency edges between items.
//!
//! Items are addressed as `LIST/ITEM`, so edges may cross lists:
//! - `tl dep add <dependent> <required> [--kind requires|blocks]`
//! - `tl dep rm <dependent> <required>`
//! - `tl dep show <item>`

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use tasklist_core::Engine;
use tasklist_core::model::{DependencyKind, Item};
use tasklist_core::store::Store;

use super::{ItemRef, parse_item_ref};
use crate::output::{OutputMode, render};

// ---------------------------------------------------------------------------
// Clap types
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct DepArgs {
    #[command(subcommand)]
    pub command: DepCommand,
}

#[derive(Subcommand, Debug)]
pub enum DepCommand {
    #[command(
        about = "Make one item depend on another",
        after_help = "EXAMPLES:\n    # B cannot start until A completes\n    tl dep add launch/B launch/A\n\n    # Cross-list hard blocker\n    tl dep add web/deploy infra/dns --kind blocks"
    )]
    Add(DepAddArgs),

    #[command(
        about = "Remove a dependency edge",
        after_help = "EXAMPLES:\n    tl dep rm launch/B launch/A"
    )]
    Rm(DepRmArgs),

    #[command(
        about = "Show what an item waits on and what waits on it",
        after_help = "EXAMPLES:\n    tl dep show launch/B --json"
    )]
    Show(DepShowArgs),
}

#[derive(Args, Debug)]
pub struct DepAddArgs {
    /// Item that waits (LIST/ITEM).
    #[arg(value_parser = parse_item_ref)]
    pub dependent: ItemRef,

    /// Item that must complete first (LIST/ITEM).
    #[arg(value_parser = parse_item_ref)]
    pub required: ItemRef,

    /// requires or blocks. Both gate availability.
    #[arg(long, default_value = "requires")]
    pub kind: DependencyKind,
}

#[derive(Args, Debug)]
pub struct DepRmArgs {
    #[arg(value_parser = parse_item_ref)]
    pub dependent: ItemRef,

    #[arg(value_parser = parse_item_ref)]
    pub required: ItemRef,
}

#[derive(Args, Debug)]
pub struct DepShowArgs {
    #[arg(value_parser = parse_item_ref)]
    pub item: ItemRef,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EdgeReport {
    dependent: String,
    required: String,
    kind: DependencyKind,
}

#[derive(Debug, Serialize)]
struct DepShow {
    item: String,
    blocked: bool,
    depends_on: Vec<EdgeReport>,
    /// Required items that are not completed yet.
    blockers: Vec<String>,
    /// Items waiting on this one.
    blocked_by: Vec<String>,
}

fn show<S: Store>(engine: &Engine<S>, target: &ItemRef) -> Result<DepShow> {
    let item = engine.item(&target.list, &target.key)?;
    let depends_on = engine
        .dependencies(&target.list, &target.key)?
        .into_iter()
        .filter(|edge| edge.dependent == item.id)
        .map(|edge| {
            Ok(EdgeReport {
                dependent: target.to_string(),
                required: engine.label(edge.required)?,
                kind: edge.kind,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let labels = |items: Vec<Item>| {
        items
            .into_iter()
            .map(|item| engine.label(item.id))
            .collect::<Result<Vec<_>, _>>()
    };

    Ok(DepShow {
        item: target.to_string(),
        blocked: engine.is_blocked(&target.list, &target.key)?,
        depends_on,
        blockers: labels(engine.blockers_of(&target.list, &target.key)?)?,
        blocked_by: labels(engine.blocked_by(&target.list, &target.key)?)?,
    })
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

pub fn run_dep(
    args: DepArgs,
    db: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let mut engine = super::open_engine(db, project_root)?;

    match args.command {
        DepCommand::Add(add) => {
            let (dependent, required) = (&add.dependent, &add.required);
            engine.add_dependency(
                &dependent.list,
                &dependent.key,
                &required.list,
                &required.key,
                add.kind,
            )?;
            let report = EdgeReport {
                dependent: dependent.to_string(),
                required: required.to_string(),
                kind: add.kind,
            };
            render(output, &report, |r, w: &mut dyn Write| {
                writeln!(w, "{} now {} {}", r.dependent, r.kind, r.required)
            })
        }
        DepCommand::Rm(rm) => {
            let (dependent, required) = (&rm.dependent, &rm.required);
            let removed = engine.remove_dependency(
                &dependent.list,
                &dependent.key,
                &required.list,
                &required.key,
            )?;
            let report = serde_json::json!({
                "dependent": dependent.to_string(),
                "required": required.to_string(),
                "removed": removed,
            });
            render(output, &report, |_, w: &mut dyn Write| {
                if removed {
                    writeln!(w, "Removed {dependent} -> {required}")
                } else {
                    writeln!(w, "No edge {dependent} -> {required}")
                }
            })
        }
        DepCommand::Show(show_args) => {
            let report = show(&engine, &show_args.item)?;
            render(output, &report, |r, w: &mut dyn Write| {
                let state = if r.blocked { "blocked" } else { "available" };
                writeln!(w, "{} ({state})", r.item)?;
                for edge in &r.depends_on {
                    let open = if r.blockers.contains(&edge.required) { " (open)" } else { "" };
                    writeln!(w, "  {} {}{open}", edge.kind, edge.required)?;
                }
                for waiting in &r.blocked_by {
                    writeln!(w, "  waited on by {waiting}")?;
                }
                Ok(())
            })
        }
    }
}
