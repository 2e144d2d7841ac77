//! `tl list`: create, show and remove task lists.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

use tasklist_core::graph::hierarchy::ListTree;
use tasklist_core::model::{Item, ListType, TaskList};

use crate::output::{OutputMode, render, write_item_line};

// ---------------------------------------------------------------------------
// Clap types
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(subcommand)]
    pub command: ListCommand,
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// Create a new list.
    Create(CreateArgs),
    /// Show all lists, or one list's item tree.
    Show(ShowArgs),
    /// Delete a list with all its items and their dependencies.
    Rm(RmListArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Unique list key.
    pub key: String,

    /// Human-readable title (defaults to the key).
    #[arg(long)]
    pub title: Option<String>,

    /// sequential, parallel, hierarchical or linked.
    #[arg(long = "type", default_value = "sequential", value_name = "TYPE")]
    pub list_type: ListType,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// List to show. Omit to list every list.
    pub key: Option<String>,
}

#[derive(Args, Debug)]
pub struct RmListArgs {
    pub key: String,
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ListDetail {
    list: TaskList,
    items: Vec<Item>,
}

fn write_tree(w: &mut dyn Write, tree: &ListTree) -> io::Result<()> {
    // Explicit stack; deep nesting is allowed.
    let mut stack: Vec<(&Item, usize)> = tree
        .root_items()
        .into_iter()
        .rev()
        .map(|item| (item, 0))
        .collect();
    while let Some((item, depth)) = stack.pop() {
        write_item_line(w, item, depth)?;
        let children = tree.children_of(item.id);
        stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub fn run_list(
    args: ListArgs,
    db: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let mut engine = super::open_engine(db, project_root)?;

    match args.command {
        ListCommand::Create(create) => {
            let title = create.title.as_deref().unwrap_or(&create.key);
            let list = engine.create_list(&create.key, title, create.list_type)?;
            render(output, &list, |l, w: &mut dyn Write| {
                writeln!(w, "Created list {} ({}): {}", l.key, l.list_type, l.title)
            })
        }
        ListCommand::Show(ShowArgs { key: None }) => {
            let lists = engine.lists()?;
            render(output, &lists, |lists, w: &mut dyn Write| {
                if lists.is_empty() {
                    return writeln!(w, "No lists. Create one with `tl list create <key>`.");
                }
                for list in lists {
                    writeln!(w, "{:<16} {:<13} {}", list.key, list.list_type.as_str(), list.title)?;
                }
                Ok(())
            })
        }
        ListCommand::Show(ShowArgs { key: Some(key) }) => {
            let list = engine.list(&key)?;
            let tree = engine.tree(&key)?;
            let detail = ListDetail {
                list,
                items: tree.items().to_vec(),
            };
            render(output, &detail, |d, w: &mut dyn Write| {
                writeln!(w, "{} ({}): {}", d.list.key, d.list.list_type, d.list.title)?;
                if tree.is_empty() {
                    return writeln!(w, "  (no items)");
                }
                write_tree(w, &tree)
            })
        }
        ListCommand::Rm(rm) => {
            engine.delete_list(&rm.key)?;
            let report = serde_json::json!({ "deleted": rm.key });
            render(output, &report, |_, w: &mut dyn Write| {
                writeln!(w, "Deleted list {}", rm.key)
            })
        }
    }
}
