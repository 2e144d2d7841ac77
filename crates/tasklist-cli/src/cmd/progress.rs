use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use tasklist_core::progress::ListProgress;

use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct ProgressArgs {
    pub list: String,
}

#[derive(Debug, Serialize)]
struct ProgressReport {
    list: String,
    #[serde(flatten)]
    counts: ListProgress,
    percent_complete: f64,
    recommended_max_depth: usize,
}

pub fn run_progress(
    args: &ProgressArgs,
    db: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let engine = super::open_engine(db, project_root)?;
    let counts = engine.progress(&args.list)?;
    let report = ProgressReport {
        list: args.list.clone(),
        percent_complete: counts.percent_complete(),
        recommended_max_depth: engine.config().hierarchy.recommended_max_depth,
        counts,
    };

    render(output, &report, |r, w: &mut dyn Write| {
        let c = &r.counts;
        writeln!(w, "{}: {:.0}% complete ({}/{})", r.list, r.percent_complete, c.completed, c.total)?;
        writeln!(
            w,
            "  pending {}  in progress {}  failed {}",
            c.pending, c.in_progress, c.failed
        )?;
        writeln!(w, "  available {}  blocked {}", c.available, c.blocked)?;
        writeln!(
            w,
            "  {} root item(s), {} subitem(s), max depth {}",
            c.root_items, c.subitems, c.max_depth
        )?;
        if c.exceeds_recommended_depth {
            writeln!(
                w,
                "  warning: nesting exceeds the recommended depth of {}",
                r.recommended_max_depth
            )?;
        }
        Ok(())
    })
}
