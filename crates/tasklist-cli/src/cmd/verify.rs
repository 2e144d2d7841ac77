use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::output::{OutputMode, render};

#[derive(Debug, Serialize)]
struct VerifyReport {
    ok: bool,
    lists: usize,
    cycles: Vec<Vec<String>>,
}

/// Execute `tl verify`. Exits non-zero when the stored dependency graph
/// contains a loop.
///
/// # Errors
///
/// Returns an error when cycles are found, the hierarchy is inconsistent,
/// or storage fails.
pub fn run_verify(db: Option<&Path>, output: OutputMode, project_root: &Path) -> Result<()> {
    let engine = super::open_engine(db, project_root)?;
    let lists = engine.lists()?.len();
    let cycles = engine
        .verify()?
        .iter()
        .map(|cycle| {
            cycle
                .path
                .iter()
                .map(|&id| engine.label(id))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let report = VerifyReport {
        ok: cycles.is_empty(),
        lists,
        cycles,
    };
    render(output, &report, |r, w: &mut dyn Write| {
        if r.ok {
            return writeln!(w, "ok: {} list(s), no dependency cycles", r.lists);
        }
        for cycle in &r.cycles {
            writeln!(w, "cycle: {}", cycle.join(" → "))?;
        }
        Ok(())
    })?;

    if !report.ok {
        anyhow::bail!("{} dependency cycle(s) found", report.cycles.len());
    }
    Ok(())
}
