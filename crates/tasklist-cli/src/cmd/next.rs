use anyhow::Result;
use clap::Args;
use std::io::Write;
use std::path::Path;

use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct NextArgs {
    pub list: String,

    /// Print every candidate in priority order instead of only the first.
    #[arg(long)]
    pub all: bool,
}

/// Execute `tl next`.
///
/// Prints nothing-available as text, or `null` / `[]` in JSON mode; an empty
/// schedule is not an error.
pub fn run_next(
    args: &NextArgs,
    db: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let engine = super::open_engine(db, project_root)?;

    if args.all {
        let ranked = engine.candidates(&args.list)?;
        return render(output, &ranked, |ranked, w: &mut dyn Write| {
            if ranked.is_empty() {
                return writeln!(w, "Nothing available in {}.", args.list);
            }
            for candidate in ranked {
                writeln!(
                    w,
                    "P{}  {:<12} {}",
                    candidate.priority, candidate.item.key, candidate.item.content
                )?;
            }
            Ok(())
        });
    }

    let next = engine.schedule_next(&args.list)?;
    render(output, &next, |next, w: &mut dyn Write| match next {
        Some(item) => writeln!(w, "{}  {}", item.key, item.content),
        None => writeln!(w, "Nothing available in {}.", args.list),
    })
}
