use std::path::Path;

use anyhow::anyhow;
use indicatif::ProgressBar;

pub mod dissolve;
pub mod overlaps;
pub mod within;

/// Options shared by the file-to-file routines.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub show_progress: bool,
    /// Leave an existing output untouched and skip the run.
    pub skip_existing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Skipped,
    Written { count: usize },
}

impl RunOptions {
    pub fn progress_bar(&self) -> ProgressBar {
        if self.show_progress {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        }
    }
}

/// Validate the input path and decide whether the run should go ahead.
fn should_run(infile: &Path, outfile: &Path, options: &RunOptions) -> anyhow::Result<bool> {
    if options.skip_existing && outfile.exists() {
        log::info!("Output {:?} exists, skipping", outfile);
        return Ok(false);
    }
    if !infile.exists() {
        return Err(anyhow!("Input file {:?} not found", infile));
    }
    Ok(true)
}
