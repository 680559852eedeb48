//! Manifest commands - diff, extract and embed go.mod/go.sum comments

use crate::error::{GorunError, GorunResult};
use crate::manifest::{self, SectionStatus};
use console::style;
use regex::Regex;
use std::path::Path;
use tracing::info;

/// Report how embedded sections compare to the files on disk
///
/// Fails with `ManifestDrift` when anything differs.
pub fn diff(source: &Path) -> GorunResult<()> {
    let report = manifest::diff(source)?;

    for (name, status) in &report.sections {
        let label = match status {
            SectionStatus::Absent | SectionStatus::Same => style("OK:").green(),
            _ => style("WARN:").yellow(),
        };
        eprintln!("{} section {:?} {}", label, name, status);
    }

    if report.has_drift() {
        eprintln!("Diffs found");
        return Err(GorunError::ManifestDrift);
    }
    Ok(())
}

/// Write embedded sections out next to the source
pub fn extract(source: &Path) -> GorunResult<()> {
    let written = manifest::extract(source)?;
    if written.is_empty() {
        info!("Nothing embedded in {}", source.display());
    }
    for name in written {
        eprintln!("{} extracted {}", style("OK:").green(), name);
    }
    Ok(())
}

/// Embed go.mod/go.sum from next to the source into the source itself
pub fn embed(source: &Path, ignore_pattern: &str) -> GorunResult<()> {
    let ignore = Regex::new(ignore_pattern)?;
    if manifest::embed(source, source, &ignore)? {
        info!("Embedded manifests into {}", source.display());
    } else {
        info!("Not embedding into {}: path is ignored", source.display());
    }
    Ok(())
}
