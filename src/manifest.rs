//! Module manifests embedded in source comments
//!
//! A script can carry its `go.mod` and `go.sum` inside comment blocks so it
//! stays a single file:
//!
//! ```text
//! // go.mod >>>
//! // module hello
//! // <<< go.mod
//! ```
//!
//! A `go.env` block holds `KEY=VALUE` lines layered onto the build
//! environment.

use crate::error::{GorunError, GorunResult};
use regex::Regex;
use std::fmt;
use std::fs;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tracing::debug;

/// Embedded module file
pub const GO_MOD: &str = "go.mod";
/// Embedded checksum file
pub const GO_SUM: &str = "go.sum";
/// Embedded build environment
pub const GO_ENV: &str = "go.env";

/// Default pattern of source paths never rewritten by `embed`
pub const DEFAULT_EMBED_IGNORE: &str = "^/(bin|sbin|usr|opt|root)/(.*)";

fn header(name: &str) -> String {
    format!("// {name} >>>\n")
}

fn trailer(name: &str) -> String {
    format!("// <<< {name}\n")
}

/// Byte offsets of a section: (start, inner start, inner end, end)
fn bounds(content: &str, name: &str) -> Option<(usize, usize, usize, usize)> {
    let header = header(name);
    let trailer = trailer(name);
    let start = content.find(&header)?;
    let inner_start = start + header.len();
    let inner_end = inner_start + content[inner_start..].find(&trailer)?;
    Some((start, inner_start, inner_end, inner_end + trailer.len()))
}

/// Text of section `name` with its comment markers stripped
pub fn section(content: &str, name: &str) -> Option<String> {
    let (_, inner_start, inner_end, _) = bounds(content, name)?;
    let text = content[inner_start..inner_end]
        .lines()
        .map(|line| {
            line.strip_prefix("// ")
                .or_else(|| line.strip_prefix("//"))
                .unwrap_or(line)
        })
        .collect::<Vec<_>>()
        .join("\n");
    Some(text)
}

/// Remove section `name`, returning where it started
pub fn remove_section(content: &str, name: &str) -> (Option<usize>, String) {
    match bounds(content, name) {
        Some((start, _, _, end)) => {
            let mut out = String::with_capacity(content.len() - (end - start));
            out.push_str(&content[..start]);
            out.push_str(&content[end..]);
            (Some(start), out)
        }
        None => (None, content.to_string()),
    }
}

/// Render `text` as an embedded section
pub fn comment_section(text: &str, name: &str) -> String {
    let mut out = header(name);
    for line in text.lines() {
        out.push_str("// ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&trailer(name));
    out
}

/// Trim and collapse blank lines so formatting noise doesn't count
fn normalize(text: &str) -> String {
    text.trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `KEY=VALUE` assignments from the `go.env` section
pub fn env_assignments(content: &str) -> Vec<(String, String)> {
    section(content, GO_ENV)
        .map(|text| {
            text.lines()
                .filter_map(|line| {
                    let line = line.trim();
                    let (key, value) = line.split_once('=')?;
                    (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Read a manifest file from disk, normalised; `None` when absent
fn read_disk(path: &Path) -> GorunResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(normalize(&text))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GorunError::io(format!("reading {}", path.display()), e)),
    }
}

fn read_source(source: &Path) -> GorunResult<String> {
    fs::read_to_string(source)
        .map_err(|e| GorunError::io(format!("reading {}", source.display()), e))
}

/// Write a private (0600) file, replacing any previous content
pub(crate) fn write_private(path: &Path, content: &[u8]) -> GorunResult<()> {
    use std::io::Write;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| GorunError::io(format!("writing {}", path.display()), e))?;
    file.write_all(content)
        .map_err(|e| GorunError::io(format!("writing {}", path.display()), e))
}

/// Write section `name` of `content` into `dest`, if the section is present
pub fn write_section(content: &str, name: &str, dest: &Path) -> GorunResult<bool> {
    match section(content, name) {
        Some(text) if !text.trim().is_empty() => {
            let mut text = text;
            text.push('\n');
            write_private(dest, text.as_bytes())?;
            debug!("Extracted {} to {}", name, dest.display());
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Write the embedded go.mod and go.sum next to the source
pub fn extract(source: &Path) -> GorunResult<Vec<&'static str>> {
    let content = read_source(source)?;
    let dir = source.parent().unwrap_or_else(|| Path::new("."));

    let mut written = Vec::new();
    for name in [GO_SUM, GO_MOD] {
        if write_section(&content, name, &dir.join(name))? {
            written.push(name);
        }
    }
    Ok(written)
}

/// Where new sections go: after an interpreter line, else at the top
fn insertion_point(content: &str) -> usize {
    if content.starts_with("#!") {
        content.find('\n').map_or(content.len(), |i| i + 1)
    } else {
        0
    }
}

/// Embed go.mod and go.sum found next to `source` into `dest`
///
/// Returns `false` when the source path matches `ignore` and nothing was
/// written.
pub fn embed(source: &Path, dest: &Path, ignore: &Regex) -> GorunResult<bool> {
    if ignore.is_match(&source.to_string_lossy()) {
        debug!("{} matches the embed ignore pattern", source.display());
        return Ok(false);
    }

    let mut content = read_source(source)?;
    let dir = source.parent().unwrap_or_else(|| Path::new("."));
    let sum = read_disk(&dir.join(GO_SUM))?;
    let module = read_disk(&dir.join(GO_MOD))?;

    // A section is only replaced when its file is on disk
    let mut sum_was_new = false;
    if let Some(sum) = &sum {
        let (start, rest) = remove_section(&content, GO_SUM);
        sum_was_new = start.is_none();
        let at = start.unwrap_or_else(|| insertion_point(&rest));
        content = format!("{}{}{}", &rest[..at], comment_section(sum, GO_SUM), &rest[at..]);
    }

    if let Some(module) = &module {
        let (start, rest) = remove_section(&content, GO_MOD);
        let at = start.unwrap_or_else(|| insertion_point(&rest));
        // Separate freshly added sections; keep the user's layout otherwise
        let gap = if sum.is_some() && sum_was_new { "\n" } else { "" };
        content = format!(
            "{}{}{}{}",
            &rest[..at],
            comment_section(module, GO_MOD),
            gap,
            &rest[at..]
        );
    }

    write_private(dest, content.as_bytes())?;
    Ok(true)
}

/// How an embedded section compares to the file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionStatus {
    /// Neither embedded nor on disk
    Absent,
    /// Embedded and identical to the file on disk
    Same,
    /// Embedded, but no file on disk
    EmbeddedOnly,
    /// On disk, but not embedded
    DiskOnly,
    /// Both present with different content
    Different,
}

impl SectionStatus {
    /// Whether this status counts as drift
    pub fn is_drift(&self) -> bool {
        !matches!(self, Self::Absent | Self::Same)
    }
}

impl fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "not embedded or on disk"),
            Self::Same => write!(f, "embedded and same as on disk"),
            Self::EmbeddedOnly => write!(f, "embedded but nothing on disk"),
            Self::DiskOnly => write!(f, "on disk but not embedded"),
            Self::Different => write!(f, "embedded and different to on disk"),
        }
    }
}

/// Per-section comparison result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestReport {
    pub sections: Vec<(&'static str, SectionStatus)>,
}

impl ManifestReport {
    /// Whether any section differs
    pub fn has_drift(&self) -> bool {
        self.sections.iter().any(|(_, status)| status.is_drift())
    }
}

/// Compare embedded sections with go.mod and go.sum next to the source
pub fn diff(source: &Path) -> GorunResult<ManifestReport> {
    let content = read_source(source)?;
    let dir = source.parent().unwrap_or_else(|| Path::new("."));

    let mut sections = Vec::new();
    for name in [GO_MOD, GO_SUM] {
        let embedded = section(&content, name)
            .map(|text| normalize(&text))
            .filter(|text| !text.is_empty());
        let on_disk = read_disk(&dir.join(name))?;

        let status = match (embedded, on_disk) {
            (None, None) => SectionStatus::Absent,
            (Some(_), None) => SectionStatus::EmbeddedOnly,
            (None, Some(_)) => SectionStatus::DiskOnly,
            (Some(a), Some(b)) if a == b => SectionStatus::Same,
            (Some(_), Some(_)) => SectionStatus::Different,
        };
        sections.push((name, status));
    }

    Ok(ManifestReport { sections })
}
