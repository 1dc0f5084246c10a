//! Write Pipeline
//!
//! The single entry point of the code generator: [`write_queries`] takes the
//! analysed queries discovered across all files and mutates zero or more
//! files on disk.
//!
//! Order matters in exactly one place: tag assignment runs globally over
//! every query before any file is touched, because a tag chosen for a query
//! in one file may be shared with queries from another file. After that
//! barrier each file is patched and written independently; files are
//! processed in sorted path order for deterministic output and logs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::parser::{ParserError, SourceInspector, SourceLanguage};
use crate::patch::{apply_edits, plan_edits, PatchError};
use crate::query::{AnalysedQuery, TaggedQuery};
use crate::render::{render_region, RenderError};
use crate::route::{
    has_queries_import, import_specifier, insert_queries_import, DefaultQueriesModule,
    QueriesModuleResolver,
};
use crate::tags::assign_tags;

// ============================================================================
// Write Errors
// ============================================================================

/// Errors that abort the write batch.
///
/// Everything here is fatal: this is a one-shot batch code-generation tool,
/// so there is no retry policy and no partial-success accounting beyond the
/// files already written when the failure surfaced.
#[derive(Debug, Error)]
pub enum WriteError {
    /// A tag group rendered inconsistent bodies (logic defect upstream).
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The edit plan for a file was invalid.
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// A source file could not be parsed.
    #[error(transparent)]
    Parser(#[from] ParserError),

    /// The external formatter rejected generated content.
    #[error("formatter failed for {path}")]
    Format {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// File I/O failure (permissions, missing files).
    #[error("I/O error for {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Formatter Seam
// ============================================================================

/// External formatting collaborator applied to all final text before it is
/// persisted.
pub trait Formatter {
    /// Format `content` destined for `path`.
    fn format(&self, path: &Path, content: String) -> anyhow::Result<String>;
}

/// Default formatter: passthrough, normalizing trailing whitespace to a
/// single final newline.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFormatter;

impl Formatter for DefaultFormatter {
    fn format(&self, _path: &Path, content: String) -> anyhow::Result<String> {
        Ok(format!("{}\n", content.trim_end()))
    }
}

// ============================================================================
// Options
// ============================================================================

/// Configuration for [`write_queries`].
pub struct WriteOptions {
    resolver: Box<dyn QueriesModuleResolver>,
    formatter: Box<dyn Formatter>,
    dry_run: bool,
}

impl WriteOptions {
    /// Options with the default destination mapping and formatter.
    pub fn new() -> Self {
        Self {
            resolver: Box::new(DefaultQueriesModule),
            formatter: Box::new(DefaultFormatter),
            dry_run: false,
        }
    }

    /// Override the destination-resolution function.
    pub fn with_queries_module(mut self, resolver: impl QueriesModuleResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Override the formatting collaborator.
    pub fn with_formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    /// Compute everything but persist nothing. The returned report still
    /// records which files would change.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Write Report
// ============================================================================

/// Outcome of a write batch.
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Files whose content differed from what is on disk.
    pub changed: Vec<PathBuf>,
    /// Files inspected or produced, changed or not.
    pub visited: Vec<PathBuf>,
}

impl WriteReport {
    /// Whether the batch left (or would leave) any file different.
    pub fn is_clean(&self) -> bool {
        self.changed.is_empty()
    }
}

// ============================================================================
// Entry Point
// ============================================================================

/// Assign tags globally, then patch and write every file that owns queries.
pub fn write_queries(
    queries: &[AnalysedQuery],
    options: &WriteOptions,
) -> Result<WriteReport, WriteError> {
    // Global barrier: the tag map must cover every discovered query before
    // any file is rewritten.
    let tagged = assign_tags(queries);

    let mut by_file: BTreeMap<PathBuf, Vec<TaggedQuery>> = BTreeMap::new();
    for query in tagged {
        by_file.entry(query.query.file.clone()).or_default().push(query);
    }
    info!(files = by_file.len(), queries = queries.len(), "writing query types");

    let mut report = WriteReport::default();
    for (file, group) in &by_file {
        write_file(file, group, options, &mut report)?;
    }
    Ok(report)
}

/// Patch one source file and route its declarations.
fn write_file(
    file: &Path,
    group: &[TaggedQuery],
    options: &WriteOptions,
    report: &mut WriteReport,
) -> Result<(), WriteError> {
    let language = SourceLanguage::from_path(file)
        .ok_or_else(|| ParserError::NotPatchable(file.display().to_string()))?;
    let destination = options.resolver.resolve(file);
    let region = render_region(group)?;
    debug!(file = %file.display(), destination = %destination.display(), "routing declarations");

    if !language.patchable() {
        // External .sql sources are never patched; their declarations go to
        // the companion module with a placeholder source link.
        persist(&destination, standalone_module(file, &region), options, report)?;
        return Ok(());
    }

    let source = fs::read_to_string(file).map_err(|source| WriteError::Io {
        path: file.to_path_buf(),
        source,
    })?;
    let mut inspector = SourceInspector::new(language)?;
    let inspection = inspector.inspect(&source)?;
    let edits = plan_edits(&inspection, group);
    let patched = apply_edits(&source, &edits)?;

    if destination == file {
        let content = format!("{}\n\n{}", patched.trim_end(), region);
        persist(file, content, options, report)?;
    } else {
        let specifier = import_specifier(file, &destination);
        let content = if has_queries_import(&patched, &specifier) {
            patched
        } else {
            insert_queries_import(&patched, &specifier)
        };
        persist(file, content, options, report)?;
        persist(&destination, standalone_module(file, &region), options, report)?;
    }
    Ok(())
}

/// Wrap a region for a standalone destination module.
fn standalone_module(source: &Path, region: &str) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string());
    format!(
        "/** Types for the queries in `{}`. Generated code, do not edit directly. */\n\n{}",
        name, region
    )
}

/// Format, compare against disk, and write a file, creating parent
/// directories on demand.
fn persist(
    path: &Path,
    content: String,
    options: &WriteOptions,
    report: &mut WriteReport,
) -> Result<(), WriteError> {
    let formatted = options
        .formatter
        .format(path, content)
        .map_err(|source| WriteError::Format {
            path: path.to_path_buf(),
            source,
        })?;

    report.visited.push(path.to_path_buf());
    let existing = fs::read_to_string(path).ok();
    if existing.as_deref() == Some(formatted.as_str()) {
        debug!(path = %path.display(), "unchanged");
        return Ok(());
    }
    report.changed.push(path.to_path_buf());

    if options.dry_run {
        info!(path = %path.display(), "would change");
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| WriteError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    fs::write(path, formatted).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "wrote");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_formatter_normalizes_trailing_whitespace() {
        let formatted = DefaultFormatter
            .format(Path::new("x.ts"), "const a = 1\n\n\n".to_string())
            .unwrap();
        assert_eq!(formatted, "const a = 1\n");
    }

    #[test]
    fn test_standalone_module_names_its_source() {
        let module = standalone_module(Path::new("src/list.sql"), "export declare namespace queries {}");
        assert!(module.starts_with("/** Types for the queries in `list.sql`."));
        assert!(module.ends_with("export declare namespace queries {}"));
    }
}
