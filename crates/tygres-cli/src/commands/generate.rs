//! Generate command: load an analysis report and run the write pipeline.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use tygres_core::{write_queries, AnalysedQuery, SourceLanguage, WriteOptions};

/// Arguments for the generate command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Path to the analysis report (JSON array of analysed queries)
    #[arg(long, short = 'r')]
    report: PathBuf,

    /// Route all generated declarations into this directory instead of the
    /// per-file default (same file for TypeScript, `__sql__` sibling for SQL)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Compute everything but write nothing; exit non-zero if any file
    /// would change
    #[arg(long)]
    check: bool,
}

/// Execute the generate command.
pub fn execute(args: GenerateArgs) -> Result<()> {
    let queries = load_report(&args.report)?;
    info!(queries = queries.len(), report = %args.report.display(), "loaded analysis report");

    let mut options = WriteOptions::new().dry_run(args.check);
    if let Some(out_dir) = args.out_dir.clone() {
        options = options.with_queries_module(move |source: &Path| out_dir_destination(&out_dir, source));
    }

    let report = write_queries(&queries, &options).context("write batch failed")?;
    if args.check && !report.is_clean() {
        for path in &report.changed {
            eprintln!("out of date: {}", path.display());
        }
        anyhow::bail!("{} file(s) need regeneration", report.changed.len());
    }
    info!(
        visited = report.visited.len(),
        changed = report.changed.len(),
        "generation complete"
    );
    Ok(())
}

/// Load and deserialize the analysis report.
fn load_report(path: &Path) -> Result<Vec<AnalysedQuery>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open analysis report {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("malformed analysis report {}", path.display()))
}

/// Map a source file into the shared output directory, keeping its name and
/// ensuring a `.ts` extension for non-TypeScript sources.
fn out_dir_destination(out_dir: &Path, source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match SourceLanguage::from_path(source) {
        Some(lang) if lang.patchable() => out_dir.join(name),
        _ => out_dir.join(format!("{}.ts", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_dir_destination_keeps_typescript_names() {
        assert_eq!(
            out_dir_destination(Path::new("types"), Path::new("src/demo.ts")),
            PathBuf::from("types/demo.ts")
        );
    }

    #[test]
    fn test_out_dir_destination_appends_ts_for_sql() {
        assert_eq!(
            out_dir_destination(Path::new("types"), Path::new("src/list.sql")),
            PathBuf::from("types/list.sql.ts")
        );
    }
}
