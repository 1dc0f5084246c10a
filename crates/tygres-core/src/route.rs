//! Output Routing
//!
//! This module decides where a source file's generated declarations live:
//! appended as a trailing block in the same file, or written to a separate
//! destination module that the source file then imports.
//!
//! The import-existence check is purely textual. Three spellings are
//! recognized (double-quoted, single-quoted, default import); anything else
//! gets a fresh `import * as queries from '...'` line at the very top of the
//! file.

use std::path::{Component, Path, PathBuf};

use crate::parser::SourceLanguage;
use crate::render::QUERIES_NAMESPACE;

/// Conventional subdirectory for companion modules of non-TypeScript
/// sources (e.g. standalone `.sql` files).
pub const SQL_MODULE_DIR: &str = "__sql__";

// ============================================================================
// Destination Resolution
// ============================================================================

/// Maps a source file path to the file its generated declarations belong in.
pub trait QueriesModuleResolver {
    /// Resolve the declarations destination for a source file.
    fn resolve(&self, source: &Path) -> PathBuf;
}

impl<F> QueriesModuleResolver for F
where
    F: Fn(&Path) -> PathBuf,
{
    fn resolve(&self, source: &Path) -> PathBuf {
        self(source)
    }
}

/// Default destination mapping.
///
/// TypeScript sources keep their declarations in the same file. Anything
/// else maps to a sibling module in the conventional `__sql__` subdirectory,
/// named after the source file with a `.ts` extension appended.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultQueriesModule;

impl QueriesModuleResolver for DefaultQueriesModule {
    fn resolve(&self, source: &Path) -> PathBuf {
        match SourceLanguage::from_path(source) {
            Some(lang) if lang.patchable() => source.to_path_buf(),
            _ => {
                let dir = source.parent().unwrap_or_else(|| Path::new(""));
                let name = source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                dir.join(SQL_MODULE_DIR).join(format!("{}.ts", name))
            }
        }
    }
}

// ============================================================================
// Imports
// ============================================================================

/// Compute the module specifier for importing `destination` from `source`.
///
/// Relative, `./`-prefixed, with a trailing `.ts`/`.tsx` extension stripped.
pub fn import_specifier(source: &Path, destination: &Path) -> String {
    let from_dir = source.parent().unwrap_or_else(|| Path::new(""));
    let relative = relative_path(from_dir, destination);
    let mut spec = relative.to_string_lossy().replace('\\', "/");
    for ext in [".ts", ".tsx"] {
        if let Some(stripped) = spec.strip_suffix(ext) {
            spec = stripped.to_string();
            break;
        }
    }
    if spec.starts_with("../") {
        spec
    } else {
        format!("./{}", spec.trim_start_matches("./"))
    }
}

/// Check whether the file already imports the queries module, under any of
/// the three recognized textual spellings.
pub fn has_queries_import(content: &str, specifier: &str) -> bool {
    let spellings = [
        format!("import * as {} from '{}'", QUERIES_NAMESPACE, specifier),
        format!("import * as {} from \"{}\"", QUERIES_NAMESPACE, specifier),
        format!("import {} from '{}'", QUERIES_NAMESPACE, specifier),
    ];
    spellings.iter().any(|s| content.contains(s.as_str()))
}

/// Insert the queries-module import at the very top of the file.
pub fn insert_queries_import(content: &str, specifier: &str) -> String {
    format!(
        "import * as {} from '{}'\n{}",
        QUERIES_NAMESPACE, specifier, content
    )
}

/// Compute a relative path from `from_dir` to `to` by stripping the common
/// prefix and ascending out of the remainder.
fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from_dir.components().collect();
    let to_components: Vec<Component> = to.components().collect();

    let common = from
        .iter()
        .zip(to_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &to_components[common..] {
        relative.push(component);
    }
    relative
}
