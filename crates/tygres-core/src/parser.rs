//! Tree-Sitter Parsing for Source Patching
//!
//! This module provides tree-sitter based parsing of TypeScript sources and
//! locates the two kinds of syntax the patcher cares about:
//!
//! - `sql`-tagged template invocations (query call sites)
//! - the single top-level `queries` namespace a file may own (the
//!   generated-declarations region)
//!
//! Both are found with tree-sitter queries embedded at compile time, and are
//! reported as byte offsets into the original text so the patcher can splice
//! replacements positionally.

use std::path::Path;

use thiserror::Error;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator, Tree};

// Embedded at compile time so the binary works without external query files.
const CALLSITES_QUERY: &str = include_str!("../queries/typescript-callsites.scm");
const REGION_QUERY: &str = include_str!("../queries/typescript-region.scm");

// ============================================================================
// Source Languages
// ============================================================================

/// Languages a query source file may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLanguage {
    /// TypeScript (.ts, .mts, .cts)
    TypeScript,
    /// TSX (.tsx)
    Tsx,
    /// Standalone SQL files (.sql). Never parsed or patched; declarations
    /// for their queries are routed to a companion module instead.
    Sql,
}

impl SourceLanguage {
    /// Detect language from file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ts" | "mts" | "cts" => Some(SourceLanguage::TypeScript),
            "tsx" => Some(SourceLanguage::Tsx),
            "sql" => Some(SourceLanguage::Sql),
            _ => None,
        }
    }

    /// Detect language from file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether sources in this language can be parsed and patched in place.
    pub fn patchable(&self) -> bool {
        !matches!(self, SourceLanguage::Sql)
    }

    /// Get the tree-sitter Language for this language.
    ///
    /// Panics for [`SourceLanguage::Sql`], which has no grammar here; callers
    /// must check [`patchable`](Self::patchable) first.
    fn tree_sitter_language(&self) -> Language {
        match self {
            SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            SourceLanguage::Sql => unreachable!("sql sources are never parsed"),
        }
    }
}

impl std::fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceLanguage::TypeScript => "typescript",
            SourceLanguage::Tsx => "tsx",
            SourceLanguage::Sql => "sql",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// Parser Errors
// ============================================================================

/// Errors that can occur while parsing and inspecting a source file.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Failed to set language
    #[error("Failed to set language: {0}")]
    LanguageSet(String),

    /// Failed to parse source code
    #[error("Failed to parse source code")]
    ParseFailed,

    /// Failed to compile an embedded query
    #[error("Failed to compile query: {0}")]
    QueryCompile(String),

    /// The file is not written in a patchable language
    #[error("Not a patchable source file: {0}")]
    NotPatchable(String),
}

// ============================================================================
// Call Sites
// ============================================================================

/// A `sql`-tagged template invocation located in a source file.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Start byte of the whole call expression.
    pub start_byte: usize,
    /// End byte of the whole call expression.
    pub end_byte: usize,
    /// Start byte of the `sql` tag identifier.
    pub tag_start: usize,
    /// Start byte of the template literal. The span from `tag_start` to
    /// here covers the tag expression plus any existing type arguments.
    pub template_start: usize,
    /// Full source text of the call expression, used to match the call
    /// site against an analysed query's captured text.
    pub text: String,
}

// ============================================================================
// Source Inspector
// ============================================================================

/// Everything the patcher needs to know about one source file.
#[derive(Debug, Default)]
pub struct Inspection {
    /// `sql`-tagged template call sites, in source order.
    pub call_sites: Vec<CallSite>,
    /// Byte spans of existing top-level generated-declarations regions.
    pub region_spans: Vec<(usize, usize)>,
}

/// Parses a source file and locates call sites and generated regions.
pub struct SourceInspector {
    parser: Parser,
    callsites_query: Query,
    region_query: Query,
}

impl SourceInspector {
    /// Create an inspector for the given patchable language.
    pub fn new(language: SourceLanguage) -> Result<Self, ParserError> {
        if !language.patchable() {
            return Err(ParserError::NotPatchable(language.to_string()));
        }
        let ts_language = language.tree_sitter_language();
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| ParserError::LanguageSet(e.to_string()))?;
        let callsites_query = Query::new(&ts_language, CALLSITES_QUERY)
            .map_err(|e| ParserError::QueryCompile(format!("{:?}", e)))?;
        let region_query = Query::new(&ts_language, REGION_QUERY)
            .map_err(|e| ParserError::QueryCompile(format!("{:?}", e)))?;
        Ok(Self {
            parser,
            callsites_query,
            region_query,
        })
    }

    /// Create an inspector for the given file path.
    pub fn for_path(path: &Path) -> Result<Self, ParserError> {
        let language = SourceLanguage::from_path(path)
            .ok_or_else(|| ParserError::NotPatchable(path.display().to_string()))?;
        Self::new(language)
    }

    /// Parse the source and locate call sites and region spans in one pass.
    pub fn inspect(&mut self, source: &str) -> Result<Inspection, ParserError> {
        let tree = self.parse(source)?;
        Ok(Inspection {
            call_sites: self.call_sites(&tree, source),
            region_spans: self.region_spans(&tree, source),
        })
    }

    /// Parse source code into a syntax tree.
    pub fn parse(&mut self, source: &str) -> Result<Tree, ParserError> {
        self.parser.parse(source, None).ok_or(ParserError::ParseFailed)
    }

    /// Locate every `sql`-tagged template invocation.
    fn call_sites(&self, tree: &Tree, source: &str) -> Vec<CallSite> {
        let source_bytes = source.as_bytes();
        let call_idx = self.capture_index(&self.callsites_query, "call");
        let tag_idx = self.capture_index(&self.callsites_query, "tag");
        let template_idx = self.capture_index(&self.callsites_query, "template");

        let mut sites = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.callsites_query, tree.root_node(), source_bytes);
        while let Some(match_) = matches.next() {
            let mut call: Option<Node> = None;
            let mut tag: Option<Node> = None;
            let mut template: Option<Node> = None;
            for capture in match_.captures {
                if capture.index == call_idx {
                    call = Some(capture.node);
                } else if capture.index == tag_idx {
                    tag = Some(capture.node);
                } else if capture.index == template_idx {
                    template = Some(capture.node);
                }
            }
            let (Some(call), Some(tag), Some(template)) = (call, tag, template) else {
                continue;
            };
            let text = call.utf8_text(source_bytes).unwrap_or("").to_string();
            sites.push(CallSite {
                start_byte: call.start_byte(),
                end_byte: call.end_byte(),
                tag_start: tag.start_byte(),
                template_start: template.start_byte(),
                text,
            });
        }
        sites.sort_by_key(|site| site.start_byte);
        sites
    }

    /// Locate the byte spans of existing generated-declarations regions.
    ///
    /// A region is a top-level namespace block literally named `queries`;
    /// the reported span covers the whole owning top-level statement,
    /// including `export`/`declare` wrappers. Namespaces nested inside other
    /// code are not regions and are ignored.
    fn region_spans(&self, tree: &Tree, source: &str) -> Vec<(usize, usize)> {
        let source_bytes = source.as_bytes();
        let module_idx = self.capture_index(&self.region_query, "module");

        let mut spans = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.region_query, tree.root_node(), source_bytes);
        while let Some(match_) = matches.next() {
            for capture in match_.captures {
                if capture.index != module_idx {
                    continue;
                }
                if let Some(statement) = top_level_statement(capture.node) {
                    let span = (statement.start_byte(), statement.end_byte());
                    if !spans.contains(&span) {
                        spans.push(span);
                    }
                }
            }
        }
        spans.sort();
        spans
    }

    fn capture_index(&self, query: &Query, name: &str) -> u32 {
        query
            .capture_index_for_name(name)
            .expect("capture name is defined in the embedded query")
    }
}

/// Ascend from a namespace node to the top-level statement that owns it.
///
/// Returns `None` when the chain to the program root passes through anything
/// other than export/declare wrappers, i.e. the namespace is nested inside
/// other code and must not be treated as a generated region.
fn top_level_statement(node: Node) -> Option<Node> {
    let mut current = node;
    loop {
        let parent = current.parent()?;
        if parent.kind() == "program" {
            return Some(current);
        }
        match parent.kind() {
            "export_statement" | "ambient_declaration" | "internal_module" | "module" => {
                current = parent;
            }
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(
            SourceLanguage::from_extension("ts"),
            Some(SourceLanguage::TypeScript)
        );
        assert_eq!(SourceLanguage::from_extension("tsx"), Some(SourceLanguage::Tsx));
        assert_eq!(SourceLanguage::from_extension("sql"), Some(SourceLanguage::Sql));
        assert_eq!(SourceLanguage::from_extension("py"), None);
    }

    #[test]
    fn test_sql_sources_are_not_patchable() {
        assert!(!SourceLanguage::Sql.patchable());
        assert!(SourceInspector::new(SourceLanguage::Sql).is_err());
    }

    #[test]
    fn test_finds_sql_tagged_templates() {
        let source = "const a = sql`select 1 as x`\nconst b = other`select 2`\n";
        let mut inspector = SourceInspector::new(SourceLanguage::TypeScript).unwrap();
        let inspection = inspector.inspect(source).unwrap();
        assert_eq!(inspection.call_sites.len(), 1);
        assert_eq!(inspection.call_sites[0].text, "sql`select 1 as x`");
    }

    #[test]
    fn test_call_site_spans_cover_tag_expression() {
        let source = "const a = sql`select 1 as x`\n";
        let mut inspector = SourceInspector::new(SourceLanguage::TypeScript).unwrap();
        let inspection = inspector.inspect(source).unwrap();
        let site = &inspection.call_sites[0];
        assert_eq!(&source[site.tag_start..site.template_start], "sql");
        assert_eq!(&source[site.start_byte..site.end_byte], site.text);
    }

    #[test]
    fn test_typed_call_site_span_includes_type_arguments() {
        let source = "const a = sql<queries.Old>`select 1 as x`\n";
        let mut inspector = SourceInspector::new(SourceLanguage::TypeScript).unwrap();
        let inspection = inspector.inspect(source).unwrap();
        assert_eq!(inspection.call_sites.len(), 1);
        let site = &inspection.call_sites[0];
        assert_eq!(&source[site.tag_start..site.template_start], "sql<queries.Old>");
    }

    #[test]
    fn test_finds_top_level_queries_region() {
        let source = "\
const a = 1

export declare namespace queries {
  export interface X {
    \"a\": number
  }
}
";
        let mut inspector = SourceInspector::new(SourceLanguage::TypeScript).unwrap();
        let inspection = inspector.inspect(source).unwrap();
        assert_eq!(inspection.region_spans.len(), 1);
        let (start, end) = inspection.region_spans[0];
        assert!(source[start..end].starts_with("export declare namespace queries {"));
        assert!(source[start..end].ends_with("}"));
    }

    #[test]
    fn test_other_namespaces_are_not_regions() {
        let source = "declare namespace other {\n  export interface X {}\n}\n";
        let mut inspector = SourceInspector::new(SourceLanguage::TypeScript).unwrap();
        let inspection = inspector.inspect(source).unwrap();
        assert!(inspection.region_spans.is_empty());
    }

    #[test]
    fn test_nested_queries_namespace_is_ignored() {
        let source = "function f() {\n  namespace queries {}\n}\n";
        let mut inspector = SourceInspector::new(SourceLanguage::TypeScript).unwrap();
        let inspection = inspector.inspect(source).unwrap();
        assert!(inspection.region_spans.is_empty());
    }

    #[test]
    fn test_tsx_sources_parse() {
        let source = "const a = sql`select 1 as x`\nconst el = <div>{a}</div>\n";
        let mut inspector = SourceInspector::new(SourceLanguage::Tsx).unwrap();
        let inspection = inspector.inspect(source).unwrap();
        assert_eq!(inspection.call_sites.len(), 1);
    }
}
