//! Interface Rendering
//!
//! This module turns groups of tagged queries into TypeScript declaration
//! text: one `export interface` per tag, wrapped in the single
//! `export declare namespace queries` block a source file may own.
//!
//! Queries sharing a tag share a result shape by construction, so every
//! query in a group must render the identical field body. A mismatch means
//! tag assignment handed out one name for two shapes, which is a logic
//! defect upstream, not recoverable per-query data; rendering aborts the
//! whole batch.

use std::collections::HashMap;

use thiserror::Error;

use crate::query::{Field, TaggedQuery};

/// Name of the namespace block owning all generated declarations in a file.
pub const QUERIES_NAMESPACE: &str = "queries";

/// Maximum length of a query text quoted in a documentation comment.
const QUERY_DOC_MAX: usize = 100;

// ============================================================================
// Render Errors
// ============================================================================

/// Errors that can occur while rendering declarations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Queries sharing a tag rendered different field bodies. Indicates a
    /// defect in tag assignment; the batch must not be written.
    #[error("queries tagged `{tag}` render different field bodies; refusing to write an inconsistent batch")]
    InconsistentGroup {
        /// The tag whose group disagreed.
        tag: String,
    },
}

// ============================================================================
// Region Rendering
// ============================================================================

/// Render the full generated-declarations region for one file's queries.
///
/// Interfaces appear in first-use order of their tags, separated by blank
/// lines, inside a single `export declare namespace queries` block.
pub fn render_region(queries: &[TaggedQuery]) -> Result<String, RenderError> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&TaggedQuery>> = HashMap::new();
    for query in queries {
        let group = groups.entry(query.tag.as_str()).or_default();
        if group.is_empty() {
            order.push(query.tag.as_str());
        }
        group.push(query);
    }

    let mut out = format!("export declare namespace {} {{\n", QUERIES_NAMESPACE);
    for (i, tag) in order.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&render_interface(tag, &groups[tag], "  ")?);
    }
    out.push('}');
    Ok(out)
}

/// Render one `export interface` declaration for a tag group.
pub fn render_interface(
    tag: &str,
    group: &[&TaggedQuery],
    indent: &str,
) -> Result<String, RenderError> {
    let field_indent = format!("{}  ", indent);
    let bodies: Vec<String> = group
        .iter()
        .map(|query| render_fields(&query.query.fields, &field_indent))
        .collect();
    if bodies.iter().any(|body| body != &bodies[0]) {
        return Err(RenderError::InconsistentGroup {
            tag: tag.to_string(),
        });
    }

    let mut doc_lines: Vec<String> = Vec::new();
    for query in group {
        let line = format!("- query: `{}`", normalize_query_text(&query.query.sql));
        if !doc_lines.contains(&line) {
            doc_lines.push(line);
        }
    }
    for query in group {
        if let Some(comment) = &query.query.comment {
            if !comment.is_empty() && !doc_lines.contains(comment) {
                doc_lines.push(comment.clone());
            }
        }
    }

    let mut out = doc_comment(&doc_lines, indent);
    out.push_str(&format!("{}export interface {} {{\n", indent, tag));
    out.push_str(&bodies[0]);
    out.push_str(&format!("{}}}\n", indent));
    Ok(out)
}

/// Render the property lines of an interface body.
///
/// The rendered text doubles as the group consistency key, so it must be a
/// pure function of the field records.
fn render_fields(fields: &[Field], indent: &str) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut doc_parts: Vec<String> = Vec::new();
        if let Some(comment) = &field.comment {
            if !comment.is_empty() {
                doc_parts.push(comment.clone());
            }
        }
        if let Some(column) = &field.column {
            doc_parts.push(format!("column: `{}`", column));
        }
        if field.not_null {
            doc_parts.push("not null: `true`".to_string());
        }
        if let Some(gdesc) = &field.gdesc {
            doc_parts.push(format!("regtype: `{}`", gdesc));
        }
        if !doc_parts.is_empty() {
            out.push_str(&doc_comment(&[doc_parts.join(", ")], indent));
        }
        out.push_str(&format!(
            "{}{}: {}\n",
            indent,
            quote_property(&field.name),
            field_type(field)
        ));
    }
    out
}

/// The TypeScript type expression for a field, with `| null` applied to
/// nullable columns unless the base type already absorbs null.
fn field_type(field: &Field) -> String {
    let universal = field.typescript == "any" || field.typescript == "unknown";
    if field.not_null || universal {
        field.typescript.clone()
    } else {
        format!("{} | null", field.typescript)
    }
}

/// Encode a column name as a safely quoted property key. Column names need
/// not be valid bare identifiers, so every key is quoted.
fn quote_property(name: &str) -> String {
    serde_json::to_string(name).expect("strings are always serializable")
}

/// Collapse whitespace runs and truncate long query texts for display.
fn normalize_query_text(sql: &str) -> String {
    let normalized = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() > QUERY_DOC_MAX {
        let truncated: String = normalized.chars().take(QUERY_DOC_MAX).collect();
        format!("{}...", truncated)
    } else {
        normalized
    }
}

/// Render a `/** ... */` documentation comment at the given indent.
///
/// Single-line when the content has no embedded line breaks, block comment
/// otherwise. Empty input renders nothing.
fn doc_comment(lines: &[String], indent: &str) -> String {
    let flattened: Vec<&str> = lines
        .iter()
        .flat_map(|line| line.lines())
        .filter(|line| !line.trim().is_empty())
        .collect();
    match flattened.as_slice() {
        [] => String::new(),
        [line] => format!("{}/** {} */\n", indent, line),
        many => {
            let mut out = format!("{}/**\n", indent);
            for line in many {
                out.push_str(&format!("{} * {}\n", indent, line));
            }
            out.push_str(&format!("{} */\n", indent));
            out
        }
    }
}
