//! Query Data Model
//!
//! This module defines the records exchanged with the query-analysis
//! collaborator and the canonical identifier used to decide whether two
//! queries may share one generated type.
//!
//! The analysis collaborator discovers `sql`-tagged template call sites and
//! runs the queries against a live database to infer column types and
//! nullability. Its output is a list of [`AnalysedQuery`] records, which is
//! the sole input to the code-generation pipeline in this crate.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// Field
// ============================================================================

/// A single output column of an analysed query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Column name as it appears in the result set.
    pub name: String,
    /// Rendered scalar TypeScript type expression (e.g. `number`, `string`).
    pub typescript: String,
    /// Whether the column is known to be non-nullable.
    pub not_null: bool,
    /// Schema-qualified source column (e.g. `public.test_table.foo`), when
    /// the analyser could trace the output back to a table column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Native database type name (regtype), when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdesc: Option<String>,
    /// Free-text comment attached to the source column, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// ============================================================================
// Analysed Query
// ============================================================================

/// A query call site discovered and analysed by the external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysedQuery {
    /// Source file the call site was found in.
    pub file: PathBuf,
    /// Normalized query text.
    pub sql: String,
    /// Exact original call-site source text. Used to locate the call site in
    /// the syntax tree when patching, so it must match the file byte-for-byte.
    pub text: String,
    /// Output columns of the query.
    pub fields: Vec<Field>,
    /// Candidate type names, ordered from most to least preferred, computed
    /// by the external namer from referenced tables and columns.
    pub suggested_tags: Vec<String>,
    /// Free text extracted near the query (e.g. a leading comment).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl AnalysedQuery {
    /// Compute the canonical identifier for this query's result shape.
    ///
    /// Two queries are interchangeable for typing purposes iff their
    /// identifiers are equal. The encoding is the order-preserving JSON
    /// serialization of the full field records, so name, type, nullability
    /// and provenance all participate in the equality key.
    pub fn identifier(&self) -> String {
        serde_json::to_string(&self.fields).expect("field records are always serializable")
    }
}

// ============================================================================
// Tagged Query
// ============================================================================

/// An analysed query with its resolved canonical type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedQuery {
    /// The underlying analysed query.
    #[serde(flatten)]
    pub query: AnalysedQuery,
    /// Resolved canonical type name for the query's result shape.
    pub tag: String,
}

impl TaggedQuery {
    /// Canonical identifier of the underlying query.
    pub fn identifier(&self) -> String {
        self.query.identifier()
    }
}
