//! Tygres Core - Typed-query code generation for SQL tagged templates
//!
//! This crate turns untyped `sql`-tagged template call sites in TypeScript
//! source into statically-typed ones:
//! - Canonical identifiers and global tag assignment for query result shapes
//! - TypeScript interface rendering with documentation comments
//! - Tree-sitter based source patching via positional edits
//! - Output routing (in-file trailing block or separate imported module)

pub mod parser;
pub mod patch;
pub mod query;
pub mod render;
pub mod route;
pub mod tags;
pub mod write;

// Data model re-exports
pub use query::{AnalysedQuery, Field, TaggedQuery};

// Tag assignment re-exports
pub use tags::{assign_tags, build_tag_map};

// Rendering re-exports
pub use render::{render_interface, render_region, RenderError, QUERIES_NAMESPACE};

// Parsing and patching re-exports
pub use parser::{CallSite, Inspection, ParserError, SourceInspector, SourceLanguage};
pub use patch::{apply_edits, plan_edits, Edit, PatchError};

// Routing re-exports
pub use route::{DefaultQueriesModule, QueriesModuleResolver};

// Write pipeline re-exports
pub use write::{
    write_queries, DefaultFormatter, Formatter, WriteError, WriteOptions, WriteReport,
};
