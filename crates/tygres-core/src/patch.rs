//! Source Patching
//!
//! This module computes and applies positional text edits to a source file:
//! deleting any existing generated-declarations region wholesale and
//! rewriting `sql` tag expressions to carry the resolved type name.
//!
//! Edits are `(start, end, replacement)` byte spans derived from the syntax
//! tree walk in [`crate::parser`]. They are applied back-to-front (sorted
//! descending by end offset) so earlier offsets stay valid regardless of how
//! replacement text changes length at later offsets. Overlapping edits are a
//! fatal error, never silent corruption.

use thiserror::Error;

use crate::parser::Inspection;
use crate::query::TaggedQuery;
use crate::render::QUERIES_NAMESPACE;

// ============================================================================
// Patch Errors
// ============================================================================

/// Errors that can occur while applying edits.
#[derive(Debug, Error)]
pub enum PatchError {
    /// Two scheduled edits overlap. The edit plan is invalid and the file
    /// must not be written.
    #[error("overlapping edits: {first_start}..{first_end} and {second_start}..{second_end}")]
    OverlappingEdits {
        first_start: usize,
        first_end: usize,
        second_start: usize,
        second_end: usize,
    },

    /// An edit extends past the end of the text.
    #[error("edit {start}..{end} is out of bounds for text of length {len}")]
    OutOfBounds { start: usize, end: usize, len: usize },
}

// ============================================================================
// Edits
// ============================================================================

/// A single positional text replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// Start byte offset into the original text.
    pub start: usize,
    /// End byte offset (exclusive) into the original text.
    pub end: usize,
    /// Replacement text; empty for deletions.
    pub replacement: String,
}

/// Compute the edit set for one source file.
///
/// Existing generated regions are scheduled for deletion. Each `sql` call
/// site is matched against the file's query group by exact call-site text;
/// the first matching query wins, and duplicate identical call-site text is
/// not disambiguated beyond that. Call sites with no matching query are left
/// unmodified, since a file may legitimately contain unanalysed queries.
pub fn plan_edits(inspection: &Inspection, group: &[TaggedQuery]) -> Vec<Edit> {
    let mut edits = Vec::new();

    for &(start, end) in &inspection.region_spans {
        edits.push(Edit {
            start,
            end,
            replacement: String::new(),
        });
    }

    for site in &inspection.call_sites {
        let Some(query) = group.iter().find(|q| q.query.text == site.text) else {
            continue;
        };
        edits.push(Edit {
            start: site.tag_start,
            end: site.template_start,
            replacement: format!("sql<{}.{}>", QUERIES_NAMESPACE, query.tag),
        });
    }

    edits
}

/// Apply a set of non-overlapping edits to the original text.
///
/// Edits are sorted descending by end offset and spliced sequentially from
/// the end of the text toward the start.
pub fn apply_edits(source: &str, edits: &[Edit]) -> Result<String, PatchError> {
    let mut ordered: Vec<&Edit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.end.cmp(&a.end).then(b.start.cmp(&a.start)));

    for pair in ordered.windows(2) {
        let (later, earlier) = (pair[0], pair[1]);
        if earlier.end > later.start {
            return Err(PatchError::OverlappingEdits {
                first_start: earlier.start,
                first_end: earlier.end,
                second_start: later.start,
                second_end: later.end,
            });
        }
    }

    let mut text = source.to_string();
    for edit in ordered {
        if edit.end > text.len() || edit.start > edit.end {
            return Err(PatchError::OutOfBounds {
                start: edit.start,
                end: edit.end,
                len: text.len(),
            });
        }
        text.replace_range(edit.start..edit.end, &edit.replacement);
    }
    Ok(text)
}
