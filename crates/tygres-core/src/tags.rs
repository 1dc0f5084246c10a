//! Tag Assignment
//!
//! This module picks one canonical type name ("tag") per distinct query
//! result shape, resolving collisions between queries that prefer the same
//! name.
//!
//! Assignment runs once, globally, over every analysed query across all
//! files. This is the pipeline's only ordering barrier: no file may be
//! rewritten before the full tag map exists, because a tag chosen for a
//! query in one file must stay consistent with queries discovered in other
//! files.
//!
//! The algorithm is a sequence of pure list transformations:
//!
//! 1. Expand each query into one candidate per suggested tag.
//! 2. Stable-sort candidates ascending by how many alternatives their query
//!    has. Queries with fewer naming options claim their preferred name
//!    before queries with room to fall back.
//! 3. For each candidate, find the first candidate in the sorted order with
//!    the same tag string. Same identifier: the name is shared, keep it.
//!    Different identifier: the name is taken, suffix with the claimant's
//!    position in the sorted array.
//! 4. Stable-sort exact claims before suffixed ones, then keep the first
//!    surviving candidate per identifier.
//!
//! The numeric suffix is a positional index into the intermediate sorted
//! array. It is deterministic for a given input order but not stable if the
//! upstream ordering changes.

use std::collections::HashMap;

use tracing::debug;

use crate::query::{AnalysedQuery, TaggedQuery};

/// Fallback name for queries the namer produced no suggestions for.
const FALLBACK_TAG: &str = "Query";

// ============================================================================
// Candidates
// ============================================================================

/// One (query result shape, proposed name) pairing under consideration.
#[derive(Debug, Clone)]
struct Candidate {
    /// Canonical identifier of the proposing query's result shape.
    identifier: String,
    /// Proposed tag string.
    tag: String,
    /// Total number of suggestions the proposing query has.
    alternatives: usize,
}

/// Whether a candidate kept its proposed name or had to be suffixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Priority {
    /// The first claimant of this tag string shares the candidate's
    /// identifier, so the bare name is kept.
    Exact,
    /// The tag string was first claimed by a different result shape; the
    /// candidate's tag was rewritten with a numeric suffix.
    Collision,
}

// ============================================================================
// Assignment
// ============================================================================

/// Resolve a tag for every analysed query.
///
/// Queries with equal identifiers receive equal tags, and each query gets
/// the most preferred candidate from its `suggested_tags` that survives
/// collision resolution.
pub fn assign_tags(queries: &[AnalysedQuery]) -> Vec<TaggedQuery> {
    let map = build_tag_map(queries);
    queries
        .iter()
        .map(|query| {
            let tag = map
                .get(&query.identifier())
                .cloned()
                .unwrap_or_else(|| FALLBACK_TAG.to_string());
            TaggedQuery {
                query: query.clone(),
                tag,
            }
        })
        .collect()
}

/// Build the global identifier → tag map.
pub fn build_tag_map(queries: &[AnalysedQuery]) -> HashMap<String, String> {
    let candidates = expand_candidates(queries);
    let resolved = resolve_collisions(&candidates);
    let map = dedupe_by_identifier(resolved);
    debug!(
        queries = queries.len(),
        shapes = map.len(),
        "assigned tags"
    );
    map
}

/// Expand queries into candidate records, sorted ascending by the number of
/// alternatives the proposing query has. The sort is stable, so ties keep
/// the input order and repeated runs are deterministic.
fn expand_candidates(queries: &[AnalysedQuery]) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for query in queries {
        let identifier = query.identifier();
        if query.suggested_tags.is_empty() {
            candidates.push(Candidate {
                identifier: identifier.clone(),
                tag: FALLBACK_TAG.to_string(),
                alternatives: 1,
            });
            continue;
        }
        for tag in &query.suggested_tags {
            candidates.push(Candidate {
                identifier: identifier.clone(),
                tag: tag.clone(),
                alternatives: query.suggested_tags.len(),
            });
        }
    }
    candidates.sort_by_key(|c| c.alternatives);
    candidates
}

/// Rewrite tags of candidates whose proposed name was first claimed by a
/// different result shape.
fn resolve_collisions(candidates: &[Candidate]) -> Vec<(Candidate, Priority)> {
    candidates
        .iter()
        .map(|candidate| {
            // The first occurrence is at or before this candidate's own
            // position, since the candidate matches its own tag string.
            let first = candidates
                .iter()
                .position(|other| other.tag == candidate.tag)
                .expect("candidate matches itself");
            if candidates[first].identifier == candidate.identifier {
                (candidate.clone(), Priority::Exact)
            } else {
                let suffixed = Candidate {
                    identifier: candidate.identifier.clone(),
                    tag: format!("{}_{}", candidate.tag, first),
                    alternatives: candidate.alternatives,
                };
                (suffixed, Priority::Collision)
            }
        })
        .collect()
}

/// Keep the highest-priority surviving candidate per identifier.
fn dedupe_by_identifier(mut resolved: Vec<(Candidate, Priority)>) -> HashMap<String, String> {
    // Stable: exact claims precede suffixed ones, input order otherwise.
    resolved.sort_by_key(|(_, priority)| *priority);
    let mut map = HashMap::new();
    for (candidate, _) in resolved {
        map.entry(candidate.identifier).or_insert(candidate.tag);
    }
    map
}
