//! Reorder/sorting engine
//!
//! Orchestrates move, sort, and delete requests over a document snapshot.
//! Each operation validates its inputs, builds a position map, recomputes
//! reference positions, rewrites citation text, and returns everything as
//! one immutable change set. No I/O happens here; committing the change set
//! is the persistence layer's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::mapping::{self, PositionMap, Target};
use crate::rewrite;
use crate::snapshot::DocumentSnapshot;
use crate::EngineError;

/// Direction for the year sort.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

/// One reference's old and new position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePlacement {
    pub reference_id: Uuid,
    pub old_position: u32,
    pub new_position: u32,
}

/// The reference removed by a delete operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedReference {
    pub reference_id: Uuid,
    pub old_position: u32,
}

/// Citations sharing one before/after text transformation, grouped so the
/// persistence layer can apply them as a single batched write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRewriteGroup {
    pub old_text: String,
    pub new_text: String,
    pub citation_ids: Vec<Uuid>,
}

impl CitationRewriteGroup {
    pub fn affected_count(&self) -> usize {
        self.citation_ids.len()
    }
}

/// The computed, not-yet-committed result of one operation.
///
/// `placements` lists every surviving reference with its updated position,
/// ordered by new position; `rewrites` covers only citations whose text
/// actually changes. An empty change set means the operation was a no-op.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub placements: Vec<ReferencePlacement>,
    pub deleted: Option<DeletedReference>,
    pub rewrites: Vec<CitationRewriteGroup>,

    /// Old number -> new number, surviving references only.
    pub mapping: BTreeMap<u32, u32>,
}

impl ChangeSet {
    pub fn is_noop(&self) -> bool {
        self.placements.is_empty() && self.deleted.is_none() && self.rewrites.is_empty()
    }

    /// Total number of citation rows the rewrites touch.
    pub fn citations_affected(&self) -> usize {
        self.rewrites.iter().map(|g| g.affected_count()).sum()
    }

    /// Number of references whose position actually changes.
    pub fn references_moved(&self) -> usize {
        self.placements
            .iter()
            .filter(|p| p.old_position != p.new_position)
            .count()
    }
}

impl DocumentSnapshot {
    /// Move one reference to a 1-based target position.
    pub fn move_reference(
        &self,
        reference_id: Uuid,
        new_position: u32,
    ) -> Result<ChangeSet, EngineError> {
        let n = self.reference_count();
        let reference = self
            .references
            .iter()
            .find(|r| r.id == reference_id)
            .ok_or(EngineError::NotFound { id: reference_id })?;

        if new_position < 1 || new_position > n {
            return Err(EngineError::InvalidPosition {
                position: new_position,
                len: n,
            });
        }

        let map = mapping::move_map(n, reference.position, new_position);
        Ok(self.build_change_set(map, None))
    }

    /// Re-sort alphabetically by first author's surname.
    pub fn sort_alphabetically(&self) -> ChangeSet {
        let references = self.ordered_references();
        let map = mapping::alphabetical_map(&references);
        self.build_change_set(map, None)
    }

    /// Re-sort by publication year.
    pub fn sort_by_year(&self, direction: SortDirection) -> ChangeSet {
        let references = self.ordered_references();
        let map = mapping::year_map(&references, direction == SortDirection::Ascending);
        self.build_change_set(map, None)
    }

    /// Re-sort by first appearance in the document's citations.
    pub fn sort_by_appearance(&self) -> ChangeSet {
        let map = mapping::appearance_map_for(self);
        self.build_change_set(map, None)
    }

    /// Delete one reference, shifting everything above it down a slot and
    /// orphaning citations that only pointed at it.
    pub fn delete_reference(&self, reference_id: Uuid) -> Result<ChangeSet, EngineError> {
        let n = self.reference_count();
        let reference = self
            .references
            .iter()
            .find(|r| r.id == reference_id)
            .ok_or(EngineError::NotFound { id: reference_id })?;

        let deleted = DeletedReference {
            reference_id,
            old_position: reference.position,
        };

        let map = mapping::delete_map(n, reference.position);
        Ok(self.build_change_set(map, Some(deleted)))
    }

    /// Assemble the change set for a computed position map.
    ///
    /// An identity map short-circuits to an empty change set, which is how a
    /// single-reference sort (or a move to the same slot) becomes a no-op.
    /// Deletes always produce a change set, even for the last remaining
    /// reference.
    fn build_change_set(&self, map: PositionMap, deleted: Option<DeletedReference>) -> ChangeSet {
        if deleted.is_none() && map.is_identity() {
            return ChangeSet::default();
        }

        let mut placements: Vec<ReferencePlacement> = Vec::with_capacity(self.references.len());
        let mut number_mapping = BTreeMap::new();

        for reference in &self.references {
            match map.lookup(reference.position) {
                Some(Target::Position(new_position)) => {
                    number_mapping.insert(reference.position, new_position);
                    placements.push(ReferencePlacement {
                        reference_id: reference.id,
                        old_position: reference.position,
                        new_position,
                    });
                }
                Some(Target::Deleted) | None => {}
            }
        }

        placements.sort_by_key(|p| p.new_position);

        // Group rewrites by identical before/after pair; one batched write
        // per group downstream.
        let mut groups: BTreeMap<(String, String), Vec<Uuid>> = BTreeMap::new();

        for citation in &self.citations {
            let result = rewrite::rewrite_citation(&citation.raw_text, citation.kind, &map);
            if result.changed {
                groups
                    .entry((citation.raw_text.clone(), result.text))
                    .or_default()
                    .push(citation.id);
            }
        }

        let rewrites: Vec<CitationRewriteGroup> = groups
            .into_iter()
            .map(|((old_text, new_text), citation_ids)| CitationRewriteGroup {
                old_text,
                new_text,
                citation_ids,
            })
            .collect();

        debug!(
            references = placements.len(),
            moved = placements
                .iter()
                .filter(|p| p.old_position != p.new_position)
                .count(),
            rewrite_groups = rewrites.len(),
            deleted = deleted.is_some(),
            "Change set computed"
        );

        ChangeSet {
            placements,
            deleted,
            rewrites,
            mapping: number_mapping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{CitationEntry, CitationKind, ReferenceEntry};

    fn reference(position: u32, author: &str, year: &str) -> ReferenceEntry {
        ReferenceEntry {
            id: Uuid::new_v4(),
            position,
            authors: vec![author.to_string()],
            year: Some(year.to_string()),
        }
    }

    fn citation(raw: &str, paragraph: u32, offset: u32) -> CitationEntry {
        CitationEntry {
            id: Uuid::new_v4(),
            kind: CitationKind::Numeric,
            raw_text: raw.to_string(),
            paragraph_index: paragraph,
            char_start: offset,
            char_end: offset + raw.len() as u32,
        }
    }

    fn snapshot(references: Vec<ReferenceEntry>, citations: Vec<CitationEntry>) -> DocumentSnapshot {
        DocumentSnapshot {
            references,
            citations,
        }
    }

    #[test]
    fn test_move_to_front_scenario() {
        // [A,B,C] at 1,2,3; move C to 1 -> order [C,A,B]; "(1,3)" -> "(1,2)".
        let refs = vec![
            reference(1, "Adams, A.", "2001"),
            reference(2, "Brown, B.", "2002"),
            reference(3, "Clark, C.", "2003"),
        ];
        let c_id = refs[2].id;
        let snap = snapshot(refs, vec![citation("(1,3)", 0, 0)]);

        let change_set = snap.move_reference(c_id, 1).unwrap();

        assert_eq!(change_set.mapping.get(&1), Some(&2));
        assert_eq!(change_set.mapping.get(&2), Some(&3));
        assert_eq!(change_set.mapping.get(&3), Some(&1));

        assert_eq!(change_set.placements[0].reference_id, c_id);
        assert_eq!(change_set.placements[0].new_position, 1);

        assert_eq!(change_set.rewrites.len(), 1);
        assert_eq!(change_set.rewrites[0].old_text, "(1,3)");
        assert_eq!(change_set.rewrites[0].new_text, "(1,2)");
    }

    #[test]
    fn test_move_unknown_reference() {
        let snap = snapshot(vec![reference(1, "A", "2000")], vec![]);
        let missing = Uuid::new_v4();
        assert_eq!(
            snap.move_reference(missing, 1),
            Err(EngineError::NotFound { id: missing })
        );
    }

    #[test]
    fn test_move_position_out_of_range() {
        let refs = vec![reference(1, "A", "2000"), reference(2, "B", "2001")];
        let id = refs[0].id;
        let snap = snapshot(refs, vec![]);

        assert_eq!(
            snap.move_reference(id, 0),
            Err(EngineError::InvalidPosition { position: 0, len: 2 })
        );
        assert_eq!(
            snap.move_reference(id, 3),
            Err(EngineError::InvalidPosition { position: 3, len: 2 })
        );
    }

    #[test]
    fn test_move_to_current_slot_is_noop() {
        let refs = vec![reference(1, "A", "2000"), reference(2, "B", "2001")];
        let id = refs[1].id;
        let snap = snapshot(refs, vec![citation("[2]", 0, 0)]);

        let change_set = snap.move_reference(id, 2).unwrap();
        assert!(change_set.is_noop());
    }

    #[test]
    fn test_single_reference_sort_is_noop() {
        let snap = snapshot(vec![reference(1, "Solo, S.", "1999")], vec![]);
        assert!(snap.sort_alphabetically().is_noop());
        assert!(snap.sort_by_year(SortDirection::default()).is_noop());
        assert!(snap.sort_by_appearance().is_noop());
    }

    #[test]
    fn test_sort_by_year_descending_scenario() {
        // Years [2010, 2023, 2015] -> map {1->3, 2->1, 3->2}.
        let refs = vec![
            reference(1, "A", "2010"),
            reference(2, "B", "2023"),
            reference(3, "C", "2015"),
        ];
        let snap = snapshot(refs, vec![]);

        let change_set = snap.sort_by_year(SortDirection::Descending);
        assert_eq!(change_set.mapping.get(&1), Some(&3));
        assert_eq!(change_set.mapping.get(&2), Some(&1));
        assert_eq!(change_set.mapping.get(&3), Some(&2));
    }

    #[test]
    fn test_sort_alphabetical_rewrites_citations() {
        let refs = vec![
            reference(1, "Young, Y.", "2001"),
            reference(2, "Abbott, A.", "2002"),
        ];
        let snap = snapshot(refs, vec![citation("[1]", 0, 0), citation("[2]", 1, 0)]);

        let change_set = snap.sort_alphabetically();
        assert_eq!(change_set.mapping.get(&1), Some(&2));
        assert_eq!(change_set.mapping.get(&2), Some(&1));
        assert_eq!(change_set.rewrites.len(), 2);
    }

    #[test]
    fn test_sort_by_appearance() {
        let refs = vec![
            reference(1, "A", "2000"),
            reference(2, "B", "2001"),
            reference(3, "C", "2002"),
        ];
        // Position 3 is cited first, then 1; 2 is never cited.
        let cites = vec![citation("[3]", 0, 4), citation("(1)", 0, 30)];
        let snap = snapshot(refs, cites);

        let change_set = snap.sort_by_appearance();
        assert_eq!(change_set.mapping.get(&3), Some(&1));
        assert_eq!(change_set.mapping.get(&1), Some(&2));
        assert_eq!(change_set.mapping.get(&2), Some(&3));
    }

    #[test]
    fn test_delete_scenario() {
        // Delete position 2 of 3: "[2]" orphans, "[1,2]" drops to "[1]".
        let refs = vec![
            reference(1, "A", "2000"),
            reference(2, "B", "2001"),
            reference(3, "C", "2002"),
        ];
        let b_id = refs[1].id;
        let cites = vec![citation("[2]", 0, 0), citation("[1,2]", 1, 0), citation("[3]", 2, 0)];
        let snap = snapshot(refs, cites);

        let change_set = snap.delete_reference(b_id).unwrap();

        let deleted = change_set.deleted.unwrap();
        assert_eq!(deleted.reference_id, b_id);
        assert_eq!(deleted.old_position, 2);

        assert_eq!(change_set.placements.len(), 2);
        assert_eq!(change_set.mapping.get(&1), Some(&1));
        assert_eq!(change_set.mapping.get(&3), Some(&2));
        assert!(!change_set.mapping.contains_key(&2));

        let texts: Vec<(&str, &str)> = change_set
            .rewrites
            .iter()
            .map(|g| (g.old_text.as_str(), g.new_text.as_str()))
            .collect();
        assert!(texts.contains(&("[2]", "[orphaned]")));
        assert!(texts.contains(&("[1,2]", "[1]")));
        assert!(texts.contains(&("[3]", "[2]")));
    }

    #[test]
    fn test_delete_unknown_reference() {
        let snap = snapshot(vec![reference(1, "A", "2000")], vec![]);
        let missing = Uuid::new_v4();
        assert_eq!(
            snap.delete_reference(missing),
            Err(EngineError::NotFound { id: missing })
        );
    }

    #[test]
    fn test_delete_last_remaining_reference() {
        let refs = vec![reference(1, "A", "2000")];
        let id = refs[0].id;
        let snap = snapshot(refs, vec![citation("[1]", 0, 0)]);

        let change_set = snap.delete_reference(id).unwrap();
        assert!(!change_set.is_noop());
        assert!(change_set.placements.is_empty());
        assert_eq!(change_set.rewrites[0].new_text, "[orphaned]");
    }

    #[test]
    fn test_identical_rewrites_are_grouped() {
        let refs = vec![
            reference(1, "A", "2000"),
            reference(2, "B", "2001"),
            reference(3, "C", "2002"),
        ];
        let b_id = refs[1].id;
        // Three citations with identical text collapse into one group.
        let cites = vec![citation("[2]", 0, 0), citation("[2]", 1, 0), citation("[2]", 2, 0)];
        let snap = snapshot(refs, cites);

        let change_set = snap.delete_reference(b_id).unwrap();
        assert_eq!(change_set.rewrites.len(), 1);
        assert_eq!(change_set.rewrites[0].affected_count(), 3);
        assert_eq!(change_set.citations_affected(), 3);
    }

    #[test]
    fn test_non_numeric_citations_never_rewritten() {
        let refs = vec![reference(1, "A", "2000"), reference(2, "B", "2001")];
        let b_id = refs[1].id;
        let mut author_year = citation("(Brown, 2001)", 0, 0);
        author_year.kind = CitationKind::AuthorYear;
        let snap = snapshot(refs, vec![author_year]);

        let change_set = snap.delete_reference(b_id).unwrap();
        assert!(change_set.rewrites.is_empty());
    }

    #[test]
    fn test_orphan_completeness_after_delete() {
        // No citation may keep a numeral pointing at a now-missing position.
        let refs = vec![
            reference(1, "A", "2000"),
            reference(2, "B", "2001"),
            reference(3, "C", "2002"),
        ];
        let deleted_id = refs[2].id;
        let cites = vec![citation("[3]", 0, 0), citation("[1-3]", 1, 0), citation("(2,3)", 2, 0)];
        let snap = snapshot(refs, cites);

        let change_set = snap.delete_reference(deleted_id).unwrap();

        let remaining = snap.reference_count() - 1;
        for group in &change_set.rewrites {
            for n in crate::rewrite::marker_numbers(&group.new_text) {
                assert!(n >= 1 && n <= remaining, "dangling numeral {}", n);
            }
        }
    }
}
