//! Position mapping builder
//!
//! Computes an old-position -> new-position map over the current reference
//! ordering for each reorder strategy. A map is total: every current
//! position appears exactly once, either moved or (for deletes) marked
//! deleted.

use std::collections::BTreeMap;

use crate::rewrite;
use crate::snapshot::{CitationEntry, DocumentSnapshot, ReferenceEntry};

/// Where a position goes under a mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// The reference now lives at this 1-based position.
    Position(u32),

    /// The reference was removed; numerals pointing here are orphaned.
    Deleted,
}

/// Total map from every current position to its target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionMap {
    targets: BTreeMap<u32, Target>,
}

impl PositionMap {
    /// The identity map over `1..=n`.
    pub fn identity(n: u32) -> Self {
        let targets = (1..=n).map(|p| (p, Target::Position(p))).collect();
        Self { targets }
    }

    /// Look up the target for an old position. Numerals outside the current
    /// reference range have no entry and are treated as unresolvable by the
    /// rewriter.
    pub fn lookup(&self, old_position: u32) -> Option<Target> {
        self.targets.get(&old_position).copied()
    }

    /// Number of positions covered.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// True when every position maps to itself (a no-op pass).
    pub fn is_identity(&self) -> bool {
        self.targets
            .iter()
            .all(|(&old, &target)| target == Target::Position(old))
    }

    /// Iterate `(old_position, target)` pairs in ascending old-position
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Target)> + '_ {
        self.targets.iter().map(|(&old, &target)| (old, target))
    }

    fn insert(&mut self, old: u32, target: Target) {
        self.targets.insert(old, target);
    }
}

/// Map for moving the reference at `old_position` to `new_position`.
///
/// Everything between the two slots shifts one place in the vacated
/// direction; the rest is identity. Both positions must already be
/// validated against `1..=n`.
pub fn move_map(n: u32, old_position: u32, new_position: u32) -> PositionMap {
    let mut map = PositionMap::identity(n);

    if old_position == new_position {
        return map;
    }

    map.insert(old_position, Target::Position(new_position));

    if new_position < old_position {
        // Moving up: the block it jumped over shifts down one slot.
        for p in new_position..old_position {
            map.insert(p, Target::Position(p + 1));
        }
    } else {
        // Moving down: the block shifts up into the vacated slot.
        for p in (old_position + 1)..=new_position {
            map.insert(p, Target::Position(p - 1));
        }
    }

    map
}

/// Map for deleting the reference at `deleted_position`: that position is
/// marked deleted and every higher position shifts down by one, leaving a
/// dense `1..N-1`.
pub fn delete_map(n: u32, deleted_position: u32) -> PositionMap {
    let mut map = PositionMap::default();

    for p in 1..=n {
        if p == deleted_position {
            map.insert(p, Target::Deleted);
        } else if p > deleted_position {
            map.insert(p, Target::Position(p - 1));
        } else {
            map.insert(p, Target::Position(p));
        }
    }

    map
}

/// Build a map from the old positions listed in their new order: the first
/// element becomes position 1, and so on.
fn from_new_order(old_positions_in_new_order: &[u32]) -> PositionMap {
    let mut map = PositionMap::default();
    for (index, &old) in old_positions_in_new_order.iter().enumerate() {
        map.insert(old, Target::Position(index as u32 + 1));
    }
    map
}

/// Alphabetical order by first author's surname, case-insensitive.
///
/// Entries without an author sort last. The sort is stable, so ties keep
/// their original relative order.
pub fn alphabetical_map(references: &[&ReferenceEntry]) -> PositionMap {
    let mut ordered: Vec<&ReferenceEntry> = references.to_vec();
    ordered.sort_by_key(|r| {
        let surname = r.first_author_surname();
        (surname.is_none(), surname, r.position)
    });

    let new_order: Vec<u32> = ordered.iter().map(|r| r.position).collect();
    from_new_order(&new_order)
}

/// Year order, descending by default. Missing or non-numeric years sort
/// last regardless of direction; ties keep their original relative order.
pub fn year_map(references: &[&ReferenceEntry], ascending: bool) -> PositionMap {
    let mut ordered: Vec<&ReferenceEntry> = references.to_vec();
    ordered.sort_by_key(|r| {
        let year = r.numeric_year();
        let key = year.map(|y| if ascending { y } else { -y });
        (key.is_none(), key, r.position)
    });

    let new_order: Vec<u32> = ordered.iter().map(|r| r.position).collect();
    from_new_order(&new_order)
}

/// First-appearance order: scan numeric citations in document order and
/// give each reference the ordinal of the first numeral that resolves to
/// it. References never cited follow all cited ones, keeping their original
/// relative order.
pub fn appearance_map(
    references: &[&ReferenceEntry],
    citations_in_order: &[&CitationEntry],
) -> PositionMap {
    let n = references.len() as u32;
    let mut new_order: Vec<u32> = Vec::with_capacity(references.len());
    let mut placed = vec![false; references.len() + 1];

    for citation in citations_in_order {
        for number in rewrite::marker_numbers(&citation.raw_text) {
            if number >= 1 && number <= n && !placed[number as usize] {
                placed[number as usize] = true;
                new_order.push(number);
            }
        }
    }

    for reference in references {
        let p = reference.position;
        if p >= 1 && p <= n && !placed[p as usize] {
            placed[p as usize] = true;
            new_order.push(p);
        }
    }

    from_new_order(&new_order)
}

/// Convenience wrapper building the appearance map straight from a
/// snapshot.
pub fn appearance_map_for(snapshot: &DocumentSnapshot) -> PositionMap {
    let references = snapshot.ordered_references();
    let citations = snapshot.numeric_citations_in_order();
    appearance_map(&references, &citations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::CitationKind;
    use uuid::Uuid;

    fn reference(position: u32, author: Option<&str>, year: Option<&str>) -> ReferenceEntry {
        ReferenceEntry {
            id: Uuid::new_v4(),
            position,
            authors: author.map(|a| vec![a.to_string()]).unwrap_or_default(),
            year: year.map(String::from),
        }
    }

    fn citation(paragraph: u32, offset: u32, raw: &str) -> CitationEntry {
        CitationEntry {
            id: Uuid::new_v4(),
            kind: CitationKind::Numeric,
            raw_text: raw.to_string(),
            paragraph_index: paragraph,
            char_start: offset,
            char_end: offset + raw.len() as u32,
        }
    }

    fn assert_bijection(map: &PositionMap, n: u32) {
        let mut seen = vec![false; n as usize + 1];
        assert_eq!(map.len(), n as usize);
        for (_, target) in map.iter() {
            match target {
                Target::Position(p) => {
                    assert!(p >= 1 && p <= n, "target {} out of range", p);
                    assert!(!seen[p as usize], "target {} hit twice", p);
                    seen[p as usize] = true;
                }
                Target::Deleted => panic!("unexpected deletion"),
            }
        }
    }

    #[test]
    fn test_move_to_front() {
        // Scenario: [A,B,C], move C to position 1 -> {1->2, 2->3, 3->1}
        let map = move_map(3, 3, 1);
        assert_eq!(map.lookup(1), Some(Target::Position(2)));
        assert_eq!(map.lookup(2), Some(Target::Position(3)));
        assert_eq!(map.lookup(3), Some(Target::Position(1)));
        assert_bijection(&map, 3);
    }

    #[test]
    fn test_move_toward_back() {
        let map = move_map(4, 1, 3);
        assert_eq!(map.lookup(1), Some(Target::Position(3)));
        assert_eq!(map.lookup(2), Some(Target::Position(1)));
        assert_eq!(map.lookup(3), Some(Target::Position(2)));
        assert_eq!(map.lookup(4), Some(Target::Position(4)));
        assert_bijection(&map, 4);
    }

    #[test]
    fn test_move_to_same_slot_is_identity() {
        assert!(move_map(5, 2, 2).is_identity());
    }

    #[test]
    fn test_delete_map() {
        // Scenario: delete position 2 of 3 -> {1->1, 2->DELETED, 3->2}
        let map = delete_map(3, 2);
        assert_eq!(map.lookup(1), Some(Target::Position(1)));
        assert_eq!(map.lookup(2), Some(Target::Deleted));
        assert_eq!(map.lookup(3), Some(Target::Position(2)));

        let deleted = map
            .iter()
            .filter(|(_, t)| *t == Target::Deleted)
            .count();
        assert_eq!(deleted, 1);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_alphabetical_missing_author_last() {
        let refs = vec![
            reference(1, None, None),
            reference(2, Some("Zhang, W."), None),
            reference(3, Some("abbott, K."), None),
        ];
        let ordered: Vec<&ReferenceEntry> = refs.iter().collect();
        let map = alphabetical_map(&ordered);

        assert_eq!(map.lookup(3), Some(Target::Position(1))); // abbott
        assert_eq!(map.lookup(2), Some(Target::Position(2))); // Zhang
        assert_eq!(map.lookup(1), Some(Target::Position(3))); // no author
        assert_bijection(&map, 3);
    }

    #[test]
    fn test_alphabetical_ties_stay_stable() {
        let refs = vec![
            reference(1, Some("Smith, A."), None),
            reference(2, Some("smith, B."), None),
        ];
        let ordered: Vec<&ReferenceEntry> = refs.iter().collect();
        let map = alphabetical_map(&ordered);

        assert_eq!(map.lookup(1), Some(Target::Position(1)));
        assert_eq!(map.lookup(2), Some(Target::Position(2)));
    }

    #[test]
    fn test_year_descending_default() {
        // Scenario: years [2010, 2023, 2015] -> {1->3, 2->1, 3->2}
        let refs = vec![
            reference(1, None, Some("2010")),
            reference(2, None, Some("2023")),
            reference(3, None, Some("2015")),
        ];
        let ordered: Vec<&ReferenceEntry> = refs.iter().collect();
        let map = year_map(&ordered, false);

        assert_eq!(map.lookup(1), Some(Target::Position(3)));
        assert_eq!(map.lookup(2), Some(Target::Position(1)));
        assert_eq!(map.lookup(3), Some(Target::Position(2)));
        assert_bijection(&map, 3);
    }

    #[test]
    fn test_year_ascending_and_missing_last() {
        let refs = vec![
            reference(1, None, Some("2020")),
            reference(2, None, Some("in press")),
            reference(3, None, Some("2001")),
        ];
        let ordered: Vec<&ReferenceEntry> = refs.iter().collect();
        let map = year_map(&ordered, true);

        assert_eq!(map.lookup(3), Some(Target::Position(1)));
        assert_eq!(map.lookup(1), Some(Target::Position(2)));
        assert_eq!(map.lookup(2), Some(Target::Position(3)));
    }

    #[test]
    fn test_appearance_order() {
        let refs = vec![
            reference(1, None, None),
            reference(2, None, None),
            reference(3, None, None),
            reference(4, None, None),
        ];
        let cites = vec![
            citation(0, 10, "[3]"),
            citation(0, 40, "(1, 3)"),
            citation(2, 5, "[2]"),
        ];
        let ordered_refs: Vec<&ReferenceEntry> = refs.iter().collect();
        let ordered_cites: Vec<&CitationEntry> = cites.iter().collect();
        let map = appearance_map(&ordered_refs, &ordered_cites);

        // First appearances: 3, then 1, then 2; 4 is never cited.
        assert_eq!(map.lookup(3), Some(Target::Position(1)));
        assert_eq!(map.lookup(1), Some(Target::Position(2)));
        assert_eq!(map.lookup(2), Some(Target::Position(3)));
        assert_eq!(map.lookup(4), Some(Target::Position(4)));
        assert_bijection(&map, 4);
    }

    #[test]
    fn test_appearance_ignores_out_of_range_numbers() {
        let refs = vec![reference(1, None, None), reference(2, None, None)];
        let cites = vec![citation(0, 0, "[9]"), citation(0, 5, "[2]")];
        let ordered_refs: Vec<&ReferenceEntry> = refs.iter().collect();
        let ordered_cites: Vec<&CitationEntry> = cites.iter().collect();
        let map = appearance_map(&ordered_refs, &ordered_cites);

        assert_eq!(map.lookup(2), Some(Target::Position(1)));
        assert_eq!(map.lookup(1), Some(Target::Position(2)));
    }
}
