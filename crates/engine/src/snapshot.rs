//! Per-document snapshot types
//!
//! The engine never reads live state; every operation takes one of these
//! immutable snapshots, loaded from storage by the caller. References arrive
//! ordered by position and citations in document order (paragraph index,
//! then character offset).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an in-text citation marks its targets.
///
/// Only numeric citations participate in renumbering; the other kinds pass
/// through every operation untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationKind {
    Numeric,
    Footnote,
    Endnote,
    AuthorYear,
}

impl CitationKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, CitationKind::Numeric)
    }
}

/// One bibliography entry as the engine sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub id: Uuid,

    /// 1-based ordinal in the reference list.
    pub position: u32,

    /// Author names as stored ("Surname, Initials" or "Given Surname").
    pub authors: Vec<String>,

    /// Publication year as stored; may be non-numeric ("in press").
    pub year: Option<String>,
}

impl ReferenceEntry {
    /// Surname of the first author, lowercased for case-insensitive
    /// comparison. `None` when the entry has no authors.
    pub fn first_author_surname(&self) -> Option<String> {
        let first = self.authors.first()?;
        let first = first.trim();
        if first.is_empty() {
            return None;
        }

        // "Smith, J." keeps the part before the comma; "Jane Smith" keeps
        // the final whitespace-separated token.
        let surname = match first.split_once(',') {
            Some((surname, _)) => surname,
            None => first.split_whitespace().next_back().unwrap_or(first),
        };

        Some(surname.trim().to_lowercase())
    }

    /// Publication year parsed from the leading digits of the stored value,
    /// so `"2010a"` still sorts as 2010. `None` for missing or non-numeric
    /// years, which sort after everything else.
    pub fn numeric_year(&self) -> Option<i32> {
        let year = self.year.as_deref()?.trim();
        let digits: String = year.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        digits.parse().ok()
    }
}

/// One in-text citation occurrence as the engine sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CitationEntry {
    pub id: Uuid,
    pub kind: CitationKind,

    /// Raw marker text, wrappers included (`"(4, 5)"`, `"[7-8]"`).
    pub raw_text: String,

    /// Paragraph ordinal within the source document.
    pub paragraph_index: u32,

    /// Character offsets within the paragraph.
    pub char_start: u32,
    pub char_end: u32,
}

/// Everything one renumbering operation needs, read once from storage.
#[derive(Clone, Debug, Default)]
pub struct DocumentSnapshot {
    pub references: Vec<ReferenceEntry>,
    pub citations: Vec<CitationEntry>,
}

impl DocumentSnapshot {
    /// Number of references in the snapshot.
    pub fn reference_count(&self) -> u32 {
        self.references.len() as u32
    }

    /// Numeric citations in document order.
    pub fn numeric_citations_in_order(&self) -> Vec<&CitationEntry> {
        let mut citations: Vec<&CitationEntry> = self
            .citations
            .iter()
            .filter(|c| c.kind.is_numeric())
            .collect();
        citations.sort_by_key(|c| (c.paragraph_index, c.char_start));
        citations
    }

    /// References ordered by their current position.
    pub(crate) fn ordered_references(&self) -> Vec<&ReferenceEntry> {
        let mut refs: Vec<&ReferenceEntry> = self.references.iter().collect();
        refs.sort_by_key(|r| r.position);
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(authors: &[&str], year: Option<&str>) -> ReferenceEntry {
        ReferenceEntry {
            id: Uuid::new_v4(),
            position: 1,
            authors: authors.iter().map(|s| s.to_string()).collect(),
            year: year.map(String::from),
        }
    }

    #[test]
    fn test_surname_comma_form() {
        let r = entry(&["Smith, J.", "Doe, A."], None);
        assert_eq!(r.first_author_surname(), Some("smith".to_string()));
    }

    #[test]
    fn test_surname_natural_form() {
        let r = entry(&["Jane van Smith"], None);
        assert_eq!(r.first_author_surname(), Some("smith".to_string()));
    }

    #[test]
    fn test_surname_missing() {
        assert_eq!(entry(&[], None).first_author_surname(), None);
        assert_eq!(entry(&["  "], None).first_author_surname(), None);
    }

    #[test]
    fn test_numeric_year() {
        assert_eq!(entry(&[], Some("2010")).numeric_year(), Some(2010));
        assert_eq!(entry(&[], Some("2010a")).numeric_year(), Some(2010));
        assert_eq!(entry(&[], Some("in press")).numeric_year(), None);
        assert_eq!(entry(&[], None).numeric_year(), None);
    }
}
