//! Reference entity
//!
//! One entry in a document's ordered bibliography. The position is
//! persisted as a fixed-width, zero-padded sort key so that lexical and
//! numeric ordering coincide in the database.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Digits in a sort key. Bounds a document to 9999 references.
pub const SORT_KEY_WIDTH: usize = 4;

/// Encode a 1-based position as its zero-padded sort key ("0042").
pub fn encode_sort_key(position: u32) -> String {
    format!("{:0width$}", position, width = SORT_KEY_WIDTH)
}

/// Decode a sort key back to its numeric position. Unparseable keys decode
/// to 0, which no live reference ever holds.
pub fn decode_sort_key(sort_key: &str) -> u32 {
    sort_key.trim().parse().unwrap_or(0)
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document_references")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub document_id: Uuid,

    /// Zero-padded position key; see [`encode_sort_key`]
    #[sea_orm(column_type = "Text")]
    pub sort_key: String,

    /// Author names as a JSONB array of strings
    #[sea_orm(column_type = "JsonBinary")]
    pub authors: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub year: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub journal: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub volume: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub issue: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub pages: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub doi: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub url: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub publisher: Option<String>,

    /// Human-readable rendered form of the entry
    #[sea_orm(column_type = "Text")]
    pub rendered: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// The 1-based position this reference currently holds.
    pub fn position(&self) -> u32 {
        decode_sort_key(&self.sort_key)
    }

    /// Author list decoded from the JSONB column.
    pub fn author_list(&self) -> Vec<String> {
        serde_json::from_value(self.authors.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document::Entity",
        from = "Column::DocumentId",
        to = "super::document::Column::Id",
        on_delete = "Cascade"
    )]
    Document,

    #[sea_orm(has_many = "super::citation_reference::Entity", on_delete = "Cascade")]
    CitationLinks,
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_round_trip() {
        assert_eq!(encode_sort_key(1), "0001");
        assert_eq!(encode_sort_key(42), "0042");
        assert_eq!(encode_sort_key(9999), "9999");
        assert_eq!(decode_sort_key("0042"), 42);
        assert_eq!(decode_sort_key(&encode_sort_key(137)), 137);
    }

    #[test]
    fn test_sort_key_lexical_order_matches_numeric() {
        let keys: Vec<String> = [3u32, 17, 100, 1042].iter().map(|&p| encode_sort_key(p)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_decode_garbage_is_zero() {
        assert_eq!(decode_sort_key("not-a-key"), 0);
        assert_eq!(decode_sort_key(""), 0);
    }
}
