//! Citation entity
//!
//! One in-text occurrence of one or more reference numbers. The engine
//! mutates `raw_text` in place on renumbering; citation rows are never
//! deleted by the consistency core.

use citesync_engine::CitationKind;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "citations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub document_id: Uuid,

    /// Raw marker text as it appears in the document ("(4, 5)", "[7-8]")
    #[sea_orm(column_type = "Text")]
    pub raw_text: String,

    /// Citation kind; only "numeric" participates in renumbering
    #[sea_orm(column_type = "Text")]
    pub kind: String,

    /// Paragraph ordinal in the source document
    pub paragraph_index: i32,

    /// Character offsets within the paragraph
    pub char_start: i32,

    pub char_end: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the citation kind as an enum; unknown values are treated as
    /// numeric, the common case in stored documents.
    pub fn citation_kind(&self) -> CitationKind {
        kind_from_str(&self.kind)
    }

    /// Whether this citation participates in renumbering
    pub fn is_numeric(&self) -> bool {
        self.citation_kind().is_numeric()
    }
}

/// Decode a stored kind string.
pub fn kind_from_str(s: &str) -> CitationKind {
    match s {
        "footnote" => CitationKind::Footnote,
        "endnote" => CitationKind::Endnote,
        "author_year" => CitationKind::AuthorYear,
        _ => CitationKind::Numeric,
    }
}

/// Encode a kind for storage.
pub fn kind_to_str(kind: CitationKind) -> &'static str {
    match kind {
        CitationKind::Numeric => "numeric",
        CitationKind::Footnote => "footnote",
        CitationKind::Endnote => "endnote",
        CitationKind::AuthorYear => "author_year",
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
    ReferenceLinks,
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
