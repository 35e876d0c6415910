//! Change record entity
//!
//! Audit entry capturing one distinct before/after citation text
//! transformation from a renumbering pass. The non-reverted records for a
//! document always describe only the most recent pass; each new pass marks
//! the previous ones reverted before inserting its own.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Operation tag for renumbering passes.
pub const OPERATION_RENUMBER: &str = "renumber";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "change_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub document_id: Uuid,

    /// Operation type, e.g. "renumber"
    #[sea_orm(column_type = "Text")]
    pub operation: String,

    #[sea_orm(column_type = "Text")]
    pub old_text: String,

    #[sea_orm(column_type = "Text")]
    pub new_text: String,

    /// How many citation rows shared this transformation
    pub affected_count: i32,

    pub reverted: bool,

    pub created_at: DateTimeWithTimeZone,
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
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
