//! Citation-reference link entity
//!
//! Records which citation numbers currently resolve to which reference, so
//! the mapping does not have to be re-derived from marker text on every
//! pass.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "citation_references")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub citation_id: Uuid,

    pub reference_id: Uuid,

    /// The marker numeral through which the citation names the reference
    pub marker_number: i32,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::citation::Entity",
        from = "Column::CitationId",
        to = "super::citation::Column::Id",
        on_delete = "Cascade"
    )]
    Citation,

    #[sea_orm(
        belongs_to = "super::reference::Entity",
        from = "Column::ReferenceId",
        to = "super::reference::Column::Id",
        on_delete = "Cascade"
    )]
    Reference,
}

impl Related<super::citation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Citation.def()
    }
}

impl Related<super::reference::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reference.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
