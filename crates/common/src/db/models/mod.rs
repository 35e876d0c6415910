//! SeaORM entity models
//!
//! Database entities for CiteSync

mod change_record;
mod citation;
mod citation_reference;
mod document;
mod reference;
mod tenant;

pub use tenant::{
    Entity as TenantEntity,
    Model as Tenant,
    ActiveModel as TenantActiveModel,
    Column as TenantColumn,
};

pub use document::{
    Entity as DocumentEntity,
    Model as Document,
    ActiveModel as DocumentActiveModel,
    Column as DocumentColumn,
};

pub use reference::{
    decode_sort_key,
    encode_sort_key,
    Entity as ReferenceEntity,
    Model as Reference,
    ActiveModel as ReferenceActiveModel,
    Column as ReferenceColumn,
    SORT_KEY_WIDTH,
};

pub use citation::{
    kind_from_str,
    kind_to_str,
    Entity as CitationEntity,
    Model as Citation,
    ActiveModel as CitationActiveModel,
    Column as CitationColumn,
};

pub use citation_reference::{
    Entity as CitationReferenceEntity,
    Model as CitationReference,
    ActiveModel as CitationReferenceActiveModel,
    Column as CitationReferenceColumn,
};

pub use change_record::{
    Entity as ChangeRecordEntity,
    Model as ChangeRecord,
    ActiveModel as ChangeRecordActiveModel,
    Column as ChangeRecordColumn,
    OPERATION_RENUMBER,
};
