//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations with proper
//! error handling, plus the consistency transaction that commits an engine
//! change set as a single atomic unit.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use citesync_engine::{ChangeSet, CitationEntry, DocumentSnapshot, ReferenceEntry};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set, Statement, TransactionTrait,
};
use uuid::Uuid;

/// Counters describing what one committed change set touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedChangeSet {
    pub references_updated: usize,
    pub citations_updated: usize,
    pub records_written: usize,
    pub reference_deleted: bool,
}

/// Fields a reference edit may update. `None` leaves the stored value
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct ReferenceEdit {
    pub authors: Option<Vec<String>>,
    pub year: Option<String>,
    pub title: Option<String>,
    pub journal: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub publisher: Option<String>,
    pub rendered: Option<String>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

/// Commit-path failures are transient from the caller's perspective: the
/// transaction rolled back, nothing is partially visible, and a retry
/// against a fresh snapshot is safe.
fn transient(err: DbErr) -> AppError {
    AppError::TransientStorage {
        message: err.to_string(),
    }
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    /// Find a document scoped to its owning tenant.
    ///
    /// Returns `None` both when the document does not exist and when it
    /// belongs to a different tenant; callers turn either into the same
    /// not-found error.
    pub async fn find_document_for_tenant(
        &self,
        document_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<Document>> {
        DocumentEntity::find_by_id(document_id)
            .filter(DocumentColumn::TenantId.eq(tenant_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Reference Operations
    // ========================================================================

    /// List a document's references ordered by position.
    pub async fn list_references(&self, document_id: Uuid) -> Result<Vec<Reference>> {
        ReferenceEntity::find()
            .filter(ReferenceColumn::DocumentId.eq(document_id))
            .order_by_asc(ReferenceColumn::SortKey)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find one reference by ID.
    pub async fn find_reference_by_id(&self, reference_id: Uuid) -> Result<Option<Reference>> {
        ReferenceEntity::find_by_id(reference_id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Apply an edit to a reference's structured fields.
    pub async fn update_reference(
        &self,
        reference_id: Uuid,
        edit: ReferenceEdit,
    ) -> Result<Reference> {
        let mut reference: ReferenceActiveModel = ReferenceEntity::find_by_id(reference_id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::ReferenceNotFound {
                id: reference_id.to_string(),
            })?
            .into();

        if let Some(authors) = edit.authors {
            reference.authors = Set(serde_json::to_value(authors)?);
        }
        if let Some(year) = edit.year {
            reference.year = Set(Some(year));
        }
        if let Some(title) = edit.title {
            reference.title = Set(title);
        }
        if let Some(journal) = edit.journal {
            reference.journal = Set(Some(journal));
        }
        if let Some(volume) = edit.volume {
            reference.volume = Set(Some(volume));
        }
        if let Some(issue) = edit.issue {
            reference.issue = Set(Some(issue));
        }
        if let Some(pages) = edit.pages {
            reference.pages = Set(Some(pages));
        }
        if let Some(doi) = edit.doi {
            reference.doi = Set(Some(doi));
        }
        if let Some(url) = edit.url {
            reference.url = Set(Some(url));
        }
        if let Some(publisher) = edit.publisher {
            reference.publisher = Set(Some(publisher));
        }
        if let Some(rendered) = edit.rendered {
            reference.rendered = Set(rendered);
        }

        reference.updated_at = Set(chrono::Utc::now().into());

        reference.update(self.write_conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Citation Operations
    // ========================================================================

    /// List a document's citations in document order (paragraph index, then
    /// character offset), the order the appearance sort scans them in.
    pub async fn list_citations(&self, document_id: Uuid) -> Result<Vec<Citation>> {
        CitationEntity::find()
            .filter(CitationColumn::DocumentId.eq(document_id))
            .order_by_asc(CitationColumn::ParagraphIndex)
            .order_by_asc(CitationColumn::CharStart)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    /// Load the immutable per-document snapshot the engine operates on.
    pub async fn snapshot(&self, document_id: Uuid) -> Result<DocumentSnapshot> {
        let references = self.list_references(document_id).await?;
        let citations = self.list_citations(document_id).await?;

        Ok(DocumentSnapshot {
            references: references
                .iter()
                .map(|r| ReferenceEntry {
                    id: r.id,
                    position: r.position(),
                    authors: r.author_list(),
                    year: r.year.clone(),
                })
                .collect(),
            citations: citations
                .iter()
                .map(|c| CitationEntry {
                    id: c.id,
                    kind: c.citation_kind(),
                    raw_text: c.raw_text.clone(),
                    paragraph_index: c.paragraph_index.max(0) as u32,
                    char_start: c.char_start.max(0) as u32,
                    char_end: c.char_end.max(0) as u32,
                })
                .collect(),
        })
    }

    // ========================================================================
    // Change Records
    // ========================================================================

    /// Non-reverted renumber records for a document, newest first. These
    /// always describe the most recent renumbering pass only.
    pub async fn list_active_change_records(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<ChangeRecord>> {
        ChangeRecordEntity::find()
            .filter(ChangeRecordColumn::DocumentId.eq(document_id))
            .filter(ChangeRecordColumn::Operation.eq(OPERATION_RENUMBER))
            .filter(ChangeRecordColumn::Reverted.eq(false))
            .order_by_desc(ChangeRecordColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Consistency Transaction
    // ========================================================================

    /// Commit a computed change set as one atomic unit:
    ///
    /// 1. delete the removed reference, if the operation was a delete
    /// 2. write new sort keys to every repositioned reference, carrying the
    ///    citation-reference link numbers along
    /// 3. write new raw text to the affected citations, one batched update
    ///    per distinct transformation
    /// 4. mark prior non-reverted renumber records for the document reverted
    /// 5. insert one new change record per distinct transformation
    ///
    /// Either all five steps become visible or none do; an error on any step
    /// rolls the transaction back, so no reader observes renumbered
    /// references with stale citation text or vice versa.
    pub async fn apply_change_set(
        &self,
        document_id: Uuid,
        change_set: &ChangeSet,
    ) -> Result<AppliedChangeSet> {
        if change_set.is_noop() {
            return Ok(AppliedChangeSet::default());
        }

        let txn = self.write_conn().begin().await.map_err(transient)?;
        let now: sea_orm::entity::prelude::DateTimeWithTimeZone = chrono::Utc::now().into();

        let mut applied = AppliedChangeSet::default();

        // Step 1: remove the deleted reference and its citation links.
        if let Some(deleted) = change_set.deleted {
            CitationReferenceEntity::delete_many()
                .filter(CitationReferenceColumn::ReferenceId.eq(deleted.reference_id))
                .exec(&txn)
                .await
                .map_err(transient)?;

            ReferenceEntity::delete_by_id(deleted.reference_id)
                .exec(&txn)
                .await
                .map_err(transient)?;

            applied.reference_deleted = true;
        }

        // Step 2: reposition surviving references.
        for placement in &change_set.placements {
            if placement.old_position == placement.new_position {
                continue;
            }

            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE document_references SET sort_key = $1, updated_at = $2 WHERE id = $3",
                vec![
                    encode_sort_key(placement.new_position).into(),
                    now.into(),
                    placement.reference_id.into(),
                ],
            );
            txn.execute(stmt).await.map_err(transient)?;

            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE citation_references SET marker_number = $1 WHERE reference_id = $2",
                vec![
                    (placement.new_position as i32).into(),
                    placement.reference_id.into(),
                ],
            );
            txn.execute(stmt).await.map_err(transient)?;

            applied.references_updated += 1;
        }

        // Step 3: rewrite citation text, one batched write per distinct
        // transformation. Rows are addressed by id, never by matching old
        // text: one group's new text can equal another group's old text (a
        // swap), and text matching would rewrite those rows twice.
        for group in &change_set.rewrites {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE citations SET raw_text = $1, updated_at = $2 WHERE id = ANY($3)",
                vec![
                    group.new_text.clone().into(),
                    now.into(),
                    group.citation_ids.clone().into(),
                ],
            );
            txn.execute(stmt).await.map_err(transient)?;

            applied.citations_updated += group.affected_count();
        }

        // Step 4: prior renumber records describe a superseded numbering.
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE change_records
            SET reverted = TRUE
            WHERE document_id = $1 AND operation = $2 AND reverted = FALSE
            "#,
            vec![document_id.into(), OPERATION_RENUMBER.into()],
        );
        txn.execute(stmt).await.map_err(transient)?;

        // Step 5: one audit record per distinct transformation.
        for group in &change_set.rewrites {
            let record = ChangeRecordActiveModel {
                id: Set(Uuid::new_v4()),
                document_id: Set(document_id),
                operation: Set(OPERATION_RENUMBER.to_string()),
                old_text: Set(group.old_text.clone()),
                new_text: Set(group.new_text.clone()),
                affected_count: Set(group.affected_count() as i32),
                reverted: Set(false),
                created_at: Set(now),
            };
            record.insert(&txn).await.map_err(transient)?;
            applied.records_written += 1;
        }

        txn.commit().await.map_err(transient)?;

        tracing::info!(
            document_id = %document_id,
            references_updated = applied.references_updated,
            citations_updated = applied.citations_updated,
            records_written = applied.records_written,
            reference_deleted = applied.reference_deleted,
            "Change set committed"
        );

        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citesync_engine::{CitationRewriteGroup, ReferencePlacement};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::collections::BTreeMap;

    fn pool_from(conn: DatabaseConnection) -> DbPool {
        DbPool {
            primary: conn,
            replica: None,
        }
    }

    fn swap_change_set() -> ChangeSet {
        let mut mapping = BTreeMap::new();
        mapping.insert(1, 2);
        mapping.insert(2, 1);

        ChangeSet {
            placements: vec![
                ReferencePlacement {
                    reference_id: Uuid::new_v4(),
                    old_position: 2,
                    new_position: 1,
                },
                ReferencePlacement {
                    reference_id: Uuid::new_v4(),
                    old_position: 1,
                    new_position: 2,
                },
            ],
            deleted: None,
            rewrites: vec![CitationRewriteGroup {
                old_text: "[1]".to_string(),
                new_text: "[2]".to_string(),
                citation_ids: vec![Uuid::new_v4()],
            }],
            mapping,
        }
    }

    #[tokio::test]
    async fn test_noop_change_set_never_touches_storage() {
        // No prepared results: any statement reaching the mock would error.
        let conn = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let repo = Repository::new(pool_from(conn));

        let applied = repo
            .apply_change_set(Uuid::new_v4(), &ChangeSet::default())
            .await
            .unwrap();
        assert_eq!(applied, AppliedChangeSet::default());
    }

    #[tokio::test]
    async fn test_commit_failure_surfaces_as_transient() {
        // The first write of the transaction fails; everything rolls back
        // and the caller sees a retryable error rather than a partial
        // commit.
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_errors([DbErr::Custom("connection reset by peer".into())])
            .into_connection();
        let repo = Repository::new(pool_from(conn));

        let err = repo
            .apply_change_set(Uuid::new_v4(), &swap_change_set())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, AppError::TransientStorage { .. }));
    }
}
