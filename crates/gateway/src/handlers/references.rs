//! Reference consistency handlers
//!
//! The four renumbering operations (move/sort via reorder, delete, edit,
//! resequence-by-appearance) plus read endpoints for the reference list and
//! the renumbering audit trail. Each mutating handler loads a fresh
//! snapshot, lets the engine compute an immutable change set, and commits
//! it through the consistency transaction; transient commit failures are
//! retried against a fresh snapshot, validation failures never are.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    Json,
};
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use citesync_common::{
    auth::AuthContext,
    config::CommitRetryConfig,
    db::models::{ChangeRecord, Reference},
    db::{AppliedChangeSet, Repository},
    errors::{AppError, Result},
    metrics::{record_commit_retry, record_renumber},
};
use citesync_engine::{ChangeSet, DocumentSnapshot, ReferencePlacement, SortDirection};

// ============================================================================
// Request / response types
// ============================================================================

/// Sort strategies accepted by the reorder endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Alphabetical,
    Year,
    Appearance,
}

/// Reorder request: either a single-reference move or a bulk sort
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub reference_id: Option<Uuid>,
    pub new_position: Option<u32>,
    pub sort_by: Option<SortBy>,
    /// Only meaningful for the year sort; defaults to descending
    #[serde(default)]
    pub direction: Option<SortDirection>,
}

/// Response for reorder and resequence operations
#[derive(Serialize)]
pub struct ReorderResponse {
    pub changes: Vec<ReferencePlacement>,
    pub updated_count: usize,
    pub citations_updated: usize,
}

#[derive(Serialize)]
pub struct DeleteReferenceResponse {
    pub deleted_reference_id: Uuid,
    pub deleted_position: u32,
    pub affected_citations: usize,
    pub remaining_references: usize,
}

#[derive(Serialize)]
pub struct ResequenceResponse {
    /// Old number -> new number for every surviving reference
    pub mapping: BTreeMap<u32, u32>,
    pub citations_updated: usize,
}

/// Fields accepted by the reference edit endpoint; absent fields keep
/// their stored values
#[derive(Debug, Default, Deserialize, Validate)]
pub struct EditReferenceRequest {
    pub authors: Option<Vec<String>>,

    #[validate(length(max = 32))]
    pub year: Option<String>,

    #[validate(length(min = 1, max = 2000))]
    pub title: Option<String>,

    pub journal: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub publisher: Option<String>,

    #[validate(length(max = 10000))]
    pub rendered: Option<String>,
}

#[derive(Serialize)]
pub struct ReferenceResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub position: u32,
    pub authors: Vec<String>,
    pub year: Option<String>,
    pub title: String,
    pub journal: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub publisher: Option<String>,
    pub rendered: String,
    pub updated_at: String,
}

impl From<Reference> for ReferenceResponse {
    fn from(r: Reference) -> Self {
        let position = r.position();
        let authors = r.author_list();
        Self {
            id: r.id,
            document_id: r.document_id,
            position,
            authors,
            year: r.year,
            title: r.title,
            journal: r.journal,
            volume: r.volume,
            issue: r.issue,
            pages: r.pages,
            doi: r.doi,
            url: r.url,
            publisher: r.publisher,
            rendered: r.rendered,
            updated_at: r.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct ReferenceListResponse {
    pub references: Vec<ReferenceResponse>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct ChangeRecordView {
    pub id: Uuid,
    pub operation: String,
    pub old_text: String,
    pub new_text: String,
    pub affected_count: i32,
    pub created_at: String,
}

impl From<ChangeRecord> for ChangeRecordView {
    fn from(r: ChangeRecord) -> Self {
        Self {
            id: r.id,
            operation: r.operation,
            old_text: r.old_text,
            new_text: r.new_text,
            affected_count: r.affected_count,
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct ChangeRecordListResponse {
    pub records: Vec<ChangeRecordView>,
    pub total: usize,
}

// ============================================================================
// Operation plumbing
// ============================================================================

/// One validated renumbering operation, ready to run against a snapshot
#[derive(Debug, Clone, Copy)]
enum Operation {
    Move {
        reference_id: Uuid,
        new_position: u32,
    },
    SortAlphabetical,
    SortByYear(SortDirection),
    SortByAppearance,
    Delete(Uuid),
}

impl Operation {
    fn label(&self) -> &'static str {
        match self {
            Operation::Move { .. } => "move",
            Operation::SortAlphabetical => "sort_alphabetical",
            Operation::SortByYear(_) => "sort_year",
            Operation::SortByAppearance => "sort_appearance",
            Operation::Delete(_) => "delete",
        }
    }
}

impl ReorderRequest {
    /// Resolve the request into exactly one operation.
    ///
    /// A request naming both a move target and a sort strategy, half a move
    /// pair, or nothing at all is malformed; an empty request is an error
    /// rather than a silent no-op so callers learn it carried no operation.
    fn operation(&self) -> Result<Operation> {
        match (self.reference_id, self.new_position, self.sort_by) {
            (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => Err(AppError::InvalidRequest {
                message: "request a move or a sort, not both".to_string(),
            }),
            (Some(reference_id), Some(new_position), None) => Ok(Operation::Move {
                reference_id,
                new_position,
            }),
            (Some(_), None, None) => Err(AppError::MissingField {
                field: "new_position".to_string(),
            }),
            (None, Some(_), None) => Err(AppError::MissingField {
                field: "reference_id".to_string(),
            }),
            (None, None, Some(SortBy::Alphabetical)) => Ok(Operation::SortAlphabetical),
            (None, None, Some(SortBy::Year)) => {
                Ok(Operation::SortByYear(self.direction.unwrap_or_default()))
            }
            (None, None, Some(SortBy::Appearance)) => Ok(Operation::SortByAppearance),
            (None, None, None) => Err(AppError::InvalidRequest {
                message: "provide either reference_id and new_position, or sort_by".to_string(),
            }),
        }
    }
}

fn compute(snapshot: &DocumentSnapshot, operation: Operation) -> Result<ChangeSet> {
    match operation {
        Operation::Move {
            reference_id,
            new_position,
        } => snapshot
            .move_reference(reference_id, new_position)
            .map_err(Into::into),
        Operation::SortAlphabetical => Ok(snapshot.sort_alphabetically()),
        Operation::SortByYear(direction) => Ok(snapshot.sort_by_year(direction)),
        Operation::SortByAppearance => Ok(snapshot.sort_by_appearance()),
        Operation::Delete(reference_id) => snapshot.delete_reference(reference_id).map_err(Into::into),
    }
}

/// Run one operation to completion: fresh snapshot, engine computation,
/// atomic commit. Transient commit failures restart the whole attempt
/// against a fresh snapshot with exponential backoff; logical validation
/// failures surface immediately.
async fn execute_with_retry(
    repo: &Repository,
    retry: &CommitRetryConfig,
    document_id: Uuid,
    operation: Operation,
) -> Result<(ChangeSet, AppliedChangeSet)> {
    let policy = ExponentialBackoff {
        initial_interval: Duration::from_millis(retry.initial_interval_ms),
        max_elapsed_time: Some(Duration::from_millis(retry.max_elapsed_ms)),
        ..ExponentialBackoff::default()
    };

    let label = operation.label();

    let classify = move |err: AppError| {
        if err.is_retryable() {
            record_commit_retry(label);
            tracing::warn!(error = %err, operation = label, "Transient commit failure, retrying");
            backoff::Error::transient(err)
        } else {
            backoff::Error::permanent(err)
        }
    };

    backoff::future::retry(policy, || async move {
        let snapshot = repo.snapshot(document_id).await.map_err(classify)?;
        let change_set = compute(&snapshot, operation).map_err(backoff::Error::permanent)?;
        let applied = repo
            .apply_change_set(document_id, &change_set)
            .await
            .map_err(classify)?;
        Ok((change_set, applied))
    })
    .await
}

/// Resolve the document or fail with the same not-found error for both
/// "absent" and "owned by another tenant".
async fn require_document(
    repo: &Repository,
    document_id: Uuid,
    auth: &AuthContext,
) -> Result<()> {
    repo.find_document_for_tenant(document_id, auth.tenant_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// List a document's references in reference-list order
pub async fn list_references(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(document_id): Path<Uuid>,
) -> Result<Json<ReferenceListResponse>> {
    let repo = Repository::new(state.db.clone());
    require_document(&repo, document_id, &auth).await?;

    let references = repo.list_references(document_id).await?;
    let total = references.len();

    Ok(Json(ReferenceListResponse {
        references: references.into_iter().map(Into::into).collect(),
        total,
    }))
}

/// Move one reference or re-sort the whole list
pub async fn reorder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(document_id): Path<Uuid>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<ReorderResponse>> {
    let operation = request.operation()?;
    let repo = Repository::new(state.db.clone());
    require_document(&repo, document_id, &auth).await?;

    let start = Instant::now();
    let (change_set, applied) =
        execute_with_retry(&repo, &state.config.commit_retry, document_id, operation).await?;

    record_renumber(
        start.elapsed().as_secs_f64(),
        operation.label(),
        applied.references_updated,
        applied.citations_updated,
    );

    tracing::info!(
        document_id = %document_id,
        tenant_id = %auth.tenant_id,
        operation = operation.label(),
        references_updated = applied.references_updated,
        citations_updated = applied.citations_updated,
        "Reorder completed"
    );

    Ok(Json(ReorderResponse {
        changes: change_set.placements,
        updated_count: applied.references_updated,
        citations_updated: applied.citations_updated,
    }))
}

/// Delete one reference, renumbering the remainder and orphaning citations
/// that only pointed at it
pub async fn delete_reference(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((document_id, reference_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeleteReferenceResponse>> {
    let repo = Repository::new(state.db.clone());
    require_document(&repo, document_id, &auth).await?;

    let operation = Operation::Delete(reference_id);
    let start = Instant::now();
    let (change_set, applied) =
        execute_with_retry(&repo, &state.config.commit_retry, document_id, operation).await?;

    let deleted = change_set.deleted.ok_or_else(|| AppError::Internal {
        message: "delete produced no deletion record".to_string(),
    })?;

    record_renumber(
        start.elapsed().as_secs_f64(),
        operation.label(),
        applied.references_updated,
        applied.citations_updated,
    );

    tracing::info!(
        document_id = %document_id,
        tenant_id = %auth.tenant_id,
        reference_id = %reference_id,
        deleted_position = deleted.old_position,
        citations_updated = applied.citations_updated,
        "Reference deleted"
    );

    Ok(Json(DeleteReferenceResponse {
        deleted_reference_id: deleted.reference_id,
        deleted_position: deleted.old_position,
        affected_citations: applied.citations_updated,
        remaining_references: change_set.placements.len(),
    }))
}

/// Edit a reference's structured fields. Editing never renumbers; sorts
/// are explicit operations.
pub async fn edit_reference(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((document_id, reference_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<EditReferenceRequest>,
) -> Result<Json<ReferenceResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let repo = Repository::new(state.db.clone());
    require_document(&repo, document_id, &auth).await?;

    let reference = repo
        .find_reference_by_id(reference_id)
        .await?
        .ok_or_else(|| AppError::ReferenceNotFound {
            id: reference_id.to_string(),
        })?;

    if reference.document_id != document_id {
        return Err(AppError::InvalidDocument {
            reference_id: reference_id.to_string(),
            document_id: document_id.to_string(),
        });
    }

    let updated = repo
        .update_reference(
            reference_id,
            citesync_common::db::ReferenceEdit {
                authors: request.authors,
                year: request.year,
                title: request.title,
                journal: request.journal,
                volume: request.volume,
                issue: request.issue,
                pages: request.pages,
                doi: request.doi,
                url: request.url,
                publisher: request.publisher,
                rendered: request.rendered,
            },
        )
        .await?;

    tracing::info!(
        document_id = %document_id,
        tenant_id = %auth.tenant_id,
        reference_id = %reference_id,
        "Reference edited"
    );

    Ok(Json(updated.into()))
}

/// Renumber the whole list by first appearance in the document
pub async fn resequence(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(document_id): Path<Uuid>,
) -> Result<Json<ResequenceResponse>> {
    let repo = Repository::new(state.db.clone());
    require_document(&repo, document_id, &auth).await?;

    let operation = Operation::SortByAppearance;
    let start = Instant::now();
    let (change_set, applied) =
        execute_with_retry(&repo, &state.config.commit_retry, document_id, operation).await?;

    record_renumber(
        start.elapsed().as_secs_f64(),
        "resequence",
        applied.references_updated,
        applied.citations_updated,
    );

    tracing::info!(
        document_id = %document_id,
        tenant_id = %auth.tenant_id,
        references_updated = applied.references_updated,
        citations_updated = applied.citations_updated,
        "Resequence by appearance completed"
    );

    Ok(Json(ResequenceResponse {
        mapping: change_set.mapping,
        citations_updated: applied.citations_updated,
    }))
}

/// Renumbering audit trail: the distinct before/after transformations of
/// the most recent pass
pub async fn list_changes(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(document_id): Path<Uuid>,
) -> Result<Json<ChangeRecordListResponse>> {
    let repo = Repository::new(state.db.clone());
    require_document(&repo, document_id, &auth).await?;

    let records = repo.list_active_change_records(document_id).await?;
    let total = records.len();

    Ok(Json(ChangeRecordListResponse {
        records: records.into_iter().map(Into::into).collect(),
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(
        reference_id: Option<Uuid>,
        new_position: Option<u32>,
        sort_by: Option<SortBy>,
    ) -> ReorderRequest {
        ReorderRequest {
            reference_id,
            new_position,
            sort_by,
            direction: None,
        }
    }

    #[test]
    fn test_reorder_request_move() {
        let id = Uuid::new_v4();
        let op = request(Some(id), Some(3), None).operation().unwrap();
        assert!(matches!(
            op,
            Operation::Move {
                reference_id,
                new_position: 3
            } if reference_id == id
        ));
    }

    #[test]
    fn test_reorder_request_sorts() {
        assert!(matches!(
            request(None, None, Some(SortBy::Alphabetical)).operation().unwrap(),
            Operation::SortAlphabetical
        ));
        assert!(matches!(
            request(None, None, Some(SortBy::Year)).operation().unwrap(),
            Operation::SortByYear(SortDirection::Descending)
        ));
        assert!(matches!(
            request(None, None, Some(SortBy::Appearance)).operation().unwrap(),
            Operation::SortByAppearance
        ));
    }

    #[test]
    fn test_reorder_request_year_direction() {
        let mut req = request(None, None, Some(SortBy::Year));
        req.direction = Some(SortDirection::Ascending);
        assert!(matches!(
            req.operation().unwrap(),
            Operation::SortByYear(SortDirection::Ascending)
        ));
    }

    #[test]
    fn test_reorder_request_empty_is_invalid() {
        let err = request(None, None, None).operation().unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest { .. }));
    }

    #[test]
    fn test_reorder_request_move_and_sort_is_invalid() {
        let err = request(Some(Uuid::new_v4()), Some(1), Some(SortBy::Year))
            .operation()
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest { .. }));
    }

    #[test]
    fn test_reorder_request_half_move_is_invalid() {
        let err = request(Some(Uuid::new_v4()), None, None).operation().unwrap_err();
        assert!(matches!(err, AppError::MissingField { .. }));

        let err = request(None, Some(2), None).operation().unwrap_err();
        assert!(matches!(err, AppError::MissingField { .. }));
    }
}
