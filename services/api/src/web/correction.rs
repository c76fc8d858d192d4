//! services/api/src/web/correction.rs
//!
//! Handlers for the progress-correction page of a book: load the session
//! history with its validation findings, preview staged changes, and commit
//! them through the reconciliation pipeline.

use crate::web::{
    protocol::{
        CorrectionRequest, CorrectionView, PartialSaveFailure, SaveResponse, ValidationFailure,
    },
    rest::port_failure,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Local;
use reading_tracker_core::{BookId, ReconciliationSession, SaveError, SessionId};
use std::sync::Arc;
use tracing::{error, info, warn};

//=========================================================================================
// Failure Type
//=========================================================================================

/// Every way a correction request can fail, each with its own response body.
#[derive(Debug)]
pub enum CorrectionFailure {
    /// Loading the book or its sessions failed.
    Port(StatusCode, String),
    /// A field change carried a value no session can hold.
    InvalidChange(String),
    /// An edit or deletion named a session that does not belong to the book.
    UnknownSession { book_id: BookId, session_id: SessionId },
    /// Saving was refused; nothing was written.
    Blocked(ValidationFailure),
    /// The store rejected a command partway through the save.
    Partial(PartialSaveFailure),
    /// Everything was written but the sessions could not be reloaded.
    Refresh(String),
}

impl IntoResponse for CorrectionFailure {
    fn into_response(self) -> Response {
        match self {
            Self::Port(status, message) => (status, message).into_response(),
            Self::InvalidChange(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::UnknownSession { book_id, session_id } => (
                StatusCode::NOT_FOUND,
                format!("Session {} is not part of book {}", session_id, book_id),
            )
                .into_response(),
            Self::Blocked(body) => (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response(),
            Self::Partial(body) => (StatusCode::BAD_GATEWAY, Json(body)).into_response(),
            Self::Refresh(message) => (StatusCode::INTERNAL_SERVER_ERROR, message).into_response(),
        }
    }
}

//=========================================================================================
// Reconciliation Helpers
//=========================================================================================

async fn load(app_state: &AppState, book_id: BookId) -> Result<ReconciliationSession, CorrectionFailure> {
    let today = Local::now().date_naive();
    ReconciliationSession::load(app_state.sessions.as_ref(), book_id, today)
        .await
        .map_err(|e| {
            let (status, message) = port_failure("Failed to load sessions", e);
            CorrectionFailure::Port(status, message)
        })
}

/// Replays the page's staged edits and deletions onto a fresh reconciliation session.
fn stage(
    reconciliation: &mut ReconciliationSession,
    request: CorrectionRequest,
) -> Result<(), CorrectionFailure> {
    let book_id = reconciliation.book_id();

    for entry in request.edits {
        for change in entry.changes {
            change.check().map_err(CorrectionFailure::InvalidChange)?;
            if !reconciliation.edit_session(entry.id, change.into()) {
                return Err(CorrectionFailure::UnknownSession {
                    book_id,
                    session_id: entry.id,
                });
            }
        }
    }

    for id in request.deletions {
        let known = reconciliation
            .sorted_sessions()
            .iter()
            .any(|s| s.id == Some(id));
        if !known {
            return Err(CorrectionFailure::UnknownSession {
                book_id,
                session_id: id,
            });
        }
        reconciliation.delete_session(id);
    }
    Ok(())
}

fn blocked(reconciliation: &ReconciliationSession) -> CorrectionFailure {
    let errors = reconciliation.report().errors.clone();
    CorrectionFailure::Blocked(ValidationFailure {
        message: format!("{} session(s) have validation errors", errors.len()),
        count: errors.len(),
        errors,
        pending_deletions: reconciliation.staging().deleting_sessions().to_vec(),
    })
}

/// Stages the request and runs the save pipeline.
///
/// Saving is refused while the error snapshot is non-empty; editing a session
/// clears its own error, so only errors on untouched sessions (and inverted
/// ranges caught by the pipeline's own check) block. Marking a session for
/// deletion does not clear its error; the refusal lists it under
/// `pending_deletions`.
pub async fn apply_correction(
    app_state: &AppState,
    book_id: BookId,
    request: CorrectionRequest,
) -> Result<SaveResponse, CorrectionFailure> {
    let mut reconciliation = load(app_state, book_id).await?;
    stage(&mut reconciliation, request)?;

    if !reconciliation.can_save() {
        warn!(
            "Refusing to save book {}: {} sessions have errors",
            book_id,
            reconciliation.report().error_count()
        );
        return Err(blocked(&reconciliation));
    }

    match reconciliation.save_all(app_state.sessions.as_ref()).await {
        Ok(report) => {
            info!(
                "Progress correction saved for book {}: {:?} updated, {:?} deleted",
                book_id, report.updated, report.deleted
            );
            Ok(SaveResponse::from(report))
        }
        Err(SaveError::Validation { .. }) => Err(blocked(&reconciliation)),
        Err(SaveError::Persistence {
            step,
            id,
            committed,
            source,
        }) => Err(CorrectionFailure::Partial(PartialSaveFailure {
            message: source.to_string(),
            failed_step: step.to_string(),
            failed_session: id,
            updated: committed.updated,
            deleted: committed.deleted,
        })),
        Err(e @ SaveError::Refresh(_)) => {
            error!("Progress correction for book {}: {}", book_id, e);
            Err(CorrectionFailure::Refresh(e.to_string()))
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Load a book's sessions, newest first, with their validation findings.
#[utoipa::path(
    get,
    path = "/books/{id}/progress-correction",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Sessions and validation findings", body = CorrectionView),
        (status = 404, description = "Unknown book")
    )
)]
pub async fn load_correction_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<BookId>,
) -> Result<Json<CorrectionView>, CorrectionFailure> {
    let reconciliation = load(&app_state, book_id).await?;
    Ok(Json(CorrectionView::new(
        reconciliation.book().cloned(),
        reconciliation.sorted_sessions().to_vec(),
        Vec::new(),
        reconciliation.report(),
    )))
}

/// Show how the sessions would look after saving the given changes. Nothing is written.
#[utoipa::path(
    post,
    path = "/books/{id}/progress-correction/preview",
    params(("id" = i64, Path, description = "Book id")),
    request_body = CorrectionRequest,
    responses(
        (status = 200, description = "Sessions with changes applied, revalidated", body = CorrectionView),
        (status = 400, description = "Negative page or minute count"),
        (status = 404, description = "Unknown book or session")
    )
)]
pub async fn preview_correction_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<BookId>,
    Json(request): Json<CorrectionRequest>,
) -> Result<Json<CorrectionView>, CorrectionFailure> {
    let mut reconciliation = load(&app_state, book_id).await?;
    stage(&mut reconciliation, request)?;
    reconciliation.revalidate();

    Ok(Json(CorrectionView::new(
        reconciliation.book().cloned(),
        reconciliation.working_sessions(),
        reconciliation.staging().deleting_sessions().to_vec(),
        reconciliation.report(),
    )))
}

/// Save all staged edits and deletions for a book.
#[utoipa::path(
    post,
    path = "/books/{id}/progress-correction",
    params(("id" = i64, Path, description = "Book id")),
    request_body = CorrectionRequest,
    responses(
        (status = 200, description = "All changes saved", body = SaveResponse),
        (status = 400, description = "Negative page or minute count"),
        (status = 404, description = "Unknown book or session"),
        (status = 422, description = "Sessions have validation errors; nothing saved", body = ValidationFailure),
        (status = 502, description = "The store rejected a change; earlier changes were kept", body = PartialSaveFailure)
    )
)]
pub async fn save_correction_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<BookId>,
    Json(request): Json<CorrectionRequest>,
) -> Result<Json<SaveResponse>, CorrectionFailure> {
    apply_correction(&app_state, book_id, request).await.map(Json)
}
