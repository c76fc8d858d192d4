//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the book and session REST endpoints and the
//! master definition for the OpenAPI specification.

use crate::web::{
    correction,
    protocol::{
        BookDto, BookProgressDto, CorrectionRequest, CorrectionView, CreateBookRequest,
        CreateSessionRequest, ListSessionsQuery, PartialSaveFailure, SaveResponse, SessionChanges,
        SessionDto, UpdateSessionRequest, ValidationFailure,
    },
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use reading_tracker_core::{
    BookId, BookProgress, PortError, SessionFilter, SessionId,
};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_books_handler,
        create_book_handler,
        get_book_handler,
        book_progress_handler,
        list_sessions_handler,
        create_session_handler,
        update_session_handler,
        delete_session_handler,
        correction::load_correction_handler,
        correction::preview_correction_handler,
        correction::save_correction_handler,
    ),
    components(
        schemas(
            BookDto,
            BookProgressDto,
            CreateBookRequest,
            SessionDto,
            CreateSessionRequest,
            UpdateSessionRequest,
            SessionChanges,
            CorrectionRequest,
            CorrectionView,
            SaveResponse,
            ValidationFailure,
            PartialSaveFailure,
        )
    ),
    tags(
        (name = "Reading Tracker API", description = "Books, reading sessions and progress correction.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Converts a port failure into an HTTP error. Unexpected failures are logged
/// and replaced with a generic message.
pub(crate) fn port_failure(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        PortError::Conflict(message) => (StatusCode::CONFLICT, message),
        PortError::Unexpected(_) => {
            error!("{}: {:?}", context, e);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

//=========================================================================================
// Book Handlers
//=========================================================================================

/// List all books, most recently added first.
#[utoipa::path(
    get,
    path = "/books",
    responses(
        (status = 200, description = "All books", body = [BookDto]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_books_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<BookDto>>, (StatusCode, String)> {
    let books = app_state
        .library
        .list_books()
        .await
        .map_err(|e| port_failure("Failed to list books", e))?;
    Ok(Json(books.into_iter().map(BookDto::from).collect()))
}

/// Add a book to the library.
#[utoipa::path(
    post,
    path = "/books",
    request_body = CreateBookRequest,
    responses(
        (status = 201, description = "Book created", body = BookDto),
        (status = 400, description = "Invalid title or page total"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_book_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<BookDto>), (StatusCode, String)> {
    let new_book = req
        .into_domain()
        .map_err(|message| (StatusCode::BAD_REQUEST, message))?;

    let book = app_state
        .library
        .create_book(new_book)
        .await
        .map_err(|e| port_failure("Failed to create book", e))?;
    info!("Created book {} ({})", book.id, book.title);
    Ok((StatusCode::CREATED, Json(BookDto::from(book))))
}

#[utoipa::path(
    get,
    path = "/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book", body = BookDto),
        (status = 404, description = "Unknown book")
    )
)]
pub async fn get_book_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<BookId>,
) -> Result<Json<BookDto>, (StatusCode, String)> {
    let book = app_state
        .sessions
        .get_book(id)
        .await
        .map_err(|e| port_failure("Failed to load book", e))?;
    Ok(Json(BookDto::from(book)))
}

/// Reading progress summarized over the book's sessions.
#[utoipa::path(
    get,
    path = "/books/{id}/progress",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Progress summary", body = BookProgressDto),
        (status = 404, description = "Unknown book")
    )
)]
pub async fn book_progress_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<BookId>,
) -> Result<Json<BookProgressDto>, (StatusCode, String)> {
    let book = app_state
        .sessions
        .get_book(id)
        .await
        .map_err(|e| port_failure("Failed to load book", e))?;
    let sessions = app_state
        .sessions
        .list_sessions(SessionFilter::for_book(id))
        .await
        .map_err(|e| port_failure("Failed to list sessions", e))?;

    let progress = BookProgress::from_sessions(&book, &sessions);
    Ok(Json(BookProgressDto::new(id, progress)))
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// List sessions, optionally narrowed to a book and a date range.
#[utoipa::path(
    get,
    path = "/sessions",
    params(ListSessionsQuery),
    responses(
        (status = 200, description = "Matching sessions, newest first", body = [SessionDto]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<SessionDto>>, (StatusCode, String)> {
    let filter = SessionFilter {
        book_id: query.book_id,
        start_date: query.start_date,
        end_date: query.end_date,
    };
    let sessions = app_state
        .sessions
        .list_sessions(filter)
        .await
        .map_err(|e| port_failure("Failed to list sessions", e))?;
    Ok(Json(sessions.into_iter().map(SessionDto::from).collect()))
}

/// Record a new reading session. `pages_read` is derived from the page range.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionDto),
        (status = 400, description = "Negative or inverted page range"),
        (status = 404, description = "Unknown book")
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionDto>), (StatusCode, String)> {
    let new_session = req
        .into_domain()
        .map_err(|message| (StatusCode::BAD_REQUEST, message))?;

    let session = app_state
        .library
        .create_session(new_session)
        .await
        .map_err(|e| port_failure("Failed to create session", e))?;
    Ok((StatusCode::CREATED, Json(SessionDto::from(session))))
}

#[utoipa::path(
    put,
    path = "/sessions/{id}",
    params(("id" = i64, Path, description = "Session id")),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Session updated", body = SessionDto),
        (status = 400, description = "Negative page or minute count"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn update_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<Json<SessionDto>, (StatusCode, String)> {
    let command = req
        .into_command(id)
        .map_err(|message| (StatusCode::BAD_REQUEST, message))?;
    let session = app_state
        .sessions
        .update_session(command)
        .await
        .map_err(|e| port_failure("Failed to update session", e))?;
    Ok(Json(SessionDto::from(session)))
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = i64, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode, (StatusCode, String)> {
    app_state
        .sessions
        .delete_session(id)
        .await
        .map_err(|e| port_failure("Failed to delete session", e))?;
    Ok(StatusCode::NO_CONTENT)
}
