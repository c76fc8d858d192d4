use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use pretty_assertions::assert_eq;
use reading_tracker_core::domain::derive_pages_read;
use reading_tracker_core::{
    Book, BookId, LibraryService, NewBook, NewSession, PortError, PortResult, Session,
    SessionCommandService, SessionFilter, SessionId, UpdateSessionCommand,
};
use utoipa::OpenApi;

use crate::config::Config;
use crate::web::correction::{apply_correction, CorrectionFailure};
use crate::web::protocol::{
    CorrectionRequest, CreateBookRequest, CreateSessionRequest, FieldChange, ListSessionsQuery,
    SessionChanges, UpdateSessionRequest,
};
use crate::web::rest::ApiDoc;
use crate::web::state::AppState;
use crate::web::{
    book_progress_handler, create_book_handler, create_session_handler, delete_session_handler,
    get_book_handler, list_books_handler, list_sessions_handler, load_correction_handler,
    preview_correction_handler, save_correction_handler, update_session_handler,
};

/// An in-memory stand-in for the database adapter.
#[derive(Default)]
struct MemoryStore {
    books: Mutex<Vec<Book>>,
    sessions: Mutex<Vec<Session>>,
    next_id: AtomicI64,
    writes: Mutex<Vec<String>>,
    reject_delete: Option<SessionId>,
}

impl MemoryStore {
    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn session(&self, id: SessionId) -> Option<Session> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == Some(id))
            .cloned()
    }
}

#[async_trait]
impl SessionCommandService for MemoryStore {
    async fn list_sessions(&self, filter: SessionFilter) -> PortResult<Vec<Session>> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions.iter().filter(|s| filter.matches(s)).cloned().collect())
    }

    async fn update_session(&self, command: UpdateSessionCommand) -> PortResult<Session> {
        self.writes.lock().unwrap().push(format!("update {}", command.id));
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == Some(command.id))
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", command.id)))?;
        session.session_date = command.session_date;
        session.start_time = command.start_time;
        session.end_time = command.end_time;
        session.start_page = command.start_page;
        session.end_page = command.end_page;
        session.minutes_read = command.minutes_read;
        if let Some(pages) = derive_pages_read(command.start_page, command.end_page) {
            session.pages_read = Some(pages);
        }
        Ok(session.clone())
    }

    async fn delete_session(&self, id: SessionId) -> PortResult<()> {
        self.writes.lock().unwrap().push(format!("delete {}", id));
        if self.reject_delete == Some(id) {
            return Err(PortError::Unexpected("database is read-only".to_string()));
        }
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|s| s.id != Some(id));
        if sessions.len() == before {
            return Err(PortError::NotFound(format!("Session {} not found", id)));
        }
        Ok(())
    }

    async fn get_book(&self, id: BookId) -> PortResult<Book> {
        self.books
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", id)))
    }
}

#[async_trait]
impl LibraryService for MemoryStore {
    async fn create_book(&self, book: NewBook) -> PortResult<Book> {
        let book = Book {
            id: self.next_id(),
            title: book.title,
            author: book.author,
            total_pages: book.total_pages,
            created_at: Some(Utc::now()),
        };
        self.books.lock().unwrap().push(book.clone());
        Ok(book)
    }

    async fn list_books(&self) -> PortResult<Vec<Book>> {
        Ok(self.books.lock().unwrap().clone())
    }

    async fn create_session(&self, session: NewSession) -> PortResult<Session> {
        self.get_book(session.book_id).await?;
        let session = Session {
            id: Some(self.next_id()),
            book_id: session.book_id,
            session_date: session.session_date,
            start_time: session.start_time,
            end_time: session.end_time,
            start_page: session.start_page,
            end_page: session.end_page,
            pages_read: derive_pages_read(session.start_page, session.end_page),
            minutes_read: session.minutes_read,
            notes: session.notes,
            created_at: Some(Utc::now()),
        };
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

fn test_config() -> Arc<Config> {
    Arc::new(
        Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/tracker_test".to_string()),
            _ => None,
        })
        .unwrap(),
    )
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

/// Book 1 with 100 pages; session 2 reads days 1-50, session 3 overruns to 120.
async fn seeded(store: MemoryStore) -> (Arc<MemoryStore>, Arc<AppState>) {
    let store = Arc::new(store);
    let book = store
        .create_book(NewBook {
            title: "Persuasion".to_string(),
            author: Some("Jane Austen".to_string()),
            total_pages: Some(100),
        })
        .await
        .unwrap();
    for (on, start, end) in [("2024-01-01", 0, 50), ("2024-01-10", 50, 120)] {
        store
            .create_session(NewSession {
                book_id: book.id,
                session_date: date(on),
                start_time: None,
                end_time: None,
                start_page: Some(start),
                end_page: Some(end),
                minutes_read: None,
                notes: None,
            })
            .await
            .unwrap();
    }
    let state = Arc::new(AppState::new(store.clone(), test_config()));
    (store, state)
}

fn edit(id: SessionId, changes: Vec<FieldChange>) -> SessionChanges {
    SessionChanges { id, changes }
}

#[tokio::test]
async fn book_and_session_lifecycle() {
    let store = Arc::new(MemoryStore::default());
    let state = Arc::new(AppState::new(store.clone(), test_config()));

    let (status, Json(book)) = create_book_handler(
        State(state.clone()),
        Json(CreateBookRequest {
            title: "Moby-Dick".to_string(),
            author: Some("Herman Melville".to_string()),
            total_pages: Some(600),
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let (_, Json(created)) = create_session_handler(
        State(state.clone()),
        Json(CreateSessionRequest {
            book_id: book.id,
            session_date: date("2024-03-01"),
            start_time: None,
            end_time: None,
            start_page: Some(10),
            end_page: Some(42),
            minutes_read: Some(35),
            notes: Some("Call me Ishmael".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(created.pages_read, Some(32));

    let Json(listed) = list_sessions_handler(
        State(state.clone()),
        Query(ListSessionsQuery {
            book_id: Some(book.id),
            start_date: Some(date("2024-03-01")),
            end_date: None,
        }),
    )
    .await
    .unwrap();
    assert_eq!(listed.len(), 1);

    let Json(progress) = book_progress_handler(State(state.clone()), Path(book.id))
        .await
        .unwrap();
    assert_eq!(progress.current_page, Some(42));
    assert_eq!(progress.minutes_read, 35);
    assert!(!progress.finished);

    let id = created.id.unwrap();
    let status = delete_session_handler(State(state.clone()), Path(id)).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = delete_session_handler(State(state), Path(id)).await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_session_rejects_inverted_range() {
    let (store, state) = seeded(MemoryStore::default()).await;
    let (status, message) = create_session_handler(
        State(state),
        Json(CreateSessionRequest {
            book_id: 1,
            session_date: date("2024-02-01"),
            start_time: None,
            end_time: None,
            start_page: Some(80),
            end_page: Some(60),
            minutes_read: None,
            notes: None,
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "End page cannot be less than start page");
    assert_eq!(store.sessions.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn listing_books_returns_the_library() {
    let (_, state) = seeded(MemoryStore::default()).await;
    let Json(books) = list_books_handler(State(state.clone())).await.unwrap();

    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Persuasion");
    assert_eq!(books[0].total_pages, Some(100));

    let Json(progress) = book_progress_handler(State(state), Path(books[0].id))
        .await
        .unwrap();
    assert_eq!(progress.percent_complete, Some(100.0));
    assert!(progress.finished);
}

fn update_request(start: Option<i32>, end: Option<i32>) -> UpdateSessionRequest {
    UpdateSessionRequest {
        session_date: date("2024-01-10"),
        start_time: None,
        end_time: None,
        start_page: start,
        end_page: end,
        minutes_read: Some(40),
    }
}

#[tokio::test]
async fn updating_a_session_recomputes_pages_read() {
    let (store, state) = seeded(MemoryStore::default()).await;
    let Json(updated) = update_session_handler(
        State(state.clone()),
        Path(3),
        Json(update_request(Some(50), Some(95))),
    )
    .await
    .unwrap();

    assert_eq!(updated.end_page, Some(95));
    assert_eq!(updated.pages_read, Some(45));
    assert_eq!(updated.minutes_read, Some(40));
    assert_eq!(store.session(3).unwrap().pages_read, Some(45));

    let (status, _) = update_session_handler(
        State(state.clone()),
        Path(42),
        Json(update_request(Some(0), Some(10))),
    )
    .await
    .unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, message) = update_session_handler(
        State(state),
        Path(3),
        Json(update_request(Some(-2), Some(i32::MAX))),
    )
    .await
    .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "Page numbers must not be negative");
    assert_eq!(store.writes(), vec!["update 3".to_string(), "update 42".to_string()]);
}

#[tokio::test]
async fn negative_page_in_correction_is_rejected() {
    let (store, state) = seeded(MemoryStore::default()).await;
    let request = CorrectionRequest {
        edits: vec![edit(
            2,
            vec![
                FieldChange::StartPage(Some(-2)),
                FieldChange::EndPage(Some(i32::MAX)),
            ],
        )],
        deletions: Vec::new(),
    };
    let failure = preview_correction_handler(State(state.clone()), Path(1), Json(request.clone()))
        .await
        .unwrap_err();
    assert_eq!(failure.into_response().status(), StatusCode::BAD_REQUEST);

    let failure = apply_correction(&state, 1, request).await.unwrap_err();
    assert!(matches!(failure, CorrectionFailure::InvalidChange(_)));
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn unknown_book_is_not_found() {
    let (_, state) = seeded(MemoryStore::default()).await;
    let (status, _) = get_book_handler(State(state.clone()), Path(99)).await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = load_correction_handler(State(state), Path(99))
        .await
        .unwrap_err()
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn correction_page_reports_overrun() {
    let (_, state) = seeded(MemoryStore::default()).await;
    let Json(view) = load_correction_handler(State(state), Path(1)).await.unwrap();

    let ids: Vec<Option<SessionId>> = view.sessions.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![Some(3), Some(2)]);
    assert_eq!(
        view.errors.get(&3).map(String::as_str),
        Some("End page (120) exceeds total pages (100)")
    );
    assert!(view.warnings.is_empty());
    assert!(!view.can_save);
}

#[tokio::test]
async fn preview_applies_changes_without_writing() {
    let (store, state) = seeded(MemoryStore::default()).await;
    let request = CorrectionRequest {
        edits: vec![edit(3, vec![FieldChange::EndPage(Some(90))])],
        deletions: vec![2],
    };
    let Json(view) = preview_correction_handler(State(state), Path(1), Json(request))
        .await
        .unwrap();

    assert_eq!(view.sessions.len(), 1);
    assert_eq!(view.sessions[0].pages_read, Some(40));
    assert_eq!(view.pending_deletions, vec![2]);
    assert!(view.can_save);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn saving_a_correction_persists_it() {
    let (store, state) = seeded(MemoryStore::default()).await;
    let request = CorrectionRequest {
        edits: vec![edit(3, vec![FieldChange::EndPage(Some(90))])],
        deletions: Vec::new(),
    };
    let Json(saved) = save_correction_handler(State(state), Path(1), Json(request))
        .await
        .unwrap();

    assert_eq!(saved.updated, vec![3]);
    assert!(saved.deleted.is_empty());
    let stored = store.session(3).unwrap();
    assert_eq!(stored.end_page, Some(90));
    assert_eq!(stored.pages_read, Some(40));
}

#[tokio::test]
async fn inverted_edit_blocks_save() {
    let (store, state) = seeded(MemoryStore::default()).await;
    let request = CorrectionRequest {
        edits: vec![edit(3, vec![FieldChange::EndPage(Some(20))])],
        deletions: vec![2],
    };
    let failure = apply_correction(&state, 1, request).await.unwrap_err();

    match &failure {
        CorrectionFailure::Blocked(body) => {
            assert_eq!(body.count, 1);
            assert_eq!(
                body.errors.get(&3).map(String::as_str),
                Some("End page cannot be less than start page")
            );
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert_eq!(failure.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn error_on_untouched_session_blocks_save() {
    let (store, state) = seeded(MemoryStore::default()).await;
    let request = CorrectionRequest {
        edits: vec![edit(2, vec![FieldChange::MinutesRead(Some(30))])],
        deletions: Vec::new(),
    };
    let failure = apply_correction(&state, 1, request).await.unwrap_err();
    assert!(matches!(failure, CorrectionFailure::Blocked(ref body) if body.errors.contains_key(&3)));
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn refusal_lists_erroring_sessions_marked_for_deletion() {
    let (store, state) = seeded(MemoryStore::default()).await;
    let request = CorrectionRequest {
        edits: Vec::new(),
        deletions: vec![3],
    };
    let failure = apply_correction(&state, 1, request).await.unwrap_err();

    match &failure {
        CorrectionFailure::Blocked(body) => {
            assert!(body.errors.contains_key(&3));
            assert_eq!(body.pending_deletions, vec![3]);
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn inverted_edit_on_session_marked_for_deletion_blocks_save() {
    let (store, state) = seeded(MemoryStore::default()).await;
    let request = CorrectionRequest {
        edits: vec![edit(3, vec![FieldChange::EndPage(Some(0))])],
        deletions: vec![3],
    };
    let failure = apply_correction(&state, 1, request).await.unwrap_err();

    match &failure {
        CorrectionFailure::Blocked(body) => {
            assert_eq!(
                body.errors.get(&3).map(String::as_str),
                Some("End page cannot be less than start page")
            );
            assert_eq!(body.pending_deletions, vec![3]);
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn deletion_takes_precedence_over_edit() {
    let (store, state) = seeded(MemoryStore::default()).await;
    let request = CorrectionRequest {
        edits: vec![edit(3, vec![FieldChange::EndPage(Some(95))])],
        deletions: vec![3],
    };
    let saved = apply_correction(&state, 1, request).await.unwrap();

    assert!(saved.updated.is_empty());
    assert_eq!(saved.deleted, vec![3]);
    assert_eq!(store.writes(), vec!["delete 3".to_string()]);
}

#[tokio::test]
async fn unknown_session_in_request_is_rejected() {
    let (store, state) = seeded(MemoryStore::default()).await;
    let request = CorrectionRequest {
        edits: vec![edit(42, vec![FieldChange::Notes(Some("lost".to_string()))])],
        deletions: Vec::new(),
    };
    let failure = apply_correction(&state, 1, request).await.unwrap_err();
    assert!(matches!(
        failure,
        CorrectionFailure::UnknownSession { book_id: 1, session_id: 42 }
    ));
    assert_eq!(failure.into_response().status(), StatusCode::NOT_FOUND);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn rejected_delete_reports_what_was_saved() {
    let store = MemoryStore {
        reject_delete: Some(2),
        ..MemoryStore::default()
    };
    let (store, state) = seeded(store).await;
    let request = CorrectionRequest {
        edits: vec![edit(3, vec![FieldChange::EndPage(Some(100))])],
        deletions: vec![2],
    };
    let failure = apply_correction(&state, 1, request).await.unwrap_err();

    match &failure {
        CorrectionFailure::Partial(body) => {
            assert_eq!(body.failed_step, "delete");
            assert_eq!(body.failed_session, 2);
            assert_eq!(body.updated, vec![3]);
            assert!(body.deleted.is_empty());
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert_eq!(failure.into_response().status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        store.writes(),
        vec!["update 3".to_string(), "delete 2".to_string()]
    );
    assert_eq!(store.session(3).unwrap().end_page, Some(100));
}

#[test]
fn openapi_documents_the_correction_routes() {
    let doc = ApiDoc::openapi();
    assert!(doc.paths.paths.contains_key("/books/{id}/progress-correction"));
    assert!(doc.paths.paths.contains_key("/books/{id}/progress-correction/preview"));
    assert!(doc.paths.paths.contains_key("/sessions/{id}"));
}
