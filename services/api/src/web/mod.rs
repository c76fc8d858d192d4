pub mod correction;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible
// to the binary that builds the web server router.
pub use correction::{load_correction_handler, preview_correction_handler, save_correction_handler};
pub use middleware::trace_requests;
pub use rest::{
    book_progress_handler, create_book_handler, create_session_handler, delete_session_handler,
    get_book_handler, list_books_handler, list_sessions_handler, update_session_handler,
};
