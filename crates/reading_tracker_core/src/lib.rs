pub mod domain;
pub mod ordering;
pub mod ports;
pub mod progress;
pub mod reconcile;
pub mod staging;
pub mod validation;

pub use domain::{
    Book, BookId, NewBook, NewSession, Session, SessionFilter, SessionId, UpdateSessionCommand,
};
pub use ports::{LibraryService, PortError, PortResult, SessionCommandService};
pub use progress::BookProgress;
pub use reconcile::{ReconciliationSession, SaveError, SaveReport, SaveStep};
pub use staging::{SessionEdit, SessionField, StagedEdit, StagingBuffer};
pub use validation::{validate, ValidationReport};
