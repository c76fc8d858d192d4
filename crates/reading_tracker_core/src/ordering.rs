//! Display and validation order for a book's session history.

use std::cmp::{Ordering, Reverse};

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::Session;

/// Newest first: `session_date` descending, then `created_at` descending.
///
/// On a shared date a session with a `created_at` sorts ahead of one without.
pub fn compare_sessions(a: &Session, b: &Session) -> Ordering {
    sort_key(a).cmp(&sort_key(b))
}

type SortKey = (Reverse<NaiveDate>, Reverse<Option<DateTime<Utc>>>);

fn sort_key(session: &Session) -> SortKey {
    (Reverse(session.session_date), Reverse(session.created_at))
}

/// Sorts in place. The sort is stable, so sessions with identical keys keep
/// their relative order and sorting again is a no-op.
pub fn sort_sessions(sessions: &mut [Session]) {
    sessions.sort_by(compare_sessions);
}

pub fn sorted_sessions(mut sessions: Vec<Session>) -> Vec<Session> {
    sort_sessions(&mut sessions);
    sessions
}
