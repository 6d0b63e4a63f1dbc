use time::{Duration, OffsetDateTime};

/// Authors may edit or delete while `now - created_at <= window`; the boundary itself is allowed.
pub fn edit_window_open(created_at: OffsetDateTime, now: OffsetDateTime, window: Duration) -> bool {
	now - created_at <= window
}

pub fn auto_resolution_due(created_at: OffsetDateTime, now: OffsetDateTime, delay: Duration) -> bool {
	now - created_at >= delay
}
