use time::{Duration, OffsetDateTime};

/// True while the most recent chat log for the ordered pair is inside the trailing cooldown.
///
/// A log exactly `days` old still blocks.
pub fn cooldown_active(last_logged: Option<OffsetDateTime>, now: OffsetDateTime, days: i64) -> bool {
	match last_logged {
		Some(at) => now - at <= Duration::days(days),
		None => false,
	}
}

/// Both departments must be non-empty and differ.
pub fn is_cross_department(actor: Option<&str>, other: Option<&str>) -> bool {
	match (actor.map(str::trim), other.map(str::trim)) {
		(Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => a != b,
		_ => false,
	}
}
