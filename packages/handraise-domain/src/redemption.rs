use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Builds the string encoded into a redemption QR image:
/// `<TAG>|USER:<username>|POINTS:<amount>|TS:<rfc3339>`.
pub fn encode_payload(
	protocol_tag: &str,
	username: &str,
	amount: i64,
	at: OffsetDateTime,
) -> Result<String, time::error::Format> {
	let ts = at.format(&Rfc3339)?;

	Ok(format!("{protocol_tag}|USER:{username}|POINTS:{amount}|TS:{ts}"))
}
