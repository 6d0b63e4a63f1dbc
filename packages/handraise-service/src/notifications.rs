//! In-app notifications and their email mirrors.
//!
//! Writers run inside the caller's transaction and return the emails to send; the caller hands
//! them to [`HandraiseService::dispatch_mail`] after commit.

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{HandraiseService, MailMessage, Principal, Result};
use handraise_storage::{
	models::{Notification, User},
	queries,
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MarkReadRequest {
	/// Restricts the update to these ids. All unread notifications when absent or empty.
	#[serde(default)]
	pub ids: Option<Vec<i64>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MarkReadResponse {
	pub updated: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct NotificationView {
	pub id: i64,
	pub message: String,
	pub question_id: Option<i64>,
	pub read: bool,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}
impl From<Notification> for NotificationView {
	fn from(row: Notification) -> Self {
		Self {
			id: row.id,
			message: row.message,
			question_id: row.question_id,
			read: row.read,
			created_at: row.created_at,
		}
	}
}

impl HandraiseService {
	pub async fn list_notifications(&self, principal: &Principal) -> Result<Vec<NotificationView>> {
		let rows = sqlx::query_as::<_, Notification>(
			"\
SELECT id, recipient_id, message, question_id, read, created_at
FROM notifications
WHERE recipient_id = $1
ORDER BY created_at DESC, id DESC
LIMIT $2",
		)
		.bind(principal.user_id)
		.bind(i64::from(self.cfg.listing.max_notifications))
		.fetch_all(&self.db.pool)
		.await?;

		Ok(rows.into_iter().map(NotificationView::from).collect())
	}

	pub async fn mark_notifications_read(
		&self,
		principal: &Principal,
		req: MarkReadRequest,
	) -> Result<MarkReadResponse> {
		let mut builder = mark_read_query(principal.user_id, req.ids);
		let updated = builder.build().execute(&self.db.pool).await?.rows_affected();

		Ok(MarkReadResponse { updated })
	}
}

fn mark_read_query(recipient_id: i64, ids: Option<Vec<i64>>) -> QueryBuilder<'static, Postgres> {
	let mut builder = QueryBuilder::<Postgres>::new(
		"UPDATE notifications SET read = TRUE WHERE read = FALSE AND recipient_id = ",
	);

	builder.push_bind(recipient_id);

	if let Some(ids) = ids.filter(|ids| !ids.is_empty()) {
		builder.push(" AND id = ANY(");
		builder.push_bind(ids);
		builder.push(")");
	}

	builder
}

/// Notifies every expert in the question's tags except the poster. One row per expert.
pub(crate) async fn fan_out_urgent(
	conn: &mut PgConnection,
	poster_id: i64,
	question_id: i64,
	title: &str,
	tags: &[String],
	now: OffsetDateTime,
) -> Result<Vec<MailMessage>> {
	let experts = queries::experts_for_tags(&mut *conn, tags, poster_id).await?;
	let mut outbound = Vec::new();

	for expert in &experts {
		let message = urgent_message(title, &expert.matched_tags);

		queries::insert_notification(&mut *conn, expert.user_id, &message, Some(question_id), now)
			.await?;

		if !expert.email.is_empty() {
			outbound.push(MailMessage {
				to: expert.email.clone(),
				subject: format!("Urgent question: {title}"),
				body: message,
			});
		}
	}

	tracing::info!(question_id, recipients = experts.len(), "Urgent question fanned out.");

	Ok(outbound)
}

pub(crate) async fn notify_assignee(
	conn: &mut PgConnection,
	assignee: &User,
	question_id: i64,
	title: &str,
	now: OffsetDateTime,
) -> Result<Option<MailMessage>> {
	let message = assigned_message(title);

	queries::insert_notification(&mut *conn, assignee.id, &message, Some(question_id), now).await?;

	if assignee.email.is_empty() {
		return Ok(None);
	}

	Ok(Some(MailMessage {
		to: assignee.email.clone(),
		subject: format!("You were assigned a question: {title}"),
		body: message,
	}))
}

pub(crate) async fn notify_new_answer(
	conn: &mut PgConnection,
	creator_id: i64,
	question_id: i64,
	title: &str,
	now: OffsetDateTime,
) -> Result<()> {
	let message = format!("New answer to: {title}");

	queries::insert_notification(&mut *conn, creator_id, &message, Some(question_id), now).await?;

	Ok(())
}

pub(crate) async fn notify_best_answer(
	conn: &mut PgConnection,
	author_id: i64,
	question_id: i64,
	title: &str,
	now: OffsetDateTime,
) -> Result<()> {
	let message = format!("Your answer was marked as best: {title}");

	queries::insert_notification(&mut *conn, author_id, &message, Some(question_id), now).await?;

	Ok(())
}

pub(crate) async fn notify_direct_question(
	conn: &mut PgConnection,
	recipient_id: i64,
	sender_username: &str,
	title: &str,
	now: OffsetDateTime,
) -> Result<()> {
	let message = format!("You have a new direct question from {sender_username}: {title}");

	queries::insert_notification(&mut *conn, recipient_id, &message, None, now).await?;

	Ok(())
}

fn urgent_message(title: &str, matched_tags: &str) -> String {
	format!("URGENT: {title} (tags: {matched_tags})")
}

fn assigned_message(title: &str) -> String {
	format!("You were assigned to answer: {title}")
}
