use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, HandraiseService, Principal, Result, UserRef};
use handraise_domain::tags;
use handraise_storage::{models::DirectQuestion, queries};

const DIRECT_QUESTION_SELECT: &str = "\
SELECT
	d.id,
	d.sender_id,
	s.username AS sender_username,
	d.recipient_id,
	r.username AS recipient_username,
	d.title,
	d.body,
	d.created_at
FROM direct_questions d
JOIN users s ON s.id = d.sender_id
JOIN users r ON r.id = d.recipient_id";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateDirectQuestionRequest {
	pub recipient_id: i64,
	pub title: String,
	#[serde(default)]
	pub body: String,
	#[serde(default, deserialize_with = "crate::deserialize_tags")]
	pub tags: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DirectQuestionView {
	pub id: i64,
	pub sender: UserRef,
	pub recipient: UserRef,
	/// True when the viewer sent it.
	pub sent: bool,
	pub title: String,
	pub body: String,
	pub tags: Vec<String>,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

impl HandraiseService {
	pub async fn create_direct_question(
		&self,
		principal: &Principal,
		req: CreateDirectQuestionRequest,
	) -> Result<DirectQuestionView> {
		let title = req.title.trim();

		if title.is_empty() {
			return Err(Error::InvalidRequest { message: "title is required.".to_string() });
		}
		if req.recipient_id == principal.user_id {
			return Err(Error::InvalidRequest {
				message: "You cannot send a direct question to yourself.".to_string(),
			});
		}

		let now = OffsetDateTime::now_utc();
		let tag_names = tags::normalize_tags(&req.tags);
		let mut tx = self.db.pool.begin().await?;

		if queries::get_user(&mut *tx, req.recipient_id).await?.is_none() {
			return Err(Error::NotFound { message: "Recipient not found.".to_string() });
		}

		let direct_question_id: i64 = sqlx::query_scalar(
			"\
INSERT INTO direct_questions (sender_id, recipient_id, title, body, created_at)
VALUES ($1, $2, $3, $4, $5)
RETURNING id",
		)
		.bind(principal.user_id)
		.bind(req.recipient_id)
		.bind(title)
		.bind(req.body.trim())
		.bind(now)
		.fetch_one(&mut *tx)
		.await?;
		let tag_rows = queries::ensure_tags(&mut tx, &tag_names).await?;

		queries::link_direct_question_tags(&mut tx, direct_question_id, &tag_rows).await?;
		crate::notifications::notify_direct_question(
			&mut tx,
			req.recipient_id,
			&principal.username,
			title,
			now,
		)
		.await?;

		tx.commit().await?;

		tracing::info!(
			direct_question_id,
			sender_id = principal.user_id,
			recipient_id = req.recipient_id,
			"Direct question sent."
		);

		self.get_direct_question(principal, direct_question_id).await
	}

	/// Direct questions the caller sent or received, newest first.
	pub async fn list_direct_questions(&self, principal: &Principal) -> Result<Vec<DirectQuestionView>> {
		let sql = format!(
			"{DIRECT_QUESTION_SELECT}
WHERE d.sender_id = $1 OR d.recipient_id = $1
ORDER BY d.created_at DESC, d.id DESC
LIMIT $2"
		);
		let rows = sqlx::query_as::<_, DirectQuestion>(&sql)
			.bind(principal.user_id)
			.bind(i64::from(self.cfg.listing.max_direct_questions))
			.fetch_all(&self.db.pool)
			.await?;

		self.direct_question_views(principal, rows).await
	}

	pub async fn get_direct_question(
		&self,
		principal: &Principal,
		direct_question_id: i64,
	) -> Result<DirectQuestionView> {
		let sql = format!("{DIRECT_QUESTION_SELECT}\nWHERE d.id = $1");
		let row = sqlx::query_as::<_, DirectQuestion>(&sql)
			.bind(direct_question_id)
			.fetch_optional(&self.db.pool)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Direct question not found.".to_string() })?;

		if row.sender_id != principal.user_id && row.recipient_id != principal.user_id {
			return Err(Error::Forbidden {
				message: "Only the sender and the recipient can read this question.".to_string(),
			});
		}

		let mut views = self.direct_question_views(principal, vec![row]).await?;

		views.pop().ok_or_else(|| Error::NotFound { message: "Direct question not found.".to_string() })
	}

	async fn direct_question_views(
		&self,
		principal: &Principal,
		rows: Vec<DirectQuestion>,
	) -> Result<Vec<DirectQuestionView>> {
		let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
		let mut tags_by_id =
			crate::group_names(queries::direct_question_tags(&self.db.pool, &ids).await?);

		Ok(rows
			.into_iter()
			.map(|row| DirectQuestionView {
				id: row.id,
				sent: row.sender_id == principal.user_id,
				sender: UserRef { id: row.sender_id, username: row.sender_username },
				recipient: UserRef { id: row.recipient_id, username: row.recipient_username },
				title: row.title,
				body: row.body,
				tags: tags_by_id.remove(&row.id).unwrap_or_default(),
				created_at: row.created_at,
			})
			.collect())
	}
}
