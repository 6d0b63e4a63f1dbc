use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{Error, HandraiseService, Principal, Result, UserRef};
use handraise_domain::{ledger::Reason, tags, window};
use handraise_storage::{
	ledger,
	models::Question,
	queries::{self, QUESTION_SELECT},
};

const SUGGESTION_LIMIT: i64 = 5;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostQuestionRequest {
	pub title: String,
	#[serde(default)]
	pub body: String,
	#[serde(default, deserialize_with = "crate::deserialize_tags")]
	pub tags: Vec<String>,
	#[serde(default)]
	pub urgent: bool,
	#[serde(default)]
	pub assigned_answerer_id: Option<i64>,
	#[serde(default)]
	pub anonymous: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListQuestionsRequest {
	pub tag: Option<String>,
	pub page: Option<u32>,
	pub page_size: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ListQuestionsResponse {
	pub items: Vec<QuestionView>,
	pub page: u32,
	pub page_size: u32,
	pub total: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuestionView {
	pub id: i64,
	pub title: String,
	pub body: String,
	/// Null for anonymous questions, for every viewer.
	pub author: Option<UserRef>,
	/// True when the viewer created the question, anonymous or not.
	pub mine: bool,
	pub anonymous: bool,
	pub urgent: bool,
	pub tags: Vec<String>,
	pub assigned_answerer_id: Option<i64>,
	pub best_answer_id: Option<i64>,
	pub auto_awarded: bool,
	pub answer_count: i64,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuestionSuggestion {
	pub id: i64,
	pub title: String,
}

impl HandraiseService {
	pub async fn post_question(
		&self,
		principal: &Principal,
		req: PostQuestionRequest,
	) -> Result<QuestionView> {
		let title = req.title.trim();

		if title.is_empty() {
			return Err(Error::InvalidRequest { message: "title is required.".to_string() });
		}

		let tag_names = tags::normalize_tags(&req.tags);
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let assignee = match req.assigned_answerer_id {
			Some(user_id) => Some(queries::get_user(&mut *tx, user_id).await?.ok_or_else(|| {
				Error::NotFound { message: "Assigned answerer not found.".to_string() }
			})?),
			None => None,
		};
		let question_id: i64 = sqlx::query_scalar(
			"\
INSERT INTO questions (title, body, created_by, anonymous, urgent, assigned_answerer_id, created_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)
RETURNING id",
		)
		.bind(title)
		.bind(req.body.trim())
		.bind(principal.user_id)
		.bind(req.anonymous)
		.bind(req.urgent)
		.bind(assignee.as_ref().map(|user| user.id))
		.bind(now)
		.fetch_one(&mut *tx)
		.await?;
		let tag_rows = queries::ensure_tags(&mut tx, &tag_names).await?;

		queries::link_question_tags(&mut tx, question_id, &tag_rows).await?;
		ledger::award(
			&mut tx,
			principal.user_id,
			self.cfg.engagement.question_points,
			Reason::PostedQuestion.as_str(),
			now,
		)
		.await?;

		let mut outbound = Vec::new();

		if req.urgent && !tag_names.is_empty() {
			outbound.extend(
				crate::notifications::fan_out_urgent(
					&mut tx,
					principal.user_id,
					question_id,
					title,
					&tag_names,
					now,
				)
				.await?,
			);
		}
		if let Some(assignee) = assignee.as_ref() {
			outbound.extend(
				crate::notifications::notify_assignee(&mut tx, assignee, question_id, title, now)
					.await?,
			);
		}

		tx.commit().await?;

		tracing::info!(
			question_id,
			user_id = principal.user_id,
			urgent = req.urgent,
			anonymous = req.anonymous,
			emails = outbound.len(),
			"Question posted."
		);

		self.dispatch_mail(outbound);

		let row = queries::get_question(&self.db.pool, question_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Question not found.".to_string() })?;

		self.question_view(principal, row).await
	}

	pub async fn list_questions(
		&self,
		principal: &Principal,
		req: ListQuestionsRequest,
	) -> Result<ListQuestionsResponse> {
		let listing = &self.cfg.listing;
		let page = req.page.unwrap_or(1).max(1);
		let page_size = req.page_size.unwrap_or(listing.default_page_size).clamp(1, listing.max_page_size);
		let tag = req.tag.as_deref().and_then(tags::normalize_tag_name);
		let mut count = QueryBuilder::<Postgres>::new("SELECT count(*) FROM questions q");

		push_tag_filter(&mut count, tag.as_deref());

		let total: i64 = count.build_query_scalar().fetch_one(&self.db.pool).await?;
		let mut builder = QueryBuilder::<Postgres>::new(QUESTION_SELECT);

		push_tag_filter(&mut builder, tag.as_deref());
		builder.push("\nORDER BY q.created_at DESC, q.id DESC\nLIMIT ");
		builder.push_bind(i64::from(page_size));
		builder.push(" OFFSET ");
		builder.push_bind(i64::from(page - 1) * i64::from(page_size));

		let mut rows: Vec<Question> = builder.build_query_as().fetch_all(&self.db.pool).await?;

		self.resolve_due(&mut rows).await?;

		let items = self.question_views(principal, rows).await?;

		Ok(ListQuestionsResponse { items, page, page_size, total })
	}

	pub async fn get_question(&self, principal: &Principal, question_id: i64) -> Result<QuestionView> {
		let row = queries::get_question(&self.db.pool, question_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Question not found.".to_string() })?;
		let mut rows = vec![row];

		self.resolve_due(&mut rows).await?;

		let mut views = self.question_views(principal, rows).await?;

		views.pop().ok_or_else(|| Error::NotFound { message: "Question not found.".to_string() })
	}

	/// Deletes a question within the edit window. Ledger entries it produced stay.
	pub async fn delete_question(&self, principal: &Principal, question_id: i64) -> Result<()> {
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let row: Option<(Option<i64>, OffsetDateTime)> = sqlx::query_as(
			"SELECT created_by, created_at FROM questions WHERE id = $1 FOR UPDATE",
		)
		.bind(question_id)
		.fetch_optional(&mut *tx)
		.await?;
		let Some((created_by, created_at)) = row else {
			return Err(Error::NotFound { message: "Question not found.".to_string() });
		};

		if created_by != Some(principal.user_id) {
			return Err(Error::Forbidden {
				message: "Only the asker can delete this question.".to_string(),
			});
		}
		if !window::edit_window_open(created_at, now, self.edit_window()) {
			return Err(Error::Forbidden { message: "Delete window expired.".to_string() });
		}

		// Break the questions/answers reference cycle before the cascade runs.
		sqlx::query("UPDATE questions SET best_answer_id = NULL WHERE id = $1")
			.bind(question_id)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM questions WHERE id = $1")
			.bind(question_id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		tracing::info!(question_id, user_id = principal.user_id, "Question deleted.");

		Ok(())
	}

	/// Up to five questions whose title contains `fragment`, newest first.
	pub async fn suggest_questions(&self, fragment: &str) -> Result<Vec<QuestionSuggestion>> {
		let fragment = fragment.trim();

		if fragment.is_empty() {
			return Ok(Vec::new());
		}

		let rows: Vec<(i64, String)> = sqlx::query_as(
			"\
SELECT id, title
FROM questions
WHERE title ILIKE $1
ORDER BY created_at DESC, id DESC
LIMIT $2",
		)
		.bind(crate::contains_pattern(fragment))
		.bind(SUGGESTION_LIMIT)
		.fetch_all(&self.db.pool)
		.await?;

		Ok(rows.into_iter().map(|(id, title)| QuestionSuggestion { id, title }).collect())
	}

	pub(crate) async fn question_view(
		&self,
		principal: &Principal,
		row: Question,
	) -> Result<QuestionView> {
		let mut views = self.question_views(principal, vec![row]).await?;

		views.pop().ok_or_else(|| Error::NotFound { message: "Question not found.".to_string() })
	}

	pub(crate) async fn question_views(
		&self,
		principal: &Principal,
		rows: Vec<Question>,
	) -> Result<Vec<QuestionView>> {
		let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
		let mut tags_by_question = crate::group_names(queries::question_tags(&self.db.pool, &ids).await?);

		Ok(rows
			.into_iter()
			.map(|row| {
				let tags = tags_by_question.remove(&row.id).unwrap_or_default();

				project_question(principal, row, tags)
			})
			.collect())
	}
}

fn push_tag_filter(builder: &mut QueryBuilder<'_, Postgres>, tag: Option<&str>) {
	let Some(tag) = tag else {
		return;
	};

	builder.push(
		"\nWHERE EXISTS (\
\n\tSELECT 1\
\n\tFROM question_tags qt\
\n\tJOIN tags t ON t.id = qt.tag_id\
\n\tWHERE qt.question_id = q.id\
\n\t\tAND t.name = ",
	);
	builder.push_bind(tag.to_string());
	builder.push(")");
}

pub(crate) fn project_question(principal: &Principal, row: Question, tags: Vec<String>) -> QuestionView {
	let author = match (row.anonymous, row.created_by, row.creator_username) {
		(false, Some(id), Some(username)) => Some(UserRef { id, username }),
		_ => None,
	};

	QuestionView {
		id: row.id,
		title: row.title,
		body: row.body,
		author,
		mine: row.created_by == Some(principal.user_id),
		anonymous: row.anonymous,
		urgent: row.urgent,
		tags,
		assigned_answerer_id: row.assigned_answerer_id,
		best_answer_id: row.best_answer_id,
		auto_awarded: row.auto_awarded,
		answer_count: row.answer_count,
		created_at: row.created_at,
	}
}
