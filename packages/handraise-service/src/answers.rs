use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use time::OffsetDateTime;

use crate::{Error, HandraiseService, Principal, Result, UserRef};
use handraise_domain::{ledger::Reason, window};
use handraise_storage::{ledger, models::Answer, queries};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerRequest {
	#[serde(default)]
	pub body: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnswerView {
	pub id: i64,
	pub question_id: i64,
	pub author: Option<UserRef>,
	pub mine: bool,
	pub body: String,
	pub like_count: i64,
	pub liked_by_me: bool,
	pub is_best: bool,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct LikeResponse {
	pub answer_id: i64,
	pub like_count: i64,
	/// False when the like already existed.
	pub created: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct MarkBestResponse {
	pub question_id: i64,
	pub best_answer_id: i64,
	pub points_awarded: i64,
}

impl HandraiseService {
	/// Answers for a question, newest first. Resolves the question first when it is due.
	pub async fn list_answers(&self, principal: &Principal, question_id: i64) -> Result<Vec<AnswerView>> {
		let question = queries::get_question(&self.db.pool, question_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Question not found.".to_string() })?;
		let mut questions = vec![question];

		self.resolve_due(&mut questions).await?;

		let best_answer_id = questions[0].best_answer_id;
		let answers = queries::list_answers(&self.db.pool, question_id).await?;
		let ids: Vec<i64> = answers.iter().map(|answer| answer.id).collect();
		let liked: Vec<i64> = sqlx::query_scalar(
			"SELECT answer_id FROM answer_likes WHERE user_id = $1 AND answer_id = ANY($2)",
		)
		.bind(principal.user_id)
		.bind(&ids)
		.fetch_all(&self.db.pool)
		.await?;

		Ok(answers
			.into_iter()
			.map(|answer| {
				let liked_by_me = liked.contains(&answer.id);

				project_answer(principal, answer, best_answer_id, liked_by_me)
			})
			.collect())
	}

	pub async fn answer_question(
		&self,
		principal: &Principal,
		question_id: i64,
		req: AnswerRequest,
	) -> Result<AnswerView> {
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let question = queries::get_question(&mut *tx, question_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Question not found.".to_string() })?;

		if let Some(assignee) = question.assigned_answerer_id
			&& assignee != principal.user_id
		{
			return Err(Error::Forbidden {
				message: "Only the assigned answerer can answer this question.".to_string(),
			});
		}

		let already_answered: bool = sqlx::query_scalar(
			"SELECT EXISTS (SELECT 1 FROM answers WHERE question_id = $1 AND author_id = $2)",
		)
		.bind(question_id)
		.bind(principal.user_id)
		.fetch_one(&mut *tx)
		.await?;

		if already_answered {
			return Err(already_answered_error());
		}

		let body = req.body.trim();

		if body.is_empty() {
			return Err(Error::InvalidRequest { message: "body is required.".to_string() });
		}

		// A concurrent duplicate loses on the (question_id, author_id) constraint.
		let answer_id: Option<i64> = sqlx::query_scalar(
			"\
INSERT INTO answers (question_id, author_id, body, created_at)
VALUES ($1, $2, $3, $4)
ON CONFLICT (question_id, author_id) DO NOTHING
RETURNING id",
		)
		.bind(question_id)
		.bind(principal.user_id)
		.bind(body)
		.bind(now)
		.fetch_optional(&mut *tx)
		.await?;
		let Some(answer_id) = answer_id else {
			return Err(already_answered_error());
		};

		ledger::award(
			&mut tx,
			principal.user_id,
			self.cfg.engagement.answer_points,
			Reason::AnsweredQuestion.as_str(),
			now,
		)
		.await?;

		if let Some(creator) = question.created_by
			&& !question.anonymous
			&& creator != principal.user_id
		{
			crate::notifications::notify_new_answer(&mut tx, creator, question_id, &question.title, now)
				.await?;
		}

		tx.commit().await?;

		tracing::info!(question_id, answer_id, user_id = principal.user_id, "Answer posted.");

		self.answer_view(principal, answer_id).await
	}

	pub async fn edit_answer(
		&self,
		principal: &Principal,
		answer_id: i64,
		req: AnswerRequest,
	) -> Result<AnswerView> {
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;

		self.lock_own_answer(&mut tx, principal, answer_id, now).await?;

		let body = req.body.trim();

		if body.is_empty() {
			return Err(Error::InvalidRequest { message: "body is required.".to_string() });
		}

		sqlx::query("UPDATE answers SET body = $1 WHERE id = $2")
			.bind(body)
			.bind(answer_id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		self.answer_view(principal, answer_id).await
	}

	/// Deletes an answer within the edit window, clearing it as best answer if it was one.
	pub async fn delete_answer(&self, principal: &Principal, answer_id: i64) -> Result<()> {
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let question_id = self.lock_own_answer(&mut tx, principal, answer_id, now).await?;

		sqlx::query("UPDATE questions SET best_answer_id = NULL WHERE id = $1 AND best_answer_id = $2")
			.bind(question_id)
			.bind(answer_id)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM answers WHERE id = $1")
			.bind(answer_id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		tracing::info!(question_id, answer_id, user_id = principal.user_id, "Answer deleted.");

		Ok(())
	}

	/// Idempotent like. Returns the like count after the call.
	pub async fn like_answer(&self, principal: &Principal, answer_id: i64) -> Result<LikeResponse> {
		let author_id: Option<Option<i64>> =
			sqlx::query_scalar("SELECT author_id FROM answers WHERE id = $1")
				.bind(answer_id)
				.fetch_optional(&self.db.pool)
				.await?;
		let Some(author_id) = author_id else {
			return Err(Error::NotFound { message: "Answer not found.".to_string() });
		};

		if author_id == Some(principal.user_id) {
			return Err(Error::InvalidRequest {
				message: "You cannot like your own answer.".to_string(),
			});
		}

		let inserted = sqlx::query(
			"\
INSERT INTO answer_likes (answer_id, user_id)
VALUES ($1, $2)
ON CONFLICT DO NOTHING",
		)
		.bind(answer_id)
		.bind(principal.user_id)
		.execute(&self.db.pool)
		.await?
		.rows_affected();
		let like_count: i64 = sqlx::query_scalar("SELECT count(*) FROM answer_likes WHERE answer_id = $1")
			.bind(answer_id)
			.fetch_one(&self.db.pool)
			.await?;

		Ok(LikeResponse { answer_id, like_count, created: inserted > 0 })
	}

	/// Lets the asker pick the best answer. Also closes the question for auto-resolution.
	pub async fn mark_best_answer(
		&self,
		principal: &Principal,
		answer_id: i64,
	) -> Result<MarkBestResponse> {
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let answer: Option<(i64, Option<i64>)> =
			sqlx::query_as("SELECT question_id, author_id FROM answers WHERE id = $1 FOR SHARE")
				.bind(answer_id)
				.fetch_optional(&mut *tx)
				.await?;
		let Some((question_id, author_id)) = answer else {
			return Err(Error::NotFound { message: "Answer not found.".to_string() });
		};
		let (created_by, current_best, title): (Option<i64>, Option<i64>, String) = sqlx::query_as(
			"SELECT created_by, best_answer_id, title FROM questions WHERE id = $1 FOR UPDATE",
		)
		.bind(question_id)
		.fetch_one(&mut *tx)
		.await?;

		if created_by != Some(principal.user_id) {
			return Err(Error::Forbidden {
				message: "Only the asker can select the best answer.".to_string(),
			});
		}
		if current_best == Some(answer_id) {
			tx.commit().await?;

			return Ok(MarkBestResponse { question_id, best_answer_id: answer_id, points_awarded: 0 });
		}

		sqlx::query("UPDATE questions SET best_answer_id = $1, auto_awarded = TRUE WHERE id = $2")
			.bind(answer_id)
			.bind(question_id)
			.execute(&mut *tx)
			.await?;

		let mut points_awarded = 0;

		if let Some(author_id) = author_id {
			points_awarded = self.cfg.engagement.best_answer_points;

			ledger::award(
				&mut tx,
				author_id,
				points_awarded,
				Reason::BestAnswerSelected.as_str(),
				now,
			)
			.await?;
			crate::notifications::notify_best_answer(&mut tx, author_id, question_id, &title, now)
				.await?;
		}

		tx.commit().await?;

		tracing::info!(question_id, answer_id, points_awarded, "Best answer selected.");

		Ok(MarkBestResponse { question_id, best_answer_id: answer_id, points_awarded })
	}

	/// Locks the answer row and checks authorship and the edit window. Returns its question id.
	async fn lock_own_answer(
		&self,
		conn: &mut PgConnection,
		principal: &Principal,
		answer_id: i64,
		now: OffsetDateTime,
	) -> Result<i64> {
		let row: Option<(i64, Option<i64>, OffsetDateTime)> = sqlx::query_as(
			"SELECT question_id, author_id, created_at FROM answers WHERE id = $1 FOR UPDATE",
		)
		.bind(answer_id)
		.fetch_optional(&mut *conn)
		.await?;
		let Some((question_id, author_id, created_at)) = row else {
			return Err(Error::NotFound { message: "Answer not found.".to_string() });
		};

		if author_id != Some(principal.user_id) {
			return Err(Error::Forbidden {
				message: "Only the author can change this answer.".to_string(),
			});
		}
		if !window::edit_window_open(created_at, now, self.edit_window()) {
			return Err(Error::Forbidden { message: "Edit window expired.".to_string() });
		}

		Ok(question_id)
	}

	async fn answer_view(&self, principal: &Principal, answer_id: i64) -> Result<AnswerView> {
		let answer = queries::get_answer(&self.db.pool, answer_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Answer not found.".to_string() })?;
		let best_answer_id: Option<i64> =
			sqlx::query_scalar("SELECT best_answer_id FROM questions WHERE id = $1")
				.bind(answer.question_id)
				.fetch_one(&self.db.pool)
				.await?;
		let liked_by_me: bool = sqlx::query_scalar(
			"SELECT EXISTS (SELECT 1 FROM answer_likes WHERE answer_id = $1 AND user_id = $2)",
		)
		.bind(answer_id)
		.bind(principal.user_id)
		.fetch_one(&self.db.pool)
		.await?;

		Ok(project_answer(principal, answer, best_answer_id, liked_by_me))
	}
}

fn already_answered_error() -> Error {
	Error::Conflict { message: "You already answered this question.".to_string() }
}

fn project_answer(
	principal: &Principal,
	answer: Answer,
	best_answer_id: Option<i64>,
	liked_by_me: bool,
) -> AnswerView {
	let author = match (answer.author_id, answer.author_username) {
		(Some(id), Some(username)) => Some(UserRef { id, username }),
		_ => None,
	};

	AnswerView {
		id: answer.id,
		question_id: answer.question_id,
		mine: answer.author_id == Some(principal.user_id),
		author,
		body: answer.body,
		like_count: answer.like_count,
		liked_by_me,
		is_best: best_answer_id == Some(answer.id),
		created_at: answer.created_at,
	}
}
