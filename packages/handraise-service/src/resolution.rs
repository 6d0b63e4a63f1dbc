//! Lazy 24-hour resolution of questions nobody picked a best answer for.
//!
//! Every question read path calls [`HandraiseService::resolve_due`] before serializing. The first
//! reader to flip `auto_awarded` wins the transition and pays out; everyone else skips.

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::{HandraiseService, Result};
use handraise_domain::{
	ledger::Reason,
	resolution::{self as rules, Candidate},
	window,
};
use handraise_storage::{ledger, models::Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolutionOutcome {
	/// Not due, already resolved, or another reader claimed it first.
	Skipped,
	NoAnswers,
	Awarded { answer_id: i64, user_id: i64, points: i64 },
	/// The winning answer lost its author; nothing is paid out.
	Unattributed { answer_id: i64 },
}

impl HandraiseService {
	pub(crate) async fn resolve_due(&self, questions: &mut [Question]) -> Result<()> {
		let now = OffsetDateTime::now_utc();
		let delay = Duration::seconds(self.cfg.engagement.auto_award_after_seconds);

		for question in questions.iter_mut() {
			if question.auto_awarded || question.best_answer_id.is_some() {
				continue;
			}
			if !window::auto_resolution_due(question.created_at, now, delay) {
				continue;
			}

			self.resolve_question(question.id, now).await?;

			question.auto_awarded = true;
		}

		Ok(())
	}

	/// Runs the resolution for one question as of `now`.
	pub async fn resolve_question(
		&self,
		question_id: i64,
		now: OffsetDateTime,
	) -> Result<ResolutionOutcome> {
		let due_at_or_before = now - Duration::seconds(self.cfg.engagement.auto_award_after_seconds);
		let mut tx = self.db.pool.begin().await?;
		let claimed: Option<i64> = sqlx::query_scalar(
			"\
UPDATE questions
SET auto_awarded = TRUE
WHERE id = $1
	AND auto_awarded = FALSE
	AND best_answer_id IS NULL
	AND created_at <= $2
RETURNING id",
		)
		.bind(question_id)
		.bind(due_at_or_before)
		.fetch_optional(&mut *tx)
		.await?;

		if claimed.is_none() {
			tx.rollback().await?;

			return Ok(ResolutionOutcome::Skipped);
		}

		let rows: Vec<(i64, Option<i64>, i64, i32)> = sqlx::query_as(
			"\
SELECT
	a.id,
	a.author_id,
	count(l.user_id) AS like_count,
	COALESCE(p.years_experience, 0) AS years_experience
FROM answers a
LEFT JOIN answer_likes l ON l.answer_id = a.id
LEFT JOIN profiles p ON p.user_id = a.author_id
WHERE a.question_id = $1
GROUP BY a.id, a.author_id, p.years_experience",
		)
		.bind(question_id)
		.fetch_all(&mut *tx)
		.await?;
		let candidates: Vec<Candidate> = rows
			.into_iter()
			.map(|(answer_id, author_id, like_count, years_experience)| Candidate {
				answer_id,
				author_id,
				like_count,
				years_experience,
			})
			.collect();
		let outcome = match rules::select_winner(&candidates) {
			None => ResolutionOutcome::NoAnswers,
			Some(Candidate { answer_id, author_id: Some(user_id), .. }) => {
				let points = self.cfg.engagement.auto_award_points;

				ledger::award(&mut tx, *user_id, points, Reason::AutoResolutionBonus.as_str(), now)
					.await?;

				ResolutionOutcome::Awarded { answer_id: *answer_id, user_id: *user_id, points }
			},
			Some(winner) => ResolutionOutcome::Unattributed { answer_id: winner.answer_id },
		};

		tx.commit().await?;

		tracing::info!(question_id, ?outcome, "Question auto-resolved.");

		Ok(outcome)
	}
}
