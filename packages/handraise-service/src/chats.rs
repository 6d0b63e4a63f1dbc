use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, HandraiseService, Principal, Result};
use handraise_domain::{chat, ledger::Reason};
use handraise_storage::{ledger, queries};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatLogRequest {
	/// Username of the colleague the caller chatted with.
	pub other: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatLogResponse {
	pub other_id: i64,
	pub points_awarded: i64,
	pub cross_department: bool,
	pub points_balance: i64,
}

impl HandraiseService {
	/// Records a 1:1 chat and pays the weekly chat bonus.
	pub async fn log_chat(&self, principal: &Principal, req: ChatLogRequest) -> Result<ChatLogResponse> {
		let other_name = req.other.trim().trim_start_matches('@');

		if other_name.is_empty() {
			return Err(Error::InvalidRequest { message: "other is required.".to_string() });
		}

		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let other = queries::find_user_by_username(&mut *tx, other_name)
			.await?
			.ok_or_else(|| Error::NotFound { message: "User not found.".to_string() })?;

		if other.id == principal.user_id {
			return Err(Error::InvalidRequest {
				message: "You cannot log a chat with yourself.".to_string(),
			});
		}

		// Serializes concurrent logs by the same actor.
		let actor_department: Option<String> =
			sqlx::query_scalar("SELECT department FROM profiles WHERE user_id = $1 FOR UPDATE")
				.bind(principal.user_id)
				.fetch_optional(&mut *tx)
				.await?;
		let Some(actor_department) = actor_department else {
			return Err(Error::NotFound { message: "Profile not found.".to_string() });
		};
		let last_logged: Option<OffsetDateTime> = sqlx::query_scalar(
			"SELECT max(created_at) FROM chat_logs WHERE user_id = $1 AND other_id = $2",
		)
		.bind(principal.user_id)
		.bind(other.id)
		.fetch_one(&mut *tx)
		.await?;

		if chat::cooldown_active(last_logged, now, self.cfg.engagement.chat_cooldown_days) {
			return Err(Error::Conflict {
				message: "You already logged a chat with this colleague this week.".to_string(),
			});
		}

		let other_department: Option<String> =
			sqlx::query_scalar("SELECT department FROM profiles WHERE user_id = $1")
				.bind(other.id)
				.fetch_optional(&mut *tx)
				.await?;

		sqlx::query("INSERT INTO chat_logs (user_id, other_id, created_at) VALUES ($1, $2, $3)")
			.bind(principal.user_id)
			.bind(other.id)
			.bind(now)
			.execute(&mut *tx)
			.await?;

		let engagement = &self.cfg.engagement;
		let mut points_awarded = engagement.chat_points;
		let mut points_balance = ledger::award(
			&mut tx,
			principal.user_id,
			engagement.chat_points,
			Reason::LoggedChat.as_str(),
			now,
		)
		.await?;
		let cross_department =
			chat::is_cross_department(Some(actor_department.as_str()), other_department.as_deref());

		if cross_department {
			points_awarded += engagement.cross_department_points;
			points_balance = ledger::award(
				&mut tx,
				principal.user_id,
				engagement.cross_department_points,
				Reason::CrossDepartmentBonus.as_str(),
				now,
			)
			.await?;
		}

		tx.commit().await?;

		tracing::info!(
			user_id = principal.user_id,
			other_id = other.id,
			points_awarded,
			cross_department,
			"Chat logged."
		);

		Ok(ChatLogResponse { other_id: other.id, points_awarded, cross_department, points_balance })
	}
}
