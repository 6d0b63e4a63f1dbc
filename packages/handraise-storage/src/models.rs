use time::OffsetDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
	pub id: i64,
	pub username: String,
	pub email: String,
	pub first_name: String,
	pub last_name: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Credential {
	pub id: i64,
	pub username: String,
	/// Argon2id PHC string.
	pub password_hash: String,
}

/// A user joined with their profile.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
	pub user_id: i64,
	pub username: String,
	pub email: String,
	pub first_name: String,
	pub last_name: String,
	pub department: String,
	pub position: String,
	pub bio: String,
	pub hobbies: String,
	pub avatar_url: String,
	pub years_experience: i32,
	pub points_balance: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Tag {
	pub id: i64,
	pub name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Question {
	pub id: i64,
	pub title: String,
	pub body: String,
	pub created_by: Option<i64>,
	/// Username of `created_by`, regardless of the anonymous flag.
	pub creator_username: Option<String>,
	pub anonymous: bool,
	pub urgent: bool,
	pub assigned_answerer_id: Option<i64>,
	pub best_answer_id: Option<i64>,
	pub auto_awarded: bool,
	pub created_at: OffsetDateTime,
	pub answer_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Answer {
	pub id: i64,
	pub question_id: i64,
	pub author_id: Option<i64>,
	pub author_username: Option<String>,
	pub body: String,
	pub created_at: OffsetDateTime,
	pub like_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PointTransaction {
	pub id: i64,
	pub user_id: i64,
	pub amount: i64,
	pub reason: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Notification {
	pub id: i64,
	pub recipient_id: i64,
	pub message: String,
	pub question_id: Option<i64>,
	pub read: bool,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DirectQuestion {
	pub id: i64,
	pub sender_id: i64,
	pub sender_username: String,
	pub recipient_id: i64,
	pub recipient_username: String,
	pub title: String,
	pub body: String,
	pub created_at: OffsetDateTime,
}
