use sqlx::{PgConnection, PgExecutor};
use time::OffsetDateTime;

use crate::{
	Result,
	models::{Answer, Profile, Question, Tag, User},
};

/// Column list shared by every question read. Append `WHERE`/`ORDER BY` clauses.
pub const QUESTION_SELECT: &str = "\
SELECT
	q.id,
	q.title,
	q.body,
	q.created_by,
	u.username AS creator_username,
	q.anonymous,
	q.urgent,
	q.assigned_answerer_id,
	q.best_answer_id,
	q.auto_awarded,
	q.created_at,
	(SELECT count(*) FROM answers a WHERE a.question_id = q.id) AS answer_count
FROM questions q
LEFT JOIN users u ON u.id = q.created_by";

pub const ANSWER_SELECT: &str = "\
SELECT
	a.id,
	a.question_id,
	a.author_id,
	u.username AS author_username,
	a.body,
	a.created_at,
	(SELECT count(*) FROM answer_likes l WHERE l.answer_id = a.id) AS like_count
FROM answers a
LEFT JOIN users u ON u.id = a.author_id";

pub const PROFILE_SELECT: &str = "\
SELECT
	u.id AS user_id,
	u.username,
	u.email,
	u.first_name,
	u.last_name,
	p.department,
	p.position,
	p.bio,
	p.hobbies,
	p.avatar_url,
	p.years_experience,
	p.points_balance
FROM users u
JOIN profiles p ON p.user_id = u.id";

pub async fn get_question<'e, E>(executor: E, question_id: i64) -> Result<Option<Question>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("{QUESTION_SELECT}\nWHERE q.id = $1");
	let row = sqlx::query_as::<_, Question>(&sql).bind(question_id).fetch_optional(executor).await?;

	Ok(row)
}

pub async fn get_answer<'e, E>(executor: E, answer_id: i64) -> Result<Option<Answer>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("{ANSWER_SELECT}\nWHERE a.id = $1");
	let row = sqlx::query_as::<_, Answer>(&sql).bind(answer_id).fetch_optional(executor).await?;

	Ok(row)
}

pub async fn list_answers<'e, E>(executor: E, question_id: i64) -> Result<Vec<Answer>>
where
	E: PgExecutor<'e>,
{
	let sql =
		format!("{ANSWER_SELECT}\nWHERE a.question_id = $1\nORDER BY a.created_at DESC, a.id DESC");
	let rows = sqlx::query_as::<_, Answer>(&sql).bind(question_id).fetch_all(executor).await?;

	Ok(rows)
}

pub async fn get_profile<'e, E>(executor: E, user_id: i64) -> Result<Option<Profile>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("{PROFILE_SELECT}\nWHERE u.id = $1");
	let row = sqlx::query_as::<_, Profile>(&sql).bind(user_id).fetch_optional(executor).await?;

	Ok(row)
}

pub async fn get_user<'e, E>(executor: E, user_id: i64) -> Result<Option<User>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, User>(
		"\
SELECT id, username, email, first_name, last_name, created_at
FROM users
WHERE id = $1",
	)
	.bind(user_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn find_user_by_username<'e, E>(executor: E, username: &str) -> Result<Option<User>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, User>(
		"\
SELECT id, username, email, first_name, last_name, created_at
FROM users
WHERE username = $1",
	)
	.bind(username)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn find_user_by_email<'e, E>(executor: E, email: &str) -> Result<Option<User>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, User>(
		"\
SELECT id, username, email, first_name, last_name, created_at
FROM users
WHERE email <> ''
	AND lower(email) = lower($1)",
	)
	.bind(email.trim())
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

/// Inserts missing tags and returns every requested tag. Names must already be normalized.
pub async fn ensure_tags(conn: &mut PgConnection, names: &[String]) -> Result<Vec<Tag>> {
	let mut tags = Vec::with_capacity(names.len());

	for name in names {
		// The no-op update makes RETURNING yield the existing row on conflict.
		let tag = sqlx::query_as::<_, Tag>(
			"\
INSERT INTO tags (name)
VALUES ($1)
ON CONFLICT (name) DO UPDATE
SET name = EXCLUDED.name
RETURNING id, name",
		)
		.bind(name.as_str())
		.fetch_one(&mut *conn)
		.await?;

		tags.push(tag);
	}

	Ok(tags)
}

pub async fn list_tags<'e, E>(executor: E) -> Result<Vec<Tag>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name ASC")
		.fetch_all(executor)
		.await?;

	Ok(rows)
}

pub async fn link_question_tags(
	conn: &mut PgConnection,
	question_id: i64,
	tags: &[Tag],
) -> Result<()> {
	for tag in tags {
		sqlx::query(
			"\
INSERT INTO question_tags (question_id, tag_id)
VALUES ($1, $2)
ON CONFLICT DO NOTHING",
		)
		.bind(question_id)
		.bind(tag.id)
		.execute(&mut *conn)
		.await?;
	}

	Ok(())
}

/// `(question_id, tag name)` pairs for the given questions.
pub async fn question_tags<'e, E>(executor: E, question_ids: &[i64]) -> Result<Vec<(i64, String)>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, (i64, String)>(
		"\
SELECT qt.question_id, t.name
FROM question_tags qt
JOIN tags t ON t.id = qt.tag_id
WHERE qt.question_id = ANY($1)
ORDER BY qt.question_id, t.name",
	)
	.bind(question_ids)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn link_direct_question_tags(
	conn: &mut PgConnection,
	direct_question_id: i64,
	tags: &[Tag],
) -> Result<()> {
	for tag in tags {
		sqlx::query(
			"\
INSERT INTO direct_question_tags (direct_question_id, tag_id)
VALUES ($1, $2)
ON CONFLICT DO NOTHING",
		)
		.bind(direct_question_id)
		.bind(tag.id)
		.execute(&mut *conn)
		.await?;
	}

	Ok(())
}

pub async fn direct_question_tags<'e, E>(
	executor: E,
	direct_question_ids: &[i64],
) -> Result<Vec<(i64, String)>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, (i64, String)>(
		"\
SELECT dt.direct_question_id, t.name
FROM direct_question_tags dt
JOIN tags t ON t.id = dt.tag_id
WHERE dt.direct_question_id = ANY($1)
ORDER BY dt.direct_question_id, t.name",
	)
	.bind(direct_question_ids)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Replaces a profile's expertise set wholesale.
pub async fn replace_expertise(conn: &mut PgConnection, user_id: i64, tags: &[Tag]) -> Result<()> {
	sqlx::query("DELETE FROM profile_expertise WHERE user_id = $1")
		.bind(user_id)
		.execute(&mut *conn)
		.await?;

	for tag in tags {
		sqlx::query(
			"\
INSERT INTO profile_expertise (user_id, tag_id)
VALUES ($1, $2)
ON CONFLICT DO NOTHING",
		)
		.bind(user_id)
		.bind(tag.id)
		.execute(&mut *conn)
		.await?;
	}

	Ok(())
}

/// `(user_id, tag name)` pairs for the given users.
pub async fn expertise<'e, E>(executor: E, user_ids: &[i64]) -> Result<Vec<(i64, String)>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, (i64, String)>(
		"\
SELECT pe.user_id, t.name
FROM profile_expertise pe
JOIN tags t ON t.id = pe.tag_id
WHERE pe.user_id = ANY($1)
ORDER BY pe.user_id, t.name",
	)
	.bind(user_ids)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// A user whose expertise intersects a tag set.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Expert {
	pub user_id: i64,
	pub email: String,
	/// Matching tag names, comma separated in name order.
	pub matched_tags: String,
}

/// Users with expertise in any of `tag_names`, one row per user, excluding `exclude_user_id`.
pub async fn experts_for_tags<'e, E>(
	executor: E,
	tag_names: &[String],
	exclude_user_id: i64,
) -> Result<Vec<Expert>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, Expert>(
		"\
SELECT
	u.id AS user_id,
	u.email,
	string_agg(t.name, ', ' ORDER BY t.name) AS matched_tags
FROM profile_expertise pe
JOIN tags t ON t.id = pe.tag_id
JOIN users u ON u.id = pe.user_id
WHERE lower(t.name) = ANY($1)
	AND u.id <> $2
GROUP BY u.id, u.email
ORDER BY u.id",
	)
	.bind(tag_names)
	.bind(exclude_user_id)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn insert_notification<'e, E>(
	executor: E,
	recipient_id: i64,
	message: &str,
	question_id: Option<i64>,
	at: OffsetDateTime,
) -> Result<i64>
where
	E: PgExecutor<'e>,
{
	let id = sqlx::query_scalar(
		"\
INSERT INTO notifications (recipient_id, message, question_id, created_at)
VALUES ($1, $2, $3, $4)
RETURNING id",
	)
	.bind(recipient_id)
	.bind(message)
	.bind(question_id)
	.bind(at)
	.fetch_one(executor)
	.await?;

	Ok(id)
}
