//! Point ledger writes. Every change to `profiles.points_balance` goes through here together
//! with its immutable `point_transactions` row, inside the caller's transaction.

use sqlx::{PgConnection, PgExecutor};
use time::OffsetDateTime;

use crate::{Error, Result, models::PointTransaction};

/// Credits `amount` and records the entry. Returns the new balance.
pub async fn award(
	conn: &mut PgConnection,
	user_id: i64,
	amount: i64,
	reason: &str,
	at: OffsetDateTime,
) -> Result<i64> {
	if amount <= 0 {
		return Err(Error::InvalidArgument(format!("Award amount must be positive, got {amount}.")));
	}

	let balance: Option<i64> = sqlx::query_scalar(
		"\
UPDATE profiles
SET points_balance = points_balance + $1
WHERE user_id = $2
RETURNING points_balance",
	)
	.bind(amount)
	.bind(user_id)
	.fetch_optional(&mut *conn)
	.await?;
	let Some(balance) = balance else {
		return Err(Error::NotFound(format!("Profile for user {user_id}.")));
	};

	insert_entry(&mut *conn, user_id, amount, reason, at).await?;

	Ok(balance)
}

/// Debits `amount` when the balance covers it. Returns `None` and writes nothing otherwise.
pub async fn redeem(
	conn: &mut PgConnection,
	user_id: i64,
	amount: i64,
	reason: &str,
	at: OffsetDateTime,
) -> Result<Option<i64>> {
	if amount <= 0 {
		return Err(Error::InvalidArgument(format!(
			"Redeem amount must be positive, got {amount}."
		)));
	}

	let balance: Option<i64> = sqlx::query_scalar(
		"\
UPDATE profiles
SET points_balance = points_balance - $1
WHERE user_id = $2
	AND points_balance >= $1
RETURNING points_balance",
	)
	.bind(amount)
	.bind(user_id)
	.fetch_optional(&mut *conn)
	.await?;

	if balance.is_some() {
		insert_entry(&mut *conn, user_id, -amount, reason, at).await?;
	}

	Ok(balance)
}

pub async fn balance<'e, E>(executor: E, user_id: i64) -> Result<Option<i64>>
where
	E: PgExecutor<'e>,
{
	let balance = sqlx::query_scalar("SELECT points_balance FROM profiles WHERE user_id = $1")
		.bind(user_id)
		.fetch_optional(executor)
		.await?;

	Ok(balance)
}

/// Sum of every ledger entry for the user. Equals the cached balance.
pub async fn ledger_sum<'e, E>(executor: E, user_id: i64) -> Result<i64>
where
	E: PgExecutor<'e>,
{
	let sum = sqlx::query_scalar(
		"SELECT COALESCE(SUM(amount), 0)::bigint FROM point_transactions WHERE user_id = $1",
	)
	.bind(user_id)
	.fetch_one(executor)
	.await?;

	Ok(sum)
}

pub async fn list_transactions<'e, E>(
	executor: E,
	user_id: i64,
	limit: i64,
) -> Result<Vec<PointTransaction>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, PointTransaction>(
		"\
SELECT id, user_id, amount, reason, created_at
FROM point_transactions
WHERE user_id = $1
ORDER BY created_at DESC, id DESC
LIMIT $2",
	)
	.bind(user_id)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

async fn insert_entry(
	conn: &mut PgConnection,
	user_id: i64,
	amount: i64,
	reason: &str,
	at: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO point_transactions (user_id, amount, reason, created_at)
VALUES ($1, $2, $3, $4)",
	)
	.bind(user_id)
	.bind(amount)
	.bind(reason)
	.bind(at)
	.execute(conn)
	.await?;

	Ok(())
}
