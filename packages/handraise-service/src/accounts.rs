//! Store-backed accounts: registration, credentials, bearer sessions and recovery flows.
//!
//! Passwords are stored as Argon2id PHC strings keyed by the configured pepper. Session and reset
//! tokens are random and only their `blake3` digests are persisted.

use argon2::{
	Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
	password_hash::{SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Error, HandraiseService, MailMessage, Principal, Result, UserRef};
use handraise_domain::tags;
use handraise_storage::{models::Credential, queries};

const TOKEN_TYPE: &str = "Bearer";
const SESSION_ACCESS: &str = "access";
const SESSION_REFRESH: &str = "refresh";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
	/// Derived from the email local part when absent.
	#[serde(default)]
	pub username: Option<String>,
	#[serde(default)]
	pub email: String,
	#[serde(default)]
	pub password: String,
	#[serde(default)]
	pub first_name: String,
	#[serde(default)]
	pub last_name: String,
	#[serde(default)]
	pub department: String,
	#[serde(default)]
	pub position: String,
	#[serde(default)]
	pub years_experience: Option<i32>,
	#[serde(default, alias = "expertise", deserialize_with = "crate::deserialize_tags")]
	pub expertise_hashtags: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginRequest {
	pub username: String,
	pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
	pub refresh_token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
	pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
	pub token: String,
	pub new_password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForgotUsernameRequest {
	pub email: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TokenPair {
	pub access_token: String,
	pub refresh_token: String,
	pub token_type: &'static str,
	/// Access token lifetime in seconds.
	pub expires_in: i64,
	pub user: UserRef,
}

impl HandraiseService {
	/// Creates the user, its profile and expertise in one transaction, then signs the user in.
	pub async fn register(&self, req: RegisterRequest) -> Result<TokenPair> {
		self.check_password_length(&req.password)?;

		if let Some(years) = req.years_experience
			&& years < 0
		{
			return Err(Error::InvalidRequest {
				message: "years_experience must not be negative.".to_string(),
			});
		}

		let email = req.email.trim().to_lowercase();
		let requested = req.username.as_deref().map(str::trim).filter(|name| !name.is_empty());
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;

		if !email.is_empty() && queries::find_user_by_email(&mut *tx, &email).await?.is_some() {
			return Err(Error::Conflict { message: "Email is already registered.".to_string() });
		}

		let username = match requested {
			Some(name) => {
				if queries::find_user_by_username(&mut *tx, name).await?.is_some() {
					return Err(Error::Conflict {
						message: "Username already exists.".to_string(),
					});
				}

				name.to_string()
			},
			None => {
				let Some(base) = username_base(&email) else {
					return Err(Error::InvalidRequest {
						message: "username or email is required.".to_string(),
					});
				};

				available_username(&mut tx, base).await?
			},
		};
		let password_hash = self.hash_password(&req.password).await?;
		let user_id: i64 = sqlx::query_scalar(
			"\
INSERT INTO users (username, email, first_name, last_name, password_hash, created_at)
VALUES ($1, $2, $3, $4, $5, $6)
RETURNING id",
		)
		.bind(&username)
		.bind(&email)
		.bind(req.first_name.trim())
		.bind(req.last_name.trim())
		.bind(&password_hash)
		.bind(now)
		.fetch_one(&mut *tx)
		.await?;

		sqlx::query(
			"\
INSERT INTO profiles (user_id, department, position, years_experience)
VALUES ($1, $2, $3, $4)",
		)
		.bind(user_id)
		.bind(req.department.trim())
		.bind(req.position.trim())
		.bind(req.years_experience.unwrap_or(0))
		.execute(&mut *tx)
		.await?;

		let names = tags::normalize_tags(&req.expertise_hashtags);
		let tag_rows = queries::ensure_tags(&mut tx, &names).await?;

		queries::replace_expertise(&mut tx, user_id, &tag_rows).await?;

		let pair = self.issue_session(&mut tx, UserRef { id: user_id, username }, now).await?;

		tx.commit().await?;

		tracing::info!(user_id, username = %pair.user.username, "User registered.");

		Ok(pair)
	}

	pub async fn login(&self, req: LoginRequest) -> Result<TokenPair> {
		let principal = self.authenticate(&req.username, &req.password).await?;
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let pair = self
			.issue_session(
				&mut tx,
				UserRef { id: principal.user_id, username: principal.username },
				now,
			)
			.await?;

		tx.commit().await?;

		Ok(pair)
	}

	/// Checks a username and password pair.
	pub async fn authenticate(&self, username: &str, password: &str) -> Result<Principal> {
		let credential = sqlx::query_as::<_, Credential>(
			"SELECT id, username, password_hash FROM users WHERE username = $1",
		)
		.bind(username.trim())
		.fetch_optional(&self.db.pool)
		.await?;
		let Some(credential) = credential else {
			return Err(invalid_credentials());
		};
		let pepper = self.cfg.security.password_pepper.clone();
		let password = password.to_string();
		let stored = credential.password_hash;
		let verified =
			tokio::task::spawn_blocking(move || verify_password(&pepper, &password, &stored))
				.await
				.map_err(|err| Error::PasswordHash { message: err.to_string() })?;

		if !verified {
			return Err(invalid_credentials());
		}

		Ok(Principal { user_id: credential.id, username: credential.username })
	}

	/// Rotates a refresh token into a new pair. The old refresh token stops working.
	pub async fn refresh(&self, req: RefreshRequest) -> Result<TokenPair> {
		let now = OffsetDateTime::now_utc();
		let digest = token_digest(&self.cfg.security.password_pepper, req.refresh_token.trim());
		let mut tx = self.db.pool.begin().await?;
		let row: Option<(i64, String)> = sqlx::query_as(
			"\
DELETE FROM sessions s
USING users u
WHERE u.id = s.user_id
	AND s.token_digest = $1
	AND s.kind = $2
	AND s.expires_at > $3
RETURNING u.id, u.username",
		)
		.bind(&digest)
		.bind(SESSION_REFRESH)
		.bind(now)
		.fetch_optional(&mut *tx)
		.await?;
		let Some((id, username)) = row else {
			return Err(Error::Unauthorized { message: "Invalid refresh token.".to_string() });
		};
		let pair = self.issue_session(&mut tx, UserRef { id, username }, now).await?;

		tx.commit().await?;

		Ok(pair)
	}

	/// Resolves a bearer access token to its principal.
	pub async fn resolve_session(&self, token: &str) -> Result<Principal> {
		let digest = token_digest(&self.cfg.security.password_pepper, token.trim());
		let row: Option<(i64, String)> = sqlx::query_as(
			"\
SELECT u.id, u.username
FROM sessions s
JOIN users u ON u.id = s.user_id
WHERE s.token_digest = $1
	AND s.kind = $2
	AND s.expires_at > $3",
		)
		.bind(&digest)
		.bind(SESSION_ACCESS)
		.bind(OffsetDateTime::now_utc())
		.fetch_optional(&self.db.pool)
		.await?;
		let Some((user_id, username)) = row else {
			return Err(Error::Unauthorized { message: "Invalid or expired token.".to_string() });
		};

		Ok(Principal { user_id, username })
	}

	/// Mails a reset link when the email belongs to an account. Unknown emails succeed silently.
	pub async fn forgot_password(&self, req: ForgotPasswordRequest) -> Result<()> {
		let now = OffsetDateTime::now_utc();
		let Some(user) = queries::find_user_by_email(&self.db.pool, &req.email).await? else {
			tracing::debug!("Password reset requested for an unknown email.");

			return Ok(());
		};
		let token = new_token();
		let expires_at = now + Duration::seconds(self.cfg.security.reset_token_ttl_seconds);

		sqlx::query(
			"\
INSERT INTO password_resets (token_digest, user_id, expires_at, created_at)
VALUES ($1, $2, $3, $4)",
		)
		.bind(token_digest(&self.cfg.security.password_pepper, &token))
		.bind(user.id)
		.bind(expires_at)
		.bind(now)
		.execute(&self.db.pool)
		.await?;

		let link = format!("{}/reset-password?token={token}", self.cfg.service.frontend_base_url);

		tracing::info!(user_id = user.id, "Password reset issued.");

		self.dispatch_mail(vec![MailMessage {
			to: user.email,
			subject: "Reset your password".to_string(),
			body: format!(
				"Hi {},\n\nUse this link to reset your password:\n{link}\n\nIf you did not request \
				 a reset, ignore this email.",
				user.username
			),
		}]);

		Ok(())
	}

	pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<()> {
		let now = OffsetDateTime::now_utc();
		let digest = token_digest(&self.cfg.security.password_pepper, req.token.trim());
		let mut tx = self.db.pool.begin().await?;
		let row: Option<(i64, OffsetDateTime, Option<OffsetDateTime>)> = sqlx::query_as(
			"\
SELECT user_id, expires_at, used_at
FROM password_resets
WHERE token_digest = $1
FOR UPDATE",
		)
		.bind(&digest)
		.fetch_optional(&mut *tx)
		.await?;
		let user_id = match row {
			Some((user_id, expires_at, None)) if expires_at > now => user_id,
			_ => {
				return Err(Error::Unauthorized {
					message: "Invalid or expired reset token.".to_string(),
				});
			},
		};

		self.check_password_length(&req.new_password)?;

		let password_hash = self.hash_password(&req.new_password).await?;

		sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
			.bind(&password_hash)
			.bind(user_id)
			.execute(&mut *tx)
			.await?;
		sqlx::query("UPDATE password_resets SET used_at = $1 WHERE token_digest = $2")
			.bind(now)
			.bind(&digest)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM sessions WHERE user_id = $1")
			.bind(user_id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		tracing::info!(user_id, "Password reset completed.");

		Ok(())
	}

	/// Mails the username when the email belongs to an account. Unknown emails succeed silently.
	pub async fn forgot_username(&self, req: ForgotUsernameRequest) -> Result<()> {
		let Some(user) = queries::find_user_by_email(&self.db.pool, &req.email).await? else {
			return Ok(());
		};

		self.dispatch_mail(vec![MailMessage {
			to: user.email,
			subject: "Your username".to_string(),
			body: format!("Your username is: {}", user.username),
		}]);

		Ok(())
	}

	fn check_password_length(&self, password: &str) -> Result<()> {
		let min = self.cfg.security.min_password_chars as usize;

		if password.chars().count() < min {
			return Err(Error::InvalidRequest {
				message: format!("password must be at least {min} characters."),
			});
		}

		Ok(())
	}

	/// Runs Argon2 on the blocking pool.
	async fn hash_password(&self, password: &str) -> Result<String> {
		let pepper = self.cfg.security.password_pepper.clone();
		let password = password.to_string();

		tokio::task::spawn_blocking(move || hash_password(&pepper, &password))
			.await
			.map_err(|err| Error::PasswordHash { message: err.to_string() })?
	}

	async fn issue_session(
		&self,
		conn: &mut PgConnection,
		user: UserRef,
		now: OffsetDateTime,
	) -> Result<TokenPair> {
		let security = &self.cfg.security;
		let access_token = new_token();
		let refresh_token = new_token();

		for (token, kind, ttl) in [
			(&access_token, SESSION_ACCESS, security.access_token_ttl_seconds),
			(&refresh_token, SESSION_REFRESH, security.refresh_token_ttl_seconds),
		] {
			sqlx::query(
				"\
INSERT INTO sessions (token_digest, user_id, kind, expires_at, created_at)
VALUES ($1, $2, $3, $4, $5)",
			)
			.bind(token_digest(&security.password_pepper, token))
			.bind(user.id)
			.bind(kind)
			.bind(now + Duration::seconds(ttl))
			.bind(now)
			.execute(&mut *conn)
			.await?;
		}

		Ok(TokenPair {
			access_token,
			refresh_token,
			token_type: TOKEN_TYPE,
			expires_in: security.access_token_ttl_seconds,
			user,
		})
	}
}

fn invalid_credentials() -> Error {
	Error::Unauthorized { message: "Invalid credentials.".to_string() }
}

/// First free username among `base`, `base1`, `base2`, ...
async fn available_username(conn: &mut PgConnection, base: &str) -> Result<String> {
	let mut candidate = base.to_string();
	let mut counter = 0_u32;

	while queries::find_user_by_username(&mut *conn, &candidate).await?.is_some() {
		counter += 1;
		candidate = format!("{base}{counter}");
	}

	Ok(candidate)
}

fn username_base(email: &str) -> Option<&str> {
	let local = email.split('@').next()?.trim();

	(!local.is_empty()).then_some(local)
}

fn new_token() -> String {
	format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn token_digest(pepper: &str, token: &str) -> String {
	let mut hasher = blake3::Hasher::new();

	hasher.update(pepper.as_bytes());
	hasher.update(b"\x00token\x00");
	hasher.update(token.as_bytes());

	hasher.finalize().to_hex().to_string()
}

fn argon2(pepper: &str) -> Result<Argon2<'_>> {
	Argon2::new_with_secret(pepper.as_bytes(), Algorithm::Argon2id, Version::V0x13, Params::default())
		.map_err(|err| Error::PasswordHash { message: err.to_string() })
}

fn hash_password(pepper: &str, password: &str) -> Result<String> {
	let salt = SaltString::generate(&mut OsRng);
	let hash = argon2(pepper)?
		.hash_password(password.as_bytes(), &salt)
		.map_err(|err| Error::PasswordHash { message: err.to_string() })?;

	Ok(hash.to_string())
}

fn verify_password(pepper: &str, password: &str, stored: &str) -> bool {
	let Ok(parsed) = PasswordHash::new(stored) else {
		return false;
	};
	let Ok(hasher) = argon2(pepper) else {
		return false;
	};

	hasher.verify_password(password.as_bytes(), &parsed).is_ok()
}
