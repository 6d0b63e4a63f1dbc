use serde::{Deserialize, Serialize};

use crate::{Error, HandraiseService, Principal, Result};
use handraise_domain::{
	stages::{self, Stage},
	tags,
};
use handraise_storage::{models::Profile, queries};

const LEADERBOARD_LIMIT: i64 = 10;
const UNKNOWN_DEPARTMENT: &str = "Unknown";

#[derive(Clone, Debug, Serialize)]
pub struct ProfileView {
	pub id: i64,
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
	pub expertise: Vec<String>,
}

/// Partial update. Absent fields keep their value; `expertise` replaces the whole set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	pub department: Option<String>,
	pub position: Option<String>,
	pub bio: Option<String>,
	pub hobbies: Option<String>,
	pub avatar_url: Option<String>,
	pub years_experience: Option<i32>,
	#[serde(default, deserialize_with = "crate::deserialize_optional_tags")]
	pub expertise: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TagView {
	pub id: i64,
	pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DepartmentScore {
	pub department: String,
	pub points: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StageView {
	pub level: u8,
	pub key: Stage,
	pub name: &'static str,
	pub min_points: i64,
}
impl From<Stage> for StageView {
	fn from(stage: Stage) -> Self {
		Self { level: stage.level(), key: stage, name: stage.name(), min_points: stage.min_points() }
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct DepartmentPet {
	pub department: String,
	pub member_count: i64,
	pub total_points: i64,
	pub average_points: f64,
	pub stage: StageView,
	pub next_stage: Option<StageView>,
	pub points_to_next: Option<i64>,
	pub progress_ratio: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct DepartmentPetsResponse {
	pub departments: Vec<DepartmentPet>,
	pub stages: Vec<StageView>,
}

impl HandraiseService {
	pub async fn get_profile(&self, principal: &Principal) -> Result<ProfileView> {
		let profile = queries::get_profile(&self.db.pool, principal.user_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Profile not found.".to_string() })?;
		let expertise = queries::expertise(&self.db.pool, &[principal.user_id])
			.await?
			.into_iter()
			.map(|(_, name)| name)
			.collect();

		Ok(profile_view(profile, expertise))
	}

	pub async fn update_profile(
		&self,
		principal: &Principal,
		req: UpdateProfileRequest,
	) -> Result<ProfileView> {
		if let Some(years) = req.years_experience
			&& years < 0
		{
			return Err(Error::InvalidRequest {
				message: "years_experience must not be negative.".to_string(),
			});
		}

		let mut tx = self.db.pool.begin().await?;
		let updated = sqlx::query(
			"\
UPDATE profiles
SET
	department = COALESCE($2, department),
	position = COALESCE($3, position),
	bio = COALESCE($4, bio),
	hobbies = COALESCE($5, hobbies),
	avatar_url = COALESCE($6, avatar_url),
	years_experience = COALESCE($7, years_experience)
WHERE user_id = $1",
		)
		.bind(principal.user_id)
		.bind(trimmed(req.department))
		.bind(trimmed(req.position))
		.bind(trimmed(req.bio))
		.bind(trimmed(req.hobbies))
		.bind(trimmed(req.avatar_url))
		.bind(req.years_experience)
		.execute(&mut *tx)
		.await?
		.rows_affected();

		if updated == 0 {
			return Err(Error::NotFound { message: "Profile not found.".to_string() });
		}

		sqlx::query(
			"\
UPDATE users
SET
	first_name = COALESCE($2, first_name),
	last_name = COALESCE($3, last_name)
WHERE id = $1",
		)
		.bind(principal.user_id)
		.bind(trimmed(req.first_name))
		.bind(trimmed(req.last_name))
		.execute(&mut *tx)
		.await?;

		if let Some(raw) = req.expertise {
			let names = tags::normalize_tags(&raw);
			let tag_rows = queries::ensure_tags(&mut tx, &names).await?;

			queries::replace_expertise(&mut tx, principal.user_id, &tag_rows).await?;
		}

		tx.commit().await?;

		self.get_profile(principal).await
	}

	pub async fn list_tags(&self) -> Result<Vec<TagView>> {
		let rows = queries::list_tags(&self.db.pool).await?;

		Ok(rows.into_iter().map(|tag| TagView { id: tag.id, name: tag.name }).collect())
	}

	/// Top departments by ledger total. Users without a department count as "Unknown".
	pub async fn leaderboard(&self) -> Result<Vec<DepartmentScore>> {
		let rows = sqlx::query_as::<_, DepartmentScore>(
			"\
SELECT
	COALESCE(NULLIF(btrim(p.department), ''), $1) AS department,
	COALESCE(SUM(t.amount), 0)::bigint AS points
FROM profiles p
LEFT JOIN point_transactions t ON t.user_id = p.user_id
GROUP BY 1
ORDER BY points DESC, department ASC
LIMIT $2",
		)
		.bind(UNKNOWN_DEPARTMENT)
		.bind(LEADERBOARD_LIMIT)
		.fetch_all(&self.db.pool)
		.await?;

		Ok(rows)
	}

	/// Mascot stage per department, from the members' current balances.
	pub async fn department_pets(&self) -> Result<DepartmentPetsResponse> {
		let rows: Vec<(String, i64, i64)> = sqlx::query_as(
			"\
SELECT
	btrim(department) AS department,
	count(*) AS member_count,
	COALESCE(SUM(points_balance), 0)::bigint AS total_points
FROM profiles
WHERE btrim(department) <> ''
GROUP BY 1
ORDER BY total_points DESC, department ASC",
		)
		.fetch_all(&self.db.pool)
		.await?;
		let departments = rows
			.into_iter()
			.map(|(department, member_count, total_points)| {
				department_pet(department, member_count, total_points)
			})
			.collect();
		let stages = Stage::ALL.into_iter().map(StageView::from).collect();

		Ok(DepartmentPetsResponse { departments, stages })
	}
}

fn trimmed(value: Option<String>) -> Option<String> {
	value.map(|value| value.trim().to_string())
}

fn profile_view(profile: Profile, expertise: Vec<String>) -> ProfileView {
	ProfileView {
		id: profile.user_id,
		username: profile.username,
		email: profile.email,
		first_name: profile.first_name,
		last_name: profile.last_name,
		department: profile.department,
		position: profile.position,
		bio: profile.bio,
		hobbies: profile.hobbies,
		avatar_url: profile.avatar_url,
		years_experience: profile.years_experience,
		points_balance: profile.points_balance,
		expertise,
	}
}

fn department_pet(department: String, member_count: i64, total_points: i64) -> DepartmentPet {
	let progress = stages::stage_progress(total_points);
	let average_points = if member_count > 0 {
		(total_points as f64 / member_count as f64 * 100.0).round() / 100.0
	} else {
		0.0
	};

	DepartmentPet {
		department,
		member_count,
		total_points,
		average_points,
		stage: progress.stage.into(),
		next_stage: progress.next_stage.map(StageView::from),
		points_to_next: progress.points_to_next,
		progress_ratio: progress.progress_ratio,
	}
}
