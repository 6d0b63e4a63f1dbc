use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

use crate::{HandraiseService, Principal, QuestionView, Result};
use handraise_domain::search::{self, ParsedQuery, Person};
use handraise_storage::{
	models::Question,
	queries::{self, QUESTION_SELECT},
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchRequest {
	#[serde(default)]
	pub q: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SearchResponse {
	pub people: Vec<PersonHit>,
	pub questions: Vec<QuestionView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PersonHit {
	pub id: i64,
	pub username: String,
	pub name: String,
	pub department: String,
	pub years_experience: i32,
	pub expertise: Vec<String>,
	/// Ranking tier, lower is a closer match.
	pub tier: u8,
}

#[derive(Debug, sqlx::FromRow)]
struct PersonRow {
	id: i64,
	username: String,
	first_name: String,
	last_name: String,
	department: String,
	years_experience: i32,
	#[sqlx(skip)]
	expertise: Vec<String>,
}
impl Person for PersonRow {
	fn username(&self) -> &str {
		&self.username
	}

	fn first_name(&self) -> &str {
		&self.first_name
	}

	fn last_name(&self) -> &str {
		&self.last_name
	}

	fn expertise(&self) -> &[String] {
		&self.expertise
	}
}

impl HandraiseService {
	/// People and questions matching a free-form query with `#tag` and `@user` tokens.
	pub async fn search(&self, principal: &Principal, req: SearchRequest) -> Result<SearchResponse> {
		let query = search::parse_query(&req.q);

		if query.is_empty() {
			return Ok(SearchResponse::default());
		}

		let people = self.search_people(&query).await?;
		let questions = self.search_questions(principal, &query).await?;

		tracing::debug!(
			hashtags = query.hashtags.len(),
			mentions = query.mentions.len(),
			keywords = query.keywords.len(),
			people = people.len(),
			questions = questions.len(),
			"Search completed."
		);

		Ok(SearchResponse { people, questions })
	}

	async fn search_people(&self, query: &ParsedQuery) -> Result<Vec<PersonHit>> {
		let mention_prefixes: Vec<String> =
			query.mentions.iter().map(|m| crate::prefix_pattern(&m.to_lowercase())).collect();
		let keyword_patterns: Vec<String> =
			query.keywords.iter().map(|kw| crate::contains_pattern(kw)).collect();
		let mut rows = sqlx::query_as::<_, PersonRow>(
			"\
SELECT
	u.id,
	u.username,
	u.first_name,
	u.last_name,
	p.department,
	p.years_experience
FROM users u
JOIN profiles p ON p.user_id = u.id
WHERE lower(u.username) LIKE ANY($1)
	OR u.username ILIKE ANY($2)
	OR u.first_name ILIKE ANY($2)
	OR u.last_name ILIKE ANY($2)
	OR EXISTS (
		SELECT 1
		FROM profile_expertise pe
		JOIN tags t ON t.id = pe.tag_id
		WHERE pe.user_id = u.id
			AND lower(t.name) = ANY($3)
	)",
		)
		.bind(&mention_prefixes)
		.bind(&keyword_patterns)
		.bind(&query.hashtags)
		.fetch_all(&self.db.pool)
		.await?;
		let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
		let mut expertise = crate::group_names(queries::expertise(&self.db.pool, &ids).await?);

		for row in &mut rows {
			row.expertise = expertise.remove(&row.id).unwrap_or_default();
		}

		rows.retain(|row| search::person_matches(query, row));

		let ranked = search::rank_people(query, rows, self.cfg.search.max_people as usize);

		Ok(ranked
			.into_iter()
			.map(|row| {
				let tier = search::person_tier(query, &row);
				let name = format!("{} {}", row.first_name, row.last_name).trim().to_string();

				PersonHit {
					id: row.id,
					username: row.username,
					name,
					department: row.department,
					years_experience: row.years_experience,
					expertise: row.expertise,
					tier,
				}
			})
			.collect())
	}

	async fn search_questions(
		&self,
		principal: &Principal,
		query: &ParsedQuery,
	) -> Result<Vec<QuestionView>> {
		let mut builder = QueryBuilder::<Postgres>::new(QUESTION_SELECT);

		push_question_filter(&mut builder, query);
		builder.push("\nORDER BY q.created_at DESC, q.id DESC\nLIMIT ");
		builder.push_bind(i64::from(self.cfg.search.max_questions));

		let mut rows: Vec<Question> = builder.build_query_as().fetch_all(&self.db.pool).await?;

		self.resolve_due(&mut rows).await?;

		self.question_views(principal, rows).await
	}
}

/// A question matches when any present component matches: a hashtag, a visible author mention,
/// or every keyword somewhere in its title, body or tags.
fn push_question_filter(builder: &mut QueryBuilder<'_, Postgres>, query: &ParsedQuery) {
	builder.push("\nWHERE FALSE");

	if !query.hashtags.is_empty() {
		builder.push(
			"\n\tOR EXISTS (\
\n\t\tSELECT 1 FROM question_tags qt JOIN tags t ON t.id = qt.tag_id\
\n\t\tWHERE qt.question_id = q.id AND lower(t.name) = ANY(",
		);
		builder.push_bind(query.hashtags.clone());
		builder.push("))");
	}
	if !query.mentions.is_empty() {
		let mentions: Vec<String> = query.mentions.iter().map(|m| m.to_lowercase()).collect();

		builder.push("\n\tOR (NOT q.anonymous AND lower(u.username) = ANY(");
		builder.push_bind(mentions);
		builder.push("))");
	}
	if !query.keywords.is_empty() {
		builder.push("\n\tOR (TRUE");

		for keyword in &query.keywords {
			let pattern = crate::contains_pattern(keyword);

			builder.push("\n\t\tAND (q.title ILIKE ");
			builder.push_bind(pattern.clone());
			builder.push(" OR q.body ILIKE ");
			builder.push_bind(pattern.clone());
			builder.push(
				" OR EXISTS (\
SELECT 1 FROM question_tags qt JOIN tags t ON t.id = qt.tag_id \
WHERE qt.question_id = q.id AND t.name ILIKE ",
			);
			builder.push_bind(pattern);
			builder.push("))");
		}

		builder.push(")");
	}
}
