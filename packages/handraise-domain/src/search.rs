use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static HASHTAG_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"#([\w-]+)").expect("Hashtag pattern must compile."));
static MENTION_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"@([\w.-]+)").expect("Mention pattern must compile."));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
	/// Lowercased tag names, without the leading `#`.
	pub hashtags: Vec<String>,
	/// Handles as typed, without the leading `@`.
	pub mentions: Vec<String>,
	pub keywords: Vec<String>,
	/// Keywords joined by a single space.
	pub cleaned: String,
}
impl ParsedQuery {
	pub fn is_empty(&self) -> bool {
		self.hashtags.is_empty() && self.mentions.is_empty() && self.keywords.is_empty()
	}
}

/// A person as seen by the ranking function.
pub trait Person {
	fn username(&self) -> &str;
	fn first_name(&self) -> &str;
	fn last_name(&self) -> &str;
	/// Normalized expertise tag names.
	fn expertise(&self) -> &[String];
}

pub fn parse_query(raw: &str) -> ParsedQuery {
	let raw = raw.trim();

	if raw.is_empty() {
		return ParsedQuery::default();
	}

	let mut hashtags = Vec::new();

	for caps in HASHTAG_RE.captures_iter(raw) {
		let tag = caps[1].to_lowercase();

		if !hashtags.contains(&tag) {
			hashtags.push(tag);
		}
	}

	let mut mentions = Vec::new();

	for caps in MENTION_RE.captures_iter(raw) {
		let handle = caps[1].to_string();

		if !mentions.contains(&handle) {
			mentions.push(handle);
		}
	}

	let without_tags = HASHTAG_RE.replace_all(raw, " ");
	let remainder = MENTION_RE.replace_all(&without_tags, " ");
	let keywords: Vec<String> = remainder.split_whitespace().map(str::to_string).collect();
	let cleaned = keywords.join(" ");

	ParsedQuery { hashtags, mentions, keywords, cleaned }
}

/// Whether a person belongs in the people results at all.
pub fn person_matches<P: Person>(query: &ParsedQuery, person: &P) -> bool {
	let username = person.username().to_lowercase();

	if query.mentions.iter().any(|m| username.starts_with(&m.to_lowercase())) {
		return true;
	}

	let first = person.first_name().to_lowercase();
	let last = person.last_name().to_lowercase();

	if query.keywords.iter().map(|kw| kw.to_lowercase()).any(|kw| {
		username.contains(&kw) || first.contains(&kw) || last.contains(&kw)
	}) {
		return true;
	}

	has_hashtag_expertise(query, person)
}

/// Ranking tier of a person, lower is better. The first matching tier wins.
pub fn person_tier<P: Person>(query: &ParsedQuery, person: &P) -> u8 {
	let username = person.username().to_lowercase();
	let first = person.first_name().to_lowercase();
	let last = person.last_name().to_lowercase();
	let cleaned = query.cleaned.to_lowercase();
	let has_cleaned = !cleaned.is_empty();

	if query.mentions.iter().any(|m| m.to_lowercase() == username) {
		return 0;
	}
	if has_cleaned && username.starts_with(&cleaned) {
		return 1;
	}
	if has_cleaned && (first == cleaned || last == cleaned) {
		return 2;
	}
	if has_cleaned && (first.starts_with(&cleaned) || last.starts_with(&cleaned)) {
		return 3;
	}
	if has_hashtag_expertise(query, person) {
		return 4;
	}
	if has_cleaned
		&& (username.contains(&cleaned) || first.contains(&cleaned) || last.contains(&cleaned))
	{
		return 5;
	}

	6
}

/// Sorts people by `(tier, username)` and keeps at most `cap` of them.
pub fn rank_people<P: Person>(query: &ParsedQuery, people: Vec<P>, cap: usize) -> Vec<P> {
	let mut ranked: Vec<(u8, P)> =
		people.into_iter().map(|person| (person_tier(query, &person), person)).collect();

	ranked.sort_by(|(tier_a, a), (tier_b, b)| {
		tier_a.cmp(tier_b).then_with(|| a.username().cmp(b.username()))
	});
	ranked.truncate(cap);

	ranked.into_iter().map(|(_, person)| person).collect()
}

fn has_hashtag_expertise<P: Person>(query: &ParsedQuery, person: &P) -> bool {
	person
		.expertise()
		.iter()
		.any(|skill| query.hashtags.iter().any(|tag| tag.eq_ignore_ascii_case(skill)))
}
