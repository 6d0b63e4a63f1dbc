use std::cmp::Ordering;

/// One answer competing in the 24-hour auto-resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
	pub answer_id: i64,
	pub author_id: Option<i64>,
	pub like_count: i64,
	/// Experience of the author; answers without an author count as zero.
	pub years_experience: i32,
}

/// Picks the winner: most likes, then most experienced author, then the oldest answer id.
pub fn select_winner(candidates: &[Candidate]) -> Option<&Candidate> {
	candidates.iter().min_by(|a, b| rank(a, b))
}

fn rank(a: &Candidate, b: &Candidate) -> Ordering {
	b.like_count
		.cmp(&a.like_count)
		.then_with(|| b.years_experience.cmp(&a.years_experience))
		.then_with(|| a.answer_id.cmp(&b.answer_id))
}
