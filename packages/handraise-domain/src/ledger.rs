use serde::Serialize;

/// Fixed reasons recorded on ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reason {
	PostedQuestion,
	AnsweredQuestion,
	BestAnswerSelected,
	AutoResolutionBonus,
	LoggedChat,
	CrossDepartmentBonus,
	Redeemed,
}
impl Reason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::PostedQuestion => "Posted a question",
			Self::AnsweredQuestion => "Answered a question",
			Self::BestAnswerSelected => "Best answer selected",
			Self::AutoResolutionBonus => "24h top-liked answer bonus",
			Self::LoggedChat => "Logged 1-on-1 chat",
			Self::CrossDepartmentBonus => "Cross-department bonus",
			Self::Redeemed => "Redeemed at cafeteria",
		}
	}
}
