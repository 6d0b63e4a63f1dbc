use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	Hatchling,
	Apprentice,
	Helper,
	Sage,
}
impl Stage {
	pub const ALL: [Stage; 4] = [Self::Hatchling, Self::Apprentice, Self::Helper, Self::Sage];

	pub fn level(self) -> u8 {
		match self {
			Self::Hatchling => 1,
			Self::Apprentice => 2,
			Self::Helper => 3,
			Self::Sage => 4,
		}
	}

	pub fn min_points(self) -> i64 {
		match self {
			Self::Hatchling => 0,
			Self::Apprentice => 50,
			Self::Helper => 100,
			Self::Sage => 200,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Self::Hatchling => "Hatchling Fox",
			Self::Apprentice => "Apprentice Fox",
			Self::Helper => "Helper Fox",
			Self::Sage => "Sage Fox",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageProgress {
	pub stage: Stage,
	pub next_stage: Option<Stage>,
	pub points_to_next: Option<i64>,
	/// Fraction of the way from the current stage to the next, in `[0, 1]`.
	pub progress_ratio: f64,
}

/// Locates a department total on the mascot ladder.
pub fn stage_progress(total_points: i64) -> StageProgress {
	let mut stage = Stage::Hatchling;
	let mut next_stage = None;

	for candidate in Stage::ALL {
		if total_points >= candidate.min_points() {
			stage = candidate;
		} else {
			next_stage = Some(candidate);

			break;
		}
	}

	match next_stage {
		Some(next) => {
			let span = (next.min_points() - stage.min_points()).max(1);
			let ratio = (total_points - stage.min_points()) as f64 / span as f64;

			StageProgress {
				stage,
				next_stage,
				points_to_next: Some((next.min_points() - total_points).max(0)),
				progress_ratio: (ratio.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0,
			}
		},
		None => StageProgress { stage, next_stage, points_to_next: None, progress_ratio: 1.0 },
	}
}
