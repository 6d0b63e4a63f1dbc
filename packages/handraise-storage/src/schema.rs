pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_users.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_users.sql")),
				"tables/002_profiles.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_profiles.sql")),
				"tables/003_tags.sql" => out.push_str(include_str!("../../../sql/tables/003_tags.sql")),
				"tables/004_profile_expertise.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_profile_expertise.sql")),
				"tables/005_questions.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_questions.sql")),
				"tables/006_question_tags.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_question_tags.sql")),
				"tables/007_answers.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_answers.sql")),
				"tables/016_question_best_answer_fk.sql" => out
					.push_str(include_str!("../../../sql/tables/016_question_best_answer_fk.sql")),
				"tables/008_answer_likes.sql" =>
					out.push_str(include_str!("../../../sql/tables/008_answer_likes.sql")),
				"tables/009_point_transactions.sql" =>
					out.push_str(include_str!("../../../sql/tables/009_point_transactions.sql")),
				"tables/010_notifications.sql" =>
					out.push_str(include_str!("../../../sql/tables/010_notifications.sql")),
				"tables/011_chat_logs.sql" =>
					out.push_str(include_str!("../../../sql/tables/011_chat_logs.sql")),
				"tables/012_direct_questions.sql" =>
					out.push_str(include_str!("../../../sql/tables/012_direct_questions.sql")),
				"tables/013_direct_question_tags.sql" =>
					out.push_str(include_str!("../../../sql/tables/013_direct_question_tags.sql")),
				"tables/014_sessions.sql" =>
					out.push_str(include_str!("../../../sql/tables/014_sessions.sql")),
				"tables/015_password_resets.sql" =>
					out.push_str(include_str!("../../../sql/tables/015_password_resets.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
