use time::{Duration, OffsetDateTime};

use handraise_service::{
	AnswerRequest, HandraiseService, PostQuestionRequest, Principal, ResolutionOutcome,
};

const DAY: i64 = 24 * 60 * 60;

async fn post(service: &HandraiseService, asker: &Principal, title: &str) -> i64 {
	service
		.post_question(
			asker,
			PostQuestionRequest {
				title: title.to_string(),
				body: String::new(),
				tags: Vec::new(),
				urgent: false,
				assigned_answerer_id: None,
				anonymous: false,
			},
		)
		.await
		.expect("Post failed.")
		.id
}

async fn answer(service: &HandraiseService, author: &Principal, question_id: i64) -> i64 {
	service
		.answer_question(author, question_id, AnswerRequest { body: "Answer.".to_string() })
		.await
		.expect("Answer failed.")
		.id
}

async fn ledger_rows(service: &HandraiseService) -> i64 {
	sqlx::query_scalar("SELECT count(*) FROM point_transactions")
		.fetch_one(&service.db.pool)
		.await
		.expect("Failed to count ledger rows.")
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn unanswered_question_resolves_without_ledger_rows() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping unanswered_question_resolves_without_ledger_rows; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "", 0, &[]).await;
	let question_id = post(&h.service, &asker, "Nobody knows").await;
	let before = ledger_rows(&h.service).await;

	super::backdate(&h.service, "questions", question_id, DAY + 60).await;

	let view = h.service.get_question(&asker, question_id).await.expect("Get failed.");

	assert!(view.auto_awarded);
	assert_eq!(view.best_answer_id, None);
	assert_eq!(ledger_rows(&h.service).await, before);

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn winner_is_most_liked_then_most_experienced() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping winner_is_most_liked_then_most_experienced; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "", 0, &[]).await;
	let junior = super::register(&h.service, "junior", "", 1, &[]).await;
	let senior = super::register(&h.service, "senior", "", 9, &[]).await;
	let liker = super::register(&h.service, "liker", "", 0, &[]).await;
	let tied = post(&h.service, &asker, "Tie on likes").await;
	let _junior_answer = answer(&h.service, &junior, tied).await;
	let senior_answer = answer(&h.service, &senior, tied).await;
	let later = OffsetDateTime::now_utc() + Duration::seconds(DAY + 60);
	let outcome = h.service.resolve_question(tied, later).await.expect("Resolution failed.");

	assert_eq!(
		outcome,
		ResolutionOutcome::Awarded { answer_id: senior_answer, user_id: senior.user_id, points: 10 }
	);

	let liked = post(&h.service, &asker, "Likes win").await;
	let junior_answer = answer(&h.service, &junior, liked).await;
	let _senior_answer = answer(&h.service, &senior, liked).await;

	h.service.like_answer(&liker, junior_answer).await.expect("Like failed.");

	let outcome = h.service.resolve_question(liked, later).await.expect("Resolution failed.");

	assert_eq!(
		outcome,
		ResolutionOutcome::Awarded { answer_id: junior_answer, user_id: junior.user_id, points: 10 }
	);

	let again = h.service.resolve_question(liked, later).await.expect("Resolution failed.");

	assert_eq!(again, ResolutionOutcome::Skipped);
	assert_eq!(super::assert_balance_matches_ledger(&h.service, junior.user_id).await, 30);

	let history = h.service.point_transactions(&junior).await.expect("Transactions failed.");

	assert_eq!(history.iter().filter(|e| e.reason == "24h top-liked answer bonus").count(), 1);

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn human_best_answer_blocks_auto_award() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping human_best_answer_blocks_auto_award; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "", 0, &[]).await;
	let helper = super::register(&h.service, "helper", "", 0, &[]).await;
	let question_id = post(&h.service, &asker, "Picked by hand").await;
	let answer_id = answer(&h.service, &helper, question_id).await;

	h.service.mark_best_answer(&asker, answer_id).await.expect("Mark failed.");

	let later = OffsetDateTime::now_utc() + Duration::seconds(DAY + 60);
	let outcome = h.service.resolve_question(question_id, later).await.expect("Resolution failed.");

	assert_eq!(outcome, ResolutionOutcome::Skipped);
	assert_eq!(super::assert_balance_matches_ledger(&h.service, helper.user_id).await, 30);

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn young_questions_are_not_resolved() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping young_questions_are_not_resolved; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "", 0, &[]).await;
	let question_id = post(&h.service, &asker, "Fresh").await;
	let outcome = h
		.service
		.resolve_question(question_id, OffsetDateTime::now_utc())
		.await
		.expect("Resolution failed.");

	assert_eq!(outcome, ResolutionOutcome::Skipped);

	let view = h.service.get_question(&asker, question_id).await.expect("Get failed.");

	assert!(!view.auto_awarded);

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn concurrent_resolutions_pay_out_once() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping concurrent_resolutions_pay_out_once; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "", 0, &[]).await;
	let helper = super::register(&h.service, "helper", "", 3, &[]).await;
	let question_id = post(&h.service, &asker, "Race me").await;
	let answer_id = answer(&h.service, &helper, question_id).await;

	super::backdate(&h.service, "questions", question_id, DAY + 60).await;

	let now = OffsetDateTime::now_utc();
	let (first, second) = tokio::join!(
		h.service.resolve_question(question_id, now),
		h.service.resolve_question(question_id, now),
	);
	let outcomes = [first.expect("Resolution failed."), second.expect("Resolution failed.")];
	let awarded = ResolutionOutcome::Awarded { answer_id, user_id: helper.user_id, points: 10 };

	assert_eq!(outcomes.iter().filter(|outcome| **outcome == awarded).count(), 1);
	assert_eq!(
		outcomes.iter().filter(|outcome| **outcome == ResolutionOutcome::Skipped).count(),
		1
	);
	assert_eq!(super::assert_balance_matches_ledger(&h.service, helper.user_id).await, 20);

	h.finish().await;
}
