use std::time::Duration;

use handraise_service::{AnswerRequest, Error, HandraiseService, PostQuestionRequest, Principal};

async fn post(service: &HandraiseService, asker: &Principal, assignee: Option<i64>) -> i64 {
	service
		.post_question(
			asker,
			PostQuestionRequest {
				title: "Which crate for retries?".to_string(),
				body: String::new(),
				tags: vec!["rust".to_string()],
				urgent: false,
				assigned_answerer_id: assignee,
				anonymous: false,
			},
		)
		.await
		.expect("Post failed.")
		.id
}

fn body(text: &str) -> AnswerRequest {
	AnswerRequest { body: text.to_string() }
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn second_answer_by_same_user_conflicts() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping second_answer_by_same_user_conflicts; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "", 0, &[]).await;
	let helper = super::register(&h.service, "helper", "", 0, &[]).await;
	let question_id = post(&h.service, &asker, None).await;

	h.service.answer_question(&helper, question_id, body("First.")).await.expect("Answer failed.");

	let err = h
		.service
		.answer_question(&helper, question_id, body("Second."))
		.await
		.expect_err("Second answer must fail.");

	assert!(matches!(err, Error::Conflict { .. }), "Unexpected error: {err:?}");

	let answers = h.service.list_answers(&asker, question_id).await.expect("List failed.");

	assert_eq!(answers.len(), 1);
	assert_eq!(answers[0].body, "First.");
	assert_eq!(super::assert_balance_matches_ledger(&h.service, helper.user_id).await, 10);

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn likes_are_idempotent_and_never_self() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping likes_are_idempotent_and_never_self; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "", 0, &[]).await;
	let helper = super::register(&h.service, "helper", "", 0, &[]).await;
	let question_id = post(&h.service, &asker, None).await;
	let answer =
		h.service.answer_question(&helper, question_id, body("Try backoff.")).await.expect("Answer failed.");
	let first = h.service.like_answer(&asker, answer.id).await.expect("Like failed.");
	let second = h.service.like_answer(&asker, answer.id).await.expect("Repeated like failed.");

	assert_eq!(first.like_count, 1);
	assert!(first.created);
	assert_eq!(second.like_count, 1);
	assert!(!second.created);

	let err = h.service.like_answer(&helper, answer.id).await.expect_err("Self like must fail.");

	assert!(matches!(err, Error::InvalidRequest { .. }));

	let missing = h.service.like_answer(&asker, answer.id + 1_000).await.expect_err("Must fail.");

	assert!(matches!(missing, Error::NotFound { .. }));

	let answers = h.service.list_answers(&asker, question_id).await.expect("List failed.");

	assert!(answers[0].liked_by_me);
	assert_eq!(answers[0].like_count, 1);

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn edit_window_closes_after_thirty_minutes() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping edit_window_closes_after_thirty_minutes; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "", 0, &[]).await;
	let helper = super::register(&h.service, "helper", "", 0, &[]).await;
	let question_id = post(&h.service, &asker, None).await;
	let answer =
		h.service.answer_question(&helper, question_id, body("Draft.")).await.expect("Answer failed.");

	super::backdate(&h.service, "answers", answer.id, 29 * 60 + 55).await;

	let edited = h
		.service
		.edit_answer(&helper, answer.id, body("Final."))
		.await
		.expect("Edit inside the window must succeed.");

	assert_eq!(edited.body, "Final.");

	let err = h.service.edit_answer(&asker, answer.id, body("Hijack.")).await.expect_err("Must fail.");

	assert!(matches!(err, Error::Forbidden { .. }));

	super::backdate(&h.service, "answers", answer.id, 30 * 60 + 1).await;

	let err = h
		.service
		.edit_answer(&helper, answer.id, body("Too late."))
		.await
		.expect_err("Edit after the window must fail.");

	match err {
		Error::Forbidden { message } => assert_eq!(message, "Edit window expired."),
		other => panic!("Expected forbidden, got {other:?}."),
	}

	let err = h.service.delete_answer(&helper, answer.id).await.expect_err("Delete must fail.");

	assert!(matches!(err, Error::Forbidden { .. }));

	super::backdate(&h.service, "questions", question_id, 30 * 60 + 1).await;

	let err = h.service.delete_question(&asker, question_id).await.expect_err("Delete must fail.");

	assert!(matches!(err, Error::Forbidden { .. }));

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn assigned_question_only_accepts_the_assignee() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping assigned_question_only_accepts_the_assignee; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "", 0, &[]).await;
	let assignee = super::register(&h.service, "assignee", "", 0, &[]).await;
	let bystander = super::register(&h.service, "bystander", "", 0, &[]).await;
	let question_id = post(&h.service, &asker, Some(assignee.user_id)).await;
	let err = h
		.service
		.answer_question(&bystander, question_id, body("Me!"))
		.await
		.expect_err("Bystander must be rejected.");

	assert!(matches!(err, Error::Forbidden { .. }));

	h.service
		.answer_question(&assignee, question_id, body("On it."))
		.await
		.expect("Assignee must be able to answer.");

	let notifications = h.service.list_notifications(&assignee).await.expect("List failed.");

	assert_eq!(notifications.len(), 1);
	assert_eq!(notifications[0].message, "You were assigned to answer: Which crate for retries?");
	assert_eq!(notifications[0].question_id, Some(question_id));

	let missing = h
		.service
		.answer_question(&assignee, question_id + 1_000, body("?"))
		.await
		.expect_err("Missing question must fail.");

	assert!(matches!(missing, Error::NotFound { .. }));

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn best_answer_selection_awards_on_change_only() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping best_answer_selection_awards_on_change_only; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "", 0, &[]).await;
	let helper = super::register(&h.service, "helper", "", 0, &[]).await;
	let other = super::register(&h.service, "other", "", 0, &[]).await;
	let question_id = post(&h.service, &asker, None).await;
	let first = h.service.answer_question(&helper, question_id, body("A.")).await.expect("Answer failed.");
	let second = h.service.answer_question(&other, question_id, body("B.")).await.expect("Answer failed.");
	let err = h.service.mark_best_answer(&helper, first.id).await.expect_err("Must fail.");

	assert!(matches!(err, Error::Forbidden { .. }));

	let marked = h.service.mark_best_answer(&asker, first.id).await.expect("Mark failed.");
	let again = h.service.mark_best_answer(&asker, first.id).await.expect("Re-mark failed.");

	assert_eq!(marked.points_awarded, 20);
	assert_eq!(again.points_awarded, 0);

	let switched = h.service.mark_best_answer(&asker, second.id).await.expect("Switch failed.");

	assert_eq!(switched.points_awarded, 20);
	assert_eq!(super::assert_balance_matches_ledger(&h.service, helper.user_id).await, 30);
	assert_eq!(super::assert_balance_matches_ledger(&h.service, other.user_id).await, 30);

	h.service.delete_answer(&other, second.id).await.expect("Delete failed.");

	let view = h.service.get_question(&asker, question_id).await.expect("Get failed.");

	assert_eq!(view.best_answer_id, None);
	assert!(view.auto_awarded);

	let notifications = h.service.list_notifications(&helper).await.expect("List failed.");

	assert!(
		notifications
			.iter()
			.any(|n| n.message == "Your answer was marked as best: Which crate for retries?")
	);

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn best_answer_waits_for_a_pending_answer_delete() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping best_answer_waits_for_a_pending_answer_delete; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "", 0, &[]).await;
	let helper = super::register(&h.service, "helper", "", 0, &[]).await;
	let question_id = post(&h.service, &asker, None).await;
	let answer_id =
		h.service.answer_question(&helper, question_id, body("Gone soon.")).await.expect("Answer failed.").id;
	// Same statements as `delete_answer`, held open until the delete commits.
	let mut deleting = h.service.db.pool.begin().await.expect("Begin failed.");

	sqlx::query("SELECT id FROM answers WHERE id = $1 FOR UPDATE")
		.bind(answer_id)
		.execute(&mut *deleting)
		.await
		.expect("Lock failed.");

	let delete = async move {
		tokio::time::sleep(Duration::from_millis(200)).await;
		sqlx::query("DELETE FROM answers WHERE id = $1")
			.bind(answer_id)
			.execute(&mut *deleting)
			.await
			.expect("Delete failed.");
		deleting.commit().await.expect("Commit failed.");
	};
	let (marked, ()) = tokio::join!(h.service.mark_best_answer(&asker, answer_id), delete);

	assert!(matches!(marked, Err(Error::NotFound { .. })), "Unexpected result: {marked:?}");

	let view = h.service.get_question(&asker, question_id).await.expect("Get failed.");

	assert_eq!(view.best_answer_id, None);
	assert_eq!(super::assert_balance_matches_ledger(&h.service, helper.user_id).await, 10);

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn concurrent_answers_by_one_user_keep_one_row() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping concurrent_answers_by_one_user_keep_one_row; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "", 0, &[]).await;
	let helper = super::register(&h.service, "helper", "", 0, &[]).await;
	let question_id = post(&h.service, &asker, None).await;
	let (first, second) = tokio::join!(
		h.service.answer_question(&helper, question_id, body("Left.")),
		h.service.answer_question(&helper, question_id, body("Right.")),
	);
	let outcomes = [first, second];

	assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
	assert!(
		outcomes.iter().any(|outcome| matches!(outcome, Err(Error::Conflict { .. }))),
		"Unexpected outcomes: {outcomes:?}"
	);
	assert_eq!(h.service.list_answers(&asker, question_id).await.expect("List failed.").len(), 1);
	assert_eq!(super::assert_balance_matches_ledger(&h.service, helper.user_id).await, 10);

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn concurrent_likes_by_one_user_count_once() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping concurrent_likes_by_one_user_count_once; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "", 0, &[]).await;
	let helper = super::register(&h.service, "helper", "", 0, &[]).await;
	let question_id = post(&h.service, &asker, None).await;
	let answer_id =
		h.service.answer_question(&helper, question_id, body("Use jitter.")).await.expect("Answer failed.").id;
	let (first, second) =
		tokio::join!(h.service.like_answer(&asker, answer_id), h.service.like_answer(&asker, answer_id));
	let first = first.expect("Like failed.");
	let second = second.expect("Like failed.");

	assert!(first.created ^ second.created);

	let answers = h.service.list_answers(&asker, question_id).await.expect("List failed.");

	assert_eq!(answers[0].like_count, 1);

	h.finish().await;
}
