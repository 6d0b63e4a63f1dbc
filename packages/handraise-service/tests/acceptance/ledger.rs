use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};

use handraise_service::{
	AnswerRequest, ChatLogRequest, Error, PostQuestionRequest, RedeemRequest,
};

use super::{FailingQr, PNG_BYTES};

fn question(title: &str) -> PostQuestionRequest {
	PostQuestionRequest {
		title: title.to_string(),
		body: "Details.".to_string(),
		tags: Vec::new(),
		urgent: false,
		assigned_answerer_id: None,
		anonymous: false,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn balance_equals_ledger_sum_after_every_award() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping balance_equals_ledger_sum_after_every_award; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let asker = super::register(&h.service, "asker", "Engineering", 3, &[]).await;
	let helper = super::register(&h.service, "helper", "Finance", 5, &[]).await;
	let posted = h.service.post_question(&asker, question("How do I deploy?")).await.expect("Post failed.");

	assert_eq!(super::assert_balance_matches_ledger(&h.service, asker.user_id).await, 5);

	let answer = h
		.service
		.answer_question(&helper, posted.id, AnswerRequest { body: "Use the pipeline.".to_string() })
		.await
		.expect("Answer failed.");
	let best = h.service.mark_best_answer(&asker, answer.id).await.expect("Mark best failed.");

	assert_eq!(best.points_awarded, 20);
	assert_eq!(super::assert_balance_matches_ledger(&h.service, helper.user_id).await, 30);

	let chat = h
		.service
		.log_chat(&asker, ChatLogRequest { other: "helper".to_string() })
		.await
		.expect("Chat log failed.");

	assert!(chat.cross_department);
	assert_eq!(chat.points_awarded, 25);
	assert_eq!(super::assert_balance_matches_ledger(&h.service, asker.user_id).await, 30);

	let history = h.service.point_transactions(&asker).await.expect("Transactions failed.");
	let reasons: Vec<&str> = history.iter().map(|entry| entry.reason.as_str()).collect();

	assert!(reasons.contains(&"Posted a question"));
	assert!(reasons.contains(&"Logged 1-on-1 chat"));
	assert!(reasons.contains(&"Cross-department bonus"));

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn redemption_debits_and_returns_qr_payload() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping redemption_debits_and_returns_qr_payload; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let user = super::register(&h.service, "spender", "Ops", 1, &[]).await;

	h.service.post_question(&user, question("First")).await.expect("Post failed.");
	h.service.post_question(&user, question("Second")).await.expect("Post failed.");

	let redeemed =
		h.service.redeem_points(&user, RedeemRequest { amount: 7 }).await.expect("Redeem failed.");

	assert_eq!(redeemed.points_balance, 3);
	assert!(redeemed.payload.starts_with("HANDRAISE|USER:spender|POINTS:7|TS:"));
	assert_eq!(redeemed.qr_data_url, format!("data:image/png;base64,{}", STANDARD.encode(PNG_BYTES)));
	assert_eq!(super::assert_balance_matches_ledger(&h.service, user.user_id).await, 3);

	let history = h.service.point_transactions(&user).await.expect("Transactions failed.");

	assert_eq!(history[0].amount, -7);
	assert_eq!(history[0].reason, "Redeemed at cafeteria");

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn over_redemption_is_rejected_without_writes() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping over_redemption_is_rejected_without_writes; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let user = super::register(&h.service, "saver", "Ops", 1, &[]).await;

	h.service.post_question(&user, question("Only question")).await.expect("Post failed.");

	for amount in [0, -3, 6] {
		let err = h
			.service
			.redeem_points(&user, RedeemRequest { amount })
			.await
			.expect_err("Redeem must fail.");

		assert!(matches!(err, Error::InvalidRequest { .. }), "Unexpected error: {err:?}");
	}

	let balance = h.service.points_balance(&user).await.expect("Balance failed.");

	assert_eq!(balance.points_balance, 5);
	assert_eq!(h.service.point_transactions(&user).await.expect("Transactions failed.").len(), 1);

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn renderer_failure_deducts_nothing() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping renderer_failure_deducts_nothing; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness_with_qr(test_db, Arc::new(FailingQr)).await;
	let user = super::register(&h.service, "unlucky", "Ops", 1, &[]).await;

	h.service.post_question(&user, question("Only question")).await.expect("Post failed.");

	let err = h
		.service
		.redeem_points(&user, RedeemRequest { amount: 5 })
		.await
		.expect_err("Redeem must fail when the renderer fails.");

	assert!(matches!(err, Error::Provider { .. }));
	assert_eq!(super::assert_balance_matches_ledger(&h.service, user.user_id).await, 5);

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn concurrent_redemptions_never_overdraw() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping concurrent_redemptions_never_overdraw; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let user = super::register(&h.service, "spender", "Ops", 1, &[]).await;

	for title in ["One", "Two", "Three", "Four"] {
		h.service.post_question(&user, question(title)).await.expect("Post failed.");
	}

	assert_eq!(super::assert_balance_matches_ledger(&h.service, user.user_id).await, 20);

	let (first, second) = tokio::join!(
		h.service.redeem_points(&user, RedeemRequest { amount: 15 }),
		h.service.redeem_points(&user, RedeemRequest { amount: 15 }),
	);
	let outcomes = [first, second];

	assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
	assert!(
		outcomes.iter().any(|outcome| matches!(outcome, Err(Error::InvalidRequest { .. }))),
		"Unexpected outcomes: {outcomes:?}"
	);
	assert_eq!(super::assert_balance_matches_ledger(&h.service, user.user_id).await, 5);

	h.finish().await;
}
