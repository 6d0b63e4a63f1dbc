use handraise_service::{ChatLogRequest, Error};

fn with(other: &str) -> ChatLogRequest {
	ChatLogRequest { other: other.to_string() }
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn chat_bonus_is_weekly_per_ordered_pair() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping chat_bonus_is_weekly_per_ordered_pair; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let ann = super::register(&h.service, "ann", "Sales", 0, &[]).await;
	let ben = super::register(&h.service, "ben", "Sales", 0, &[]).await;
	let first = h.service.log_chat(&ann, with("ben")).await.expect("First log failed.");

	assert_eq!(first.points_awarded, 10);
	assert!(!first.cross_department);

	let err = h.service.log_chat(&ann, with("ben")).await.expect_err("Cooldown must apply.");

	assert!(matches!(err, Error::Conflict { .. }), "Unexpected error: {err:?}");

	// The reverse direction is a different pair.
	h.service.log_chat(&ben, with("ann")).await.expect("Reverse log failed.");

	let chat_id: i64 = sqlx::query_scalar("SELECT id FROM chat_logs WHERE user_id = $1")
		.bind(ann.user_id)
		.fetch_one(&h.service.db.pool)
		.await
		.expect("Failed to load chat log.");

	super::backdate(&h.service, "chat_logs", chat_id, 8 * 24 * 60 * 60).await;

	h.service.log_chat(&ann, with("ben")).await.expect("Log after cooldown failed.");

	assert_eq!(super::assert_balance_matches_ledger(&h.service, ann.user_id).await, 20);

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn chat_rejects_self_and_unknown_users() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping chat_rejects_self_and_unknown_users; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let ann = super::register(&h.service, "ann", "", 0, &[]).await;
	let own = h.service.log_chat(&ann, with("ann")).await.expect_err("Self chat must fail.");
	let missing = h.service.log_chat(&ann, with("ghost")).await.expect_err("Unknown must fail.");

	assert!(matches!(own, Error::InvalidRequest { .. }));
	assert!(matches!(missing, Error::NotFound { .. }));
	assert_eq!(super::assert_balance_matches_ledger(&h.service, ann.user_id).await, 0);

	h.finish().await;
}
