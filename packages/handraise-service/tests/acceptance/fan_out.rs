use handraise_service::PostQuestionRequest;

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn urgent_question_reaches_each_expert_once() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping urgent_question_reaches_each_expert_once; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let poster = super::register(&h.service, "poster", "", 0, &["python"]).await;
	let expert = super::register(&h.service, "expert", "", 0, &["#Python", "django"]).await;
	let outsider = super::register(&h.service, "outsider", "", 0, &["golang"]).await;
	let question = h
		.service
		.post_question(
			&poster,
			PostQuestionRequest {
				title: "Prod import error".to_string(),
				body: "ModuleNotFoundError after deploy.".to_string(),
				tags: vec!["Python".to_string(), "#django".to_string(), "python".to_string()],
				urgent: true,
				assigned_answerer_id: None,
				anonymous: false,
			},
		)
		.await
		.expect("Post failed.");

	assert_eq!(question.tags, vec!["django".to_string(), "python".to_string()]);

	let expert_inbox = h.service.list_notifications(&expert).await.expect("List failed.");

	assert_eq!(expert_inbox.len(), 1);
	assert_eq!(expert_inbox[0].message, "URGENT: Prod import error (tags: django, python)");
	assert_eq!(expert_inbox[0].question_id, Some(question.id));
	assert!(h.service.list_notifications(&outsider).await.expect("List failed.").is_empty());
	assert!(h.service.list_notifications(&poster).await.expect("List failed.").is_empty());

	let sent = h.mail.wait_for(1).await;

	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].to, "expert@example.com");

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn mark_read_only_touches_own_notifications() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping mark_read_only_touches_own_notifications; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let poster = super::register(&h.service, "poster", "", 0, &[]).await;
	let expert = super::register(&h.service, "expert", "", 0, &["sql"]).await;
	let other = super::register(&h.service, "other", "", 0, &["sql"]).await;

	for title in ["Slow query", "Deadlock"] {
		h.service
			.post_question(
				&poster,
				PostQuestionRequest {
					title: title.to_string(),
					body: String::new(),
					tags: vec!["sql".to_string()],
					urgent: true,
					assigned_answerer_id: None,
					anonymous: false,
				},
			)
			.await
			.expect("Post failed.");
	}

	let inbox = h.service.list_notifications(&expert).await.expect("List failed.");
	let other_inbox = h.service.list_notifications(&other).await.expect("List failed.");
	let marked = h
		.service
		.mark_notifications_read(
			&expert,
			handraise_service::MarkReadRequest { ids: Some(vec![inbox[0].id, other_inbox[0].id]) },
		)
		.await
		.expect("Mark read failed.");

	assert_eq!(marked.updated, 1);

	let rest = h
		.service
		.mark_notifications_read(&expert, Default::default())
		.await
		.expect("Mark read failed.");

	assert_eq!(rest.updated, 1);
	assert!(
		h.service.list_notifications(&other).await.expect("List failed.").iter().all(|n| !n.read)
	);

	let emptied = h
		.service
		.mark_notifications_read(&other, handraise_service::MarkReadRequest { ids: Some(Vec::new()) })
		.await
		.expect("Mark read failed.");

	assert_eq!(emptied.updated, 2);
	assert!(
		h.service.list_notifications(&other).await.expect("List failed.").iter().all(|n| n.read)
	);

	h.finish().await;
}
