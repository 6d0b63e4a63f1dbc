use handraise_service::{
	Error, ForgotPasswordRequest, LoginRequest, RefreshRequest, RegisterRequest,
	ResetPasswordRequest,
};

fn registration(username: Option<&str>, email: &str, password: &str) -> RegisterRequest {
	RegisterRequest {
		username: username.map(str::to_string),
		email: email.to_string(),
		password: password.to_string(),
		first_name: "Jane".to_string(),
		last_name: "Doe".to_string(),
		department: "Engineering".to_string(),
		position: String::new(),
		years_experience: Some(4),
		expertise_hashtags: vec!["#Rust".to_string(), "sql".to_string()],
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn register_login_refresh_round_trip() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping register_login_refresh_round_trip; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;
	let pair = h
		.service
		.register(registration(None, "Jane.Doe@Example.com", "long-password"))
		.await
		.expect("Register failed.");

	assert_eq!(pair.user.username, "jane.doe");
	assert_eq!(pair.token_type, "Bearer");

	let principal = h.service.resolve_session(&pair.access_token).await.expect("Resolve failed.");
	let profile = h.service.get_profile(&principal).await.expect("Profile failed.");

	assert_eq!(profile.email, "jane.doe@example.com");
	assert_eq!(profile.expertise, vec!["rust".to_string(), "sql".to_string()]);
	assert_eq!(profile.years_experience, 4);

	let err = h
		.service
		.resolve_session(&pair.refresh_token)
		.await
		.expect_err("Refresh tokens are not access tokens.");

	assert!(matches!(err, Error::Unauthorized { .. }));

	let second = h
		.service
		.register(registration(None, "jane.doe@other.example", "long-password"))
		.await
		.expect("Second register failed.");

	assert_eq!(second.user.username, "jane.doe1");

	let duplicate = h
		.service
		.register(registration(Some("jane.doe"), "fresh@example.com", "long-password"))
		.await
		.expect_err("Duplicate username must fail.");

	assert!(matches!(duplicate, Error::Conflict { .. }));

	let short = h
		.service
		.register(registration(Some("shorty"), "short@example.com", "short"))
		.await
		.expect_err("Short password must fail.");

	assert!(matches!(short, Error::InvalidRequest { .. }));

	let login = h
		.service
		.login(LoginRequest { username: "jane.doe".to_string(), password: "long-password".to_string() })
		.await
		.expect("Login failed.");
	let bad = h
		.service
		.login(LoginRequest { username: "jane.doe".to_string(), password: "wrong-password".to_string() })
		.await
		.expect_err("Bad password must fail.");

	assert!(matches!(bad, Error::Unauthorized { .. }));

	let refreshed = h
		.service
		.refresh(RefreshRequest { refresh_token: login.refresh_token.clone() })
		.await
		.expect("Refresh failed.");

	assert_eq!(refreshed.user.id, pair.user.id);

	let reused = h
		.service
		.refresh(RefreshRequest { refresh_token: login.refresh_token })
		.await
		.expect_err("Refresh tokens are single use.");

	assert!(matches!(reused, Error::Unauthorized { .. }));

	h.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HANDRAISE_PG_DSN to run."]
async fn password_reset_is_single_use() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping password_reset_is_single_use; set HANDRAISE_PG_DSN to run.");

		return;
	};
	let h = super::harness(test_db).await;

	h.service
		.register(registration(Some("jane"), "jane@example.com", "long-password"))
		.await
		.expect("Register failed.");
	h.service
		.forgot_password(ForgotPasswordRequest { email: "nobody@example.com".to_string() })
		.await
		.expect("Unknown emails must succeed quietly.");
	h.service
		.forgot_password(ForgotPasswordRequest { email: "JANE@example.com".to_string() })
		.await
		.expect("Forgot password failed.");

	let sent = h.mail.wait_for(1).await;

	assert_eq!(sent.len(), 1);

	let token = sent[0]
		.body
		.split("token=")
		.nth(1)
		.and_then(|rest| rest.split_whitespace().next())
		.expect("Reset link must carry a token.")
		.to_string();

	assert!(sent[0].body.contains("http://frontend.test/reset-password?token="));

	let short = h
		.service
		.reset_password(ResetPasswordRequest { token: token.clone(), new_password: "short".to_string() })
		.await
		.expect_err("Short password must fail.");

	assert!(matches!(short, Error::InvalidRequest { .. }));

	h.service
		.reset_password(ResetPasswordRequest {
			token: token.clone(),
			new_password: "brand-new-password".to_string(),
		})
		.await
		.expect("Reset failed.");

	let reused = h
		.service
		.reset_password(ResetPasswordRequest { token, new_password: "another-password".to_string() })
		.await
		.expect_err("Used tokens must fail.");

	assert!(matches!(reused, Error::Unauthorized { .. }));

	h.service
		.login(LoginRequest {
			username: "jane".to_string(),
			password: "brand-new-password".to_string(),
		})
		.await
		.expect("Login with the new password failed.");

	h.finish().await;
}
