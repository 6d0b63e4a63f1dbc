use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
	from: &'a str,
	to: &'a str,
	subject: &'a str,
	text: &'a str,
}

/// Posts one plain-text message to the mail relay.
pub async fn send(
	cfg: &handraise_config::MailProviderConfig,
	to: &str,
	subject: &str,
	text: &str,
) -> Result<()> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path);
	let body = SendRequest { from: cfg.from.as_str(), to, subject, text };

	client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?
		.error_for_status()?;

	Ok(())
}
