use std::time::Duration;

use reqwest::Client;
use serde_json::json;

use crate::{Error, Result};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// Renders `payload` as a QR code and returns the PNG bytes.
pub async fn render(cfg: &handraise_config::QrProviderConfig, payload: &str) -> Result<Vec<u8>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path);
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&json!({ "payload": payload, "format": "png" }))
		.send()
		.await?;
	let bytes = res.error_for_status()?.bytes().await?;

	parse_render_response(&bytes)
}

fn parse_render_response(bytes: &[u8]) -> Result<Vec<u8>> {
	if bytes.is_empty() {
		return Err(Error::InvalidResponse { message: "QR renderer returned an empty body.".to_string() });
	}
	if !bytes.starts_with(&PNG_SIGNATURE) {
		return Err(Error::InvalidResponse {
			message: "QR renderer response is not a PNG image.".to_string(),
		});
	}

	Ok(bytes.to_vec())
}
