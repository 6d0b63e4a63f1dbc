mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Engagement, Listing, MailProviderConfig, Postgres, Providers, QrProviderConfig,
	Redemption, Search, Security, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw).map_err(|err| match err {
		Error::ParseConfig { source, .. } => Error::ParseConfig { path: path.to_path_buf(), source },
		other => other,
	})
}

/// Parses, normalizes and validates a config document.
pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: Default::default(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.security.password_pepper.trim().is_empty() {
		return Err(Error::Validation {
			message: "security.password_pepper must be non-empty.".to_string(),
		});
	}
	if cfg.security.min_password_chars == 0 {
		return Err(Error::Validation {
			message: "security.min_password_chars must be greater than zero.".to_string(),
		});
	}

	for (label, ttl) in [
		("security.access_token_ttl_seconds", cfg.security.access_token_ttl_seconds),
		("security.refresh_token_ttl_seconds", cfg.security.refresh_token_ttl_seconds),
		("security.reset_token_ttl_seconds", cfg.security.reset_token_ttl_seconds),
	] {
		if ttl <= 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	if cfg.security.refresh_token_ttl_seconds < cfg.security.access_token_ttl_seconds {
		return Err(Error::Validation {
			message: "security.refresh_token_ttl_seconds must not be shorter than the access token TTL."
				.to_string(),
		});
	}

	let engagement = &cfg.engagement;

	for (label, value) in [
		("engagement.question_points", engagement.question_points),
		("engagement.answer_points", engagement.answer_points),
		("engagement.best_answer_points", engagement.best_answer_points),
		("engagement.auto_award_points", engagement.auto_award_points),
		("engagement.chat_points", engagement.chat_points),
		("engagement.cross_department_points", engagement.cross_department_points),
		("engagement.edit_window_seconds", engagement.edit_window_seconds),
		("engagement.auto_award_after_seconds", engagement.auto_award_after_seconds),
		("engagement.chat_cooldown_days", engagement.chat_cooldown_days),
	] {
		if value <= 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.redemption.protocol_tag.is_empty() {
		return Err(Error::Validation {
			message: "redemption.protocol_tag must be non-empty.".to_string(),
		});
	}
	if cfg.redemption.protocol_tag.contains('|') {
		return Err(Error::Validation {
			message: "redemption.protocol_tag must not contain '|'.".to_string(),
		});
	}
	if cfg.search.max_people == 0 || cfg.search.max_questions == 0 {
		return Err(Error::Validation {
			message: "search.max_people and search.max_questions must be greater than zero."
				.to_string(),
		});
	}
	if cfg.listing.default_page_size == 0 {
		return Err(Error::Validation {
			message: "listing.default_page_size must be greater than zero.".to_string(),
		});
	}
	if cfg.listing.max_page_size < cfg.listing.default_page_size {
		return Err(Error::Validation {
			message: "listing.max_page_size must be at least listing.default_page_size."
				.to_string(),
		});
	}

	for (label, value) in [
		("listing.max_notifications", cfg.listing.max_notifications),
		("listing.max_transactions", cfg.listing.max_transactions),
		("listing.max_direct_questions", cfg.listing.max_direct_questions),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.providers.qr.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.qr.api_base must be non-empty.".to_string(),
		});
	}
	if let Some(mail) = cfg.providers.mail.as_ref() {
		for (label, value) in [
			("providers.mail.api_base", &mail.api_base),
			("providers.mail.api_key", &mail.api_key),
			("providers.mail.from", &mail.from),
		] {
			if value.trim().is_empty() {
				return Err(Error::Validation { message: format!("{label} must be non-empty.") });
			}
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.redemption.protocol_tag = cfg.redemption.protocol_tag.trim().to_string();

	let trimmed = cfg.service.frontend_base_url.trim_end_matches('/').to_string();

	cfg.service.frontend_base_url = trimmed;

	if cfg.providers.mail.as_ref().map(|mail| mail.api_base.trim().is_empty()).unwrap_or(false) {
		cfg.providers.mail = None;
	}
}
