pub mod accounts;
pub mod answers;
pub mod chats;
pub mod direct;
pub mod notifications;
pub mod points;
pub mod profiles;
pub mod questions;
pub mod resolution;
pub mod search;

mod error;

pub use accounts::{
	ForgotPasswordRequest, ForgotUsernameRequest, LoginRequest, RefreshRequest, RegisterRequest,
	ResetPasswordRequest, TokenPair,
};
pub use answers::{AnswerRequest, AnswerView, LikeResponse, MarkBestResponse};
pub use chats::{ChatLogRequest, ChatLogResponse};
pub use direct::{CreateDirectQuestionRequest, DirectQuestionView};
pub use error::{Error, Result};
pub use notifications::{MarkReadRequest, MarkReadResponse, NotificationView};
pub use points::{BalanceResponse, PointTransactionView, RedeemRequest, RedeemResponse};
pub use profiles::{
	DepartmentPet, DepartmentPetsResponse, DepartmentScore, ProfileView, StageView, TagView,
	UpdateProfileRequest,
};
pub use questions::{
	ListQuestionsRequest, ListQuestionsResponse, PostQuestionRequest, QuestionSuggestion,
	QuestionView,
};
pub use resolution::ResolutionOutcome;
pub use search::{PersonHit, SearchRequest, SearchResponse};

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use serde::{Deserialize, Deserializer, Serialize};
use time::Duration;

use handraise_config::{Config, MailProviderConfig, QrProviderConfig};
use handraise_domain::tags;
use handraise_providers::{mail, qr};
use handraise_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait MailSender
where
	Self: Send + Sync,
{
	fn send<'a>(
		&'a self,
		cfg: &'a MailProviderConfig,
		message: &'a MailMessage,
	) -> BoxFuture<'a, handraise_providers::Result<()>>;
}

pub trait QrRenderer
where
	Self: Send + Sync,
{
	fn render<'a>(
		&'a self,
		cfg: &'a QrProviderConfig,
		payload: &'a str,
	) -> BoxFuture<'a, handraise_providers::Result<Vec<u8>>>;
}

/// The authenticated caller. Every operation receives it explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
	pub user_id: i64,
	pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRef {
	pub id: i64,
	pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
	pub to: String,
	pub subject: String,
	pub body: String,
}

#[derive(Clone)]
pub struct Providers {
	pub mail: Arc<dyn MailSender>,
	pub qr: Arc<dyn QrRenderer>,
}
impl Providers {
	pub fn new(mail: Arc<dyn MailSender>, qr: Arc<dyn QrRenderer>) -> Self {
		Self { mail, qr }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { mail: provider.clone(), qr: provider }
	}
}

pub struct HandraiseService {
	pub cfg: Config,
	pub db: Db,
	pub providers: Providers,
}
impl HandraiseService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self { cfg, db, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		Self { cfg, db, providers }
	}

	pub(crate) fn edit_window(&self) -> Duration {
		Duration::seconds(self.cfg.engagement.edit_window_seconds)
	}

	/// Sends emails on a detached task once the triggering transaction has committed.
	pub(crate) fn dispatch_mail(&self, messages: Vec<MailMessage>) {
		if messages.is_empty() {
			return;
		}

		let Some(cfg) = self.cfg.providers.mail.clone() else {
			tracing::debug!(count = messages.len(), "Mail provider is not configured. Skipping emails.");

			return;
		};
		let sender = self.providers.mail.clone();

		tokio::spawn(async move {
			for message in messages {
				if let Err(err) = sender.send(&cfg, &message).await {
					tracing::warn!(
						error = %err,
						recipient = %message.to,
						subject = %message.subject,
						"Failed to send email."
					);
				}
			}
		});
	}
}

struct DefaultProviders;
impl MailSender for DefaultProviders {
	fn send<'a>(
		&'a self,
		cfg: &'a MailProviderConfig,
		message: &'a MailMessage,
	) -> BoxFuture<'a, handraise_providers::Result<()>> {
		Box::pin(mail::send(cfg, &message.to, &message.subject, &message.body))
	}
}

impl QrRenderer for DefaultProviders {
	fn render<'a>(
		&'a self,
		cfg: &'a QrProviderConfig,
		payload: &'a str,
	) -> BoxFuture<'a, handraise_providers::Result<Vec<u8>>> {
		Box::pin(qr::render(cfg, payload))
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTags {
	List(Vec<String>),
	Csv(String),
}
impl RawTags {
	fn into_vec(self) -> Vec<String> {
		match self {
			Self::List(items) => items,
			Self::Csv(raw) => tags::split_tag_list(&raw),
		}
	}
}

/// Accepts tags as a JSON list or a comma-separated string.
pub(crate) fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(RawTags::deserialize(deserializer)?.into_vec())
}

pub(crate) fn deserialize_optional_tags<'de, D>(
	deserializer: D,
) -> Result<Option<Vec<String>>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<RawTags>::deserialize(deserializer)?.map(RawTags::into_vec))
}

/// `%fragment%` with LIKE metacharacters escaped.
pub(crate) fn contains_pattern(fragment: &str) -> String {
	format!("%{}%", escape_like(fragment))
}

/// `fragment%` with LIKE metacharacters escaped.
pub(crate) fn prefix_pattern(fragment: &str) -> String {
	format!("{}%", escape_like(fragment))
}

fn escape_like(fragment: &str) -> String {
	let mut out = String::with_capacity(fragment.len());

	for ch in fragment.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(ch);
	}

	out
}

/// Groups `(owner_id, name)` rows by owner, keeping row order.
pub(crate) fn group_names(rows: Vec<(i64, String)>) -> HashMap<i64, Vec<String>> {
	let mut grouped: HashMap<i64, Vec<String>> = HashMap::new();

	for (owner_id, name) in rows {
		grouped.entry(owner_id).or_default().push(name);
	}

	grouped
}
