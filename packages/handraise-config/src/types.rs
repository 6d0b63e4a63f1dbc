use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub security: Security,
	#[serde(default)]
	pub engagement: Engagement,
	#[serde(default)]
	pub redemption: Redemption,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub listing: Listing,
	pub providers: Providers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Base URL of the web client, used to build password reset links.
	pub frontend_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	/// Server-side secret keying the Argon2 password hashes and the token digests.
	pub password_pepper: String,
	#[serde(default = "default_min_password_chars")]
	pub min_password_chars: u32,
	#[serde(default = "default_access_token_ttl_seconds")]
	pub access_token_ttl_seconds: i64,
	#[serde(default = "default_refresh_token_ttl_seconds")]
	pub refresh_token_ttl_seconds: i64,
	#[serde(default = "default_reset_token_ttl_seconds")]
	pub reset_token_ttl_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Engagement {
	#[serde(default = "default_question_points")]
	pub question_points: i64,
	#[serde(default = "default_answer_points")]
	pub answer_points: i64,
	#[serde(default = "default_best_answer_points")]
	pub best_answer_points: i64,
	#[serde(default = "default_auto_award_points")]
	pub auto_award_points: i64,
	#[serde(default = "default_chat_points")]
	pub chat_points: i64,
	#[serde(default = "default_cross_department_points")]
	pub cross_department_points: i64,
	/// Seconds after creation during which authors may edit or delete their posts.
	#[serde(default = "default_edit_window_seconds")]
	pub edit_window_seconds: i64,
	/// Seconds after creation before a question without a chosen answer is auto-resolved.
	#[serde(default = "default_auto_award_after_seconds")]
	pub auto_award_after_seconds: i64,
	#[serde(default = "default_chat_cooldown_days")]
	pub chat_cooldown_days: i64,
}
impl Default for Engagement {
	fn default() -> Self {
		Self {
			question_points: default_question_points(),
			answer_points: default_answer_points(),
			best_answer_points: default_best_answer_points(),
			auto_award_points: default_auto_award_points(),
			chat_points: default_chat_points(),
			cross_department_points: default_cross_department_points(),
			edit_window_seconds: default_edit_window_seconds(),
			auto_award_after_seconds: default_auto_award_after_seconds(),
			chat_cooldown_days: default_chat_cooldown_days(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Redemption {
	/// Leading tag of the redemption payload encoded into the QR image.
	#[serde(default = "default_protocol_tag")]
	pub protocol_tag: String,
}
impl Default for Redemption {
	fn default() -> Self {
		Self { protocol_tag: default_protocol_tag() }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Search {
	#[serde(default = "default_max_people")]
	pub max_people: u32,
	#[serde(default = "default_max_questions")]
	pub max_questions: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self { max_people: default_max_people(), max_questions: default_max_questions() }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
	#[serde(default = "default_page_size")]
	pub default_page_size: u32,
	#[serde(default = "default_max_page_size")]
	pub max_page_size: u32,
	#[serde(default = "default_max_notifications")]
	pub max_notifications: u32,
	#[serde(default = "default_max_transactions")]
	pub max_transactions: u32,
	#[serde(default = "default_max_direct_questions")]
	pub max_direct_questions: u32,
}
impl Default for Listing {
	fn default() -> Self {
		Self {
			default_page_size: default_page_size(),
			max_page_size: default_max_page_size(),
			max_notifications: default_max_notifications(),
			max_transactions: default_max_transactions(),
			max_direct_questions: default_max_direct_questions(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub qr: QrProviderConfig,
	/// Mail is optional; without it every email side channel is skipped.
	pub mail: Option<MailProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QrProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub from: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

fn default_min_password_chars() -> u32 {
	8
}

fn default_access_token_ttl_seconds() -> i64 {
	60 * 60
}

fn default_refresh_token_ttl_seconds() -> i64 {
	7 * 24 * 60 * 60
}

fn default_reset_token_ttl_seconds() -> i64 {
	3 * 24 * 60 * 60
}

fn default_question_points() -> i64 {
	5
}

fn default_answer_points() -> i64 {
	10
}

fn default_best_answer_points() -> i64 {
	20
}

fn default_auto_award_points() -> i64 {
	10
}

fn default_chat_points() -> i64 {
	10
}

fn default_cross_department_points() -> i64 {
	15
}

fn default_edit_window_seconds() -> i64 {
	30 * 60
}

fn default_auto_award_after_seconds() -> i64 {
	24 * 60 * 60
}

fn default_chat_cooldown_days() -> i64 {
	7
}

fn default_protocol_tag() -> String {
	"HANDRAISE".to_string()
}

fn default_max_people() -> u32 {
	100
}

fn default_max_questions() -> u32 {
	50
}

fn default_page_size() -> u32 {
	20
}

fn default_max_page_size() -> u32 {
	100
}

fn default_max_notifications() -> u32 {
	50
}

fn default_max_transactions() -> u32 {
	100
}

fn default_max_direct_questions() -> u32 {
	200
}
