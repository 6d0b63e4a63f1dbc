use std::sync::Arc;

use handraise_service::HandraiseService;
use handraise_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<HandraiseService>,
}
impl AppState {
	/// Connects to Postgres and bootstraps the schema.
	pub async fn new(config: handraise_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		Ok(Self::from_service(HandraiseService::new(config, db)))
	}

	pub fn from_service(service: HandraiseService) -> Self {
		Self { service: Arc::new(service) }
	}
}
