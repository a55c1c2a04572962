use std::sync::Arc;

use sem_service::SemService;
use sem_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<SemService>,
}
impl AppState {
	pub async fn new(config: sem_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;
		let service = SemService::new(config, db);

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: SemService) -> Self {
		Self { service: Arc::new(service) }
	}
}
