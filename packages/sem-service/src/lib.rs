pub mod auth;
pub mod record;
pub mod search;
pub mod time_serde;

mod error;

pub use error::{Error, Result};
pub use record::{Author, Issue, IssueState, Label, Record};
pub use search::{RankedResult, SearchRequest, SearchResponse};

use std::{env, future::Future, pin::Pin, sync::Arc};

use color_eyre::eyre;

use sem_config::Config;
use sem_storage::{db::Db, models::IssueBatch};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Executes a caller supplied query and hands back decoded issue rows.
pub trait RowSource
where
	Self: Send + Sync,
{
	fn fetch_issue_batch<'a>(
		&'a self,
		sql: &'a str,
	) -> BoxFuture<'a, sem_storage::Result<IssueBatch>>;
}

/// Resolves named secrets. Looked up on every request, never cached.
pub trait SecretStore
where
	Self: Send + Sync,
{
	fn get_secret<'a>(&'a self, name: &'a str) -> BoxFuture<'a, color_eyre::Result<String>>;
}

/// Reads secrets from process environment variables of the same name.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretStore;

pub struct SemService {
	pub cfg: Config,
	pub rows: Arc<dyn RowSource>,
	pub secrets: Arc<dyn SecretStore>,
}
impl SemService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self::with_sources(cfg, Arc::new(db), Arc::new(EnvSecretStore))
	}

	pub fn with_sources(
		cfg: Config,
		rows: Arc<dyn RowSource>,
		secrets: Arc<dyn SecretStore>,
	) -> Self {
		Self { cfg, rows, secrets }
	}
}

impl RowSource for Db {
	fn fetch_issue_batch<'a>(
		&'a self,
		sql: &'a str,
	) -> BoxFuture<'a, sem_storage::Result<IssueBatch>> {
		Box::pin(Db::fetch_issue_batch(self, sql))
	}
}

impl SecretStore for EnvSecretStore {
	fn get_secret<'a>(&'a self, name: &'a str) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move {
			let value =
				env::var(name).map_err(|err| eyre::eyre!("Secret {name} is unavailable: {err}."))?;

			if value.is_empty() {
				return Err(eyre::eyre!("Secret {name} is empty."));
			}

			Ok(value)
		})
	}
}
