use std::time::Instant;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Result, decode, models::IssueBatch};

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &sem_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	/// Runs a caller supplied `SELECT` and decodes every row positionally.
	///
	/// Rows that fail to decode are logged and skipped. Only a failing query is an error.
	pub async fn fetch_issue_batch(&self, sql: &str) -> Result<IssueBatch> {
		let started = Instant::now();
		let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
		let mut batch = IssueBatch { rows: Vec::with_capacity(rows.len()), skipped: 0 };

		for (idx, row) in rows.iter().enumerate() {
			match decode::decode_row(row) {
				Ok(issue) => batch.rows.push(issue),
				Err(err) => {
					tracing::warn!(row = idx, error = %err, "Skipping undecodable row.");

					batch.skipped += 1;
				},
			}
		}

		tracing::debug!(
			rows = batch.rows.len(),
			skipped = batch.skipped,
			elapsed_ms = started.elapsed().as_millis() as u64,
			"Issue batch fetched."
		);

		Ok(batch)
	}
}
