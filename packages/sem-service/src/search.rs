pub mod assemble;
pub mod ranking;

use std::time::{Duration, Instant as StdInstant};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::time::{self as tokio_time, Instant};

use sem_config::Index;
use sem_index::{HnswConfig, HnswIndex};

use crate::{
	Error, Result, SemService,
	record::{Issue, Record},
};

const ALLOWED_QUERY_PREFIX: &str = "SELECT";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
	pub sql_query: String,
	pub embedding: Vec<f64>,
	#[serde(default)]
	pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
	#[serde(flatten)]
	pub issue: Issue,
	pub ranking_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
	pub data: Vec<RankedResult>,
	/// Rows that made it into the index, not the number of hits returned.
	pub total_count: usize,
}

impl SemService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		self.search_at(req, OffsetDateTime::now_utc()).await
	}

	/// Runs the pipeline with an explicit clock reading used for every recency term.
	pub async fn search_at(
		&self,
		req: SearchRequest,
		now: OffsetDateTime,
	) -> Result<SearchResponse> {
		let started = StdInstant::now();
		let deadline = Instant::now() + Duration::from_millis(self.cfg.service.request_timeout_ms);
		let query = validate_request(&req)?;
		let stage = StdInstant::now();
		let batch = tokio_time::timeout_at(deadline, self.rows.fetch_issue_batch(&req.sql_query))
			.await
			.map_err(|_| Error::DeadlineExceeded { stage: "fetch" })??;

		tracing::info!(
			rows = batch.rows.len(),
			skipped = batch.skipped,
			elapsed_ms = elapsed_ms(stage),
			"Issue batch fetched."
		);

		let records: Vec<Record> = batch.rows.into_iter().map(Record::from_row).collect();
		let stage = StdInstant::now();
		let index = build_index(&self.cfg.index, &records, deadline)?;

		tracing::info!(
			nodes = index.len(),
			max_layer = index.max_layer(),
			elapsed_ms = elapsed_ms(stage),
			"Index built."
		);

		check_deadline(deadline, "search")?;

		let stage = StdInstant::now();
		let k = self.cfg.search.candidate_limit as usize;
		let ef = (self.cfg.index.ef_search as usize).max(k);
		let hits = index.search(&query, k, ef).map_err(|err| match err {
			sem_index::Error::DimensionMismatch { expected, actual } => Error::InvalidRequest {
				message: format!(
					"Query embedding has {actual} dimensions but indexed rows have {expected}."
				),
			},
			other => other.into(),
		})?;

		tracing::debug!(hits = hits.len(), elapsed_ms = elapsed_ms(stage), "Index searched.");

		let stage = StdInstant::now();
		let ranked = hits
			.into_iter()
			.map(|hit| {
				let issue = &records[hit.key].issue;
				let terms = ranking::compute_terms(&self.cfg.ranking, issue, hit.distance, now);

				tracing::trace!(
					issue_id = %issue.id,
					distance = hit.distance,
					similarity = terms.similarity,
					recency = terms.recency,
					comment_score = terms.comment_score,
					state_multiplier = terms.state_multiplier,
					score = terms.score,
					"Candidate ranked."
				);

				RankedResult { issue: issue.clone(), ranking_score: terms.score }
			})
			.collect::<Vec<_>>();
		let max_results = self.cfg.search.max_results as usize;
		let limit = req.limit.map_or(max_results, |limit| limit.min(max_results));
		let data = assemble::assemble(ranked, limit);

		check_deadline(deadline, "ranking")?;

		tracing::debug!(results = data.len(), elapsed_ms = elapsed_ms(stage), "Results ranked.");
		tracing::info!(
			results = data.len(),
			total_count = records.len(),
			elapsed_ms = elapsed_ms(started),
			"Search completed."
		);

		Ok(SearchResponse { data, total_count: records.len() })
	}
}

/// Checks the query text and turns the request embedding into `f32`s.
pub fn validate_request(req: &SearchRequest) -> Result<Vec<f32>> {
	let head = req.sql_query.trim_start();
	let allowed = head
		.get(..ALLOWED_QUERY_PREFIX.len())
		.is_some_and(|prefix| prefix.eq_ignore_ascii_case(ALLOWED_QUERY_PREFIX));

	if !allowed {
		return Err(Error::InvalidRequest {
			message: "Only SELECT queries are allowed".to_string(),
		});
	}

	let query: Vec<f32> = req.embedding.iter().map(|value| *value as f32).collect();

	if query.is_empty() {
		return Err(Error::InvalidRequest { message: "embedding must be non-empty.".to_string() });
	}
	if query.iter().any(|value| !value.is_finite()) {
		return Err(Error::InvalidRequest {
			message: "embedding must contain only finite numbers.".to_string(),
		});
	}

	Ok(query)
}

fn build_index(cfg: &Index, records: &[Record], deadline: Instant) -> Result<HnswIndex<usize>> {
	let hnsw = HnswConfig::new(cfg.m as usize)
		.with_m_max0(cfg.resolved_m_max0() as usize)
		.with_ef_construction(cfg.ef_construction as usize)
		.with_level_multiplier(cfg.resolved_level_multiplier());
	let mut index = match cfg.seed {
		Some(seed) => HnswIndex::with_seed(hnsw, seed),
		None => HnswIndex::new(hnsw),
	};

	for (key, record) in records.iter().enumerate() {
		check_deadline(deadline, "index build")?;

		index.insert(key, record.embedding.clone())?;
	}

	Ok(index)
}

fn check_deadline(deadline: Instant, stage: &'static str) -> Result<()> {
	if Instant::now() >= deadline {
		return Err(Error::DeadlineExceeded { stage });
	}

	Ok(())
}

fn elapsed_ms(since: StdInstant) -> u64 {
	since.elapsed().as_millis() as u64
}
