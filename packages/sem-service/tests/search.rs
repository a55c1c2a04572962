use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use color_eyre::eyre;
use time::{OffsetDateTime, macros::datetime};

use sem_config::{Config, Index, Postgres, Ranking, Search, Security, Service, Storage};
use sem_service::{
	BoxFuture, Error, Record, RowSource, SearchRequest, SecretStore, SemService,
	search::ranking,
};
use sem_storage::models::{IssueBatch, IssueRow};

const NOW: OffsetDateTime = datetime!(2025-01-15 12:00 UTC);
const SECRET_NAME: &str = "SEM_AUTH_TOKEN";

struct StaticRows {
	rows: Vec<IssueRow>,
	delay: Option<Duration>,
	calls: Arc<AtomicUsize>,
}
impl StaticRows {
	fn new(rows: Vec<IssueRow>) -> Self {
		Self { rows, delay: None, calls: Arc::new(AtomicUsize::new(0)) }
	}

	fn slow(rows: Vec<IssueRow>, delay: Duration) -> Self {
		Self { delay: Some(delay), ..Self::new(rows) }
	}
}
impl RowSource for StaticRows {
	fn fetch_issue_batch<'a>(
		&'a self,
		_sql: &'a str,
	) -> BoxFuture<'a, sem_storage::Result<IssueBatch>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}

			Ok(IssueBatch { rows: self.rows.clone(), skipped: 0 })
		})
	}
}

struct StaticSecret {
	value: Option<String>,
	calls: Arc<AtomicUsize>,
}
impl StaticSecret {
	fn new(value: Option<&str>) -> Self {
		Self { value: value.map(str::to_string), calls: Arc::new(AtomicUsize::new(0)) }
	}
}
impl SecretStore for StaticSecret {
	fn get_secret<'a>(&'a self, name: &'a str) -> BoxFuture<'a, color_eyre::Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let value = self.value.clone();

		Box::pin(async move { value.ok_or_else(|| eyre::eyre!("Secret {name} is not set.")) })
	}
}

fn test_config() -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
			request_timeout_ms: 5_000,
		},
		storage: Storage {
			postgres: Postgres {
				dsn: "postgres://localhost/unused".to_string(),
				pool_max_conns: 1,
				session_pooler: false,
			},
		},
		index: Index { seed: Some(7), ..Default::default() },
		search: Search::default(),
		ranking: Ranking::default(),
		security: Security {
			bind_localhost_only: true,
			auth_secret_name: SECRET_NAME.to_string(),
		},
	}
}

fn issue_row(id: &str, embedding: Vec<f32>) -> IssueRow {
	IssueRow {
		id: id.to_string(),
		number: 1,
		title: format!("Issue {id}"),
		labels: None,
		issue_url: format!("https://github.com/o/r/issues/{id}"),
		author: None,
		issue_state: "OPEN".to_string(),
		state_reason: None,
		created_at: datetime!(2024-12-01 00:00 UTC),
		closed_at: None,
		updated_at: NOW,
		repo_name: "r".to_string(),
		repo_url: "https://github.com/o/r".to_string(),
		owner_login: "o".to_string(),
		last_synced_at: None,
		comment_count: 0,
		embedding,
	}
}

fn three_records() -> Vec<IssueRow> {
	vec![
		issue_row("record1", vec![1.0, 0.0]),
		issue_row("record2", vec![0.0, 1.0]),
		issue_row("record3", vec![0.8, 0.6]),
	]
}

fn request(embedding: Vec<f64>) -> SearchRequest {
	SearchRequest { sql_query: "SELECT * FROM issues".to_string(), embedding, limit: None }
}

fn service(rows: StaticRows, secret: StaticSecret) -> SemService {
	SemService::with_sources(test_config(), Arc::new(rows), Arc::new(secret))
}

#[tokio::test]
async fn ranks_by_similarity_when_other_signals_match() {
	let service = service(StaticRows::new(three_records()), StaticSecret::new(None));
	let response =
		service.search_at(request(vec![1.0, 0.0]), NOW).await.expect("Search failed.");
	let ids: Vec<&str> = response.data.iter().map(|result| result.issue.id.as_str()).collect();

	assert_eq!(ids, ["record1", "record3", "record2"]);
	assert_eq!(response.total_count, 3);
	assert!(
		response.data.windows(2).all(|pair| pair[0].ranking_score >= pair[1].ranking_score)
	);

	// 0.8 * 1 + 0.05 * 1 + 0.12 * 0 + 0.03 * 1
	assert!((response.data[0].ranking_score - 0.88).abs() < 1e-5);
}

#[tokio::test]
async fn empty_batch_yields_empty_success() {
	let service = service(StaticRows::new(Vec::new()), StaticSecret::new(None));
	let response = service.search_at(request(vec![1.0, 0.0]), NOW).await.expect("Search failed.");

	assert!(response.data.is_empty());
	assert_eq!(response.total_count, 0);

	let json = serde_json::to_value(&response).expect("Serialization failed.");

	assert_eq!(json, serde_json::json!({ "data": [], "totalCount": 0 }));
}

#[tokio::test]
async fn request_limit_truncates_but_total_count_does_not() {
	let service = service(StaticRows::new(three_records()), StaticSecret::new(None));
	let mut req = request(vec![1.0, 0.0]);

	req.limit = Some(2);

	let response = service.search_at(req, NOW).await.expect("Search failed.");

	assert_eq!(response.data.len(), 2);
	assert_eq!(response.total_count, 3);
}

#[tokio::test]
async fn disallowed_query_is_rejected_before_fetching() {
	let rows = StaticRows::new(three_records());
	let calls = rows.calls.clone();
	let service = service(rows, StaticSecret::new(None));
	let mut req = request(vec![1.0, 0.0]);

	req.sql_query = "DROP TABLE issues".to_string();

	let result = service.search_at(req, NOW).await;

	assert!(matches!(result, Err(Error::InvalidRequest { .. })));
	assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn query_dimension_mismatch_is_a_bad_request() {
	let service = service(StaticRows::new(three_records()), StaticSecret::new(None));
	let result = service.search_at(request(vec![1.0, 0.0, 0.0]), NOW).await;

	assert!(matches!(result, Err(Error::InvalidRequest { .. })), "Got {result:?}.");
}

#[tokio::test]
async fn batch_dimension_mismatch_is_an_index_error() {
	let rows = vec![issue_row("a", vec![1.0, 0.0]), issue_row("b", vec![1.0, 0.0, 0.0])];
	let service = service(StaticRows::new(rows), StaticSecret::new(None));
	let result = service.search_at(request(vec![1.0, 0.0]), NOW).await;

	assert!(matches!(result, Err(Error::Index { .. })), "Got {result:?}.");
}

#[tokio::test]
async fn slow_fetch_hits_the_deadline() {
	let mut cfg = test_config();

	cfg.service.request_timeout_ms = 20;

	let rows = StaticRows::slow(three_records(), Duration::from_millis(500));
	let service = SemService::with_sources(cfg, Arc::new(rows), Arc::new(StaticSecret::new(None)));
	let result = service.search_at(request(vec![1.0, 0.0]), NOW).await;

	assert!(matches!(result, Err(Error::DeadlineExceeded { stage: "fetch" })), "Got {result:?}.");
}

#[tokio::test]
async fn malformed_header_is_rejected_without_fetching_the_secret() {
	let secret = StaticSecret::new(Some("s3cret"));
	let secret_calls = secret.calls.clone();
	let service = service(StaticRows::new(Vec::new()), secret);

	for header in [None, Some("Bearer"), Some("Token s3cret"), Some("Bearer s3cret extra")] {
		let result = service.authenticate(header).await;

		assert!(matches!(result, Err(Error::Unauthorized { .. })), "Accepted {header:?}.");
	}

	assert_eq!(secret_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn bearer_token_is_compared_against_the_secret() {
	let secret = StaticSecret::new(Some("s3cret"));
	let secret_calls = secret.calls.clone();
	let service = service(StaticRows::new(Vec::new()), secret);

	service.authenticate(Some("Bearer s3cret")).await.expect("Expected the token to match.");

	let result = service.authenticate(Some("Bearer wrong")).await;

	assert!(matches!(result, Err(Error::Unauthorized { .. })));
	assert_eq!(secret_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_secret_is_a_secret_error() {
	let service = service(StaticRows::new(Vec::new()), StaticSecret::new(None));
	let result = service.authenticate(Some("Bearer anything")).await;

	assert!(matches!(result, Err(Error::Secret { .. })));
}

#[test]
fn score_increases_with_similarity_when_other_terms_are_fixed() {
	let record = Record::from_row(issue_row("x", vec![1.0, 0.0]));
	let cfg = Ranking::default();
	let scores: Vec<f32> = [1.2_f32, 0.9, 0.5, 0.2, 0.0]
		.iter()
		.map(|distance| ranking::compute_terms(&cfg, &record.issue, *distance, NOW).score)
		.collect();

	assert!(scores.windows(2).all(|pair| pair[0] < pair[1]), "Scores {scores:?}.");
}

#[test]
fn closed_issues_score_below_open_ones() {
	let open = Record::from_row(issue_row("open", vec![1.0, 0.0]));
	let mut closed_row = issue_row("closed", vec![1.0, 0.0]);

	closed_row.issue_state = "CLOSED".to_string();

	let closed = Record::from_row(closed_row);
	let cfg = Ranking::default();
	let open_terms = ranking::compute_terms(&cfg, &open.issue, 0.1, NOW);
	let closed_terms = ranking::compute_terms(&cfg, &closed.issue, 0.1, NOW);

	assert!(open_terms.score > closed_terms.score);
	assert!((open_terms.score - closed_terms.score - 0.03 * 0.2).abs() < 1e-6);
}

#[tokio::test]
async fn unknown_state_ranks_as_closed_but_is_returned_verbatim() {
	let mut merged = issue_row("merged", vec![1.0, 0.0]);
	let mut closed = issue_row("closed", vec![1.0, 0.0]);

	merged.issue_state = "MERGED".to_string();
	closed.issue_state = "CLOSED".to_string();

	let service = service(StaticRows::new(vec![merged, closed]), StaticSecret::new(None));
	let response = service.search_at(request(vec![1.0, 0.0]), NOW).await.expect("Search failed.");
	let merged = response
		.data
		.iter()
		.find(|result| result.issue.id == "merged")
		.expect("Missing merged issue.");

	assert_eq!(merged.issue.issue_state, "MERGED");
	assert_eq!(response.data[0].ranking_score, response.data[1].ranking_score);
}
