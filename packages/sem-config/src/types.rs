use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub index: Index,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub ranking: Ranking,
	pub security: Security,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Budget for one search request, covering batch retrieval, index build and ranking.
	#[serde(default = "default_request_timeout_ms")]
	pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
	/// Rewrites the transaction pooler port (6543) to the session pooler port (5432) on load.
	#[serde(default)]
	pub session_pooler: bool,
}

/// HNSW construction and query parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Index {
	pub m: u32,
	/// Layer-0 neighbor cap. Defaults to `2 * m`.
	pub m_max0: Option<u32>,
	pub ef_construction: u32,
	pub ef_search: u32,
	/// Level multiplier `mL`. Defaults to `1 / ln(m)`.
	pub level_multiplier: Option<f64>,
	/// Fixes the level RNG so identical batches build identical graphs.
	pub seed: Option<u64>,
}
impl Index {
	pub fn resolved_m_max0(&self) -> u32 {
		self.m_max0.unwrap_or(self.m.saturating_mul(2))
	}

	pub fn resolved_level_multiplier(&self) -> f64 {
		self.level_multiplier.unwrap_or_else(|| 1.0 / f64::from(self.m).ln())
	}
}
impl Default for Index {
	fn default() -> Self {
		Self {
			m: 16,
			m_max0: None,
			ef_construction: 200,
			ef_search: 20,
			level_multiplier: None,
			seed: None,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	/// Number of nearest neighbors pulled from the index before ranking.
	pub candidate_limit: u32,
	/// Result cap applied when the request does not carry its own limit.
	pub max_results: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self { candidate_limit: 1_000, max_results: 1_000 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub recency_base_days: f32,
	pub weights: RankingWeights,
	pub state_multipliers: StateMultipliers,
}
impl Default for Ranking {
	fn default() -> Self {
		Self {
			recency_base_days: 30.0,
			weights: RankingWeights::default(),
			state_multipliers: StateMultipliers::default(),
		}
	}
}

/// Relative utility weights. They are not required to sum to one.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
	pub semantic_similarity: f32,
	pub recency: f32,
	pub comment_count: f32,
	pub issue_state: f32,
}
impl Default for RankingWeights {
	fn default() -> Self {
		Self { semantic_similarity: 0.8, recency: 0.05, comment_count: 0.12, issue_state: 0.03 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateMultipliers {
	pub open: f32,
	pub closed: f32,
}
impl Default for StateMultipliers {
	fn default() -> Self {
		Self { open: 1.0, closed: 0.8 }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	/// Secret store key holding the expected bearer token.
	pub auth_secret_name: String,
}

fn default_request_timeout_ms() -> u64 {
	25_000
}
