mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Index, Postgres, Ranking, RankingWeights, Search, Security, Service, StateMultipliers,
	Storage,
};

use std::{fs, net::SocketAddr, path::Path};

const TRANSACTION_POOLER_PORT: &str = ":6543";
const SESSION_POOLER_PORT: &str = ":5432";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	validate_service(cfg)?;

	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::invalid("storage.postgres.dsn", "must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::invalid("storage.postgres.pool_max_conns", "must be greater than zero."));
	}

	validate_index(&cfg.index)?;

	if cfg.search.candidate_limit == 0 {
		return Err(Error::invalid("search.candidate_limit", "must be greater than zero."));
	}
	if cfg.search.max_results == 0 {
		return Err(Error::invalid("search.max_results", "must be greater than zero."));
	}

	validate_ranking(&cfg.ranking)?;

	if cfg.security.auth_secret_name.is_empty() {
		return Err(Error::invalid("security.auth_secret_name", "must be non-empty."));
	}

	Ok(())
}

fn validate_service(cfg: &Config) -> Result<()> {
	let http_addr: SocketAddr = cfg
		.service
		.http_bind
		.parse()
		.map_err(|_| Error::invalid("service.http_bind", "must be a socket address."))?;

	if cfg.security.bind_localhost_only && !http_addr.ip().is_loopback() {
		return Err(Error::invalid(
			"service.http_bind",
			"must be a loopback address when security.bind_localhost_only is true.",
		));
	}
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::invalid("service.log_level", "must be non-empty."));
	}
	if cfg.service.request_timeout_ms == 0 {
		return Err(Error::invalid("service.request_timeout_ms", "must be greater than zero."));
	}

	Ok(())
}

fn validate_index(index: &Index) -> Result<()> {
	if index.m < 2 {
		return Err(Error::invalid("index.m", "must be at least 2."));
	}
	if index.resolved_m_max0() < index.m {
		return Err(Error::invalid("index.m_max0", "must be greater than or equal to index.m."));
	}
	if index.ef_construction == 0 {
		return Err(Error::invalid("index.ef_construction", "must be greater than zero."));
	}
	if index.ef_search == 0 {
		return Err(Error::invalid("index.ef_search", "must be greater than zero."));
	}
	if let Some(ml) = index.level_multiplier
		&& !(ml.is_finite() && ml > 0.0)
	{
		return Err(Error::invalid(
			"index.level_multiplier",
			"must be a finite number greater than zero.",
		));
	}

	Ok(())
}

fn validate_ranking(ranking: &Ranking) -> Result<()> {
	if !ranking.recency_base_days.is_finite() || ranking.recency_base_days <= 0.0 {
		return Err(Error::invalid(
			"ranking.recency_base_days",
			"must be a finite number greater than zero.",
		));
	}

	for (key, value) in [
		("ranking.weights.semantic_similarity", ranking.weights.semantic_similarity),
		("ranking.weights.recency", ranking.weights.recency),
		("ranking.weights.comment_count", ranking.weights.comment_count),
		("ranking.weights.issue_state", ranking.weights.issue_state),
		("ranking.state_multipliers.open", ranking.state_multipliers.open),
		("ranking.state_multipliers.closed", ranking.state_multipliers.closed),
	] {
		if !value.is_finite() {
			return Err(Error::invalid(key, "must be a finite number."));
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for value in [
		&mut cfg.service.http_bind,
		&mut cfg.service.log_level,
		&mut cfg.storage.postgres.dsn,
		&mut cfg.security.auth_secret_name,
	] {
		*value = value.trim().to_string();
	}

	if cfg.storage.postgres.session_pooler {
		cfg.storage.postgres.dsn = use_session_pooler(&cfg.storage.postgres.dsn);
	}
}

fn use_session_pooler(dsn: &str) -> String {
	dsn.replacen(TRANSACTION_POOLER_PORT, SESSION_POOLER_PORT, 1)
}
