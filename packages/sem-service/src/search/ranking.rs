use time::OffsetDateTime;

use sem_config::{Ranking, StateMultipliers};

use crate::record::{Issue, IssueState};

const SECONDS_PER_DAY: f64 = 86_400.0;
// ln(50 + 1): fifty comments map to a score of one.
const COMMENT_SATURATION: f64 = 51.0;

/// Every term that went into one ranking score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingTerms {
	pub similarity: f32,
	pub recency: f32,
	pub comment_score: f32,
	pub state_multiplier: f32,
	pub score: f32,
}

pub fn similarity(distance: f32) -> f32 {
	1.0 - distance
}

/// `exp(-Δt / (86400 * base_days))`. Timestamps ahead of `now` score as fresh.
pub fn recency(updated_at: OffsetDateTime, now: OffsetDateTime, base_days: f32) -> f32 {
	let elapsed = (now - updated_at).as_seconds_f64().max(0.0);

	(-elapsed / (SECONDS_PER_DAY * f64::from(base_days))).exp() as f32
}

pub fn comment_score(comment_count: i64) -> f32 {
	let count = comment_count.max(0) as f64;

	((count + 1.0).ln() / COMMENT_SATURATION.ln()) as f32
}

pub fn state_multiplier(state: IssueState, multipliers: &StateMultipliers) -> f32 {
	match state {
		IssueState::Open => multipliers.open,
		IssueState::Closed => multipliers.closed,
	}
}

pub fn compute_terms(
	cfg: &Ranking,
	issue: &Issue,
	distance: f32,
	now: OffsetDateTime,
) -> RankingTerms {
	let similarity = similarity(distance);
	let recency = recency(issue.issue_updated_at, now, cfg.recency_base_days);
	let comment_score = comment_score(issue.comment_count);
	let state = IssueState::parse(&issue.issue_state);
	let state_multiplier = state_multiplier(state, &cfg.state_multipliers);
	let weights = &cfg.weights;
	let score = weights.semantic_similarity * similarity
		+ weights.recency * recency
		+ weights.comment_count * comment_score
		+ weights.issue_state * state_multiplier;

	RankingTerms { similarity, recency, comment_score, state_multiplier, score }
}
