use std::cmp::Ordering;

use crate::search::RankedResult;

/// Descending order with NaN sorted last.
pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

/// Stable sort by descending score, then keep the first `limit`.
pub fn sort_by_score<T, F>(mut items: Vec<T>, limit: usize, score: F) -> Vec<T>
where
	F: Fn(&T) -> f32,
{
	items.sort_by(|a, b| cmp_f32_desc(score(a), score(b)));
	items.truncate(limit);

	items
}

pub fn assemble(results: Vec<RankedResult>, limit: usize) -> Vec<RankedResult> {
	sort_by_score(results, limit, |result| result.ranking_score)
}
