//! Positional decoding of search query rows.
//!
//! Callers write their own SQL, so column types vary between deployments. Each getter tries the
//! Postgres types a column is commonly stored as before giving up. A pgvector column has no
//! sqlx mapping here and must be selected as `embedding::text`.

use serde_json::Value;
use sqlx::{Row, postgres::PgRow};
use time::{OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::{Error, Result, models::IssueRow};

pub const COLUMN_COUNT: usize = 17;

const ID: usize = 0;
const NUMBER: usize = 1;
const TITLE: usize = 2;
const LABELS: usize = 3;
const ISSUE_URL: usize = 4;
const AUTHOR: usize = 5;
const ISSUE_STATE: usize = 6;
const STATE_REASON: usize = 7;
const CREATED_AT: usize = 8;
const CLOSED_AT: usize = 9;
const UPDATED_AT: usize = 10;
const REPO_NAME: usize = 11;
const REPO_URL: usize = 12;
const OWNER_LOGIN: usize = 13;
const LAST_SYNCED_AT: usize = 14;
const COMMENT_COUNT: usize = 15;
const EMBEDDING: usize = 16;

pub fn decode_row(row: &PgRow) -> Result<IssueRow> {
	if row.len() < COLUMN_COUNT {
		return Err(Error::Decode {
			column: "*",
			message: format!("expected {COLUMN_COUNT} columns, got {}", row.len()),
		});
	}

	let id = identifier(row, ID).ok_or_else(|| missing("id"))?;
	let created_at = timestamp(row, CREATED_AT).ok_or_else(|| missing("created_at"))?;
	let updated_at = timestamp(row, UPDATED_AT).ok_or_else(|| missing("updated_at"))?;
	let embedding = embedding(row, EMBEDDING)?;

	Ok(IssueRow {
		id,
		number: integer(row, NUMBER).unwrap_or_default(),
		title: text(row, TITLE).unwrap_or_default(),
		labels: json(row, LABELS),
		issue_url: text(row, ISSUE_URL).unwrap_or_default(),
		author: json(row, AUTHOR),
		issue_state: text(row, ISSUE_STATE).unwrap_or_default(),
		state_reason: text(row, STATE_REASON),
		created_at,
		closed_at: timestamp(row, CLOSED_AT),
		updated_at,
		repo_name: text(row, REPO_NAME).unwrap_or_default(),
		repo_url: text(row, REPO_URL).unwrap_or_default(),
		owner_login: text(row, OWNER_LOGIN).unwrap_or_default(),
		last_synced_at: timestamp(row, LAST_SYNCED_AT),
		comment_count: integer(row, COMMENT_COUNT).unwrap_or_default(),
		embedding,
	})
}

/// Parses an embedding rendered as text.
///
/// Accepts JSON arrays (which is also how pgvector prints) and Postgres array literals.
pub fn parse_embedding(raw: &str) -> Result<Vec<f32>> {
	let trimmed = raw.trim();
	let json = match trimmed.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
		Some(inner) => format!("[{inner}]"),
		None => trimmed.to_string(),
	};
	let values: Vec<f64> =
		serde_json::from_str(&json).map_err(|err| Error::InvalidEmbedding(err.to_string()))?;

	finish_embedding(values.into_iter().map(|value| value as f32).collect())
}

fn embedding_from_json(value: &Value) -> Result<Vec<f32>> {
	match value {
		Value::String(raw) => parse_embedding(raw),
		Value::Array(items) => {
			let values = items
				.iter()
				.map(|item| {
					item.as_f64().map(|value| value as f32).ok_or_else(|| {
						Error::InvalidEmbedding(format!("non-numeric element {item}"))
					})
				})
				.collect::<Result<Vec<_>>>()?;

			finish_embedding(values)
		},
		other => Err(Error::InvalidEmbedding(format!("unexpected JSON value {other}"))),
	}
}

fn finish_embedding(values: Vec<f32>) -> Result<Vec<f32>> {
	if values.is_empty() {
		return Err(Error::InvalidEmbedding("embedding is empty".to_string()));
	}
	if values.iter().any(|value| !value.is_finite()) {
		return Err(Error::InvalidEmbedding("embedding holds a non-finite value".to_string()));
	}

	Ok(values)
}

fn embedding(row: &PgRow, idx: usize) -> Result<Vec<f32>> {
	let absent = || Error::InvalidEmbedding("embedding is null".to_string());

	if let Ok(values) = row.try_get::<Option<Vec<f32>>, _>(idx) {
		return finish_embedding(values.ok_or_else(absent)?);
	}
	if let Ok(values) = row.try_get::<Option<Vec<f64>>, _>(idx) {
		let values = values.ok_or_else(absent)?;

		return finish_embedding(values.into_iter().map(|value| value as f32).collect());
	}
	if let Ok(value) = row.try_get::<Option<Value>, _>(idx) {
		return embedding_from_json(&value.ok_or_else(absent)?);
	}

	match row.try_get::<Option<String>, _>(idx) {
		Ok(Some(raw)) => parse_embedding(&raw),
		Ok(None) => Err(absent()),
		Err(err) => Err(Error::Decode { column: "embedding", message: err.to_string() }),
	}
}

fn missing(column: &'static str) -> Error {
	Error::Decode { column, message: "value is null or has an unsupported type".to_string() }
}

fn text(row: &PgRow, idx: usize) -> Option<String> {
	row.try_get::<Option<String>, _>(idx).ok().flatten()
}

fn identifier(row: &PgRow, idx: usize) -> Option<String> {
	if let Ok(value) = row.try_get::<Option<String>, _>(idx) {
		return value.filter(|value| !value.is_empty());
	}
	if let Ok(value) = row.try_get::<Option<Uuid>, _>(idx) {
		return value.map(|value| value.to_string());
	}

	integer(row, idx).map(|value| value.to_string())
}

fn integer(row: &PgRow, idx: usize) -> Option<i64> {
	if let Ok(value) = row.try_get::<Option<i64>, _>(idx) {
		return value;
	}
	if let Ok(value) = row.try_get::<Option<i32>, _>(idx) {
		return value.map(i64::from);
	}
	if let Ok(value) = row.try_get::<Option<i16>, _>(idx) {
		return value.map(i64::from);
	}
	if let Ok(value) = row.try_get::<Option<f64>, _>(idx) {
		return value.filter(|value| value.is_finite()).map(|value| value.round() as i64);
	}
	if let Ok(value) = row.try_get::<Option<f32>, _>(idx) {
		return value.filter(|value| value.is_finite()).map(|value| value.round() as i64);
	}

	text(row, idx).and_then(|raw| raw.trim().parse().ok())
}

fn timestamp(row: &PgRow, idx: usize) -> Option<OffsetDateTime> {
	if let Ok(value) = row.try_get::<Option<OffsetDateTime>, _>(idx) {
		return value;
	}
	if let Ok(value) = row.try_get::<Option<PrimitiveDateTime>, _>(idx) {
		return value.map(PrimitiveDateTime::assume_utc);
	}

	text(row, idx).and_then(|raw| OffsetDateTime::parse(raw.trim(), &Rfc3339).ok())
}

fn json(row: &PgRow, idx: usize) -> Option<Value> {
	if let Ok(value) = row.try_get::<Option<Value>, _>(idx) {
		return value.filter(|value| !value.is_null());
	}

	let raw = text(row, idx).filter(|raw| !raw.trim().is_empty())?;

	Some(serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::{embedding_from_json, parse_embedding};
	use crate::Error;

	#[test]
	fn parses_json_and_pgvector_text() {
		assert_eq!(parse_embedding("[0.5, -0.25, 1]").expect("Parse failed."), vec![0.5, -0.25, 1.0]);
		assert_eq!(parse_embedding(" [1,0] ").expect("Parse failed."), vec![1.0, 0.0]);
	}

	#[test]
	fn parses_postgres_array_literal() {
		assert_eq!(parse_embedding("{0.6,0.8}").expect("Parse failed."), vec![0.6, 0.8]);
	}

	#[test]
	fn rejects_garbage_and_empty_embeddings() {
		assert!(matches!(parse_embedding("not a vector"), Err(Error::InvalidEmbedding(_))));
		assert!(matches!(parse_embedding("[]"), Err(Error::InvalidEmbedding(_))));
		assert!(matches!(parse_embedding("[1, \"x\"]"), Err(Error::InvalidEmbedding(_))));
	}

	#[test]
	fn values_beyond_f32_range_are_rejected() {
		assert!(matches!(parse_embedding("[1e300]"), Err(Error::InvalidEmbedding(_))));
	}

	#[test]
	fn json_values_decode_as_arrays_or_text() {
		assert_eq!(embedding_from_json(&json!([0.0, 1.0])).expect("Decode failed."), vec![0.0, 1.0]);
		assert_eq!(embedding_from_json(&json!("[0.0, 1.0]")).expect("Decode failed."), [0.0, 1.0]);
		assert!(embedding_from_json(&json!({ "v": [1.0] })).is_err());
	}
}
