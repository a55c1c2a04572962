use serde_json::Value;
use time::OffsetDateTime;

/// One decoded result row of a caller supplied search query.
///
/// Labels and author stay as raw JSON; the service decides how lenient to be with them.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRow {
	pub id: String,
	pub number: i64,
	pub title: String,
	pub labels: Option<Value>,
	pub issue_url: String,
	pub author: Option<Value>,
	pub issue_state: String,
	pub state_reason: Option<String>,
	pub created_at: OffsetDateTime,
	pub closed_at: Option<OffsetDateTime>,
	pub updated_at: OffsetDateTime,
	pub repo_name: String,
	pub repo_url: String,
	pub owner_login: String,
	pub last_synced_at: Option<OffsetDateTime>,
	pub comment_count: i64,
	pub embedding: Vec<f32>,
}

/// Rows that survived decoding plus how many were dropped on the way.
#[derive(Debug, Default)]
pub struct IssueBatch {
	pub rows: Vec<IssueRow>,
	pub skipped: usize,
}
