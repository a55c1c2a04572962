use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use sem_storage::models::IssueRow;

/// Open/closed reading of the raw `issueState` column. Only ranking looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueState {
	Open,
	Closed,
}
impl IssueState {
	pub fn recognize(raw: &str) -> Option<Self> {
		match raw.trim() {
			s if s.eq_ignore_ascii_case("open") => Some(Self::Open),
			s if s.eq_ignore_ascii_case("closed") => Some(Self::Closed),
			_ => None,
		}
	}

	/// Anything other than `OPEN` counts as closed.
	pub fn parse(raw: &str) -> Self {
		Self::recognize(raw).unwrap_or(Self::Closed)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
	pub name: String,
	#[serde(default)]
	pub color: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
	pub name: String,
	pub html_url: String,
}

/// Public issue fields as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
	pub id: String,
	pub number: i64,
	pub title: String,
	pub labels: Vec<Label>,
	pub issue_url: String,
	pub author: Option<Author>,
	/// Passed through as stored.
	pub issue_state: String,
	pub issue_state_reason: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub issue_created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde::option")]
	pub issue_closed_at: Option<OffsetDateTime>,
	#[serde(with = "crate::time_serde")]
	pub issue_updated_at: OffsetDateTime,
	pub repo_name: String,
	pub repo_url: String,
	pub repo_owner_name: String,
	#[serde(with = "crate::time_serde::option")]
	pub repo_last_synced_at: Option<OffsetDateTime>,
	pub comment_count: i64,
}

/// An indexed issue: its public fields plus the unit embedding it was indexed under.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
	pub issue: Issue,
	pub embedding: Vec<f32>,
}
impl Record {
	pub fn from_row(row: IssueRow) -> Self {
		let labels = parse_labels(&row.id, row.labels);
		let author = parse_author(&row.id, row.author);

		if IssueState::recognize(&row.issue_state).is_none() {
			tracing::warn!(
				issue_id = %row.id,
				state = %row.issue_state,
				"Unknown issue state. Ranking it as closed."
			);
		}

		let issue = Issue {
			id: row.id,
			number: row.number,
			title: row.title,
			labels,
			issue_url: row.issue_url,
			author,
			issue_state: row.issue_state,
			issue_state_reason: row.state_reason,
			issue_created_at: row.created_at,
			issue_closed_at: row.closed_at,
			issue_updated_at: row.updated_at,
			repo_name: row.repo_name,
			repo_url: row.repo_url,
			repo_owner_name: row.owner_login,
			repo_last_synced_at: row.last_synced_at,
			comment_count: row.comment_count,
		};

		Self { issue, embedding: row.embedding }
	}
}

fn parse_labels(id: &str, raw: Option<Value>) -> Vec<Label> {
	let Some(value) = raw else {
		return Vec::new();
	};

	match decode_json(value) {
		Ok(labels) => labels,
		Err(err) => {
			tracing::warn!(issue_id = id, error = %err, "Failed to parse labels. Using none.");

			Vec::new()
		},
	}
}

fn parse_author(id: &str, raw: Option<Value>) -> Option<Author> {
	let value = raw?;

	match decode_json(value) {
		Ok(author) => Some(author),
		Err(err) => {
			tracing::warn!(issue_id = id, error = %err, "Failed to parse author. Dropping it.");

			None
		},
	}
}

// Text columns holding JSON come through as a JSON string; unwrap one level before decoding.
fn decode_json<T>(value: Value) -> serde_json::Result<T>
where
	T: serde::de::DeserializeOwned,
{
	match value {
		Value::String(raw) => serde_json::from_str(&raw),
		other => serde_json::from_value(other),
	}
}
