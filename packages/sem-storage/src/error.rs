#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid embedding: {0}")]
	InvalidEmbedding(String),
	#[error("Failed to decode column {column}: {message}")]
	Decode { column: &'static str, message: String },
}
