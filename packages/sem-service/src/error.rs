pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Unauthorized: {message}")]
	Unauthorized { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Secret error: {message}")]
	Secret { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
	#[error("Deadline exceeded during {stage}.")]
	DeadlineExceeded { stage: &'static str },
}

impl From<sem_storage::Error> for Error {
	fn from(err: sem_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<sem_index::Error> for Error {
	fn from(err: sem_index::Error) -> Self {
		Self::Index { message: err.to_string() }
	}
}
