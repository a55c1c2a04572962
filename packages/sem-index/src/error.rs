pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Vector dimension mismatch: index holds {expected} dimensions, got {actual}.")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Vector must contain at least one dimension.")]
	EmptyVector,
}
