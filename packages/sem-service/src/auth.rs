use crate::{Error, Result, SemService};

const BEARER_SCHEME: &str = "Bearer";

/// Extracts the token from an `Authorization` value of the exact shape `Bearer <token>`.
pub fn read_bearer_token(header: Option<&str>) -> Option<&str> {
	let mut parts = header?.split(' ');
	let scheme = parts.next()?;
	let token = parts.next()?;

	if parts.next().is_some() || scheme != BEARER_SCHEME || token.is_empty() {
		return None;
	}

	Some(token)
}

impl SemService {
	/// Verifies the caller's bearer token against the configured secret.
	///
	/// A malformed header fails without touching the secret store.
	pub async fn authenticate(&self, header: Option<&str>) -> Result<()> {
		let Some(token) = read_bearer_token(header) else {
			tracing::warn!("Rejected request with a missing or malformed authorization header.");

			return Err(Error::Unauthorized {
				message: "Missing or malformed authorization header.".to_string(),
			});
		};
		let name = self.cfg.security.auth_secret_name.as_str();
		let expected = self.secrets.get_secret(name).await.map_err(|err| {
			tracing::error!(secret = name, error = %err, "Failed to load the auth secret.");

			Error::Secret { message: err.to_string() }
		})?;

		if token != expected {
			tracing::warn!("Rejected request with an invalid bearer token.");

			return Err(Error::Unauthorized { message: "Invalid bearer token.".to_string() });
		}

		Ok(())
	}
}
