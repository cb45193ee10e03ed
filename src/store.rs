//! Persistence contracts consumed by the login strategy, plus an in-memory implementation.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	flow::LoginFlow,
	identity::{Credentials, CredentialsType, Identity},
};

/// Boxed future returned by persistence operations.
pub type PersistenceFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, PersistenceError>> + 'a + Send>>;

/// Login flow persistence.
pub trait LoginFlowPersister
where
	Self: Send + Sync,
{
	/// Stores a newly created flow.
	fn create_login_flow<'a>(&'a self, flow: &'a LoginFlow) -> PersistenceFuture<'a, ()>;

	/// Replaces a stored flow.
	fn update_login_flow<'a>(&'a self, flow: &'a LoginFlow) -> PersistenceFuture<'a, ()>;

	/// Loads a flow by identifier.
	fn get_login_flow(&self, id: Uuid) -> PersistenceFuture<'_, LoginFlow>;
}

/// Identity lookup by credential identifier.
pub trait IdentityPool
where
	Self: Send + Sync,
{
	/// Finds the identity owning `identifier` for credentials of `credentials_type`.
	///
	/// Fails with [`PersistenceError::NotFound`] when no identity matches.
	fn find_by_credentials_identifier<'a>(
		&'a self,
		credentials_type: CredentialsType,
		identifier: &'a str,
	) -> PersistenceFuture<'a, (Identity, Credentials)>;
}

/// Error type produced by persistence implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum PersistenceError {
	/// The requested record does not exist.
	#[error("Unable to locate the requested {what}.")]
	NotFound {
		/// Record kind.
		what: String,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl PersistenceError {
	/// Whether the error means the record does not exist.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn persistence_error_converts_into_bridge_error_with_source() {
		let persistence_error =
			PersistenceError::Backend { message: "database unreachable".into() };
		let error: Error = persistence_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("database unreachable"));

		let source =
			StdError::source(&error).expect("Bridge error should expose the persistence error.");

		assert_eq!(source.to_string(), persistence_error.to_string());
	}

	#[test]
	fn not_found_is_distinguishable() {
		assert!(PersistenceError::NotFound { what: "identity".into() }.is_not_found());
		assert!(!PersistenceError::Backend { message: "down".into() }.is_not_found());
	}
}
