//! Thread-safe in-memory persistence for local development and tests.

// self
use crate::{
	_prelude::*,
	flow::LoginFlow,
	identity::{Credentials, CredentialsType, Identity},
	store::{IdentityPool, LoginFlowPersister, PersistenceError, PersistenceFuture},
};

type FlowMap = Arc<RwLock<HashMap<Uuid, LoginFlow>>>;
type IdentityMap = Arc<RwLock<HashMap<Uuid, Identity>>>;

/// Keeps login flows and identities in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	flows: FlowMap,
	identities: IdentityMap,
}
impl MemoryStore {
	/// Stores `identity`, replacing one with the same id.
	pub fn insert_identity(&self, identity: Identity) {
		self.identities.write().insert(identity.id, identity);
	}

	/// Returns a stored flow without going through the persister contract.
	pub fn login_flow(&self, id: Uuid) -> Option<LoginFlow> {
		self.flows.read().get(&id).cloned()
	}

	/// Number of stored identities.
	pub fn identity_count(&self) -> usize {
		self.identities.read().len()
	}

	fn find_now(
		identities: &IdentityMap,
		credentials_type: CredentialsType,
		identifier: &str,
	) -> Result<(Identity, Credentials), PersistenceError> {
		identities
			.read()
			.values()
			.find_map(|identity| {
				identity
					.credentials(credentials_type)
					.filter(|c| c.identifiers.iter().any(|i| i == identifier))
					.map(|c| (identity.clone(), c.clone()))
			})
			.ok_or_else(|| PersistenceError::NotFound { what: "identity".into() })
	}
}
impl LoginFlowPersister for MemoryStore {
	fn create_login_flow<'a>(&'a self, flow: &'a LoginFlow) -> PersistenceFuture<'a, ()> {
		let flows = self.flows.clone();

		Box::pin(async move {
			let mut guard = flows.write();

			if guard.contains_key(&flow.id) {
				return Err(PersistenceError::Backend {
					message: format!("login flow {} already exists", flow.id),
				});
			}

			guard.insert(flow.id, flow.clone());

			Ok(())
		})
	}

	fn update_login_flow<'a>(&'a self, flow: &'a LoginFlow) -> PersistenceFuture<'a, ()> {
		let flows = self.flows.clone();

		Box::pin(async move {
			match flows.write().get_mut(&flow.id) {
				Some(stored) => {
					*stored = flow.clone();

					Ok(())
				},
				None => Err(PersistenceError::NotFound { what: "login flow".into() }),
			}
		})
	}

	fn get_login_flow(&self, id: Uuid) -> PersistenceFuture<'_, LoginFlow> {
		let flows = self.flows.clone();

		Box::pin(async move {
			flows
				.read()
				.get(&id)
				.cloned()
				.ok_or_else(|| PersistenceError::NotFound { what: "login flow".into() })
		})
	}
}
impl IdentityPool for MemoryStore {
	fn find_by_credentials_identifier<'a>(
		&'a self,
		credentials_type: CredentialsType,
		identifier: &'a str,
	) -> PersistenceFuture<'a, (Identity, Credentials)> {
		let identities = self.identities.clone();

		Box::pin(async move { Self::find_now(&identities, credentials_type, identifier) })
	}
}
