//! The OIDC login strategy.
//!
//! [`OidcStrategy`] drives a login flow through the [`LoginState`] machine: provider selection
//! suspends the attempt in the continuity channel and redirects the browser, the callback
//! resumes it and verifies the provider's claims, and `process_login` either issues a session
//! for the linked identity or hands the attempt to the registration counterpart. Native clients
//! skip the redirect by presenting an ID token.
//!
//! Routing signals are returned as [`LoginOutcome`]s; every failure is a [`LoginError`]
//! annotated with the provider, flow, and traits of the attempt.

pub mod payload;

mod callback;
mod login;
mod process;
mod state;

pub use callback::CallbackParams;
pub use payload::UpdateLoginFlowWithOidcMethod;
pub use state::{flow_id_from_state, generate_state};

// self
use crate::{
	_prelude::*,
	continuity::ContinuityManager,
	error::{ErrorClass, LoginError},
	flow::{LoginFlow, LoginHookExecutor, RegistrationCounterpart, RegistrationFlow},
	obs::{self, LoginStage, StageOutcome},
	provider::{OidcMethodConfig, Provider, ProviderId, ProviderRegistry},
	session::Session,
	store::{IdentityPool, LoginFlowPersister},
};

/// Identifier of the strategy, recorded on flows and sessions.
pub const STRATEGY_ID: &str = "oidc";
/// UI node group the post-login hooks run for.
pub const NODE_GROUP: &str = "oidc";
/// Continuity channel holding suspended attempts.
pub const CONTINUITY_CHANNEL: &str = "oidc_auth_code_session";
/// Lifespan of a suspended attempt.
pub const CONTINUITY_LIFESPAN: Duration = Duration::minutes(30);

/// Collaborators the strategy delegates persistence, hooks, and registration to.
#[derive(Clone)]
pub struct StrategyCollaborators {
	/// Login flow persistence.
	pub flows: Arc<dyn LoginFlowPersister>,
	/// Identity lookup.
	pub identities: Arc<dyn IdentityPool>,
	/// Suspension channel across the provider redirect.
	pub continuity: Arc<dyn ContinuityManager>,
	/// Post-login hooks.
	pub hooks: Arc<dyn LoginHookExecutor>,
	/// Registration side of the bridge.
	pub registration: Arc<dyn RegistrationCounterpart>,
}

/// Result of a strategy entry point that did not fail.
#[derive(Debug)]
pub enum LoginOutcome {
	/// The request does not target this strategy; try the next one.
	NotResponsible,
	/// A valid session already authenticates the request; nothing was written.
	AlreadyAuthenticated,
	/// The strategy wrote the response; generic flow handling must stop.
	CompletedByStrategy(Completion),
}
impl LoginOutcome {
	fn stage_outcome(&self) -> StageOutcome {
		match self {
			Self::NotResponsible | Self::AlreadyAuthenticated => StageOutcome::NotResponsible,
			Self::CompletedByStrategy(completion) => completion.stage_outcome(),
		}
	}
}

/// How the strategy completed a request.
#[derive(Debug)]
pub enum Completion {
	/// The browser was sent to the provider; the login completes on callback.
	Redirect {
		/// Authorization URL.
		url: Url,
	},
	/// The post-login hooks ran for an existing identity.
	SessionIssued(Box<Session>),
	/// No identity was linked; the registration flow took over.
	RegistrationPivot(Box<RegistrationFlow>),
}
impl Completion {
	fn stage_outcome(&self) -> StageOutcome {
		match self {
			Self::Redirect { .. } => StageOutcome::Redirect,
			Self::SessionIssued(_) => StageOutcome::SessionIssued,
			Self::RegistrationPivot(_) => StageOutcome::RegistrationPivot,
		}
	}
}

/// Context attached to failures of one attempt.
#[derive(Debug, Default)]
struct AttemptContext {
	provider: Option<ProviderId>,
	traits: Option<Value>,
	registration_flow_id: Option<Uuid>,
}

/// OpenID Connect login strategy.
#[derive(Clone)]
pub struct OidcStrategy {
	config: Arc<OidcMethodConfig>,
	registry: Arc<ProviderRegistry>,
	flows: Arc<dyn LoginFlowPersister>,
	identities: Arc<dyn IdentityPool>,
	continuity: Arc<dyn ContinuityManager>,
	hooks: Arc<dyn LoginHookExecutor>,
	registration: Arc<dyn RegistrationCounterpart>,
}
impl OidcStrategy {
	/// Creates a strategy over validated method settings.
	pub fn new(
		config: impl Into<Arc<OidcMethodConfig>>,
		registry: impl Into<Arc<ProviderRegistry>>,
		collaborators: StrategyCollaborators,
	) -> Self {
		let StrategyCollaborators { flows, identities, continuity, hooks, registration } =
			collaborators;

		Self {
			config: config.into(),
			registry: registry.into(),
			flows,
			identities,
			continuity,
			hooks,
			registration,
		}
	}

	/// Method settings in use.
	pub fn config(&self) -> &OidcMethodConfig {
		&self.config
	}

	/// Reloads the persisted flow `flow_id`, failing once it has expired.
	pub async fn validate_flow(&self, flow_id: Uuid) -> Result<LoginFlow> {
		let flow = self.flows.get_login_flow(flow_id).await?;

		if flow.is_expired_at(OffsetDateTime::now_utc()) {
			return Err(Error::FlowExpired { flow_id, expired_at: flow.expires_at });
		}

		Ok(flow)
	}

	fn resolve_provider(&self, provider: &str) -> Result<Arc<dyn Provider>> {
		self.registry.resolve(&self.config.config, provider)
	}

	fn ensure_enabled(&self) -> Result<()> {
		if self.config.enabled {
			Ok(())
		} else {
			Err(Error::MethodDisabled { method: STRATEGY_ID })
		}
	}

	// Annotates `source`, records the failure on `flow`, and persists it best-effort.
	async fn handle_error(
		&self,
		stage: LoginStage,
		flow: Option<&mut LoginFlow>,
		ctx: AttemptContext,
		source: Error,
	) -> LoginError {
		let (flow_id, flow_type) = match flow {
			Some(flow) => {
				flow.fail(source.id());

				if let Err(e) = self.flows.update_login_flow(flow).await {
					tracing::warn!(
						flow_id = %flow.id,
						error = %e,
						"Unable to persist the failed login flow."
					);
				}

				(Some(flow.id), Some(flow.flow_type))
			},
			None => (None, None),
		};
		let provider = ctx.provider.as_ref().map(ToString::to_string).unwrap_or_default();
		let detail = source.debug().unwrap_or_default();

		match source.class() {
			ErrorClass::Internal => tracing::error!(
				stage = stage.as_str(),
				provider = %provider,
				flow_id = ?flow_id,
				kind = source.id(),
				debug = %detail,
				"OpenID Connect login failed: {source}"
			),
			_ => tracing::warn!(
				stage = stage.as_str(),
				provider = %provider,
				flow_id = ?flow_id,
				kind = source.id(),
				"OpenID Connect login failed: {source}"
			),
		}

		obs::record_login_outcome(stage, StageOutcome::Failure);

		LoginError {
			provider: ctx.provider,
			flow_id,
			flow_type,
			traits: ctx.traits,
			registration_flow_id: ctx.registration_flow_id,
			source,
		}
	}
}
impl Debug for OidcStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OidcStrategy")
			.field("enabled", &self.config.enabled)
			.field("providers", &self.config.config.providers.len())
			.field("registry", &self.registry)
			.finish()
	}
}
