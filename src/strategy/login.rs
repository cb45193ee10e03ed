//! Login entry point: provider selection for browsers, ID-token login for native clients.

// self
use crate::{
	_prelude::*,
	continuity::ContinuationPayload,
	error::LoginError,
	flow::{FlowType, LoginFlow, LoginState, StrategyRequest, StrategyResponse},
	identity::Aal,
	oauth::TokenSet,
	obs::{self, LoginSpan, LoginStage, StageOutcome},
	provider::{Provider, ProviderId},
	strategy::{
		AttemptContext, CONTINUITY_CHANNEL, CONTINUITY_LIFESPAN, Completion, LoginOutcome,
		OidcStrategy, STRATEGY_ID, UpdateLoginFlowWithOidcMethod, generate_state,
		process::VerifiedAttempt,
	},
};

impl OidcStrategy {
	/// Handles a login submission for `flow`.
	///
	/// Browser flows are suspended in the continuity channel and the response is pointed at the
	/// provider. API flows must carry an ID token, which is verified on the spot and processed
	/// like a callback. Requests that do not name a provider, or that require more than AAL1,
	/// are left to other strategies.
	pub async fn login(
		&self,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		flow: &mut LoginFlow,
	) -> Result<LoginOutcome, LoginError> {
		const STAGE: LoginStage = LoginStage::Login;

		if flow.requested_aal > Aal::Aal1 {
			obs::record_login_outcome(STAGE, StageOutcome::NotResponsible);

			return Ok(LoginOutcome::NotResponsible);
		}

		let mut ctx = AttemptContext::default();
		let payload = match UpdateLoginFlowWithOidcMethod::from_request(request, flow.flow_type) {
			Ok(payload) => payload,
			Err(e) => return Err(self.handle_error(STAGE, Some(flow), ctx, e).await),
		};

		if payload.provider.is_empty() || payload.targets_other_method() {
			obs::record_login_outcome(STAGE, StageOutcome::NotResponsible);

			return Ok(LoginOutcome::NotResponsible);
		}

		ctx.provider = ProviderId::new(&payload.provider).ok();
		ctx.traits = payload.traits.clone();

		let span = LoginSpan::new(STAGE, &payload.provider);

		obs::record_login_outcome(STAGE, StageOutcome::Attempt);

		let result =
			span.instrument(self.login_with(request, response, flow, &payload, &mut ctx)).await;

		match result {
			Ok(outcome) => {
				obs::record_login_outcome(STAGE, outcome.stage_outcome());

				Ok(outcome)
			},
			Err(e) => Err(self.handle_error(STAGE, Some(flow), ctx, e).await),
		}
	}

	async fn login_with(
		&self,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		flow: &mut LoginFlow,
		payload: &UpdateLoginFlowWithOidcMethod,
		ctx: &mut AttemptContext,
	) -> Result<LoginOutcome> {
		self.ensure_enabled()?;

		let provider = self.resolve_provider(&payload.provider)?;

		ctx.provider = Some(provider.config().id.clone());

		self.validate_flow(flow.id).await?;

		if request.is_authenticated() && !flow.refresh {
			tracing::debug!(flow_id = %flow.id, "The request is already authenticated.");

			return Ok(LoginOutcome::AlreadyAuthenticated);
		}

		let completion = match flow.flow_type {
			FlowType::Browser =>
				self.redirect_to_provider(request, response, flow, provider.as_ref(), payload)
					.await?,
			FlowType::Api =>
				self.login_with_id_token(request, response, flow, provider.as_ref(), payload, ctx)
					.await?,
		};

		Ok(LoginOutcome::CompletedByStrategy(completion))
	}

	async fn redirect_to_provider(
		&self,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		flow: &mut LoginFlow,
		provider: &dyn Provider,
		payload: &UpdateLoginFlowWithOidcMethod,
	) -> Result<Completion> {
		let mut parameters = provider.auth_code_url_options();

		parameters.extend(provider.upstream_parameters(&payload.upstream_parameters()?));

		let client = provider.oauth2().await?;
		let state = generate_state(flow.id);
		let container =
			ContinuationPayload { state, flow_id: flow.id, traits: payload.traits.clone() };

		container
			.pause(
				self.continuity.as_ref(),
				request,
				response,
				CONTINUITY_CHANNEL,
				CONTINUITY_LIFESPAN,
			)
			.await?;

		flow.active = Some(STRATEGY_ID.into());
		flow.transition(LoginState::AwaitingProviderRedirect {
			provider: provider.config().id.to_string(),
		})?;

		// The callback reloads the flow; the selection must be durable before the redirect.
		self.flows.update_login_flow(flow).await?;

		let url = client.auth_code_url(&container.state, &parameters);

		if request.is_json_request() {
			response.browser_location_change_required(url.clone());
		} else {
			response.redirect(url.clone());
		}

		Ok(Completion::Redirect { url })
	}

	async fn login_with_id_token(
		&self,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		flow: &mut LoginFlow,
		provider: &dyn Provider,
		payload: &UpdateLoginFlowWithOidcMethod,
		ctx: &mut AttemptContext,
	) -> Result<Completion> {
		let Some(verifier) = provider.id_token_verifier() else {
			return Err(Error::ProviderNoApiSupport { provider: provider.config().id.clone() });
		};

		if payload.id_token.is_empty() {
			return Err(Error::IdTokenMissing);
		}

		let claims = verifier.claims_from_id_token(&payload.id_token).await?;

		flow.active = Some(STRATEGY_ID.into());
		flow.transition(LoginState::ClaimsVerified {
			provider: provider.config().id.to_string(),
			subject: claims.subject.clone(),
		})?;

		let token = TokenSet::from_id_token(payload.id_token.as_str());

		self.process_login(
			request,
			response,
			flow,
			VerifiedAttempt { provider, token: &token, claims: &claims, container: None },
			ctx,
		)
		.await
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		error::ErrorClass,
		provider::OidcMethodConfig,
		session::Session,
		store::{LoginFlowPersister, MemoryStore},
	};

	async fn stored_flow(store: &MemoryStore, flow_type: FlowType) -> LoginFlow {
		let flow = LoginFlow::new(flow_type, Duration::minutes(30), test_login_url());

		store.create_login_flow(&flow).await.expect("Login flow should persist.");

		flow
	}

	fn submission(fields: &[(&str, &str)]) -> StrategyRequest {
		let url = Url::parse("https://auth.example.com/self-service/login")
			.expect("Submission URL should parse.");

		StrategyRequest::new(url).with_form(fields.iter().copied())
	}

	async fn login(
		fixture: &StrategyFixture,
		request: &StrategyRequest,
		flow: &mut LoginFlow,
	) -> Result<LoginOutcome, LoginError> {
		fixture.strategy.login(request, &mut StrategyResponse::default(), flow).await
	}

	#[tokio::test]
	async fn other_methods_and_higher_assurance_are_not_ours() {
		let fixture = StrategyFixture::new(OidcMethodConfig::enabled(test_collection()));
		let mut flow = stored_flow(&fixture.store, FlowType::Browser).await;

		for fields in [
			&[("method", "password"), ("provider", "google")][..],
			&[("method", "oidc")][..],
			&[][..],
		] {
			let outcome = login(&fixture, &submission(fields), &mut flow)
				.await
				.expect("Foreign submissions should not fail.");

			assert!(matches!(outcome, LoginOutcome::NotResponsible), "{fields:?}");
		}

		let mut aal2 = flow.clone().with_requested_aal(Aal::Aal2);
		let outcome = login(&fixture, &submission(&[("provider", "google")]), &mut aal2)
			.await
			.expect("Second-factor flows should not fail.");

		assert!(matches!(outcome, LoginOutcome::NotResponsible));
		assert_eq!(fixture.store.login_flow(flow.id).map(|f| f.state), Some(LoginState::Choosing));
	}

	#[tokio::test]
	async fn disabled_method_rejects_selection() {
		let config = OidcMethodConfig { enabled: false, config: test_collection() };
		let fixture = StrategyFixture::new(config);
		let mut flow = stored_flow(&fixture.store, FlowType::Browser).await;
		let err = login(&fixture, &submission(&[("provider", "google")]), &mut flow)
			.await
			.expect_err("A disabled method must reject the selection.");

		assert!(matches!(err.source, Error::MethodDisabled { method: "oidc" }));
		assert_eq!(err.class(), ErrorClass::Forbidden);
		assert_eq!(flow.state, LoginState::Failed { kind: "method_disabled".into() });
	}

	#[tokio::test]
	async fn unknown_provider_is_not_found() {
		let fixture = StrategyFixture::new(OidcMethodConfig::enabled(test_collection()));
		let mut flow = stored_flow(&fixture.store, FlowType::Browser).await;
		let err = login(
			&fixture,
			&submission(&[("provider", "myspace"), ("traits.email", "a@example.com")]),
			&mut flow,
		)
		.await
		.expect_err("An unknown provider must be rejected.");

		assert!(matches!(
			&err.source,
			Error::ProviderUnknown { provider } if provider == "myspace"
		));
		assert_eq!(err.class(), ErrorClass::NotFound);
		assert_eq!(err.traits, Some(serde_json::json!({ "email": "a@example.com" })));
	}

	#[tokio::test]
	async fn authenticated_requests_short_circuit_unless_refreshing() {
		let fixture = StrategyFixture::new(OidcMethodConfig::enabled(test_collection()));
		let mut flow = stored_flow(&fixture.store, FlowType::Browser).await;
		let mut session = Session::new_inactive();

		session.activate(Uuid::new_v4());

		let request = submission(&[("provider", "github")]).with_session(session);
		let outcome = login(&fixture, &request, &mut flow)
			.await
			.expect("An authenticated request should short-circuit.");

		assert!(matches!(outcome, LoginOutcome::AlreadyAuthenticated));
		assert_eq!(fixture.continuity.pending(), 0);
	}

	#[tokio::test]
	async fn api_flows_need_a_verifying_provider_and_an_id_token() {
		let fixture = StrategyFixture::new(OidcMethodConfig::enabled(test_collection()));
		let mut flow = stored_flow(&fixture.store, FlowType::Api).await;
		let err = login(&fixture, &submission(&[("provider", "github")]), &mut flow)
			.await
			.expect_err("GitHub cannot verify native ID tokens.");

		assert!(matches!(err.source, Error::ProviderNoApiSupport { .. }));

		let mut flow = stored_flow(&fixture.store, FlowType::Api).await;
		let err = login(&fixture, &submission(&[("provider", "google")]), &mut flow)
			.await
			.expect_err("An API flow without an ID token must fail.");

		assert!(matches!(err.source, Error::IdTokenMissing));
		assert_eq!(err.provider.as_ref().map(ToString::to_string).as_deref(), Some("google"));
	}
}
