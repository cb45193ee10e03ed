//! Provider callback: resume the suspended attempt, exchange the code, and verify claims.

// self
use crate::{
	_prelude::*,
	continuity::ContinuationPayload,
	error::LoginError,
	flow::{LoginFlow, LoginState, RequestBody, StrategyRequest, StrategyResponse},
	obs::{self, LoginSpan, LoginStage, StageOutcome},
	provider::ProviderId,
	strategy::{
		AttemptContext, CONTINUITY_CHANNEL, Completion, OidcStrategy, flow_id_from_state,
		process::VerifiedAttempt,
	},
};

/// Parameters the provider sends back to the callback.
///
/// Read from the query and, for providers answering with `response_mode=form_post`, from the
/// form body; form values win.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
	/// Echoed `state`.
	pub state: Option<String>,
	/// Authorization code.
	pub code: Option<String>,
	/// OAuth error code.
	pub error: Option<String>,
	/// OAuth error description.
	pub error_description: Option<String>,
}
impl CallbackParams {
	/// Collects the callback parameters of `request`.
	pub fn from_request(request: &StrategyRequest) -> Self {
		let mut params = Self::default();
		let form = match &request.body {
			RequestBody::Form(fields) => fields.as_slice(),
			_ => &[],
		};
		let query = request.url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned()));

		for (key, value) in query.chain(form.iter().cloned()) {
			let slot = match key.as_str() {
				"state" => &mut params.state,
				"code" => &mut params.code,
				"error" => &mut params.error,
				"error_description" => &mut params.error_description,
				_ => continue,
			};

			*slot = Some(value).filter(|value| !value.is_empty());
		}

		params
	}
}

impl OidcStrategy {
	/// Handles the provider redirecting back to the callback of `provider`.
	///
	/// Resumes the continuity container (consuming it), checks that it belongs to the flow named
	/// by `state`, exchanges the authorization code, and hands the verified claims to
	/// `process_login`. An upstream error fails the container's flow even when the provider
	/// omitted `state`.
	pub async fn handle_callback(
		&self,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		provider: &str,
	) -> Result<Completion, LoginError> {
		const STAGE: LoginStage = LoginStage::Callback;

		let span = LoginSpan::new(STAGE, provider);
		let mut ctx =
			AttemptContext { provider: ProviderId::new(provider).ok(), ..Default::default() };
		let mut flow = None;

		obs::record_login_outcome(STAGE, StageOutcome::Attempt);

		let result = span
			.instrument(self.callback_with(request, response, provider, &mut flow, &mut ctx))
			.await;

		match result {
			Ok(completion) => {
				obs::record_login_outcome(STAGE, completion.stage_outcome());

				Ok(completion)
			},
			Err(e) => Err(self.handle_error(STAGE, flow.as_mut(), ctx, e).await),
		}
	}

	async fn callback_with(
		&self,
		request: &StrategyRequest,
		response: &mut StrategyResponse,
		provider_id: &str,
		slot: &mut Option<LoginFlow>,
		ctx: &mut AttemptContext,
	) -> Result<Completion> {
		let params = CallbackParams::from_request(request);
		let container = ContinuationPayload::take(
			self.continuity.as_ref(),
			request,
			response,
			CONTINUITY_CHANNEL,
		)
		.await?;

		// Providers may drop `state` when they report an error; the cookie still binds the
		// container to this browser, so the flow it names is the one to fail.
		if let Some(state) = params.state.as_deref() {
			container.ensure_state(state)?;
			container.ensure_flow(flow_id_from_state(state)?)?;
		}

		ctx.traits = container.traits.clone();

		let flow = slot.insert(self.validate_flow(container.flow_id).await?);

		if let Some(error) = params.error.clone() {
			return Err(Error::Upstream { error, description: params.error_description.clone() });
		}
		if params.state.is_none() {
			return Err(Error::bad_request("the `state` parameter is missing"));
		}

		let awaiting = matches!(
			&flow.state,
			LoginState::AwaitingProviderRedirect { provider } if provider == provider_id
		);

		if !awaiting {
			return Err(Error::bad_request(format!(
				"the login flow is not awaiting a callback from provider `{provider_id}`"
			)));
		}

		flow.transition(LoginState::CallbackReceived { provider: provider_id.to_owned() })?;

		let provider = self.resolve_provider(provider_id)?;
		let code = params
			.code
			.as_deref()
			.ok_or_else(|| Error::bad_request("the `code` parameter is missing"))?;
		let token = provider.oauth2().await?.exchange_code(code).await?;
		let claims = provider.claims(&token).await?;

		flow.transition(LoginState::ClaimsVerified {
			provider: provider_id.to_owned(),
			subject: claims.subject.clone(),
		})?;

		self.process_login(
			request,
			response,
			flow,
			VerifiedAttempt {
				provider: provider.as_ref(),
				token: &token,
				claims: &claims,
				container: Some(&container),
			},
			ctx,
		)
		.await
	}
}
