#![cfg(feature = "test")]

// crates.io
use httpmock::prelude::*;
// self
use oidc_login_bridge::{
	_preludet::*,
	error::ErrorClass,
	flow::{ContinueWith, FlowType, LoginFlow, LoginState, StrategyRequest, StrategyResponse},
	identity::{CredentialsType, oidc_unique_id},
	provider::{ConfigurationCollection, OidcMethodConfig, ProviderKind},
	store::LoginFlowPersister,
	strategy::{Completion, LoginOutcome},
};

struct Issuer {
	server: MockServer,
}
impl Issuer {
	async fn start() -> Self {
		let server = MockServer::start_async().await;

		server
			.mock_async(|when, then| {
				when.method(GET).path("/.well-known/openid-configuration");
				then.status(200).json_body(serde_json::json!({
					"issuer": server.base_url(),
					"authorization_endpoint": server.url("/authorize"),
					"token_endpoint": server.url("/token"),
					"jwks_uri": server.url("/keys"),
				}));
			})
			.await;

		Self { server }
	}

	fn config(&self) -> OidcMethodConfig {
		let issuer = Url::parse(&self.server.base_url()).expect("Mock issuer should parse.");

		OidcMethodConfig::enabled(
			ConfigurationCollection::new(test_base_redirect_uri())
				.with_provider(test_provider("google", ProviderKind::Google, issuer)),
		)
	}

	fn id_token(&self, subject: &str) -> String {
		sign_id_token(serde_json::json!({
			"iss": self.server.base_url(),
			"aud": TEST_CLIENT_ID,
			"sub": subject,
			"email": "a@example.com",
			"exp": OffsetDateTime::now_utc().unix_timestamp() + 600,
		}))
	}
}

async fn api_flow(fixture: &StrategyFixture) -> LoginFlow {
	let url = Url::parse("https://auth.example.com/self-service/login/api")
		.expect("Login URL should parse.");
	let flow = LoginFlow::new(FlowType::Api, Duration::minutes(30), url);

	fixture.store.create_login_flow(&flow).await.expect("Login flow should persist.");

	flow
}

fn submission(flow: &LoginFlow, body: Value) -> StrategyRequest {
	let url = Url::parse(&format!("https://auth.example.com/self-service/login?flow={}", flow.id))
		.expect("Submission URL should parse.");

	StrategyRequest::new(url).with_json(body)
}

#[tokio::test]
async fn native_id_token_logs_in_with_a_session_token() {
	let issuer = Issuer::start().await;
	let keys = issuer
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/keys");
			then.status(200).json_body(test_jwks());
		})
		.await;
	let fixture = StrategyFixture::new(issuer.config());
	let identity = linked_identity("google", "sub-123");

	fixture.store.insert_identity(identity.clone());

	let mut flow = api_flow(&fixture).await;
	let request = submission(
		&flow,
		serde_json::json!({ "provider": "google", "id_token": issuer.id_token("sub-123") }),
	);
	let outcome = fixture
		.strategy
		.login(&request, &mut StrategyResponse::default(), &mut flow)
		.await
		.expect("A valid native ID token should log in.");

	keys.assert_calls_async(1).await;

	let LoginOutcome::CompletedByStrategy(Completion::SessionIssued(session)) = outcome else {
		panic!("Native login should issue a session, got {outcome:?}.");
	};

	assert!(session.is_authenticated());
	assert_eq!(session.identity_id, Some(identity.id));
	assert_eq!(flow.state, LoginState::Completed { session_id: session.id });
	assert_eq!(flow.continue_with, vec![ContinueWith::set_session_token(session.token.clone())]);
	assert_eq!(fixture.store.login_flow(flow.id), Some(flow));
	assert_eq!(fixture.continuity.pending(), 0, "Native logins never pause.");
}

#[tokio::test]
async fn native_login_of_an_unknown_subject_pivots_without_a_container() {
	let issuer = Issuer::start().await;

	issuer
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/keys");
			then.status(200).json_body(test_jwks());
		})
		.await;

	let fixture = StrategyFixture::new(issuer.config());
	let mut flow = api_flow(&fixture).await;
	let id_token = issuer.id_token("sub-456");
	let request = submission(
		&flow,
		serde_json::json!({
			"provider": "google",
			"id_token": id_token,
			"traits": { "email": "a@example.com" },
		}),
	);
	let outcome = fixture
		.strategy
		.login(&request, &mut StrategyResponse::default(), &mut flow)
		.await
		.expect("An unknown subject should pivot, not fail.");
	let LoginOutcome::CompletedByStrategy(Completion::RegistrationPivot(registration)) = outcome
	else {
		panic!("Native login should pivot into registration, got {outcome:?}.");
	};
	let calls = fixture.registration.calls();

	assert_eq!(registration.flow_type, FlowType::Api);
	assert_eq!(calls.len(), 1);
	assert_eq!(calls[0].claims.subject, "sub-456");
	assert_eq!(calls[0].container, None);
	assert_eq!(
		calls[0].token.as_ref().and_then(|token| token.id_token()),
		Some(id_token.as_str())
	);
	assert_eq!(
		flow.state,
		LoginState::PivotedToRegistration { registration_flow_id: registration.id }
	);
}

#[tokio::test]
async fn missing_id_token_fails_before_any_network_call() {
	let issuer = Issuer::start().await;
	let keys = issuer
		.server
		.mock_async(|when, then| {
			when.any_request();
			then.status(500);
		})
		.await;
	let fixture = StrategyFixture::new(issuer.config());
	let mut flow = api_flow(&fixture).await;
	let request = submission(&flow, serde_json::json!({ "provider": "google" }));
	let err = fixture
		.strategy
		.login(&request, &mut StrategyResponse::default(), &mut flow)
		.await
		.expect_err("An API flow without an ID token must fail.");

	assert!(matches!(err.source, Error::IdTokenMissing));
	assert_eq!(err.class(), ErrorClass::BadRequest);
	assert_eq!(err.flow_id, Some(flow.id));
	assert_eq!(
		fixture.store.login_flow(flow.id).map(|flow| flow.state),
		Some(LoginState::Failed { kind: "id_token_missing".into() })
	);

	keys.assert_calls_async(0).await;
}

#[tokio::test]
async fn mismatched_credentials_are_an_internal_error() {
	let issuer = Issuer::start().await;

	issuer
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/keys");
			then.status(200).json_body(test_jwks());
		})
		.await;

	let fixture = StrategyFixture::new(issuer.config());
	let mut identity = linked_identity("google", "someone-else");

	// Findable by the asserted subject, but no linked entry agrees with it.
	if let Some(credentials) = identity.credentials.get_mut(&CredentialsType::Oidc) {
		credentials.identifiers = vec![oidc_unique_id("google", "sub-123")];
	}

	fixture.store.insert_identity(identity);

	let mut flow = api_flow(&fixture).await;
	let request = submission(
		&flow,
		serde_json::json!({ "provider": "google", "id_token": issuer.id_token("sub-123") }),
	);
	let err = fixture
		.strategy
		.login(&request, &mut StrategyResponse::default(), &mut flow)
		.await
		.expect_err("Mismatched credentials must fail.");

	assert!(matches!(err.source, Error::CredentialsMismatch { .. }));
	assert_eq!(err.class(), ErrorClass::Internal);

	let body = err.body();

	assert_eq!(body.id, "credentials_mismatch");
	assert_eq!(body.code, 500);
	assert!(!body.reason.contains("sub-123"), "The subject must stay server side.");
	assert!(fixture.hooks.calls().is_empty());
	assert!(fixture.registration.calls().is_empty());
}
