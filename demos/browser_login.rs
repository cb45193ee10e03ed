//! Selects a provider for a browser login flow and prints where the browser is sent, plus the
//! continuity cookie the callback has to carry back.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use time::Duration;
use url::Url;
// self
use oidc_login_bridge::{
	continuity::{ContinuationPayload, MemoryContinuityManager},
	flow::{
		FlowType, HookFuture, LoginFlow, LoginHookExecutor, RegistrationCounterpart,
		RegistrationFlow, RegistrationFlowOptions, RegistrationFuture, StrategyRequest,
		StrategyResponse,
	},
	http::ProviderHttpClient,
	identity::Identity,
	oauth::TokenSet,
	provider::{Claims, OidcMethodConfig, Provider, ProviderDependencies, ProviderRegistry},
	session::Session,
	store::{LoginFlowPersister, MemoryStore},
	strategy::{Completion, LoginOutcome, OidcStrategy, StrategyCollaborators},
};

const CONFIG: &str = r#"{
	"enabled": true,
	"config": {
		"base_redirect_uri": "https://auth.example.com/",
		"providers": [{
			"id": "github",
			"provider": "github",
			"client_id": "demo-client",
			"client_secret": "demo-secret"
		}]
	}
}"#;

struct ActivateSession;
impl LoginHookExecutor for ActivateSession {
	fn post_login_hook<'a>(
		&'a self,
		_: &'a StrategyRequest,
		_: &'a mut StrategyResponse,
		_: &'static str,
		_: &'a mut LoginFlow,
		identity: &'a Identity,
		session: &'a mut Session,
	) -> HookFuture<'a> {
		Box::pin(async move {
			session.activate(identity.id);

			Ok(())
		})
	}
}

struct NoRegistration;
impl RegistrationCounterpart for NoRegistration {
	fn new_registration_flow<'a>(
		&'a self,
		request: &'a StrategyRequest,
		_: &'a mut StrategyResponse,
		flow_type: FlowType,
		options: RegistrationFlowOptions,
	) -> RegistrationFuture<'a, RegistrationFlow> {
		Box::pin(async move {
			Ok(RegistrationFlow::new(flow_type, Duration::hours(1), request.url.clone(), options))
		})
	}

	fn process_registration<'a>(
		&'a self,
		_: &'a StrategyRequest,
		_: &'a mut StrategyResponse,
		_: &'a mut RegistrationFlow,
		_: Option<&'a TokenSet>,
		_: &'a Claims,
		_: &'a dyn Provider,
		_: Option<&'a ContinuationPayload>,
	) -> RegistrationFuture<'a, Option<Identity>> {
		Box::pin(async { Ok(None) })
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = OidcMethodConfig::from_json_slice(CONFIG.as_bytes())?;
	let registry = ProviderRegistry::new(ProviderDependencies::new(ProviderHttpClient::new()?));
	let store = Arc::new(MemoryStore::default());
	let strategy = OidcStrategy::new(config, registry, StrategyCollaborators {
		flows: store.clone(),
		identities: store.clone(),
		continuity: Arc::new(MemoryContinuityManager::with_random_key()),
		hooks: Arc::new(ActivateSession),
		registration: Arc::new(NoRegistration),
	});
	let mut flow = LoginFlow::new(
		FlowType::Browser,
		Duration::minutes(30),
		Url::parse("https://auth.example.com/self-service/login/browser?return_to=/home")?,
	);

	store.create_login_flow(&flow).await?;

	let request = StrategyRequest::new(Url::parse(&format!(
		"https://auth.example.com/self-service/login?flow={}",
		flow.id
	))?)
	.with_form([("provider", "github"), ("traits.email", "user@example.com")]);
	let mut response = StrategyResponse::default();

	match strategy.login(&request, &mut response, &mut flow).await? {
		LoginOutcome::CompletedByStrategy(Completion::Redirect { url }) => {
			println!("Send the browser to {url}.");
		},
		outcome => println!("Provider selection ended with {outcome:?}."),
	}

	for cookie in &response.cookies {
		println!("Set cookie `{}` for {} minutes.", cookie.name, cookie.max_age.whole_minutes());
	}

	println!("Flow {} is now `{}`.", flow.id, flow.state.as_str());

	Ok(())
}
