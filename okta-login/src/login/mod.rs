use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::aws::{CredentialBroker, StsBroker};
use crate::commands::LoginCommand;
use crate::common::{ArnPair, FederationAssertion, LoginConfig, SessionId};
use crate::error::{LoginError, LoginResult};
use crate::idp::form::SubstringClassifier;
use crate::idp::{IdentityProvider, OktaClient};
use crate::prompt::{CredentialPrompt, TerminalPrompt};
use crate::saml;
use crate::session::SessionCache;
use crate::store::{self, ProfileWrite};

/// Everything one login run needs, resolved up front from config and CLI
#[derive(Debug, Clone)]
pub struct LoginSettings {
    /// Profile name override; the role name is used otherwise
    pub profile: Option<String>,
    /// Session id given on the command line, tried before the cache
    pub sid: Option<SessionId>,
    /// `None` when sid caching is disabled
    pub sid_cache: Option<SessionCache>,
    pub credentials_file: PathBuf,
    pub region: String,
    pub output_format: String,
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub profile_name: String,
    pub arns: ArnPair,
    pub expiration: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum LoginState {
    Start,
    TryCachedSession(SessionId),
    PasswordLogin,
    HaveAssertion(FederationAssertion),
    Failed,
    Done(LoginOutcome),
}

/// Drives the login: cached session first, password login as fallback,
/// then STS and the credentials file.
pub struct Orchestrator {
    idp: Box<dyn IdentityProvider>,
    broker: Box<dyn CredentialBroker>,
    prompt: Box<dyn CredentialPrompt>,
    settings: LoginSettings,
}

impl Orchestrator {
    pub fn new(
        idp: Box<dyn IdentityProvider>,
        broker: Box<dyn CredentialBroker>,
        prompt: Box<dyn CredentialPrompt>,
        settings: LoginSettings,
    ) -> Self {
        Self {
            idp,
            broker,
            prompt,
            settings,
        }
    }

    pub async fn run(&self) -> LoginResult<LoginOutcome> {
        let mut state = LoginState::Start;

        loop {
            state = match state {
                LoginState::Start => self.start(),
                LoginState::TryCachedSession(sid) => self.try_cached_session(&sid).await?,
                LoginState::PasswordLogin => self.password_login().await?,
                LoginState::HaveAssertion(assertion) => self.finish(&assertion).await?,
                LoginState::Failed => return Err(LoginError::NoAssertionObtained),
                LoginState::Done(outcome) => return Ok(outcome),
            };
        }
    }

    fn start(&self) -> LoginState {
        if let Some(sid) = &self.settings.sid {
            debug!("Using session id from the command line");
            return LoginState::TryCachedSession(sid.clone());
        }

        let Some(cache) = &self.settings.sid_cache else {
            return LoginState::PasswordLogin;
        };
        match cache.read() {
            Some(sid) => {
                debug!("Found cached session id in {}", cache.path().display());
                LoginState::TryCachedSession(sid)
            }
            None => LoginState::PasswordLogin,
        }
    }

    async fn try_cached_session(&self, sid: &SessionId) -> LoginResult<LoginState> {
        let page = self.idp.login_with_session(sid).await?;

        Ok(match saml::extract_token(&page.body) {
            Some(assertion) => {
                info!("♻️  Reused existing Okta session");
                LoginState::HaveAssertion(assertion)
            }
            None => {
                debug!("Session login landed on {} without an assertion", page.url);
                LoginState::PasswordLogin
            }
        })
    }

    async fn password_login(&self) -> LoginResult<LoginState> {
        let credentials = self.prompt.credentials()?;
        let (page, sid) = self.idp.login_with_password(&credentials).await?;

        if let Some(cache) = &self.settings.sid_cache {
            cache.write(&sid)?;
        }

        Ok(match saml::extract_token(&page.body) {
            Some(assertion) => LoginState::HaveAssertion(assertion),
            None => {
                warn!("Password login landed on {} without an assertion", page.url);
                LoginState::Failed
            }
        })
    }

    async fn finish(&self, assertion: &FederationAssertion) -> LoginResult<LoginState> {
        let arns = saml::decode(assertion)?;
        let profile_name = self.profile_name(&arns)?;
        let credentials = self.broker.exchange(&arns, assertion).await?;

        store::write_profile(
            &self.settings.credentials_file,
            &ProfileWrite {
                name: &profile_name,
                credentials: &credentials,
                region: &self.settings.region,
                output: &self.settings.output_format,
            },
        )?;
        info!(
            "✅ Stored credentials for {} in profile [{}]",
            arns.role_arn, profile_name
        );

        Ok(LoginState::Done(LoginOutcome {
            profile_name,
            arns,
            expiration: credentials.expiry().map(DateTime::<Utc>::from),
        }))
    }

    fn profile_name(&self, arns: &ArnPair) -> LoginResult<String> {
        if let Some(profile) = self.settings.profile.as_deref().filter(|p| !p.is_empty()) {
            return Ok(profile.to_string());
        }
        arns.role_name().map(str::to_string).ok_or_else(|| {
            LoginError::malformed_assertion(format!(
                "cannot derive a profile name from role ARN '{}'",
                arns.role_arn
            ))
        })
    }
}

/// Whole minutes until `expiration`, rounded up
pub fn minutes_until(expiration: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (expiration - now).num_milliseconds();
    (millis as f64 / 60_000.0).ceil() as i64
}

pub fn expiry_summary(profile_name: &str, expiration: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format!(
        "Credentials for the profile {} have been set. They will expire in {} minutes.",
        profile_name,
        minutes_until(expiration, now)
    )
}

pub async fn run(args: LoginCommand) -> Result<()> {
    let config = LoginConfig::load_or_default(args.config.as_deref())?.with_overrides(
        args.idp_entry_url.clone(),
        args.region.clone(),
        args.no_cache_sid,
    );

    let entry_url = config.entry_url()?;
    info!("🚀 Starting Okta login");
    info!("🌐 IdP entry URL: {}", entry_url);
    info!("🗺️  Region: {}", config.region);

    let sid_cache = if config.cache_sid {
        Some(SessionCache::new(config.sid_cache_file()?))
    } else {
        None
    };

    let settings = LoginSettings {
        profile: args.profile.clone(),
        sid: args.sid.clone().map(SessionId::new),
        sid_cache,
        credentials_file: config
            .credentials_file()
            .context("Failed to locate the AWS credentials file")?,
        region: config.region.clone(),
        output_format: config.output_format.clone(),
    };

    let classifier = SubstringClassifier::from(config.form_fields.clone());
    let idp = OktaClient::new(entry_url)
        .with_timeout(config.request_timeout_secs.map(Duration::from_secs))
        .with_classifier(Box::new(classifier));
    let broker = StsBroker::for_region(&config.region).await;
    let prompt = TerminalPrompt::new(args.username.clone());

    let orchestrator = Orchestrator::new(Box::new(idp), Box::new(broker), Box::new(prompt), settings);
    let outcome = orchestrator.run().await?;
    info!(
        "Principal {} assumed {}",
        outcome.arns.principal_arn, outcome.arns.role_arn
    );

    if args.verbose {
        match outcome.expiration {
            Some(expiration) => println!(
                "{}",
                expiry_summary(&outcome.profile_name, expiration, Utc::now())
            ),
            None => println!(
                "Credentials for the profile {} have been set.",
                outcome.profile_name
            ),
        }
    }

    Ok(())
}
