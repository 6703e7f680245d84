use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

use crate::common::{RawAssertionPage, SessionId, UserCredentials};
use crate::error::{LoginError, LoginResult};
use form::{FieldClassifier, HtmlForm, SubstringClassifier};

pub mod form;

/// Okta session cookie
pub const SESSION_COOKIE: &str = "sid";

/// Text Okta puts in the page when the username/password is rejected
pub const SIGN_IN_FAILED_MARKER: &str = "Sign in failed!";

/// The two ways of reaching the IdP landing page
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Request the entry URL with an existing session cookie. The page is
    /// returned as is, whether or not the session was still valid.
    async fn login_with_session(&self, sid: &SessionId) -> LoginResult<RawAssertionPage>;

    /// Fill in and submit the login form. Returns the resulting page and the
    /// new session id.
    async fn login_with_password(
        &self,
        credentials: &UserCredentials,
    ) -> LoginResult<(RawAssertionPage, SessionId)>;
}

/// Okta client for the legacy form based login
pub struct OktaClient {
    entry_url: Url,
    timeout: Option<Duration>,
    classifier: Box<dyn FieldClassifier>,
}

impl OktaClient {
    pub fn new(entry_url: Url) -> Self {
        Self {
            entry_url,
            timeout: None,
            classifier: Box::new(SubstringClassifier::default()),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_classifier(mut self, classifier: Box<dyn FieldClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// One browser session: a fresh cookie jar that follows redirects
    fn session(&self, jar: Arc<Jar>) -> LoginResult<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .cookie_provider(jar)
            .redirect(reqwest::redirect::Policy::limited(30));
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

#[async_trait]
impl IdentityProvider for OktaClient {
    #[instrument(skip(self, sid), fields(entry_url = %self.entry_url))]
    async fn login_with_session(&self, sid: &SessionId) -> LoginResult<RawAssertionPage> {
        let jar = Arc::new(Jar::default());
        jar.add_cookie_str(
            &format!("{}={}; Path=/", SESSION_COOKIE, sid.as_str()),
            &self.entry_url,
        );
        let client = self.session(jar)?;

        debug!("Requesting entry URL with cached session");
        let response = client.get(self.entry_url.clone()).send().await?;
        let url = response.url().clone();
        let body = response.text().await?;

        Ok(RawAssertionPage { url, body })
    }

    #[instrument(skip(self, credentials), fields(entry_url = %self.entry_url))]
    async fn login_with_password(
        &self,
        credentials: &UserCredentials,
    ) -> LoginResult<(RawAssertionPage, SessionId)> {
        let jar = Arc::new(Jar::default());
        let client = self.session(jar.clone())?;

        let form_response = client.get(self.entry_url.clone()).send().await?;
        let resolved_url = form_response.url().clone();
        let form_html = form_response.text().await?;
        debug!("Login form served from {}", resolved_url);

        let form = HtmlForm::parse(&form_html);
        let payload = form.login_payload(credentials, self.classifier.as_ref());
        let target = form.submit_target(&self.entry_url, &resolved_url);

        info!("🔐 Signing in to {} as {}", target, credentials.username);
        let response = client.post(target).query(&payload).send().await?;

        let cookie_sid = response
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string());
        let url = response.url().clone();
        let body = response.text().await?;

        if body.contains(SIGN_IN_FAILED_MARKER) {
            return Err(LoginError::AuthenticationFailed);
        }

        let sid = cookie_sid
            .or_else(|| jar_cookie(&jar, &url, SESSION_COOKIE))
            .or_else(|| jar_cookie(&jar, &self.entry_url, SESSION_COOKIE))
            .ok_or(LoginError::MissingSessionCookie)?;

        Ok((RawAssertionPage { url, body }, SessionId::new(sid)))
    }
}

/// Look a cookie up in the jar as it would be sent to `url`
fn jar_cookie(jar: &Jar, url: &Url, name: &str) -> Option<String> {
    let header = jar.cookies(url)?;
    let header = header.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
