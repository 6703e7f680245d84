use std::fmt;
use url::Url;

/// Length of an Okta `sid` cookie value
pub const SESSION_ID_LEN: usize = 25;

/// Opaque Okta session identifier (the `sid` cookie)
#[derive(Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Whether a value read back from the cache looks like a live session id.
    ///
    /// This only checks the length. Okta is never asked whether the session
    /// is still valid; an expired id is detected later when the cookie login
    /// lands on a page without an assertion.
    pub fn looks_cached(value: &str) -> bool {
        value.chars().count() == SESSION_ID_LEN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId(<redacted>)")
    }
}

/// Username and password typed in for a password login
#[derive(Clone)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// HTML page returned by the IdP at the end of a login attempt
#[derive(Debug, Clone)]
pub struct RawAssertionPage {
    /// Final URL after redirects
    pub url: Url,
    pub body: String,
}

/// Base64 encoded SAML response, passed untouched to STS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationAssertion(pub String);

impl FederationAssertion {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Role and SAML provider ARNs carried by the assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArnPair {
    pub role_arn: String,
    pub principal_arn: String,
}

impl ArnPair {
    /// Default profile name: the second `/` separated segment of the role ARN
    pub fn role_name(&self) -> Option<&str> {
        self.role_arn.split('/').nth(1).filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_length_heuristic() {
        assert!(!SessionId::looks_cached(&"a".repeat(24)));
        assert!(SessionId::looks_cached(&"a".repeat(25)));
        assert!(!SessionId::looks_cached(&"a".repeat(26)));
    }

    #[test]
    fn test_secrets_are_redacted() {
        let creds = UserCredentials {
            username: "jdoe".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{:?} {:?}", creds, SessionId::new("102abcdefghijklmnopqrstuv"));
        assert!(rendered.contains("jdoe"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("102abc"));
    }

    #[test]
    fn test_role_name() {
        let arns = ArnPair {
            role_arn: "arn:aws:iam::111:role/Y".to_string(),
            principal_arn: "arn:aws:iam::111:saml-provider/X".to_string(),
        };
        assert_eq!(arns.role_name(), Some("Y"));

        let no_path = ArnPair {
            role_arn: "arn:aws:iam::111:root".to_string(),
            principal_arn: String::new(),
        };
        assert_eq!(no_path.role_name(), None);
    }
}
