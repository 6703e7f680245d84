use thiserror::Error;

/// Errors that can occur while logging in and fetching credentials
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Sign in failed!")]
    AuthenticationFailed,

    #[error("Password must be provided")]
    EmptyPassword,

    #[error("No valid SAML assertion retrieved!")]
    NoAssertionObtained,

    #[error("Malformed SAML assertion: {reason}")]
    MalformedAssertion { reason: String },

    #[error("Okta did not return a sid cookie after sign in")]
    MissingSessionCookie,

    #[error("STS AssumeRoleWithSAML failed: {message}")]
    Sts { message: String },

    #[error("Credentials file error: {message}")]
    CredentialsFile { message: String },

    #[error("HTTP client error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl LoginError {
    pub fn malformed_assertion(reason: impl Into<String>) -> Self {
        Self::MalformedAssertion {
            reason: reason.into(),
        }
    }

    pub fn sts(message: impl Into<String>) -> Self {
        Self::Sts {
            message: message.into(),
        }
    }

    pub fn credentials_file(message: impl Into<String>) -> Self {
        Self::CredentialsFile {
            message: message.into(),
        }
    }
}

pub type LoginResult<T> = Result<T, LoginError>;
