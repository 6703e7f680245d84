use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_sts::config::Region;
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::Client as StsClient;
use std::time::SystemTime;
use tracing::{info, instrument};

use crate::common::{ArnPair, FederationAssertion};
use crate::error::{LoginError, LoginResult};

/// Provider name stamped on the credentials returned by STS
pub const PROVIDER_NAME: &str = "OktaSaml";

/// Exchanges a SAML assertion for temporary AWS credentials
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn exchange(
        &self,
        arns: &ArnPair,
        assertion: &FederationAssertion,
    ) -> LoginResult<Credentials>;
}

/// `AssumeRoleWithSAML` through the STS SDK client
pub struct StsBroker {
    sts_client: StsClient,
}

impl StsBroker {
    pub fn new(sts_client: StsClient) -> Self {
        Self { sts_client }
    }

    /// Build a client for `region`. The call is authorised by the assertion
    /// itself, so no ambient AWS credentials are loaded.
    pub async fn for_region(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .no_credentials()
            .load()
            .await;
        Self::new(StsClient::new(&config))
    }
}

#[async_trait]
impl CredentialBroker for StsBroker {
    #[instrument(skip(self, assertion), fields(role_arn = %arns.role_arn))]
    async fn exchange(
        &self,
        arns: &ArnPair,
        assertion: &FederationAssertion,
    ) -> LoginResult<Credentials> {
        let response = self
            .sts_client
            .assume_role_with_saml()
            .role_arn(&arns.role_arn)
            .principal_arn(&arns.principal_arn)
            .saml_assertion(assertion.as_str())
            .send()
            .await
            .map_err(|e| LoginError::sts(DisplayErrorContext(e).to_string()))?;

        let credentials = response
            .credentials()
            .ok_or_else(|| LoginError::sts("response did not include credentials"))?;

        let expiration = SystemTime::try_from(*credentials.expiration())
            .map_err(|e| LoginError::sts(format!("unrepresentable expiration: {e}")))?;

        info!("Assumed role {}", arns.role_arn);

        Ok(Credentials::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            Some(credentials.session_token().to_string()),
            Some(expiration),
            PROVIDER_NAME,
        ))
    }
}
