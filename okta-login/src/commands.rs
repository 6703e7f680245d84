use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct LoginCommand {
    /// Okta username. Prompted for when neither this nor OKTA_USERNAME is set
    #[arg(short, long, env = "OKTA_USERNAME")]
    pub username: Option<String>,

    /// Profile to store the credentials under (defaults to the role name)
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Print how long the new credentials stay valid
    #[arg(short, long)]
    pub verbose: bool,

    /// Okta session id to log in with. If expired you are prompted for a password
    #[arg(short, long)]
    pub sid: Option<String>,

    /// Config file (defaults to ~/.okta-aws-login.yaml when present)
    #[arg(short, long, env = "OKTA_AWS_LOGIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// URL that starts the Okta login for the AWS app
    #[arg(long, env = "OKTA_IDP_ENTRY_URL")]
    pub idp_entry_url: Option<String>,

    /// AWS region for the STS call and the stored profile
    #[arg(long, env = "OKTA_AWS_REGION")]
    pub region: Option<String>,

    /// Do not read or write the cached Okta session id
    #[arg(long)]
    pub no_cache_sid: bool,
}
