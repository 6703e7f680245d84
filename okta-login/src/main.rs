use clap::Parser;
use tracing_subscriber::EnvFilter;

mod aws;
mod commands;
mod common;
mod error;
mod idp;
mod login;
mod prompt;
mod saml;
mod session;
mod store;

use commands::LoginCommand;

#[derive(Parser)]
#[command(
    name = "okta-aws-login",
    about = "Gets an STS token for the AWS CLI from an Okta SAML assertion",
    version = env!("CARGO_PKG_VERSION"),
    author = "ktruck"
)]
struct Cli {
    #[command(flatten)]
    login: LoginCommand,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout only carries the summary line
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = login::run(cli.login).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
