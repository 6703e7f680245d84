use aws_credential_types::Credentials;
use configparser::ini::{Ini, IniDefault};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

use crate::error::{LoginError, LoginResult};

/// Section that holds keys found before the first header. Never a real
/// profile name, so `[default]` keeps its header when the file is rewritten.
const PREAMBLE_SECTION: &str = "okta-aws-login:preamble";

/// Case sensitive parser that keeps `;` and `#` inside values
fn credentials_parser() -> Ini {
    let mut defaults: IniDefault = Ini::new().defaults();
    defaults.enable_inline_comments = false;
    defaults.case_sensitive = true;
    defaults.default_section = PREAMBLE_SECTION.to_string();
    Ini::new_from_defaults(defaults)
}

/// Values written into one profile section
pub struct ProfileWrite<'a> {
    pub name: &'a str,
    pub credentials: &'a Credentials,
    pub region: &'a str,
    pub output: &'a str,
}

/// Create or update one profile in the AWS shared credentials file. Other
/// sections, and other keys of this section, are left as they are.
pub fn write_profile(path: &Path, profile: &ProfileWrite<'_>) -> LoginResult<()> {
    let mut ini = credentials_parser();

    if path.exists() {
        ini.load(path).map_err(|e| {
            LoginError::credentials_file(format!("failed to load {}: {}", path.display(), e))
        })?;
    }

    let name = profile.name;
    let credentials = profile.credentials;
    ini.set(name, "output", Some(profile.output.to_string()));
    ini.set(name, "region", Some(profile.region.to_string()));
    ini.set(
        name,
        "aws_access_key_id",
        Some(credentials.access_key_id().to_string()),
    );
    ini.set(
        name,
        "aws_secret_access_key",
        Some(credentials.secret_access_key().to_string()),
    );
    ini.set(
        name,
        "aws_session_token",
        credentials.session_token().map(str::to_string),
    );

    persist(path, &ini.writes())?;
    debug!("Wrote profile [{}] to {}", name, path.display());
    Ok(())
}

/// Write via a temp file in the same directory, then rename over `path`
fn persist(path: &Path, content: &str) -> LoginResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
