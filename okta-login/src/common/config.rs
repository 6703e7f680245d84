use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Name of the config file looked up in the home directory
pub const DEFAULT_CONFIG_FILE: &str = ".okta-aws-login.yaml";

/// Configuration for the login flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    /// URL that starts the Okta login for the AWS app
    #[serde(default)]
    pub idp_entry_url: Option<String>,

    /// Region used for the STS call and written to the profile
    #[serde(default = "default_region")]
    pub region: String,

    /// AWS CLI output format written to the profile
    #[serde(default = "default_output_format")]
    pub output_format: String,

    /// AWS shared credentials file (defaults to ~/.aws/credentials)
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,

    /// Whether the Okta sid is cached between runs
    #[serde(default = "default_cache_sid")]
    pub cache_sid: bool,

    /// Where the Okta sid is cached (defaults to ~/.okta_sid)
    #[serde(default)]
    pub sid_cache_file: Option<PathBuf>,

    /// Per-request timeout in seconds. Unset means wait forever.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// How login form fields are recognised
    #[serde(default)]
    pub form_fields: FormFieldConfig,
}

/// Substrings that mark a login form field as the username or password input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormFieldConfig {
    #[serde(default = "default_username_markers")]
    pub username_markers: Vec<String>,

    #[serde(default = "default_password_markers")]
    pub password_markers: Vec<String>,
}

impl Default for FormFieldConfig {
    fn default() -> Self {
        Self {
            username_markers: default_username_markers(),
            password_markers: default_password_markers(),
        }
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            idp_entry_url: None,
            region: default_region(),
            output_format: default_output_format(),
            credentials_file: None,
            cache_sid: default_cache_sid(),
            sid_cache_file: None,
            request_timeout_secs: None,
            form_fields: FormFieldConfig::default(),
        }
    }
}

impl LoginConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: LoginConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load an explicitly named config file, or the one in the home
    /// directory if it exists, or fall back to defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_FILE)) {
            Some(path) if path.is_file() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Apply command line / environment overrides
    pub fn with_overrides(
        mut self,
        idp_entry_url: Option<String>,
        region: Option<String>,
        no_cache_sid: bool,
    ) -> Self {
        if idp_entry_url.is_some() {
            self.idp_entry_url = idp_entry_url;
        }
        if let Some(region) = region {
            self.region = region;
        }
        if no_cache_sid {
            self.cache_sid = false;
        }
        self
    }

    pub fn entry_url(&self) -> Result<Url> {
        let raw = self.idp_entry_url.as_deref().ok_or_else(|| {
            anyhow!("No IdP entry URL configured (set idp_entry_url, OKTA_IDP_ENTRY_URL or --idp-entry-url)")
        })?;
        Url::parse(raw).with_context(|| format!("Invalid IdP entry URL: {}", raw))
    }

    pub fn credentials_file(&self) -> Result<PathBuf> {
        match &self.credentials_file {
            Some(path) => Ok(path.clone()),
            None => home_path(&[".aws", "credentials"]),
        }
    }

    pub fn sid_cache_file(&self) -> Result<PathBuf> {
        match &self.sid_cache_file {
            Some(path) => Ok(path.clone()),
            None => home_path(&[".okta_sid"]),
        }
    }
}

fn home_path(parts: &[&str]) -> Result<PathBuf> {
    let mut path = dirs::home_dir().context("Could not determine home directory")?;
    path.extend(parts);
    Ok(path)
}

// Default value functions
fn default_region() -> String {
    "us-west-2".to_string()
}
fn default_output_format() -> String {
    "json".to_string()
}
fn default_cache_sid() -> bool {
    true
}
fn default_username_markers() -> Vec<String> {
    vec!["user".to_string()]
}
fn default_password_markers() -> Vec<String> {
    vec!["pass".to_string()]
}
