use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::common::SessionId;
use crate::error::LoginResult;

/// Plain text file holding the last Okta session id
#[derive(Debug, Clone)]
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached session id. Anything other than a readable file with
    /// exactly 25 characters counts as "no cached session".
    pub fn read(&self) -> Option<SessionId> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No usable sid cache at {}: {}", self.path.display(), e);
                return None;
            }
        };

        if SessionId::looks_cached(&content) {
            Some(SessionId::new(content))
        } else {
            debug!("Ignoring sid cache at {}: unexpected length", self.path.display());
            None
        }
    }

    /// Replace the cache with `sid`, readable by the owner only.
    ///
    /// The id is written to a temp file next to the cache and renamed over it.
    pub fn write(&self, sid: &SessionId) -> LoginResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        restrict_to_owner(file.path())?;
        file.write_all(sid.as_str().as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;

        debug!("Cached Okta sid in {}", self.path.display());
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
