use std::io::{self, BufRead, Write};

use crate::common::UserCredentials;
use crate::error::{LoginError, LoginResult};

/// Source of the username and password for a password login
pub trait CredentialPrompt: Send + Sync {
    fn credentials(&self) -> LoginResult<UserCredentials>;
}

/// Asks on the terminal. The username comes from `--username` /
/// `OKTA_USERNAME` when set; the password is always read with echo off.
pub struct TerminalPrompt {
    username: Option<String>,
}

impl TerminalPrompt {
    pub fn new(username: Option<String>) -> Self {
        Self {
            username: username.filter(|u| !u.is_empty()),
        }
    }

    fn read_username(&self) -> LoginResult<String> {
        if let Some(username) = &self.username {
            return Ok(username.clone());
        }

        print!("Username: ");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl CredentialPrompt for TerminalPrompt {
    fn credentials(&self) -> LoginResult<UserCredentials> {
        let username = self.read_username()?;
        // The username may have come from OKTA_USERNAME, so show it
        let password = rpassword::prompt_password(format!("Password for {}: ", username))?;
        validate_password(username, password)
    }
}

fn validate_password(username: String, password: String) -> LoginResult<UserCredentials> {
    if password.is_empty() {
        return Err(LoginError::EmptyPassword);
    }
    Ok(UserCredentials { username, password })
}
