//! Authentication settings and the environment variables they fall back to.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::DriveError;

pub const ENV_CLIENT_ID: &str = "GDRIVE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "GDRIVE_CLIENT_SECRET";
pub const ENV_REFRESH_TOKEN: &str = "GDRIVE_REFRESH_TOKEN";
/// Pre-minted bearer token; skips every OAuth flow when set.
pub const ENV_ACCESS_TOKEN: &str = "GDRIVE_ACCESS_TOKEN";
pub const ENV_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";

pub const DEFAULT_CREDENTIALS_FILE: &str = "mycreds.txt";
pub const DEFAULT_CLIENT_SECRETS_FILE: &str = "client_secrets.json";

/// Where saved Kaggle credentials live between notebook sessions.
pub const KAGGLE_WORKING_DIR: &str = "/kaggle/working";
pub const KAGGLE_CREDENTIALS_FILE: &str = "/kaggle/working/gdrive_credentials.json";

/// Runtime the toolkit is authenticating from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Colab,
    Kaggle,
    Local,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Colab => "colab",
            Environment::Kaggle => "kaggle",
            Environment::Local => "local",
        }
    }
}

impl FromStr for Environment {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "colab" => Ok(Environment::Colab),
            "kaggle" => Ok(Environment::Kaggle),
            "local" => Ok(Environment::Local),
            _ => Err(DriveError::InvalidArgument(format!(
                "Invalid environment: '{}'. Must be 'colab', 'kaggle', or 'local'",
                s
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings consumed by [`crate::auth::quick_connect`].
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Saved OAuth credentials (local environment).
    pub credentials_file: PathBuf,
    /// OAuth client JSON from Google Cloud Console (local environment).
    pub client_secrets_file: PathBuf,
    /// Skip detection and authenticate as this environment.
    pub force_env: Option<Environment>,
    /// Kaggle OAuth client, overriding `GDRIVE_CLIENT_ID`.
    pub client_id: Option<String>,
    /// Kaggle OAuth client, overriding `GDRIVE_CLIENT_SECRET`.
    pub client_secret: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            client_secrets_file: PathBuf::from(DEFAULT_CLIENT_SECRETS_FILE),
            force_env: None,
            client_id: None,
            client_secret: None,
        }
    }
}
