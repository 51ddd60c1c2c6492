//! Authentication for Google Drive across Colab, Kaggle and local machines.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{
    AuthConfig, Environment, ENV_ACCESS_TOKEN, ENV_APPLICATION_CREDENTIALS, ENV_CLIENT_ID,
    ENV_CLIENT_SECRET, ENV_REFRESH_TOKEN, KAGGLE_CREDENTIALS_FILE, KAGGLE_WORKING_DIR,
};
use crate::error::{DriveError, Result};
use crate::models::{
    ApplicationCredentials, AuthorizedUserCredentials, ClientSecrets, ClientSecretsFile,
    ServiceAccountCredentials, StoredCredentials, TokenResponse,
};
use crate::oauth::{self, AUTH_URI, DRIVE_SCOPE, TOKEN_URI};

/// Refresh this long before the token actually expires.
const EXPIRY_BUFFER_SECS: u64 = 60;

/// Where Colab's `auth.authenticate_user()` leaves Application Default Credentials.
const COLAB_ADC_FILE: &str = "/content/.config/application_default_credentials.json";

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

enum TokenSource {
    ServiceAccount(ServiceAccountCredentials),
    User {
        credentials: RwLock<StoredCredentials>,
        save_to: Option<PathBuf>,
    },
    Static(String),
}

/// Hands out bearer tokens for the Drive API, refreshing them as they expire.
#[derive(Clone)]
pub struct Authenticator {
    source: Arc<TokenSource>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Authenticator {
    fn with_source(source: TokenSource, seed: Option<CachedToken>) -> Self {
        Self {
            source: Arc::new(source),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(seed)),
        }
    }

    /// Create a new authenticator from a service account JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)?;
        Ok(Self::from_service_account(credentials))
    }

    pub fn from_service_account(credentials: ServiceAccountCredentials) -> Self {
        Self::with_source(TokenSource::ServiceAccount(credentials), None)
    }

    /// Authenticate with OAuth user credentials.
    ///
    /// A still-valid access token in `credentials` is used until it expires.
    /// When `save_to` is set, every refresh rewrites that file.
    pub fn from_stored_credentials(credentials: StoredCredentials, save_to: Option<PathBuf>) -> Self {
        let seed = match (&credentials.access_token, credentials.expires_at) {
            (Some(token), Some(expires_at)) if !credentials.access_token_expired(unix_now(), 0) => {
                Some(CachedToken {
                    access_token: token.clone(),
                    expires_at: UNIX_EPOCH + Duration::from_secs(expires_at),
                })
            }
            _ => None,
        };
        Self::with_source(
            TokenSource::User {
                credentials: RwLock::new(credentials),
                save_to,
            },
            seed,
        )
    }

    pub fn from_authorized_user(credentials: AuthorizedUserCredentials) -> Self {
        Self::from_stored_credentials(
            StoredCredentials {
                client_id: credentials.client_id,
                client_secret: credentials.client_secret,
                refresh_token: credentials.refresh_token,
                access_token: None,
                expires_at: None,
                token_uri: credentials.token_uri,
            },
            None,
        )
    }

    /// Load an Application Default Credentials file (service account or authorized user).
    pub fn from_adc_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        match serde_json::from_str::<ApplicationCredentials>(&content)? {
            ApplicationCredentials::ServiceAccount(sa) => Ok(Self::from_service_account(sa)),
            ApplicationCredentials::AuthorizedUser(user) => Ok(Self::from_authorized_user(user)),
        }
    }

    /// Use a pre-minted bearer token as-is. It is never refreshed.
    pub fn from_access_token(token: impl Into<String>) -> Self {
        Self::with_source(TokenSource::Static(token.into()), None)
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        if let TokenSource::Static(token) = self.source.as_ref() {
            return Ok(token.clone());
        }

        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                let buffer = Duration::from_secs(EXPIRY_BUFFER_SECS);
                if token.expires_at > SystemTime::now() + buffer {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = self.refresh_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    async fn refresh_token(&self) -> Result<CachedToken> {
        match self.source.as_ref() {
            TokenSource::ServiceAccount(credentials) => self.refresh_service_account(credentials).await,
            TokenSource::User {
                credentials,
                save_to,
            } => self.refresh_user(credentials, save_to.as_deref()).await,
            TokenSource::Static(token) => Ok(CachedToken {
                access_token: token.clone(),
                expires_at: SystemTime::now() + Duration::from_secs(3600),
            }),
        }
    }

    /// Refresh the access token using JWT assertion.
    async fn refresh_service_account(&self, credentials: &ServiceAccountCredentials) -> Result<CachedToken> {
        let now = unix_now();
        let token_uri = credentials.token_uri.as_deref().unwrap_or(TOKEN_URI);

        let claims = Claims {
            iss: credentials.client_email.clone(),
            scope: DRIVE_SCOPE.to_string(),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];

        let response = self.client.post(token_uri).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        debug!(account = %credentials.client_email, "service account token refreshed");

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at: SystemTime::now() + Duration::from_secs(token_response.expires_in),
        })
    }

    async fn refresh_user(
        &self,
        credentials: &RwLock<StoredCredentials>,
        save_to: Option<&Path>,
    ) -> Result<CachedToken> {
        let mut creds = credentials.write().await;
        let token_uri = creds.token_uri.clone().unwrap_or_else(|| TOKEN_URI.to_string());

        let token_response = oauth::refresh_access_token(
            &self.client,
            &token_uri,
            &creds.client_id,
            &creds.client_secret,
            &creds.refresh_token,
        )
        .await?;

        let expires_at = unix_now() + token_response.expires_in;
        creds.access_token = Some(token_response.access_token.clone());
        creds.expires_at = Some(expires_at);
        if let Some(rotated) = token_response.refresh_token {
            creds.refresh_token = rotated;
        }
        info!("access token refreshed");

        if let Some(path) = save_to {
            if let Err(e) = save_credentials_file(path, &creds) {
                warn!(path = %path.display(), error = %e, "could not save refreshed credentials");
            }
        }

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at: UNIX_EPOCH + Duration::from_secs(expires_at),
        })
    }
}

/// Read saved OAuth credentials. A missing file is `Ok(None)`.
pub fn load_credentials_file<P: AsRef<Path>>(path: P) -> Result<Option<StoredCredentials>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Write OAuth credentials, readable only by the owner on Unix.
pub fn save_credentials_file<P: AsRef<Path>>(path: P, credentials: &StoredCredentials) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(credentials)?)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    debug!(path = %path.display(), "credentials saved");
    Ok(())
}

/// Read an OAuth client JSON (Desktop `installed` or Web `web` section).
pub fn load_client_secrets<P: AsRef<Path>>(path: P) -> Result<ClientSecrets> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DriveError::MissingClientSecrets(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    let file: ClientSecretsFile = serde_json::from_str(&content)?;
    file.into_secrets().ok_or_else(|| {
        DriveError::AuthenticationError(format!(
            "Invalid client secrets format in {}: expected an 'installed' or 'web' section",
            path.display()
        ))
    })
}

/// Detect the current environment.
///
/// Kaggle is checked first: Kaggle images may ship Colab packages too.
pub fn detect_environment() -> Environment {
    detect_environment_with(Path::new(KAGGLE_WORKING_DIR).exists(), |key| {
        std::env::var(key).ok()
    })
}

pub fn detect_environment_with<F>(kaggle_dir_exists: bool, lookup: F) -> Environment
where
    F: Fn(&str) -> Option<String>,
{
    if kaggle_dir_exists || lookup("KAGGLE_KERNEL_RUN_TYPE").is_some() {
        return Environment::Kaggle;
    }
    if lookup("COLAB_RELEASE_TAG").is_some() || lookup("COLAB_GPU").is_some() {
        return Environment::Colab;
    }
    Environment::Local
}

/// Candidate Application Default Credentials files, most specific first.
pub fn adc_candidates<F>(lookup: F) -> Vec<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let mut candidates = Vec::new();
    if let Some(path) = lookup(ENV_APPLICATION_CREDENTIALS).filter(|p| !p.is_empty()) {
        candidates.push(PathBuf::from(path));
    }
    candidates.push(PathBuf::from(COLAB_ADC_FILE));
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".config/gcloud/application_default_credentials.json"));
    }
    if let Some(config) = dirs::config_dir() {
        let path = config.join("gcloud/application_default_credentials.json");
        if !candidates.contains(&path) {
            candidates.push(path);
        }
    }
    candidates
}

/// Authenticate in Google Colab using Application Default Credentials.
///
/// Run `from google.colab import auth; auth.authenticate_user()` in a notebook
/// cell first; it writes the credentials file this picks up.
pub async fn authenticate_colab() -> Result<Authenticator> {
    let candidates = adc_candidates(|key| std::env::var(key).ok());
    let path = candidates.iter().find(|p| p.is_file()).ok_or_else(|| {
        DriveError::AuthenticationError(
            "No Application Default Credentials found. In Colab run \
             `from google.colab import auth; auth.authenticate_user()` first, \
             or set GOOGLE_APPLICATION_CREDENTIALS"
                .to_string(),
        )
    })?;

    let auth = Authenticator::from_adc_file(path)?;
    auth.get_access_token().await?;
    info!(path = %path.display(), "authenticated in Google Colab");
    Ok(auth)
}

/// Authenticate in Kaggle.
///
/// The OAuth client comes from the arguments, falling back to the
/// `GDRIVE_CLIENT_ID` / `GDRIVE_CLIENT_SECRET` secrets exposed as environment
/// variables. Saved credentials in `/kaggle/working` are reused; otherwise a
/// `GDRIVE_REFRESH_TOKEN` secret is used, and failing that the copy-paste
/// command-line flow runs once.
pub async fn authenticate_kaggle(
    client_id: Option<String>,
    client_secret: Option<String>,
) -> Result<Authenticator> {
    authenticate_kaggle_at(client_id, client_secret, Path::new(KAGGLE_CREDENTIALS_FILE)).await
}

async fn authenticate_kaggle_at(
    client_id: Option<String>,
    client_secret: Option<String>,
    credentials_file: &Path,
) -> Result<Authenticator> {
    let client_id = client_id
        .or_else(|| std::env::var(ENV_CLIENT_ID).ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DriveError::MissingEnvVar(ENV_CLIENT_ID.to_string()))?;
    let client_secret = client_secret
        .or_else(|| std::env::var(ENV_CLIENT_SECRET).ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DriveError::MissingEnvVar(ENV_CLIENT_SECRET.to_string()))?;

    let secrets = ClientSecrets {
        client_id,
        client_secret,
        auth_uri: Some(AUTH_URI.to_string()),
        token_uri: Some(TOKEN_URI.to_string()),
        redirect_uris: vec!["http://localhost".to_string()],
    };

    let credentials = match load_credentials_file(credentials_file)? {
        Some(saved) => saved,
        None => match std::env::var(ENV_REFRESH_TOKEN).ok().filter(|v| !v.is_empty()) {
            Some(refresh_token) => StoredCredentials {
                client_id: secrets.client_id.clone(),
                client_secret: secrets.client_secret.clone(),
                refresh_token,
                access_token: None,
                expires_at: None,
                token_uri: Some(TOKEN_URI.to_string()),
            },
            None => {
                let fresh = oauth::command_line_flow(&Client::new(), &secrets).await?;
                save_credentials_file(credentials_file, &fresh)?;
                fresh
            }
        },
    };

    let auth = Authenticator::from_stored_credentials(credentials, Some(credentials_file.to_path_buf()));
    auth.get_access_token().await?;
    info!("authenticated in Kaggle");
    Ok(auth)
}

/// Authenticate on a local machine with an OAuth Desktop client.
///
/// First use opens the browser; the resulting credentials are saved to
/// `credentials_file` and refreshed from there afterwards.
pub async fn authenticate_local<P, Q>(credentials_file: P, client_secrets_file: Q) -> Result<Authenticator>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let credentials_file = credentials_file.as_ref();
    let secrets = load_client_secrets(client_secrets_file)?;

    let auth = match load_credentials_file(credentials_file)? {
        None => {
            info!("first-time authentication required, opening browser");
            let fresh = oauth::local_webserver_flow(&Client::new(), &secrets).await?;
            save_credentials_file(credentials_file, &fresh)?;
            Authenticator::from_stored_credentials(fresh, Some(credentials_file.to_path_buf()))
        }
        Some(saved) => {
            if saved.access_token_expired(unix_now(), EXPIRY_BUFFER_SECS) {
                info!("refreshing expired credentials");
            } else {
                info!("using existing credentials");
            }
            Authenticator::from_stored_credentials(saved, Some(credentials_file.to_path_buf()))
        }
    };

    auth.get_access_token().await?;
    info!("authenticated on local machine");
    Ok(auth)
}

/// Connect with whatever the current environment offers.
///
/// `GDRIVE_ACCESS_TOKEN` short-circuits everything; otherwise the forced or
/// detected environment decides the flow.
pub async fn quick_connect(config: &AuthConfig) -> Result<Authenticator> {
    if let Some(token) = std::env::var(ENV_ACCESS_TOKEN).ok().filter(|t| !t.is_empty()) {
        info!("using access token from {}", ENV_ACCESS_TOKEN);
        return Ok(Authenticator::from_access_token(token));
    }

    let env = match config.force_env {
        Some(env) => {
            info!(env = %env, "forced environment");
            env
        }
        None => {
            let env = detect_environment();
            info!(env = %env, "detected environment");
            env
        }
    };

    match env {
        Environment::Colab => authenticate_colab().await,
        Environment::Kaggle => {
            authenticate_kaggle(config.client_id.clone(), config.client_secret.clone()).await
        }
        Environment::Local => {
            authenticate_local(&config.credentials_file, &config.client_secrets_file).await
        }
    }
}
