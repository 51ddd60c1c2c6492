//! Installed-application OAuth2 flows against Google's authorization server.
//!
//! Two interactive ways to obtain a refresh token:
//! - [`local_webserver_flow`]: listens on an ephemeral loopback port, opens the
//!   browser on the consent screen and captures the redirect.
//! - [`command_line_flow`]: prints the consent URL and reads the authorization
//!   code (or the whole redirected URL) from stdin. Used on hosted notebooks
//!   where no browser can reach the machine.

use std::time::Duration;

use reqwest::Client;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::unix_now;
use crate::error::{DriveError, Result};
use crate::models::{ClientSecrets, StoredCredentials, TokenResponse};

/// Google OAuth2 authorization endpoint.
pub const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google OAuth2 token endpoint.
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Google Drive API scope.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// How long the loopback listener waits for the consent redirect.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

const SUCCESS_PAGE: &str = "<html><body><h2>Authentication complete.</h2>\
    <p>You can close this tab and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h2>Authentication failed.</h2>\
    <p>Return to the terminal for details.</p></body></html>";

/// Build the consent-screen URL for `client_id`.
///
/// Requests offline access and forces the consent prompt so Google always
/// hands back a refresh token.
pub fn authorization_url(auth_uri: &str, client_id: &str, redirect_uri: &str) -> Result<String> {
    let url = Url::parse_with_params(
        auth_uri,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", DRIVE_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| DriveError::InvalidArgument(format!("Invalid auth URI {}: {}", auth_uri, e)))?;
    Ok(url.into())
}

/// Pull the authorization code out of user input or a callback request path.
///
/// Accepts a bare code, a full redirected URL, or a path like `/?code=...`.
pub fn extract_code(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DriveError::AuthenticationError(
            "No authorization code provided".to_string(),
        ));
    }

    let query = match trimmed.split_once('?') {
        Some((_, query)) => query,
        None if trimmed.contains("code=") || trimmed.contains("error=") => trimmed,
        None => return Ok(trimmed.to_string()),
    };

    let mut code = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "error" => {
                return Err(DriveError::AuthenticationError(format!(
                    "Authorization denied: {}",
                    value
                )))
            }
            "code" => code = Some(value.into_owned()),
            _ => {}
        }
    }

    code.filter(|c| !c.is_empty()).ok_or_else(|| {
        DriveError::AuthenticationError("No authorization code in redirect URL".to_string())
    })
}

/// Exchange an authorization code for access and refresh tokens.
pub async fn exchange_code(
    http: &Client,
    token_uri: &str,
    secrets: &ClientSecrets,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenResponse> {
    let params = [
        ("code", code),
        ("client_id", secrets.client_id.as_str()),
        ("client_secret", secrets.client_secret.as_str()),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];
    post_token_request(http, token_uri, &params).await
}

/// Mint a fresh access token from a refresh token.
pub async fn refresh_access_token(
    http: &Client,
    token_uri: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenResponse> {
    let params = [
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];
    post_token_request(http, token_uri, &params).await
}

async fn post_token_request(
    http: &Client,
    token_uri: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = http.post(token_uri).form(params).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::TokenRefreshError(format!(
            "Status {}: {}",
            status, body
        )));
    }

    Ok(response.json().await?)
}

/// Turn a code-exchange response into credentials that can be saved and refreshed.
pub fn credentials_from_tokens(
    secrets: &ClientSecrets,
    token_uri: &str,
    tokens: TokenResponse,
) -> Result<StoredCredentials> {
    let refresh_token = tokens.refresh_token.ok_or_else(|| {
        DriveError::AuthenticationError(
            "No refresh token received. Revoke the app's access at \
             https://myaccount.google.com/permissions and authenticate again"
                .to_string(),
        )
    })?;

    Ok(StoredCredentials {
        client_id: secrets.client_id.clone(),
        client_secret: secrets.client_secret.clone(),
        refresh_token,
        access_token: Some(tokens.access_token),
        expires_at: Some(unix_now() + tokens.expires_in),
        token_uri: Some(token_uri.to_string()),
    })
}

/// Browser-based flow with a loopback redirect.
pub async fn local_webserver_flow(http: &Client, secrets: &ClientSecrets) -> Result<StoredCredentials> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let redirect_uri = format!("http://127.0.0.1:{}/", port);
    let auth_uri = secrets.auth_uri.as_deref().unwrap_or(AUTH_URI);
    let token_uri = secrets.token_uri.as_deref().unwrap_or(TOKEN_URI);

    let consent_url = authorization_url(auth_uri, &secrets.client_id, &redirect_uri)?;
    info!(redirect_uri = %redirect_uri, "waiting for OAuth consent");

    eprintln!("Opening browser for authentication...");
    if let Err(e) = open::that(&consent_url) {
        warn!(error = %e, "could not open a browser");
    }
    eprintln!("If the browser did not open, visit:\n\n  {}\n", consent_url);

    let code = tokio::time::timeout(CALLBACK_TIMEOUT, wait_for_callback(&listener))
        .await
        .map_err(|_| {
            DriveError::AuthenticationError(
                "Timed out waiting for Google authorization (2 minutes)".to_string(),
            )
        })??;

    debug!("received authorization code");
    let tokens = exchange_code(http, token_uri, secrets, &code, &redirect_uri).await?;
    credentials_from_tokens(secrets, token_uri, tokens)
}

/// Accept loopback connections until one carries the OAuth redirect.
async fn wait_for_callback(listener: &TcpListener) -> Result<String> {
    loop {
        let (mut stream, _addr) = listener.accept().await?;

        let mut buf = vec![0u8; 8192];
        let n = stream.read(&mut buf).await?;
        let request = String::from_utf8_lossy(&buf[..n]);

        // "GET /?code=XXXX&scope=... HTTP/1.1"
        let path = request
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or("");

        if !path.contains("code=") && !path.contains("error=") {
            let _ = stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
            continue;
        }

        let result = extract_code(path);
        let page = if result.is_ok() { SUCCESS_PAGE } else { FAILURE_PAGE };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            page.len(),
            page
        );
        let _ = stream.write_all(response.as_bytes()).await;
        return result;
    }
}

/// Copy-paste flow for machines without a reachable browser.
pub async fn command_line_flow(http: &Client, secrets: &ClientSecrets) -> Result<StoredCredentials> {
    let redirect_uri = secrets
        .redirect_uris
        .iter()
        .find(|uri| uri.starts_with("http://localhost"))
        .cloned()
        .unwrap_or_else(|| "http://localhost".to_string());
    let auth_uri = secrets.auth_uri.as_deref().unwrap_or(AUTH_URI);
    let token_uri = secrets.token_uri.as_deref().unwrap_or(TOKEN_URI);

    let consent_url = authorization_url(auth_uri, &secrets.client_id, &redirect_uri)?;

    eprintln!("{}", "=".repeat(70));
    eprintln!("First-time authentication required");
    eprintln!("{}", "=".repeat(70));
    eprintln!("1. Open this URL in a browser and approve access:\n\n  {}\n", consent_url);
    eprintln!("2. The browser ends on a page that fails to load.");
    eprintln!("   Copy that page's full URL (or just its `code` value) and paste it here.\n");
    eprint!("Authorization code: ");

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let code = extract_code(&line)?;

    let tokens = exchange_code(http, token_uri, secrets, &code, &redirect_uri).await?;
    credentials_from_tokens(secrets, token_uri, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_url_carries_offline_scope() {
        let url = authorization_url(AUTH_URI, "my-client", "http://127.0.0.1:8080/").unwrap();
        let parsed = Url::parse(&url).unwrap();
        let params: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();

        assert!(params.contains(&("client_id".into(), "my-client".into())));
        assert!(params.contains(&("redirect_uri".into(), "http://127.0.0.1:8080/".into())));
        assert!(params.contains(&("scope".into(), DRIVE_SCOPE.into())));
        assert!(params.contains(&("access_type".into(), "offline".into())));
    }

    #[test]
    fn extract_bare_code() {
        assert_eq!(extract_code("  4/0AbCd-ef \n").unwrap(), "4/0AbCd-ef");
    }

    #[test]
    fn extract_code_from_redirect_url() {
        let url = "http://localhost/?code=4%2F0AbCd&scope=https://www.googleapis.com/auth/drive";
        assert_eq!(extract_code(url).unwrap(), "4/0AbCd");
    }

    #[test]
    fn extract_code_from_request_path() {
        assert_eq!(extract_code("/?state=x&code=abc").unwrap(), "abc");
    }

    #[test]
    fn extract_code_reports_denial() {
        let err = extract_code("/?error=access_denied").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn extract_code_rejects_empty() {
        assert!(extract_code("   ").is_err());
        assert!(extract_code("http://localhost/?scope=drive").is_err());
    }

    #[test]
    fn credentials_require_refresh_token() {
        let secrets = ClientSecrets {
            client_id: "id".into(),
            client_secret: "secret".into(),
            auth_uri: None,
            token_uri: None,
            redirect_uris: vec![],
        };
        let tokens = TokenResponse {
            access_token: "at".into(),
            token_type: None,
            expires_in: 3600,
            refresh_token: None,
        };
        assert!(credentials_from_tokens(&secrets, TOKEN_URI, tokens).is_err());
    }
}
