//! Data models for Google Drive API requests, responses and credential files.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DriveError;
use crate::utils::format_size;

/// MIME type Google Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Metadata for a file or folder in Google Drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_size", skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl FileMetadata {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

// The API sends sizes as decimal strings ("1024"); accept plain numbers too.
fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSize {
        Text(String),
        Number(u64),
    }

    match Option::<RawSize>::deserialize(deserializer)? {
        Some(RawSize::Text(s)) => s.parse::<u64>().map(Some).map_err(serde::de::Error::custom),
        Some(RawSize::Number(n)) => Ok(Some(n)),
        None => Ok(None),
    }
}

impl fmt::Display for FileMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size_str = self
            .size
            .map(format_size)
            .unwrap_or_else(|| "-".to_string());
        let mime = self.mime_type.as_deref().unwrap_or("-");
        write!(f, "{}\t{}\t{}\t{}", self.id, size_str, mime, self.name)
    }
}

/// Response from the files.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<FileMetadata>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Access level granted by a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Writer,
    Commenter,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Writer => "writer",
            Role::Commenter => "commenter",
        }
    }
}

impl FromStr for Role {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reader" => Ok(Role::Reader),
            "writer" => Ok(Role::Writer),
            "commenter" => Ok(Role::Commenter),
            _ => Err(DriveError::InvalidArgument(format!(
                "Invalid permission: {}. Must be one of: reader, writer, commenter",
                s
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a permission is granted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grantee {
    Anyone,
    User(String),
    Group(String),
    Domain(String),
}

/// Body of a permissions.create request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub allow_file_discovery: bool,
}

impl PermissionRequest {
    /// Link-style permission: reachable through the link, not discoverable in search.
    pub fn new(role: Role, grantee: &Grantee) -> Self {
        let (kind, email_address, domain) = match grantee {
            Grantee::Anyone => ("anyone", None, None),
            Grantee::User(email) => ("user", Some(email.clone()), None),
            Grantee::Group(email) => ("group", Some(email.clone()), None),
            Grantee::Domain(domain) => ("domain", None, Some(domain.clone())),
        };
        Self {
            kind,
            role,
            email_address,
            domain,
            allow_file_discovery: false,
        }
    }
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// Service account credentials from JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

/// `authorized_user` credentials as written by `gcloud auth application-default login`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUserCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// Application Default Credentials file, discriminated by its `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApplicationCredentials {
    ServiceAccount(ServiceAccountCredentials),
    AuthorizedUser(AuthorizedUserCredentials),
}

/// OAuth client configuration downloaded from Google Cloud Console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecretsFile {
    pub installed: Option<ClientSecrets>,
    pub web: Option<ClientSecrets>,
}

impl ClientSecretsFile {
    /// The Desktop app section wins over the Web app section.
    pub fn into_secrets(self) -> Option<ClientSecrets> {
        self.installed.or(self.web)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// Saved OAuth credentials (the `mycreds.txt` file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<u64>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl StoredCredentials {
    /// True when there is no access token or it expires within `buffer_secs` of `now`.
    pub fn access_token_expired(&self, now: u64, buffer_secs: u64) -> bool {
        match (&self.access_token, self.expires_at) {
            (Some(_), Some(expires_at)) => now + buffer_secs >= expires_at,
            _ => true,
        }
    }
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_expires_in() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_metadata_deserialize() {
        let json = r#"{
            "id": "abc123",
            "name": "test.txt",
            "mimeType": "text/plain",
            "webViewLink": "https://drive.google.com/file/d/abc123/view",
            "size": "1024",
            "parents": ["root123"]
        }"#;

        let metadata: FileMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.id, "abc123");
        assert_eq!(metadata.size, Some(1024));
        assert_eq!(metadata.parents, vec!["root123".to_string()]);
        assert!(!metadata.is_folder());
    }

    #[test]
    fn test_size_survives_serialization() {
        let json = r#"{"id": "a", "name": "b", "size": "42"}"#;
        let metadata: FileMetadata = serde_json::from_str(json).unwrap();
        let back: FileMetadata =
            serde_json::from_str(&serde_json::to_string(&metadata).unwrap()).unwrap();
        assert_eq!(back.size, Some(42));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Reader".parse::<Role>().unwrap(), Role::Reader);
        assert_eq!("writer".parse::<Role>().unwrap(), Role::Writer);
        assert_eq!(" commenter ".parse::<Role>().unwrap(), Role::Commenter);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_permission_request_body() {
        let body = serde_json::to_value(PermissionRequest::new(
            Role::Writer,
            &Grantee::User("a@example.com".into()),
        ))
        .unwrap();
        assert_eq!(body["type"], "user");
        assert_eq!(body["role"], "writer");
        assert_eq!(body["emailAddress"], "a@example.com");
        assert_eq!(body["allowFileDiscovery"], false);
        assert!(body.get("domain").is_none());
    }

    #[test]
    fn test_client_secrets_prefers_installed() {
        let json = r#"{
            "installed": {"client_id": "desktop", "client_secret": "s1"},
            "web": {"client_id": "web", "client_secret": "s2"}
        }"#;
        let file: ClientSecretsFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.into_secrets().unwrap().client_id, "desktop");
    }

    #[test]
    fn test_application_credentials_tagging() {
        let json = r#"{
            "type": "authorized_user",
            "client_id": "id",
            "client_secret": "secret",
            "refresh_token": "rt"
        }"#;
        let creds: ApplicationCredentials = serde_json::from_str(json).unwrap();
        assert!(matches!(creds, ApplicationCredentials::AuthorizedUser(_)));
    }

    #[test]
    fn test_stored_credentials_expiry() {
        let mut creds = StoredCredentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
            refresh_token: "rt".into(),
            access_token: Some("at".into()),
            expires_at: Some(1_000),
            token_uri: None,
        };
        assert!(!creds.access_token_expired(900, 60));
        assert!(creds.access_token_expired(950, 60));
        creds.access_token = None;
        assert!(creds.access_token_expired(0, 0));
    }
}
