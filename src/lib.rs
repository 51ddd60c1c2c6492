//! gdrive_toolkit - A lightweight Google Drive toolkit.
//!
//! This library provides functionality to:
//! - Authenticate from Google Colab, Kaggle or a local machine
//! - Upload, download, search, copy, move and delete files and folders
//! - Share files and get shareable links
//! - Zip a local folder and upload it, or transfer files in batches
//!
//! # Example
//!
//! ```no_run
//! use gdrive_toolkit::{quick_connect, AuthConfig, DriveClient, SearchQuery};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = quick_connect(&AuthConfig::default()).await?;
//!     let client = DriveClient::new(auth);
//!
//!     let uploaded = client.upload_file("data.csv", None, None).await?;
//!     println!("Uploaded with ID: {}", uploaded.id);
//!
//!     for file in client.search_files(&SearchQuery::new().name_contains("report")).await? {
//!         println!("{}", file);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod oauth;
pub mod query;
pub mod url_parser;
pub mod utils;

// Re-exports for convenience
pub use auth::{
    authenticate_colab, authenticate_kaggle, authenticate_local, detect_environment, quick_connect,
    Authenticator,
};
pub use client::{BatchReport, DriveClient};
pub use config::{AuthConfig, Environment};
pub use error::{DriveError, Result};
pub use models::{FileMetadata, Grantee, Role};
pub use query::SearchQuery;
pub use url_parser::extract_id;
pub use utils::format_size;
