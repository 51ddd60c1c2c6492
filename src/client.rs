//! Google Drive API v3 client.

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::archive;
use crate::auth::Authenticator;
use crate::error::{DriveError, Result};
use crate::models::{FileListResponse, FileMetadata, Grantee, PermissionRequest, Role, FOLDER_MIME_TYPE};
use crate::query::SearchQuery;
use crate::url_parser::{could_be_raw_id, extract_id, looks_like_id};
use crate::utils::guess_mime_type;

/// Base URL for Google Drive API v3.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
pub const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Files above this size go through a resumable upload session (5 MiB).
pub const RESUMABLE_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Chunk size for resumable uploads (8 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Resumable chunks must be a multiple of 256 KiB.
const CHUNK_ALIGNMENT: usize = 256 * 1024;

/// Largest page files.list will return.
const MAX_PAGE_SIZE: usize = 1000;

const FILE_FIELDS: &str = "id, name, size, mimeType, createdTime, modifiedTime, webViewLink, parents";

/// Progress callback receiving `(bytes_done, bytes_total)`.
pub type Progress<'a> = Option<&'a (dyn Fn(u64, u64) + Send + Sync)>;

/// Outcome of a batch transfer: items that went through and items that failed.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<(String, DriveError)>,
}

impl<T> BatchReport<T> {
    fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Round a requested chunk size up to the 256 KiB multiple Drive requires.
pub fn align_chunk_size(requested: usize) -> usize {
    let requested = requested.max(1);
    requested.div_ceil(CHUNK_ALIGNMENT) * CHUNK_ALIGNMENT
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_body = response.text().await.unwrap_or_default();
    Err(DriveError::from_api_body(status.as_u16(), &error_body))
}

/// Client for interacting with Google Drive.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    api_base: String,
    upload_base: String,
    drive_id: Option<String>,
}

impl DriveClient {
    pub fn new(auth: Authenticator) -> Self {
        Self {
            auth,
            http: Client::new(),
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: UPLOAD_API_BASE.to_string(),
            drive_id: None,
        }
    }

    /// Point the client at different API endpoints (used by tests).
    pub fn with_base_urls(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    /// Scope listings to a Shared Drive; it also becomes the default parent
    /// for new files and folders.
    pub fn with_shared_drive(mut self, drive_id: impl Into<String>) -> Self {
        self.drive_id = Some(drive_id.into());
        self
    }

    pub fn drive_id(&self) -> Option<&str> {
        self.drive_id.as_deref()
    }

    fn default_parent<'a>(&'a self, parent: Option<&'a str>) -> Option<&'a str> {
        parent.or(self.drive_id.as_deref())
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.api_base, file_id)
    }

    // ------------------------------------------------------------------
    // Listing and search
    // ------------------------------------------------------------------

    /// Run a raw Drive query, following pages until `max_results` files are collected.
    pub async fn query_files(&self, query: Option<&str>, max_results: usize) -> Result<Vec<FileMetadata>> {
        let token = self.auth.get_access_token().await?;
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;
        let fields = format!("nextPageToken, files({})", FILE_FIELDS);

        while all_files.len() < max_results {
            let page_size = (max_results - all_files.len()).min(MAX_PAGE_SIZE).to_string();
            let mut request = self
                .http
                .get(format!("{}/files", self.api_base))
                .bearer_auth(&token)
                .query(&[
                    ("supportsAllDrives", "true"),
                    ("includeItemsFromAllDrives", "true"),
                    ("spaces", "drive"),
                    ("fields", fields.as_str()),
                    ("pageSize", page_size.as_str()),
                ]);

            if let Some(q) = query {
                request = request.query(&[("q", q)]);
            }
            if let Some(drive_id) = &self.drive_id {
                request = request.query(&[("corpora", "drive"), ("driveId", drive_id.as_str())]);
            }
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = ensure_success(request.send().await?).await?;
            let list_response: FileListResponse = response.json().await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        all_files.truncate(max_results);
        Ok(all_files)
    }

    /// Search files with a [`SearchQuery`].
    pub async fn search_files(&self, search: &SearchQuery) -> Result<Vec<FileMetadata>> {
        let query = search.to_query_string();
        debug!(query = ?query, "searching files");
        let files = self.query_files(query.as_deref(), search.max_results).await?;
        info!(count = files.len(), "search finished");
        Ok(files)
    }

    /// List the (non-trashed) contents of a folder; `"root"` is My Drive.
    pub async fn list_folder(&self, parent_id: &str, max_results: usize) -> Result<Vec<FileMetadata>> {
        self.search_files(&SearchQuery::new().in_folder(parent_id).max_results(max_results))
            .await
    }

    /// List folders, optionally only those directly inside `parent_id`.
    pub async fn list_folders(&self, parent_id: Option<&str>, max_results: usize) -> Result<Vec<FileMetadata>> {
        let mut search = SearchQuery::new().folders_only().max_results(max_results);
        if let Some(parent) = parent_id {
            search = search.in_folder(parent);
        }
        self.search_files(&search).await
    }

    /// Find a file by exact name in a folder.
    pub async fn find_file(&self, name: &str, parent_id: &str) -> Result<Option<FileMetadata>> {
        let files = self
            .search_files(&SearchQuery::new().name_equals(name).in_folder(parent_id).max_results(1))
            .await?;
        Ok(files.into_iter().next())
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Get file metadata by ID.
    pub async fn get_file(&self, file_id: &str) -> Result<FileMetadata> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(self.file_url(file_id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
            .send()
            .await?;

        let metadata: FileMetadata = ensure_success(response).await?.json().await?;
        Ok(metadata)
    }

    /// Slash-joined path of a file, from its top-most ancestor down.
    pub async fn get_file_path(&self, file_id: &str) -> Result<String> {
        let mut current = self.get_file(file_id).await?;
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(current.id.clone());

        loop {
            names.push(current.name.clone());
            match current.parents.first() {
                Some(parent) if seen.insert(parent.clone()) => {
                    current = self.get_file(parent).await?;
                }
                _ => break,
            }
        }

        names.reverse();
        Ok(names.join("/"))
    }

    // ------------------------------------------------------------------
    // Upload
    // ------------------------------------------------------------------

    /// Upload a file to a folder (`None` means My Drive, or the shared drive root).
    pub async fn upload_file<P: AsRef<Path>>(
        &self,
        local_path: P,
        parent_id: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<FileMetadata> {
        self.upload_file_with_progress(local_path, parent_id, file_name, None)
            .await
    }

    /// Like [`upload_file`](Self::upload_file), reporting progress as bytes go out.
    pub async fn upload_file_with_progress<P: AsRef<Path>>(
        &self,
        local_path: P,
        parent_id: Option<&str>,
        file_name: Option<&str>,
        progress: Progress<'_>,
    ) -> Result<FileMetadata> {
        let local_path = local_path.as_ref();
        if !local_path.is_file() {
            return Err(DriveError::FileNotFound(local_path.display().to_string()));
        }

        let filename = match file_name {
            Some(name) => name.to_string(),
            None => local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| DriveError::FileNotFound(local_path.display().to_string()))?,
        };

        let file_size = tokio::fs::metadata(local_path).await?.len();
        let mime_type = guess_mime_type(local_path);
        let parent = self.default_parent(parent_id);

        let metadata = if file_size > RESUMABLE_THRESHOLD {
            self.upload_resumable(local_path, parent, &filename, &mime_type, DEFAULT_CHUNK_SIZE, progress)
                .await?
        } else {
            let content = tokio::fs::read(local_path).await?;
            let metadata = self.upload_multipart(content, parent, &filename, &mime_type).await?;
            if let Some(report) = progress {
                report(file_size, file_size);
            }
            metadata
        };

        info!(name = %metadata.name, id = %metadata.id, "uploaded");
        Ok(metadata)
    }

    /// Upload through a resumable session in chunks of `chunk_size` bytes
    /// (rounded up to a multiple of 256 KiB).
    pub async fn upload_large_file<P: AsRef<Path>>(
        &self,
        local_path: P,
        parent_id: Option<&str>,
        chunk_size: usize,
        progress: Progress<'_>,
    ) -> Result<FileMetadata> {
        let local_path = local_path.as_ref();
        if !local_path.is_file() {
            return Err(DriveError::FileNotFound(local_path.display().to_string()));
        }
        let filename = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DriveError::FileNotFound(local_path.display().to_string()))?;
        let mime_type = guess_mime_type(local_path);

        let metadata = self
            .upload_resumable(
                local_path,
                self.default_parent(parent_id),
                &filename,
                &mime_type,
                chunk_size,
                progress,
            )
            .await?;
        info!(name = %metadata.name, id = %metadata.id, "uploaded");
        Ok(metadata)
    }

    /// Upload in-memory content as a new file.
    pub async fn upload_bytes(
        &self,
        file_name: &str,
        content: Vec<u8>,
        parent_id: Option<&str>,
        mime_type: &str,
    ) -> Result<FileMetadata> {
        let metadata = self
            .upload_multipart(content, self.default_parent(parent_id), file_name, mime_type)
            .await?;
        info!(name = %metadata.name, id = %metadata.id, "uploaded");
        Ok(metadata)
    }

    /// Upload, then delete the file of the same name that was already in the
    /// destination folder. A failed upload leaves the existing file in place.
    pub async fn upload_replacing<P: AsRef<Path>>(
        &self,
        local_path: P,
        parent_id: Option<&str>,
        file_name: Option<&str>,
        progress: Progress<'_>,
    ) -> Result<FileMetadata> {
        let local_path = local_path.as_ref();
        let filename = match file_name {
            Some(name) => name.to_string(),
            None => local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| DriveError::FileNotFound(local_path.display().to_string()))?,
        };
        let folder = self.default_parent(parent_id).unwrap_or("root");

        let existing = self.find_file(&filename, folder).await?;
        let metadata = self
            .upload_file_with_progress(local_path, parent_id, Some(&filename), progress)
            .await?;

        if let Some(old) = existing.filter(|old| old.id != metadata.id) {
            self.delete_file(&old.id).await?;
            info!(name = %filename, old_id = %old.id, "replaced existing file");
        }
        Ok(metadata)
    }

    fn new_file_metadata(filename: &str, parent_id: Option<&str>) -> serde_json::Value {
        match parent_id {
            Some(parent) => json!({ "name": filename, "parents": [parent] }),
            None => json!({ "name": filename }),
        }
    }

    /// Upload a file using multipart upload (for smaller files).
    async fn upload_multipart(
        &self,
        content: Vec<u8>,
        parent_id: Option<&str>,
        filename: &str,
        mime_type: &str,
    ) -> Result<FileMetadata> {
        let token = self.auth.get_access_token().await?;
        let metadata = Self::new_file_metadata(filename, parent_id);

        let metadata_part = Part::text(metadata.to_string()).mime_str("application/json")?;
        let file_part = Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str(mime_type)?;

        let form = Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", FILE_FIELDS),
            ])
            .multipart(form)
            .send()
            .await?;

        let metadata: FileMetadata = ensure_success(response).await?.json().await?;
        Ok(metadata)
    }

    /// Upload a file using resumable upload (for larger files).
    async fn upload_resumable(
        &self,
        local_path: &Path,
        parent_id: Option<&str>,
        filename: &str,
        mime_type: &str,
        chunk_size: usize,
        progress: Progress<'_>,
    ) -> Result<FileMetadata> {
        let token = self.auth.get_access_token().await?;
        let mut file = File::open(local_path).await?;
        let file_size = file.metadata().await?.len();
        let metadata = Self::new_file_metadata(filename, parent_id);

        // Step 1: Initiate resumable upload
        let init_response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[("uploadType", "resumable"), ("supportsAllDrives", "true")])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(&metadata)
            .send()
            .await?;

        let init_response = ensure_success(init_response).await?;
        let upload_url = init_response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DriveError::ApiError {
                status: 500,
                message: "No upload URL in response".to_string(),
            })?
            .to_string();
        debug!(size = file_size, "resumable session started");

        // Step 2: Send the content chunk by chunk
        let chunk_size = align_chunk_size(chunk_size);
        let mut buffer = vec![0u8; chunk_size.min(file_size as usize).max(1)];
        let mut offset: u64 = 0;

        loop {
            let len = ((file_size - offset) as usize).min(buffer.len());
            file.read_exact(&mut buffer[..len]).await?;

            let content_range = if file_size == 0 {
                "bytes */0".to_string()
            } else {
                format!("bytes {}-{}/{}", offset, offset + len as u64 - 1, file_size)
            };

            let response = self
                .http
                .put(&upload_url)
                .header(CONTENT_RANGE, content_range)
                .header(CONTENT_LENGTH, len.to_string())
                .query(&[("fields", FILE_FIELDS)])
                .body(buffer[..len].to_vec())
                .send()
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => {
                    if let Some(report) = progress {
                        report(file_size, file_size);
                    }
                    let metadata: FileMetadata = response.json().await?;
                    return Ok(metadata);
                }
                StatusCode::PERMANENT_REDIRECT => {
                    // "Range: bytes=0-N" is what the server actually persisted.
                    let persisted = response
                        .headers()
                        .get(RANGE)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.rsplit('-').next())
                        .and_then(|end| end.parse::<u64>().ok())
                        .map(|end| end + 1)
                        .unwrap_or(0);

                    if persisted != offset + len as u64 {
                        file.seek(SeekFrom::Start(persisted)).await?;
                    }
                    offset = persisted;
                    if let Some(report) = progress {
                        report(offset, file_size);
                    }
                }
                status => {
                    let error_body = response.text().await.unwrap_or_default();
                    return Err(DriveError::from_api_body(status.as_u16(), &error_body));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Download
    // ------------------------------------------------------------------

    /// Download a file; a directory `destination` keeps the remote name.
    ///
    /// Missing parent directories are created. Returns the written path.
    pub async fn download_file<P: AsRef<Path>>(
        &self,
        file_id: &str,
        destination: P,
        progress: Progress<'_>,
    ) -> Result<PathBuf> {
        let metadata = self.get_file(file_id).await?;
        self.download_metadata(&metadata, destination.as_ref(), progress)
            .await
    }

    async fn download_metadata(
        &self,
        metadata: &FileMetadata,
        destination: &Path,
        progress: Progress<'_>,
    ) -> Result<PathBuf> {
        if metadata.is_folder() {
            return Err(DriveError::InvalidArgument(format!(
                "'{}' is a folder and cannot be downloaded",
                metadata.name
            )));
        }
        if metadata
            .mime_type
            .as_deref()
            .is_some_and(|m| m.starts_with("application/vnd.google-apps."))
        {
            return Err(DriveError::InvalidArgument(format!(
                "'{}' is a Google Workspace document and has no binary content",
                metadata.name
            )));
        }

        let final_path = if destination.is_dir() {
            destination.join(&metadata.name)
        } else {
            destination.to_path_buf()
        };
        if let Some(parent) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let token = self.auth.get_access_token().await?;
        let response = self
            .http
            .get(self.file_url(&metadata.id))
            .bearer_auth(&token)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let total = metadata.size.or(response.content_length()).unwrap_or(0);
        let mut file = File::create(&final_path).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if let Some(report) = progress {
                report(downloaded, total);
            }
        }

        file.flush().await?;
        info!(name = %metadata.name, path = %final_path.display(), "downloaded");
        Ok(final_path)
    }

    /// Download the first file matching an exact `name` or a raw `query`.
    pub async fn download_by_query<P: AsRef<Path>>(
        &self,
        file_name: Option<&str>,
        query: Option<&str>,
        destination: P,
    ) -> Result<PathBuf> {
        let search = match (query, file_name) {
            (Some(q), _) => SearchQuery::new().raw(q),
            (None, Some(name)) => SearchQuery::new().name_equals(name),
            (None, None) => {
                return Err(DriveError::InvalidArgument(
                    "Either file_id, file_name, or query must be provided".to_string(),
                ))
            }
        };

        let files = self.search_files(&search.max_results(10)).await?;
        let first = files.first().ok_or_else(|| {
            DriveError::FileNotFound(format!("No file found matching: {}", file_name.or(query).unwrap_or("")))
        })?;
        if files.len() > 1 {
            warn!(count = files.len(), "several files matched, downloading the first one");
        }

        self.download_metadata(first, destination.as_ref(), None).await
    }

    // ------------------------------------------------------------------
    // Folders
    // ------------------------------------------------------------------

    /// Create a folder; `None` parent means My Drive (or the shared drive root).
    pub async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<FileMetadata> {
        let token = self.auth.get_access_token().await?;
        let mut body = json!({ "name": name, "mimeType": FOLDER_MIME_TYPE });
        if let Some(parent) = self.default_parent(parent_id) {
            body["parents"] = json!([parent]);
        }

        let response = self
            .http
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
            .json(&body)
            .send()
            .await?;

        let folder: FileMetadata = ensure_success(response).await?.json().await?;
        info!(name = %folder.name, id = %folder.id, "created folder");
        Ok(folder)
    }

    /// ID of the first folder named `name` (optionally inside `parent_id`).
    pub async fn get_folder_id_by_name(&self, name: &str, parent_id: Option<&str>) -> Result<Option<String>> {
        let mut search = SearchQuery::new().name_equals(name).folders_only().max_results(10);
        if let Some(parent) = parent_id {
            search = search.in_folder(parent);
        }

        let folders = self.search_files(&search).await?;
        if folders.len() > 1 {
            warn!(count = folders.len(), name, "several folders share this name, using the first");
        }
        Ok(folders.into_iter().next().map(|f| f.id))
    }

    /// Resolve a folder given as a link, `root`, an ID or a name.
    ///
    /// A long bare string is tried as an ID first; when no folder has that ID
    /// it is treated as a name. Names are looked up and created when missing.
    pub async fn resolve_folder(&self, folder: &str) -> Result<String> {
        let folder = folder.trim();
        if looks_like_id(folder) {
            return extract_id(folder);
        }

        if could_be_raw_id(folder) {
            match self.get_file(folder).await {
                Ok(metadata) if metadata.is_folder() => return Ok(metadata.id),
                Ok(metadata) => debug!(id = %metadata.id, "not a folder, looking up by name"),
                Err(e) if e.is_not_found() => debug!(folder, "no item with this ID, looking up by name"),
                Err(e) => return Err(e),
            }
        }

        if let Some(id) = self.get_folder_id_by_name(folder, self.drive_id()).await? {
            info!(folder, id = %id, "found folder");
            return Ok(id);
        }
        Ok(self.create_folder(folder, None).await?.id)
    }

    /// Create every missing folder along `path` (like `mkdir -p`) and return
    /// the ID of the last one. Blank segments are skipped.
    pub async fn create_folder_path(&self, path: &str, parent_id: Option<&str>) -> Result<String> {
        let mut current: Option<String> = self.default_parent(parent_id).map(str::to_string);

        for segment in path.split('/').map(str::trim).filter(|s| !s.is_empty()) {
            let parent = current.take().unwrap_or_else(|| "root".to_string());
            current = Some(match self.get_folder_id_by_name(segment, Some(&parent)).await? {
                Some(existing) => {
                    debug!(folder = segment, "folder already exists");
                    existing
                }
                None => self.create_folder(segment, Some(&parent)).await?.id,
            });
        }

        Ok(current.unwrap_or_else(|| "root".to_string()))
    }

    /// Total size in bytes of every file below a folder, recursively.
    pub async fn get_folder_size(&self, folder_id: &str) -> Result<u64> {
        let mut total: u64 = 0;
        let mut pending = vec![folder_id.to_string()];
        let mut visited = HashSet::new();

        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for entry in self.list_folder(&current, usize::MAX).await? {
                if entry.is_folder() {
                    pending.push(entry.id);
                } else {
                    total += entry.size.unwrap_or(0);
                }
            }
        }

        Ok(total)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Permanently delete a file or folder; returns what was deleted.
    pub async fn delete_file(&self, file_id: &str) -> Result<FileMetadata> {
        let metadata = self.get_file(file_id).await?;
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .delete(self.file_url(file_id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true")])
            .send()
            .await?;
        ensure_success(response).await?;

        info!(name = %metadata.name, id = %metadata.id, "deleted");
        Ok(metadata)
    }

    /// Delete the first non-trashed file with this exact name.
    pub async fn delete_by_name(&self, file_name: &str) -> Result<FileMetadata> {
        let files = self
            .search_files(&SearchQuery::new().name_equals(file_name).max_results(10))
            .await?;
        let first = files
            .first()
            .ok_or_else(|| DriveError::FileNotFound(file_name.to_string()))?;
        if files.len() > 1 {
            warn!(count = files.len(), name = file_name, "several files share this name, deleting the first");
        }
        self.delete_file(&first.id).await
    }

    /// Delete a folder and everything in it.
    pub async fn delete_folder(&self, folder_id: &str) -> Result<FileMetadata> {
        let metadata = self.get_file(folder_id).await?;
        if !metadata.is_folder() {
            return Err(DriveError::InvalidArgument(format!(
                "'{}' is not a folder",
                metadata.name
            )));
        }
        self.delete_file(folder_id).await
    }

    /// Delete the first folder named `folder_name`.
    pub async fn delete_folder_by_name(&self, folder_name: &str) -> Result<FileMetadata> {
        let folder_id = self
            .get_folder_id_by_name(folder_name, None)
            .await?
            .ok_or_else(|| DriveError::FolderNotFound(folder_name.to_string()))?;
        self.delete_file(&folder_id).await
    }

    // ------------------------------------------------------------------
    // Sharing
    // ------------------------------------------------------------------

    async fn create_permission(&self, file_id: &str, role: Role, grantee: &Grantee) -> Result<()> {
        let token = self.auth.get_access_token().await?;
        let response = self
            .http
            .post(format!("{}/permissions", self.file_url(file_id)))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true")])
            .json(&PermissionRequest::new(role, grantee))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    fn link_for(metadata: &FileMetadata) -> String {
        match &metadata.web_view_link {
            Some(link) => link.clone(),
            None if metadata.is_folder() => {
                format!("https://drive.google.com/drive/folders/{}", metadata.id)
            }
            None => format!("https://drive.google.com/file/d/{}/view", metadata.id),
        }
    }

    /// Grant `role` to `grantee` and return the file's link.
    pub async fn share(&self, file_id: &str, role: Role, grantee: &Grantee) -> Result<String> {
        let metadata = self.get_file(file_id).await?;
        self.create_permission(file_id, role, grantee).await?;
        info!(name = %metadata.name, role = %role, "shared");
        Ok(Self::link_for(&metadata))
    }

    /// Anyone with the link can view.
    pub async fn share_anyone_reader(&self, file_id: &str) -> Result<String> {
        self.share(file_id, Role::Reader, &Grantee::Anyone).await
    }

    /// Best-effort link sharing: a failed permission change (for example one
    /// that already exists) still returns the link.
    pub async fn get_shareable_link(&self, file_id: &str, role: Role) -> Result<String> {
        let metadata = self.get_file(file_id).await?;
        if let Err(e) = self.create_permission(file_id, role, &Grantee::Anyone).await {
            debug!(error = %e, "permission not added, returning existing link");
        }
        Ok(Self::link_for(&metadata))
    }

    // ------------------------------------------------------------------
    // Copy / move
    // ------------------------------------------------------------------

    /// Copy a file; the copy is named `Copy of <name>` unless `new_name` is given.
    pub async fn copy_file(
        &self,
        file_id: &str,
        new_name: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<FileMetadata> {
        let source = self.get_file(file_id).await?;
        let name = new_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Copy of {}", source.name));
        let body = Self::new_file_metadata(&name, parent_id);

        let token = self.auth.get_access_token().await?;
        let response = self
            .http
            .post(format!("{}/copy", self.file_url(file_id)))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
            .json(&body)
            .send()
            .await?;

        let copied: FileMetadata = ensure_success(response).await?.json().await?;
        info!(source = %source.name, copy = %copied.name, "copied");
        Ok(copied)
    }

    /// Move a file out of all its current folders into `new_parent_id`.
    pub async fn move_file(&self, file_id: &str, new_parent_id: &str) -> Result<FileMetadata> {
        let current = self.get_file(file_id).await?;
        let remove_parents = current.parents.join(",");

        let token = self.auth.get_access_token().await?;
        let mut request = self
            .http
            .patch(self.file_url(file_id))
            .bearer_auth(&token)
            .query(&[
                ("supportsAllDrives", "true"),
                ("addParents", new_parent_id),
                ("fields", FILE_FIELDS),
            ])
            .json(&json!({}));
        if !remove_parents.is_empty() {
            request = request.query(&[("removeParents", remove_parents.as_str())]);
        }

        let moved: FileMetadata = ensure_success(request.send().await?).await?.json().await?;
        info!(name = %moved.name, parent = new_parent_id, "moved");
        Ok(moved)
    }

    // ------------------------------------------------------------------
    // Batch helpers
    // ------------------------------------------------------------------

    /// Zip a local directory and upload the archive. The temporary archive is
    /// removed whether or not the upload succeeds.
    pub async fn zip_and_upload<P: AsRef<Path>>(
        &self,
        folder_path: P,
        parent_id: Option<&str>,
        zip_name: Option<&str>,
    ) -> Result<FileMetadata> {
        let folder_path = folder_path.as_ref().to_path_buf();
        if !folder_path.is_dir() {
            return Err(DriveError::InvalidArgument(format!(
                "Not a directory: {}",
                folder_path.display()
            )));
        }
        let zip_name = archive::zip_name_for(&folder_path, zip_name)?;

        let staging = tempfile::Builder::new().prefix("gdrive-toolkit-").tempdir()?;
        let archive_path = staging.path().join(&zip_name);

        let result = async {
            let (source, dest) = (folder_path.clone(), archive_path.clone());
            let entries = tokio::task::spawn_blocking(move || archive::zip_directory(&source, &dest))
                .await
                .map_err(|e| DriveError::Io(std::io::Error::other(e)))??;
            info!(archive = %zip_name, files = entries.len(), "created zip archive");
            self.upload_file(&archive_path, parent_id, Some(&zip_name)).await
        }
        .await;

        let staging_path = staging.path().to_path_buf();
        if let Err(e) = staging.close() {
            warn!(path = %staging_path.display(), error = %e, "could not remove temporary archive");
        }
        result
    }

    /// Upload several files, continuing past failures.
    pub async fn batch_upload<P: AsRef<Path>>(
        &self,
        paths: &[P],
        parent_id: Option<&str>,
    ) -> BatchReport<FileMetadata> {
        let mut report = BatchReport::new();
        let total = paths.len();

        for (idx, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            info!("[{}/{}] uploading {}", idx + 1, total, path.display());
            match self.upload_file(path, parent_id, None).await {
                Ok(metadata) => report.succeeded.push(metadata),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "upload failed");
                    report.failed.push((path.display().to_string(), e));
                }
            }
        }

        info!("uploaded {}/{} files", report.succeeded.len(), total);
        report
    }

    /// Download several files into `save_dir`, continuing past failures.
    pub async fn batch_download<P: AsRef<Path>>(
        &self,
        file_ids: &[String],
        save_dir: P,
    ) -> Result<BatchReport<PathBuf>> {
        let save_dir = save_dir.as_ref();
        tokio::fs::create_dir_all(save_dir).await?;

        let mut report = BatchReport::new();
        let total = file_ids.len();

        for (idx, file_id) in file_ids.iter().enumerate() {
            info!("[{}/{}] downloading {}", idx + 1, total, file_id);
            match self.download_file(file_id, save_dir, None).await {
                Ok(path) => report.succeeded.push(path),
                Err(e) => {
                    warn!(file_id = %file_id, error = %e, "download failed");
                    report.failed.push((file_id.clone(), e));
                }
            }
        }

        info!("downloaded {}/{} files", report.succeeded.len(), total);
        Ok(report)
    }

    /// Drop a `README.txt` with `content` into a folder.
    pub async fn create_readme_file(&self, folder_id: &str, content: &str) -> Result<FileMetadata> {
        self.upload_bytes("README.txt", content.as_bytes().to_vec(), Some(folder_id), "text/plain")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_is_aligned() {
        assert_eq!(align_chunk_size(1), CHUNK_ALIGNMENT);
        assert_eq!(align_chunk_size(0), CHUNK_ALIGNMENT);
        assert_eq!(align_chunk_size(CHUNK_ALIGNMENT), CHUNK_ALIGNMENT);
        assert_eq!(align_chunk_size(CHUNK_ALIGNMENT + 1), 2 * CHUNK_ALIGNMENT);
        assert_eq!(align_chunk_size(DEFAULT_CHUNK_SIZE), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn folder_link_fallback() {
        let folder = FileMetadata {
            id: "f1".into(),
            name: "Data".into(),
            mime_type: Some(FOLDER_MIME_TYPE.into()),
            size: None,
            created_time: None,
            modified_time: None,
            web_view_link: None,
            parents: vec![],
        };
        assert_eq!(
            DriveClient::link_for(&folder),
            "https://drive.google.com/drive/folders/f1"
        );
    }

    // HTTP-level behaviour is covered in tests/client_test.rs
}
