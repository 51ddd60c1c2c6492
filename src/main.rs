//! gdrive-toolkit CLI - Google Drive operations from the command line.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use glob::glob;
use tracing_subscriber::EnvFilter;

use gdrive_toolkit::client::Progress;
use gdrive_toolkit::config::{
    DEFAULT_CLIENT_SECRETS_FILE, DEFAULT_CREDENTIALS_FILE, ENV_ACCESS_TOKEN,
};
use gdrive_toolkit::utils::{format_eta, render_progress_bar};
use gdrive_toolkit::{
    detect_environment, extract_id, format_size, quick_connect, AuthConfig, DriveClient,
    Environment, FileMetadata, Grantee, Role, SearchQuery,
};

/// Google Drive operations from the command line.
///
/// Examples:
///   gdrive-toolkit upload myfile.txt
///   gdrive-toolkit download <FILE_ID> --output ./downloads/
///   gdrive-toolkit search report
#[derive(Parser)]
#[command(name = "gdrive-toolkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Saved OAuth credentials (local environment).
    #[arg(long, env = "GDRIVE_CREDENTIALS_FILE", default_value = DEFAULT_CREDENTIALS_FILE, global = true)]
    credentials_file: PathBuf,

    /// OAuth client JSON from Google Cloud Console (local environment).
    #[arg(long, env = "GDRIVE_CLIENT_SECRETS", default_value = DEFAULT_CLIENT_SECRETS_FILE, global = true)]
    client_secrets: PathBuf,

    /// Force the authentication environment: colab, kaggle or local.
    #[arg(long = "env", global = true)]
    force_env: Option<Environment>,

    /// OAuth client ID for Kaggle (falls back to GDRIVE_CLIENT_ID).
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// OAuth client secret for Kaggle (falls back to GDRIVE_CLIENT_SECRET).
    #[arg(long, global = true)]
    client_secret: Option<String>,

    /// Work inside this Shared Drive.
    #[arg(long, env = "GDRIVE_SHARED_DRIVE_ID", global = true)]
    drive_id: Option<String>,

    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files to Google Drive.
    Upload {
        /// Files to upload (supports glob patterns like *.csv, file_{1,2,3}.txt).
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Folder name, URL or ID to upload to; created if no folder has that name.
        #[arg(long, short = 'f')]
        folder: Option<String>,

        /// Custom name for the uploaded file (single file only).
        #[arg(long, short = 'n')]
        name: Option<String>,

        /// Share with anyone (read-only) after upload.
        #[arg(long)]
        share: bool,

        /// Replace a file with the same name in the destination folder.
        #[arg(long)]
        overwrite: bool,

        /// Disable progress display.
        #[arg(long)]
        no_progress: bool,
    },

    /// Download files from Google Drive.
    Download {
        /// File URLs or IDs.
        #[arg(required = true)]
        files: Vec<String>,

        /// Output path (file or directory).
        #[arg(long, short = 'o', default_value = ".")]
        output: PathBuf,

        /// Disable progress display.
        #[arg(long)]
        no_progress: bool,
    },

    /// Search files in Google Drive.
    Search {
        /// Text the file name contains.
        query: Option<String>,

        /// Search in a specific folder (URL or ID).
        #[arg(long, short = 'f')]
        folder: Option<String>,

        /// Filter by MIME type (e.g., text/csv).
        #[arg(long = "type", short = 't')]
        mime_type: Option<String>,

        /// Extra raw Drive query, ANDed with the other filters.
        #[arg(long, short = 'q')]
        raw: Option<String>,

        /// Include trashed files.
        #[arg(long)]
        trashed: bool,

        /// Show type, size, dates and link for each file.
        #[arg(long)]
        long: bool,

        /// Maximum results.
        #[arg(long, short = 'l', default_value_t = 20)]
        limit: usize,
    },

    /// Create a folder; `a/b/c` creates the whole path.
    Mkdir {
        /// Folder name or slash-separated path.
        name: String,

        /// Parent folder URL or ID (default: root).
        #[arg(long, short = 'p')]
        parent: Option<String>,
    },

    /// List files in a folder.
    Ls {
        /// Folder URL or ID (default: root).
        folder: Option<String>,

        /// Maximum results.
        #[arg(long, short = 'l', default_value_t = 50)]
        limit: usize,
    },

    /// Delete a file or folder.
    Delete {
        /// File or folder URL or ID.
        file: String,

        /// Skip confirmation.
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Share a file and print its link.
    Share {
        /// File URL or ID.
        file: String,

        /// Permission level: reader, writer or commenter.
        #[arg(long, short = 'r', default_value = "reader")]
        role: Role,

        /// Share with this user instead of anyone with the link.
        #[arg(long, conflicts_with = "domain")]
        email: Option<String>,

        /// Share with everyone in this domain.
        #[arg(long)]
        domain: Option<String>,
    },

    /// Zip a local folder and upload the archive.
    ZipUpload {
        /// Local folder to zip.
        folder_path: PathBuf,

        /// Custom zip name.
        #[arg(long, short = 'n')]
        name: Option<String>,

        /// Destination folder URL or ID.
        #[arg(long, short = 'f')]
        folder: Option<String>,
    },

    /// Copy a file.
    Cp {
        /// File URL or ID.
        file: String,

        /// Name of the copy (default: "Copy of <name>").
        #[arg(long, short = 'n')]
        name: Option<String>,

        /// Destination folder URL or ID.
        #[arg(long, short = 't')]
        to: Option<String>,
    },

    /// Move a file to another folder.
    Mv {
        /// File URL or ID.
        file: String,

        /// Destination folder URL or ID.
        #[arg(long, short = 't')]
        to: String,
    },

    /// Total size of a folder, recursively.
    Du {
        /// Folder URL or ID (default: root).
        folder: Option<String>,
    },

    /// Print the full Drive path of a file.
    Path {
        /// File URL or ID.
        file: String,
    },

    /// Show environment and credential info.
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Info = cli.command {
        print_info(&cli);
        return Ok(());
    }

    let config = AuthConfig {
        credentials_file: cli.credentials_file.clone(),
        client_secrets_file: cli.client_secrets.clone(),
        force_env: cli.force_env,
        client_id: cli.client_id.clone(),
        client_secret: cli.client_secret.clone(),
    };

    eprintln!("Authenticating...");
    let auth = quick_connect(&config)
        .await
        .context("Authentication failed")?;

    let mut client = DriveClient::new(auth);
    if let Some(drive_id) = &cli.drive_id {
        client = client.with_shared_drive(extract_id(drive_id)?);
    }

    match cli.command {
        Commands::Upload {
            patterns,
            folder,
            name,
            share,
            overwrite,
            no_progress,
        } => {
            let files_to_upload = expand_patterns(&patterns)?;
            if name.is_some() && files_to_upload.len() > 1 {
                bail!("--name can only be used when uploading a single file");
            }

            let folder_id = match folder {
                Some(folder) => Some(
                    client
                        .resolve_folder(&folder)
                        .await
                        .with_context(|| format!("Failed to resolve folder: {}", folder))?,
                ),
                None => None,
            };

            let options = UploadOptions {
                name,
                share,
                overwrite,
                no_progress,
            };
            println!("Uploading {} file(s)...", files_to_upload.len());
            let failures = upload_all(&client, &files_to_upload, folder_id.as_deref(), &options).await;

            if failures > 0 {
                bail!("{} of {} upload(s) failed", failures, files_to_upload.len());
            }
            println!("Done.");
        }

        Commands::Download {
            files,
            output,
            no_progress,
        } => {
            let ids = files
                .iter()
                .map(|f| extract_id(f).with_context(|| format!("Invalid file URL or ID: {}", f)))
                .collect::<Result<Vec<_>>>()?;

            if ids.len() == 1 {
                let printer = progress_printer();
                let progress: Progress = if no_progress { None } else { Some(&printer) };
                let path = client
                    .download_file(&ids[0], &output, progress)
                    .await
                    .with_context(|| format!("Failed to download file: {}", ids[0]))?;
                println!("Downloaded to: {}", path.display());
            } else {
                let report = client.batch_download(&ids, &output).await?;
                for path in &report.succeeded {
                    println!("Downloaded to: {}", path.display());
                }
                for (id, e) in &report.failed {
                    eprintln!("FAILED {}: {}", id, e);
                }
                println!(
                    "Downloaded {}/{} files",
                    report.succeeded.len(),
                    report.total()
                );
                if !report.failed.is_empty() {
                    bail!("{} download(s) failed", report.failed.len());
                }
            }
        }

        Commands::Search {
            query,
            folder,
            mime_type,
            raw,
            trashed,
            long,
            limit,
        } => {
            let mut search = SearchQuery::new().include_trashed(trashed).max_results(limit);
            if let Some(q) = query {
                search = search.name_contains(q);
            }
            if let Some(f) = folder {
                search = search.in_folder(extract_id(&f)?);
            }
            if let Some(m) = mime_type {
                search = search.mime_type(m);
            }
            if let Some(r) = raw {
                search = search.raw(r);
            }

            let results = client.search_files(&search).await?;
            print_file_list(&results, long);
        }

        Commands::Mkdir { name, parent } => {
            let parent_id = parent.as_deref().map(extract_id).transpose()?;
            if name.contains('/') {
                let folder_id = client.create_folder_path(&name, parent_id.as_deref()).await?;
                println!("Created! Folder ID: {}", folder_id);
            } else {
                let folder = client.create_folder(&name, parent_id.as_deref()).await?;
                println!("Created! Folder ID: {}", folder.id);
            }
        }

        Commands::Ls { folder, limit } => {
            let folder_id = match folder {
                Some(f) => extract_id(&f).with_context(|| format!("Invalid folder URL or ID: {}", f))?,
                None => client.drive_id().unwrap_or("root").to_string(),
            };

            let files = client
                .list_folder(&folder_id, limit)
                .await
                .with_context(|| format!("Failed to list files in folder: {}", folder_id))?;

            if files.is_empty() {
                println!("Empty folder.");
            } else {
                println!("{:<44} {:>10} {:<30} {}", "ID", "SIZE", "TYPE", "NAME");
                println!("{}", "-".repeat(100));
                for file in files {
                    let marker = if file.is_folder() { "/" } else { "" };
                    println!("{}{}", file, marker);
                }
            }
        }

        Commands::Delete { file, yes } => {
            let file_id = extract_id(&file)?;
            let metadata = client.get_file(&file_id).await?;

            if !yes {
                let prompt = if metadata.is_folder() {
                    format!("Delete folder '{}' and ALL its contents? [y/N]: ", metadata.name)
                } else {
                    format!("Delete '{}' (ID: {})? [y/N]: ", metadata.name, metadata.id)
                };
                if !confirm(&prompt)? {
                    println!("Deletion cancelled");
                    return Ok(());
                }
            }

            let deleted = client.delete_file(&file_id).await?;
            println!("Deleted '{}'", deleted.name);
        }

        Commands::Share {
            file,
            role,
            email,
            domain,
        } => {
            let file_id = extract_id(&file)?;
            let grantee = match (email, domain) {
                (Some(email), _) => Grantee::User(email),
                (None, Some(domain)) => Grantee::Domain(domain),
                (None, None) => Grantee::Anyone,
            };
            let link = client.share(&file_id, role, &grantee).await?;
            println!("Shareable link ({}):", role);
            println!("{}", link);
        }

        Commands::ZipUpload {
            folder_path,
            name,
            folder,
        } => {
            let parent_id = folder.as_deref().map(extract_id).transpose()?;
            println!("Zipping and uploading: {}", folder_path.display());
            let metadata = client
                .zip_and_upload(&folder_path, parent_id.as_deref(), name.as_deref())
                .await?;
            println!("Done! {} (ID: {})", metadata.name, metadata.id);
        }

        Commands::Cp { file, name, to } => {
            let file_id = extract_id(&file)?;
            let parent_id = to.as_deref().map(extract_id).transpose()?;
            let copied = client
                .copy_file(&file_id, name.as_deref(), parent_id.as_deref())
                .await?;
            println!("Copied to '{}' (ID: {})", copied.name, copied.id);
        }

        Commands::Mv { file, to } => {
            let file_id = extract_id(&file)?;
            let parent_id = extract_id(&to)?;
            let moved = client.move_file(&file_id, &parent_id).await?;
            println!("Moved '{}'", moved.name);
        }

        Commands::Du { folder } => {
            let folder_id = match folder {
                Some(f) => extract_id(&f)?,
                None => client.drive_id().unwrap_or("root").to_string(),
            };
            let total = client.get_folder_size(&folder_id).await?;
            println!("{}\t{}", format_size(total), folder_id);
        }

        Commands::Path { file } => {
            let file_id = extract_id(&file)?;
            println!("{}", client.get_file_path(&file_id).await?);
        }

        Commands::Info => unreachable!("handled before authentication"),
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "gdrive_toolkit=info",
        _ => "gdrive_toolkit=debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn print_info(cli: &Cli) {
    let env = cli.force_env.unwrap_or_else(detect_environment);

    println!("{}", "=".repeat(60));
    println!("gdrive-toolkit - Information");
    println!("{}", "=".repeat(60));
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Environment: {}", env.as_str().to_uppercase());
    if std::env::var_os(ENV_ACCESS_TOKEN).is_some() {
        println!("Access token: set via {}", ENV_ACCESS_TOKEN);
    }

    if env == Environment::Local {
        let mark = |p: &Path| if p.exists() { "✓" } else { "✗" };
        println!("Credentials file: {} {}", mark(cli.credentials_file.as_path()), cli.credentials_file.display());
        println!("Client secrets: {} {}", mark(cli.client_secrets.as_path()), cli.client_secrets.display());

        if !cli.client_secrets.exists() {
            println!();
            println!("{} not found!", cli.client_secrets.display());
            println!("Create an OAuth 2.0 Desktop client at https://console.cloud.google.com/");
            println!("and save its JSON as {}", cli.client_secrets.display());
        }
    }
    println!("{}", "=".repeat(60));
}

fn print_file_list(files: &[FileMetadata], long: bool) {
    if files.is_empty() {
        println!("No files found.");
        return;
    }

    println!("{}", "=".repeat(80));
    println!("Found {} file(s)", files.len());
    println!("{}", "=".repeat(80));
    println!();

    for (i, file) in files.iter().enumerate() {
        println!("{}. {}", i + 1, file.name);
        println!("   ID: {}", file.id);
        if long {
            let size = file.size.map(format_size).unwrap_or_else(|| "N/A".to_string());
            println!("   Type: {}", file.mime_type.as_deref().unwrap_or("unknown"));
            println!("   Size: {}", size);
            println!("   Created: {}", file.created_time.as_deref().unwrap_or("N/A"));
            println!("   Modified: {}", file.modified_time.as_deref().unwrap_or("N/A"));
            println!("   Link: {}", file.web_view_link.as_deref().unwrap_or("N/A"));
        }
        println!();
    }
}

fn progress_printer() -> impl Fn(u64, u64) + Send + Sync {
    let started = Instant::now();
    move |current, total| {
        let elapsed = started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 { current as f64 / elapsed } else { 0.0 };
        let eta = if rate > 0.0 {
            total.saturating_sub(current) as f64 / rate
        } else {
            f64::INFINITY
        };
        eprint!(
            "\r  {} {} / {} ETA {}   ",
            render_progress_bar(current, total, 30),
            format_size(current),
            format_size(total),
            format_eta(eta)
        );
        if current >= total {
            eprintln!();
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

struct UploadOptions {
    name: Option<String>,
    share: bool,
    overwrite: bool,
    no_progress: bool,
}

/// Upload each file, reporting per-file results. Returns the number of files
/// whose upload or sharing failed.
async fn upload_all(
    client: &DriveClient,
    files: &[PathBuf],
    folder_id: Option<&str>,
    options: &UploadOptions,
) -> usize {
    let mut failures = 0;

    for (idx, file_path) in files.iter().enumerate() {
        let filename = options.name.clone().unwrap_or_else(|| {
            file_path.file_name().unwrap_or_default().to_string_lossy().into_owned()
        });
        println!("[{}/{}] {}", idx + 1, files.len(), filename);

        let printer = progress_printer();
        let progress: Progress = if options.no_progress { None } else { Some(&printer) };

        let uploaded = if options.overwrite {
            client
                .upload_replacing(file_path, folder_id, options.name.as_deref(), progress)
                .await
        } else {
            client
                .upload_file_with_progress(file_path, folder_id, options.name.as_deref(), progress)
                .await
        };

        let metadata = match uploaded {
            Ok(metadata) => metadata,
            Err(e) => {
                failures += 1;
                eprintln!("  FAILED: {}", e);
                continue;
            }
        };
        println!("  OK ({})", metadata.id);

        if options.share {
            match client.share_anyone_reader(&metadata.id).await {
                Ok(link) => println!("  Link: {}", link),
                Err(e) => {
                    failures += 1;
                    eprintln!("  SHARING FAILED: {}", e);
                }
            }
        }
    }

    failures
}

/// Expand glob and brace patterns into a sorted, de-duplicated file list.
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        for expanded_pattern in expand_braces(pattern) {
            let matches: Vec<PathBuf> = glob(&expanded_pattern)
                .with_context(|| format!("Invalid glob pattern: {}", expanded_pattern))?
                .filter_map(|r| r.ok())
                .filter(|p| p.is_file())
                .collect();

            if matches.is_empty() {
                let path = PathBuf::from(&expanded_pattern);
                if path.is_file() {
                    files.push(path);
                } else {
                    eprintln!("Warning: No files matched pattern: {}", expanded_pattern);
                }
            } else {
                files.extend(matches);
            }
        }
    }

    files.sort();
    files.dedup();

    if files.is_empty() {
        bail!("No files to upload");
    }
    Ok(files)
}

/// Expand brace patterns like file_{1,2,3}.txt into multiple patterns.
fn expand_braces(pattern: &str) -> Vec<String> {
    if let Some(start) = pattern.find('{') {
        if let Some(end) = pattern[start..].find('}') {
            let end = start + end;
            let prefix = &pattern[..start];
            let suffix = &pattern[end + 1..];
            let alternatives = &pattern[start + 1..end];

            return alternatives
                .split(',')
                .flat_map(|alt| {
                    let expanded = format!("{}{}{}", prefix, alt.trim(), suffix);
                    expand_braces(&expanded)
                })
                .collect();
        }
    }

    vec![pattern.to_string()]
}
