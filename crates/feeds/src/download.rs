use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::{IngestConfig, IngestError, Progress};

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

/// Obtains a bearer token from the portal's form-encoded login flow.
pub async fn opendata_token(
    http: &reqwest::Client,
    config: &IngestConfig,
) -> Result<String, IngestError> {
    let response = http
        .post(&config.authenticate_url)
        .form(&[
            ("username", config.username.as_str()),
            ("password", config.password.as_str()),
        ])
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(IngestError::Auth(format!(
            "token endpoint returned {}",
            response.status()
        )));
    }
    let auth: AuthResponse = response
        .json()
        .await
        .map_err(|_| IngestError::Auth("malformed token response".to_owned()))?;
    Ok(auth.token)
}

/// Streams one feed file into its working directory, reporting progress
/// against Content-Length about once a second. With downloads disabled the
/// file is copied from local storage instead. Returns the working
/// directory holding the file.
pub async fn download_feed_file(
    http: reqwest::Client,
    token: String,
    data_path: PathBuf,
    api_url: &'static str,
    file_name: &'static str,
    progress: Progress,
    config: IngestConfig,
) -> Result<PathBuf, IngestError> {
    let working_path = data_path.join(api_url.replace('/', "_"));
    tokio::fs::create_dir_all(&working_path).await?;
    let target = working_path.join(file_name);

    if config.disable_download {
        tokio::fs::copy(config.storage_dir.join(file_name), &target).await?;
        return Ok(working_path);
    }

    let url = format!("{}{}", config.feed_base_url, api_url);
    log::info!("downloading {}", url);
    let response = http.get(&url).header("X-Auth-Token", token).send().await?;
    if !response.status().is_success() {
        return Err(IngestError::Download {
            url,
            status: response.status(),
        });
    }

    let length = response.content_length().unwrap_or(0);
    let mut file = tokio::fs::File::create(&target).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded = 0u64;
    let mut last_report = Instant::now();
    while let Some(chunk) = stream.next().await {
        // A mid-stream failure means a partial file; the error stops this
        // feed before the parse phase can see it.
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        if last_report.elapsed() >= Duration::from_secs(1) {
            progress.report(file_name, downloaded, length);
            last_report = Instant::now();
        }
    }
    file.flush().await?;
    progress.report(file_name, length, length);

    if config.backup_downloaded {
        backup_feed_file(&target, file_name, &config).await?;
    }
    Ok(working_path)
}

async fn backup_feed_file(
    target: &Path,
    file_name: &str,
    config: &IngestConfig,
) -> Result<(), IngestError> {
    tokio::fs::create_dir_all(&config.storage_dir).await?;
    tokio::fs::copy(target, config.storage_dir.join(file_name)).await?;
    Ok(())
}
