use std::env;
use std::path::PathBuf;

pub const AUTHENTICATE_URL: &str = "https://opendata.nationalrail.co.uk/authenticate";
pub const STATIC_FEEDS_URL: &str =
    "https://opendata.nationalrail.co.uk/api/staticfeeds/";

/// Everything the ingest pipeline needs to know about its environment.
/// Credential storage and config files are the caller's concern; this is
/// plain data.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub database_path: PathBuf,
    pub username: String,
    pub password: String,
    pub authenticate_url: String,
    pub feed_base_url: String,
    /// Skip the network and copy feed files from `storage_dir` instead.
    pub disable_download: bool,
    /// Copy successfully downloaded files into `storage_dir`.
    pub backup_downloaded: bool,
    pub storage_dir: PathBuf,
}

impl IngestConfig {
    pub fn new<P, S>(database_path: P, username: S, password: S) -> Self
    where
        P: Into<PathBuf>,
        S: Into<String>,
    {
        Self {
            database_path: database_path.into(),
            username: username.into(),
            password: password.into(),
            authenticate_url: AUTHENTICATE_URL.to_owned(),
            feed_base_url: STATIC_FEEDS_URL.to_owned(),
            disable_download: false,
            backup_downloaded: false,
            storage_dir: PathBuf::from("./feed_storage"),
        }
    }

    /// Offline configuration: every feed comes from a local directory of
    /// previously downloaded files.
    pub fn local_storage<P>(database_path: P, storage_dir: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            database_path: database_path.into(),
            username: String::new(),
            password: String::new(),
            authenticate_url: AUTHENTICATE_URL.to_owned(),
            feed_base_url: STATIC_FEEDS_URL.to_owned(),
            disable_download: true,
            backup_downloaded: false,
            storage_dir: storage_dir.into(),
        }
    }

    pub fn from_env() -> Option<Self> {
        let database_path = env::var("KNOWLEDGE_DATABASE_PATH").ok()?;
        let username = env::var("OPENDATA_USERNAME").ok()?;
        let password = env::var("OPENDATA_PASSWORD").ok()?;
        let mut config = Self::new(database_path, username, password);
        if let Ok(storage_dir) = env::var("FEED_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(storage_dir);
        }
        if let Ok(value) = env::var("DISABLE_FEED_DOWNLOAD") {
            config.disable_download = value == "1" || value == "true";
        }
        if let Ok(value) = env::var("BACKUP_FEEDS_TO_STORAGE") {
            config.backup_downloaded = value == "1" || value == "true";
        }
        Some(config)
    }
}
