use std::path::Path;
use std::{error, fmt, io};

use async_trait::async_trait;
use database::{Store, Table};
use tokio::task::JoinSet;

pub mod chunker;
pub mod config;
pub mod download;
pub mod dtd;
pub mod kb;
pub mod progress;
pub mod update;

pub use chunker::{ChunkSender, RecordChunker};
pub use config::IngestConfig;
pub use progress::Progress;
pub use update::open_database;

/// Records accumulated by a parser before a chunk is handed to the writer.
pub const RECORD_CHUNK_SIZE: usize = 100_000;
/// Rows coalesced by the writer into a single transaction.
pub const SQL_BATCH_SIZE: usize = 1_000_000;
/// How many whole SQL batches may sit in the chunk queue before the
/// parsers block on it.
pub const MAX_QUEUED_BATCHES: usize = 5;
/// Chunk queue capacity; this is what bounds the pipeline's memory.
pub const MAX_QUEUE_SIZE: usize = SQL_BATCH_SIZE / RECORD_CHUNK_SIZE * MAX_QUEUED_BATCHES;

#[derive(Debug)]
pub enum IngestError {
    Io(io::Error),
    Http(reqwest::Error),
    Auth(String),
    Download {
        url: String,
        status: reqwest::StatusCode,
    },
    Zip(zip::result::ZipError),
    Xml(serde_xml_rs::Error),
    Parse {
        file: String,
        line: usize,
        message: String,
    },
    Malformed(String),
    Store(database::DatabaseError),
    Task(tokio::task::JoinError),
    PipelineClosed,
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IngestError::Io(e) => write!(f, "io error: {}", e),
            IngestError::Http(e) => write!(f, "http error: {}", e),
            IngestError::Auth(reason) => {
                write!(f, "authentication failed: {}", reason)
            }
            IngestError::Download { url, status } => {
                write!(f, "download of {} failed with status {}", url, status)
            }
            IngestError::Zip(e) => write!(f, "archive error: {}", e),
            IngestError::Xml(e) => write!(f, "xml error: {}", e),
            IngestError::Parse { file, line, message } => {
                write!(f, "malformed record at {}:{}: {}", file, line, message)
            }
            IngestError::Malformed(message) => {
                write!(f, "malformed feed: {}", message)
            }
            IngestError::Store(e) => write!(f, "{}", e),
            IngestError::Task(e) => write!(f, "worker failed: {}", e),
            IngestError::PipelineClosed => {
                write!(f, "record pipeline closed before end of stream")
            }
        }
    }
}

impl error::Error for IngestError {}

impl From<io::Error> for IngestError {
    fn from(e: io::Error) -> Self {
        IngestError::Io(e)
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(e: reqwest::Error) -> Self {
        IngestError::Http(e)
    }
}

impl From<zip::result::ZipError> for IngestError {
    fn from(e: zip::result::ZipError) -> Self {
        IngestError::Zip(e)
    }
}

impl From<serde_xml_rs::Error> for IngestError {
    fn from(e: serde_xml_rs::Error) -> Self {
        IngestError::Xml(e)
    }
}

impl From<database::DatabaseError> for IngestError {
    fn from(e: database::DatabaseError) -> Self {
        IngestError::Store(e)
    }
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(e: tokio::task::JoinError) -> Self {
        IngestError::Task(e)
    }
}

/// Handle a feed uses to launch its parse work on the shared worker set.
/// Task results are tagged with the owning feed so the orchestrator can
/// track per-feed success.
pub struct FeedTasks<'a> {
    set: &'a mut JoinSet<(usize, Result<(), IngestError>)>,
    feed_index: usize,
}

impl<'a> FeedTasks<'a> {
    pub(crate) fn new(
        set: &'a mut JoinSet<(usize, Result<(), IngestError>)>,
        feed_index: usize,
    ) -> Self {
        Self { set, feed_index }
    }

    /// Runs one parser to completion on the blocking pool. Parsers block
    /// on the chunk queue when it is full, so they must not run on the
    /// async workers.
    pub fn spawn_blocking<F>(&mut self, work: F)
    where
        F: FnOnce() -> Result<(), IngestError> + Send + 'static,
    {
        let feed_index = self.feed_index;
        self.set.spawn_blocking(move || (feed_index, work()));
    }
}

/// A source feed: identity, refresh horizon, owned tables and the parsing
/// work that turns its downloaded file into records.
#[async_trait]
pub trait Feed: Send + Sync {
    /// Stable identity, also the path under the static-feeds endpoint.
    fn api_url(&self) -> &'static str;

    /// The archive or document expected on disk after download.
    fn file_name(&self) -> &'static str;

    /// Seconds until a fresh copy of this feed goes stale.
    fn expiry_length(&self) -> u64;

    /// Tables wiped before this feed's replacement rows are inserted.
    fn owned_tables(&self) -> &'static [Table];

    /// Launches this feed's parse tasks; their completion is the feed's
    /// end of stream.
    async fn emit_records(
        &self,
        tasks: &mut FeedTasks<'_>,
        work_dir: &Path,
        chunks: &ChunkSender,
        progress: &Progress,
    ) -> Result<(), IngestError>;

    /// Runs after all of this feed's rows have been written.
    async fn post_ingest_hook(&self, _store: &Store) -> Result<(), IngestError> {
        Ok(())
    }
}

/// Every feed the pipeline knows about. Built at init; there is no runtime
/// plug-in loading.
pub fn registered_feeds() -> Vec<Box<dyn Feed>> {
    vec![
        Box::new(dtd::FaresFeed),
        Box::new(dtd::TimetableFeed),
        Box::new(kb::IncidentsFeed),
        Box::new(kb::StationsFeed),
    ]
}
