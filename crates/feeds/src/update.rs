use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use database::{queries, RecordSet, Store};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::download::{download_feed_file, opendata_token};
use crate::progress::Progress;
use crate::{
    registered_feeds, Feed, FeedTasks, IngestConfig, IngestError, MAX_QUEUE_SIZE,
    RECORD_CHUNK_SIZE, SQL_BATCH_SIZE,
};

/// At most one refresh per process; a second opener sees the flag and
/// returns with whatever the store currently holds.
static INGESTING: AtomicBool = AtomicBool::new(false);

/// Opens the store and refreshes every outdated feed before returning it.
pub async fn open_database(config: &IngestConfig) -> Result<Store, IngestError> {
    let store = Store::open(&config.database_path).await?;
    update_database(&store, config).await?;
    Ok(store)
}

/// Feeds whose recorded expiry has passed or was never written.
pub async fn outdated_feeds(store: &Store) -> Result<Vec<Box<dyn Feed>>, IngestError> {
    let now = Utc::now().timestamp();
    let unexpired = queries::expiry::unexpired_api_urls(store.pool(), now).await?;
    Ok(registered_feeds()
        .into_iter()
        .filter(|feed| !unexpired.contains(feed.api_url()))
        .collect())
}

pub async fn update_database(
    store: &Store,
    config: &IngestConfig,
) -> Result<(), IngestError> {
    let feeds = outdated_feeds(store).await?;
    if feeds.is_empty() {
        return Ok(());
    }
    if INGESTING.swap(true, Ordering::SeqCst) {
        log::warn!("a feed refresh is already in flight, skipping");
        return Ok(());
    }

    let names: Vec<&str> = feeds.iter().map(|feed| feed.api_url()).collect();
    log::info!("updating feeds: {}", names.join(", "));

    let result = update_feeds(store, config, &feeds).await;
    INGESTING.store(false, Ordering::SeqCst);
    match &result {
        Ok(()) => log::info!("feed update finished"),
        Err(e) => log::error!("feed update failed: {}", e),
    }
    result
}

async fn update_feeds(
    store: &Store,
    config: &IngestConfig,
    feeds: &[Box<dyn Feed>],
) -> Result<(), IngestError> {
    let http = reqwest::Client::new();
    let token = if config.disable_download {
        String::new()
    } else {
        opendata_token(&http, config).await?
    };
    let progress = Progress::new();
    let data_dir = tempfile::tempdir()?;

    // Each feed's tables are cleared up front, alongside the downloads;
    // a crash mid-ingest leaves the feed empty and still outdated, so the
    // next open retries it.
    for feed in feeds {
        for table in feed.owned_tables() {
            store.wipe(*table).await?;
        }
    }

    let mut downloads: JoinSet<(usize, Result<std::path::PathBuf, IngestError>)> =
        JoinSet::new();
    for (index, feed) in feeds.iter().enumerate() {
        let task = download_feed_file(
            http.clone(),
            token.clone(),
            data_dir.path().to_path_buf(),
            feed.api_url(),
            feed.file_name(),
            progress.clone(),
            config.clone(),
        );
        downloads.spawn(async move { (index, task.await) });
    }

    // Parse tasks start per feed as soon as its download lands. Dropping
    // the local sender afterwards makes the channel close once the last
    // parser is done, which is the writer's end-of-stream signal.
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<RecordSet>(MAX_QUEUE_SIZE);
    let mut parse_tasks: JoinSet<(usize, Result<(), IngestError>)> = JoinSet::new();
    let mut feed_errors: Vec<Option<IngestError>> =
        feeds.iter().map(|_| None).collect();

    while let Some(joined) = downloads.join_next().await {
        let (index, result) = joined?;
        let feed = &feeds[index];
        match result {
            Ok(path) => {
                let mut tasks = FeedTasks::new(&mut parse_tasks, index);
                if let Err(e) = feed
                    .emit_records(&mut tasks, &path, &chunk_tx, &progress)
                    .await
                {
                    log::error!("feed {} failed to start: {}", feed.api_url(), e);
                    feed_errors[index] = Some(e);
                }
            }
            Err(e) => {
                // A failed download only loses this feed; the others
                // carry on and this one retries on the next open.
                log::error!("feed {} failed to download: {}", feed.api_url(), e);
                feed_errors[index] = Some(e);
            }
        }
    }
    drop(chunk_tx);

    // All SQL stays on this task: drain the queue, coalescing chunks into
    // full batches per commit.
    let mut batch = RecordSet::new();
    let mut written = 0usize;
    while let Some(chunk) = chunk_rx.recv().await {
        batch.merge(chunk);
        report_write_progress(&progress, written, batch.len(), chunk_rx.len());
        if batch.len() < SQL_BATCH_SIZE {
            continue;
        }
        let full = mem::take(&mut batch);
        written += full.len();
        store.insert_records(full).await?;
        report_write_progress(&progress, written, 0, chunk_rx.len());
    }
    if !batch.is_empty() {
        let rest = mem::take(&mut batch);
        written += rest.len();
        store.insert_records(rest).await?;
    }
    report_write_progress(&progress, written, 0, 0);

    while let Some(joined) = parse_tasks.join_next().await {
        let (index, result) = joined?;
        if let Err(e) = result {
            log::error!("feed {} failed to parse: {}", feeds[index].api_url(), e);
            if feed_errors[index].is_none() {
                feed_errors[index] = Some(e);
            }
        }
    }

    // Hooks and expiry stamps only for feeds that made it all the way;
    // anything that failed keeps its old expiry and is retried next open.
    let now = Utc::now().timestamp();
    for (index, feed) in feeds.iter().enumerate() {
        if feed_errors[index].is_some() {
            continue;
        }
        feed.post_ingest_hook(store).await?;
        queries::expiry::set_expiry(
            store.pool(),
            feed.api_url(),
            now + feed.expiry_length() as i64,
        )
        .await?;
    }

    data_dir.close()?;
    match feed_errors.into_iter().flatten().next() {
        Some(first) => Err(first),
        None => Ok(()),
    }
}

fn report_write_progress(
    progress: &Progress,
    written: usize,
    batched: usize,
    queued_chunks: usize,
) {
    progress.report(
        "Writing to disk",
        written as u64,
        (written + batched + queued_chunks * RECORD_CHUNK_SIZE) as u64,
    );
}
