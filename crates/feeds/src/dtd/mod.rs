use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use database::{Record, Store, Table};

use crate::chunker::{ChunkSender, RecordChunker};
use crate::progress::Progress;
use crate::{Feed, FeedTasks, IngestError};

mod fares;
mod line;
mod timetable;

use line::{FixedLine, ParseError};
use timetable::TrainState;

/// Per-file parser state. A fresh one is built for every file, so parsing
/// is restartable; the MCA train machine additionally resets on every BS.
pub(crate) struct DtdState {
    today: NaiveDate,
    expired_flow_ids: HashSet<i32>,
    duplicate_trains: HashSet<String>,
    train: TrainState,
}

impl DtdState {
    fn new(today: NaiveDate) -> Self {
        Self {
            today,
            expired_flow_ids: HashSet::new(),
            duplicate_trains: HashSet::new(),
            train: TrainState::Idle,
        }
    }
}

/// Which parser handles a file, selected by the three letter suffix.
#[derive(Debug, Clone, Copy)]
enum DtdParser {
    Loc,
    Ffl,
    Fsc,
    Tty,
    Mca,
}

impl DtdParser {
    fn for_file(file_name: &str) -> Option<Self> {
        if file_name.len() < 3 {
            return None;
        }
        match file_name.get(file_name.len() - 3..)? {
            "LOC" => Some(DtdParser::Loc),
            "FFL" => Some(DtdParser::Ffl),
            "FSC" => Some(DtdParser::Fsc),
            "TTY" => Some(DtdParser::Tty),
            "MCA" => Some(DtdParser::Mca),
            _ => None,
        }
    }

    fn parse(
        self,
        line: &FixedLine,
        state: &mut DtdState,
    ) -> Result<Vec<Record>, ParseError> {
        match self {
            DtdParser::Loc => fares::records_for_loc_entry(line, state),
            DtdParser::Ffl => fares::records_for_ffl_entry(line, state),
            DtdParser::Fsc => fares::records_for_fsc_entry(line, state),
            DtdParser::Tty => fares::records_for_tty_entry(line, state),
            DtdParser::Mca => timetable::records_for_mca_entry(line, state),
        }
    }
}

/// Parses one extracted DTD file start to finish on a blocking worker,
/// pushing records through the chunk queue. Any malformed line aborts the
/// task with file and line context.
fn records_in_dtd_file(
    chunks: ChunkSender,
    parser: DtdParser,
    path: PathBuf,
    file_name: String,
    today: NaiveDate,
    progress: Progress,
) -> Result<(), IngestError> {
    let total_size = std::fs::metadata(&path)?.len();
    let file = std::fs::File::open(&path)?;

    let mut chunker = RecordChunker::new(chunks);
    let mut state = DtdState::new(today);
    let mut bytes_processed = 0u64;
    let mut last_report = Instant::now();

    for (index, read) in BufReader::new(file).lines().enumerate() {
        let text = read?;
        bytes_processed += text.len() as u64 + 1;
        if last_report.elapsed() >= Duration::from_secs(1) {
            progress.report(&file_name, bytes_processed, total_size);
            last_report = Instant::now();
        }

        // Trailing blanks are significant in a fixed-width record, so the
        // line goes in untrimmed; `lines` has already taken the newline.
        let line = FixedLine::new(&text);
        let records = parser.parse(&line, &mut state).map_err(|e| {
            IngestError::Parse {
                file: file_name.clone(),
                line: index + 1,
                message: e.to_string(),
            }
        })?;
        for record in records {
            chunker.put(record)?;
        }
    }

    progress.report(&file_name, total_size, total_size);
    chunker.finish()
}

/// Unpacks the downloaded archive in place and removes it, leaving the
/// fixed-width files beside it.
fn extract_archive(zip_path: &Path, target: &Path) -> Result<(), IngestError> {
    let file = std::fs::File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let out_path = target.join(relative);
        if entry.name().ends_with('/') {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out)?;
    }
    std::fs::remove_file(zip_path)?;
    Ok(())
}

/// Shared emit path of the two DTD feeds: extract the archive, then one
/// parse task per recognised file. The MCA state machine needs its file
/// processed by a single task, which this layout guarantees.
async fn emit_dtd_records(
    tasks: &mut FeedTasks<'_>,
    work_dir: &Path,
    file_name: &str,
    chunks: &ChunkSender,
    progress: &Progress,
) -> Result<(), IngestError> {
    let zip_path = work_dir.join(file_name);
    let target = work_dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract_archive(&zip_path, &target)).await??;

    let today = Local::now().date_naive();
    let mut entries = tokio::fs::read_dir(work_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(parser) = DtdParser::for_file(&name) else {
            continue;
        };

        let chunks = chunks.clone();
        let progress = progress.clone();
        let path = entry.path();
        tasks.spawn_blocking(move || {
            records_in_dtd_file(chunks, parser, path, name, today, progress)
        });
    }
    Ok(())
}

/// The fares feed: locations, clusters, flows, fares and ticket types.
pub struct FaresFeed;

#[async_trait]
impl Feed for FaresFeed {
    fn api_url(&self) -> &'static str {
        "2.0/fares"
    }

    fn file_name(&self) -> &'static str {
        "FARES.ZIP"
    }

    fn expiry_length(&self) -> u64 {
        60 * 60 * 24 * 365
    }

    fn owned_tables(&self) -> &'static [Table] {
        &[
            Table::LocationRecord,
            Table::StationCluster,
            Table::FlowRecord,
            Table::FareRecord,
            Table::TicketType,
        ]
    }

    async fn emit_records(
        &self,
        tasks: &mut FeedTasks<'_>,
        work_dir: &Path,
        chunks: &ChunkSender,
        progress: &Progress,
    ) -> Result<(), IngestError> {
        emit_dtd_records(tasks, work_dir, self.file_name(), chunks, progress).await
    }
}

/// The timetable feed: services, stops and timing points. Its post-ingest
/// hook rebuilds the station adjacency used by path search.
pub struct TimetableFeed;

#[async_trait]
impl Feed for TimetableFeed {
    fn api_url(&self) -> &'static str {
        "3.0/timetable"
    }

    fn file_name(&self) -> &'static str {
        "TIMETABLE.ZIP"
    }

    fn expiry_length(&self) -> u64 {
        60 * 60 * 24 * 365
    }

    fn owned_tables(&self) -> &'static [Table] {
        &[
            Table::TimetableLocation,
            Table::TimetableLink,
            Table::TrainTimetable,
            Table::Tiploc,
        ]
    }

    async fn emit_records(
        &self,
        tasks: &mut FeedTasks<'_>,
        work_dir: &Path,
        chunks: &ChunkSender,
        progress: &Progress,
    ) -> Result<(), IngestError> {
        emit_dtd_records(tasks, work_dir, self.file_name(), chunks, progress).await
    }

    async fn post_ingest_hook(&self, store: &Store) -> Result<(), IngestError> {
        log::info!("precomputing timetable links");
        database::queries::timetable::precompute_links(store.pool()).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Lays fields out at fixed byte offsets on a space-padded line, the
    /// way the feed files do.
    pub(crate) fn padded_line(fields: &[(usize, &str)]) -> String {
        let mut buffer = vec![b' '; 132];
        for (start, text) in fields {
            buffer[*start..*start + text.len()].copy_from_slice(text.as_bytes());
        }
        String::from_utf8(buffer).expect("fields are ascii")
    }

    pub(crate) fn state_for(today: NaiveDate) -> DtdState {
        DtdState::new(today)
    }

    #[test]
    fn parser_selection_uses_the_file_suffix() {
        assert!(matches!(
            DtdParser::for_file("RJFAF499.LOC"),
            Some(DtdParser::Loc)
        ));
        assert!(matches!(
            DtdParser::for_file("RJTTF293.MCA"),
            Some(DtdParser::Mca)
        ));
        assert!(DtdParser::for_file("RJFAF499.DAT").is_none());
        assert!(DtdParser::for_file("X").is_none());
    }
}
