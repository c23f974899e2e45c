use std::mem;

use database::{Record, RecordSet};
use tokio::sync::mpsc;

use crate::{IngestError, RECORD_CHUNK_SIZE};

/// The bounded queue between the parsers and the SQL writer. The writer
/// drains it until every sender has dropped; that close is the pipeline's
/// end-of-stream marker.
pub type ChunkSender = mpsc::Sender<RecordSet>;

/// Accumulates records on a parser task and pushes full chunks into the
/// queue, blocking when the writer is behind. Call [`RecordChunker::finish`]
/// at the end of a file so the partial chunk is not lost.
pub struct RecordChunker {
    sender: ChunkSender,
    chunk: RecordSet,
}

impl RecordChunker {
    pub fn new(sender: ChunkSender) -> Self {
        Self {
            sender,
            chunk: RecordSet::new(),
        }
    }

    pub fn put(&mut self, record: Record) -> Result<(), IngestError> {
        self.chunk.push(record);
        if self.chunk.len() >= RECORD_CHUNK_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), IngestError> {
        let chunk = mem::take(&mut self.chunk);
        self.sender
            .blocking_send(chunk)
            .map_err(|_| IngestError::PipelineClosed)
    }

    pub fn finish(mut self) -> Result<(), IngestError> {
        if !self.chunk.is_empty() {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use database::data_model::Station;

    use super::*;

    fn station(i: usize) -> Record {
        Record::Station(Station {
            crs_code: format!("S{i:02}"),
            name: format!("Station {i}"),
        })
    }

    #[test]
    fn partial_chunks_flush_on_finish() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut chunker = RecordChunker::new(tx);
        for i in 0..3 {
            chunker.put(station(i)).unwrap();
        }
        chunker.finish().unwrap();

        let chunk = rx.blocking_recv().unwrap();
        assert_eq!(chunk.len(), 3);
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn full_queue_applies_backpressure() {
        let (tx, mut rx) = mpsc::channel(2);
        let producer = std::thread::spawn(move || {
            let mut chunker = RecordChunker::new(tx);
            // Three full chunks; the producer must block until the
            // consumer starts draining.
            for i in 0..RECORD_CHUNK_SIZE * 3 {
                chunker.put(station(i)).unwrap();
            }
            chunker.finish().unwrap();
        });

        let mut total = 0;
        while let Some(chunk) = rx.blocking_recv() {
            total += chunk.len();
        }
        producer.join().unwrap();
        assert_eq!(total, RECORD_CHUNK_SIZE * 3);
    }

    #[test]
    fn closed_queue_surfaces_as_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut chunker = RecordChunker::new(tx);
        for i in 0..RECORD_CHUNK_SIZE - 1 {
            chunker.put(station(i)).unwrap();
        }
        assert!(matches!(
            chunker.put(station(RECORD_CHUNK_SIZE)),
            Err(IngestError::PipelineClosed)
        ));
    }
}
