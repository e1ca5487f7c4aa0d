use log::{debug, warn};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::Sender;

use super::params;
use crate::common::{Chunk, ReadPair};
use crate::fileformat::fastq::PairedFastqSource;
use crate::threading::{put_or_abort, spawn_guarded, AbortFlag, ErrorReport};

///////////////////////////////
/// Groups an iterator into numbered batches of `chunk_size`. The last batch may be smaller
pub struct Chunker<I> {
    inner: I,
    chunk_size: usize,
    next_seq: u64,
}

impl<I: Iterator> Chunker<I> {
    pub fn new(inner: I, chunk_size: usize) -> Chunker<I> {
        Chunker {
            inner,
            chunk_size: chunk_size.max(1),
            next_seq: 0,
        }
    }
}

impl<I: Iterator> Iterator for Chunker<I> {
    type Item = (u64, Vec<I::Item>);

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<I::Item> = self.inner.by_ref().take(self.chunk_size).collect();
        if batch.is_empty() {
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        Some((seq, batch))
    }
}

///////////////////////////////
/// Push the reads of `source` onto the chunk queue. Stops early, without error, once
/// the abort flag is raised. Returns the number of chunks queued
pub fn dispatch<I>(
    source: I,
    chunk_size: usize,
    chunk_tx: &Sender<Option<Chunk>>,
    abort: &AbortFlag,
    timeout: Duration,
) -> anyhow::Result<u64>
where
    I: Iterator<Item = anyhow::Result<ReadPair>>,
{
    itertools::process_results(source, |reads| {
        let mut n_chunks = 0;
        for (seq, records) in Chunker::new(reads, chunk_size) {
            if !put_or_abort(chunk_tx, Some(Chunk { seq, records }), abort, timeout) {
                warn!("shutdown flag was raised!");
                break;
            }
            n_chunks += 1;
        }
        n_chunks
    })
}

pub fn spawn_dispatcher(
    io: Arc<params::IO>,
    runtime: Arc<params::Runtime>,
    threading: Arc<params::Threading>,
    chunk_tx: Sender<Option<Chunk>>,
    abort: &AbortFlag,
    err_tx: &Sender<ErrorReport>,
) -> anyhow::Result<JoinHandle<Option<u64>>> {
    let thread_abort = abort.clone();
    spawn_guarded("dispatcher", abort, err_tx, move || {
        // the decompressing readers are not Send, so they are opened here
        let source = PairedFastqSource::open(&io.path_r1, io.path_r2.as_deref())?;
        let n_chunks = dispatch(
            source,
            runtime.chunk_size,
            &chunk_tx,
            &thread_abort,
            threading.queue_timeout,
        )?;
        debug!("dispatched {} chunks", n_chunks);
        Ok(n_chunks)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{bounded, unbounded};

    fn read(i: usize) -> ReadPair {
        ReadPair::single_end(format!("read_{}", i), b"ACGT".to_vec())
    }

    #[test]
    fn test_chunk_numbering() {
        let chunks: Vec<(u64, Vec<usize>)> = Chunker::new(0..10, 3).collect();
        assert_eq!(chunks.len(), 4);
        assert_eq!(
            chunks.iter().map(|(seq, _)| *seq).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(chunks[3].1, vec![9]);
        assert_eq!(chunks.iter().map(|(_, c)| c.len()).sum::<usize>(), 10);
    }

    #[test]
    fn test_chunk_exact_multiple_and_empty() {
        assert_eq!(Chunker::new(0..6, 3).count(), 2);
        assert_eq!(Chunker::new(0..0, 3).count(), 0);
    }

    #[test]
    fn test_dispatch_queues_all_reads() {
        let (tx, rx) = unbounded();
        let abort = AbortFlag::new();
        let source = (0..7).map(|i| Ok(read(i)));
        let n = dispatch(source, 2, &tx, &abort, Duration::from_millis(20)).unwrap();
        assert_eq!(n, 4);

        let chunks: Vec<Chunk> = rx.try_iter().flatten().collect();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].records[0].qname, "read_0");
        assert_eq!(chunks[3].seq, 3);
        assert_eq!(chunks[3].records.len(), 1);
    }

    #[test]
    fn test_dispatch_propagates_read_errors() {
        let (tx, _rx) = unbounded();
        let abort = AbortFlag::new();
        let source = vec![Ok(read(0)), Err(anyhow::anyhow!("truncated record"))].into_iter();
        let res = dispatch(source, 10, &tx, &abort, Duration::from_millis(20));
        assert!(res.is_err());
    }

    #[test]
    fn test_dispatch_stops_on_abort() {
        let (tx, _rx) = bounded(1);
        let abort = AbortFlag::new();
        abort.raise();
        let source = (0..100).map(|i| Ok(read(i)));
        let n = dispatch(source, 10, &tx, &abort, Duration::from_millis(20)).unwrap();
        assert_eq!(n, 0);
    }
}
