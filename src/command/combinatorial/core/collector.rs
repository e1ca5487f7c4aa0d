use log::{info, warn};
use std::cmp::Ordering;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender};
use min_max_heap::MinMaxHeap;

use super::worker::ResultBatch;
use crate::common::OutputRecord;
use crate::fileformat::output::Output;
use crate::runtime::Error;
use crate::threading::{spawn_guarded, AbortFlag, ErrorReport, QueueIter};

///////////////////////////////
/// Destination of the reassembled record stream
pub trait RecordSink {
    fn write_record(&mut self, record: &OutputRecord) -> anyhow::Result<()>;
}

impl RecordSink for Output {
    fn write_record(&mut self, record: &OutputRecord) -> anyhow::Result<()> {
        self.write(record)
    }
}

impl RecordSink for Vec<OutputRecord> {
    fn write_record(&mut self, record: &OutputRecord) -> anyhow::Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

// Heap entry, ordered by chunk number only
struct PendingChunk {
    seq: u64,
    records: Vec<OutputRecord>,
}

impl PartialEq for PendingChunk {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for PendingChunk {}

impl PartialOrd for PendingChunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingChunk {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seq.cmp(&other.seq)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectorReport {
    pub n_records: u64,
    /// Largest number of chunks held back at once
    pub max_pending: usize,
    /// Chunks still waiting for a predecessor at the end; only non-zero after an abort
    pub leftover_chunks: usize,
}

fn log_throughput(n_records: u64, t0: Instant) {
    let secs = t0.elapsed().as_secs_f64();
    info!(
        "processed {} reads in {:.1} seconds (average {:.0} reads/second).",
        n_records,
        secs,
        n_records as f64 / secs.max(1e-9)
    );
}

///////////////////////////////
/// Write result batches to `sink` in chunk order, whatever order they arrive in.
/// Runs until the end-of-stream marker or an abort
pub fn collect_ordered<S: RecordSink + ?Sized>(
    result_rx: &Receiver<Option<ResultBatch>>,
    sink: &mut S,
    abort: &AbortFlag,
    timeout: Duration,
    report_interval: Duration,
) -> anyhow::Result<CollectorReport> {
    let mut heap: MinMaxHeap<PendingChunk> = MinMaxHeap::new();
    let mut next_seq = 0u64;
    let mut report = CollectorReport::default();

    let t0 = Instant::now();
    let mut last_report = t0;
    for (seq, records) in QueueIter::new(result_rx, abort, timeout) {
        heap.push(PendingChunk { seq, records });
        report.max_pending = report.max_pending.max(heap.len());

        while heap.peek_min().is_some_and(|c| c.seq == next_seq) {
            let Some(chunk) = heap.pop_min() else {
                break;
            };
            for record in &chunk.records {
                sink.write_record(record)?;
            }
            report.n_records += chunk.records.len() as u64;
            next_seq += 1;
        }

        if last_report.elapsed() >= report_interval {
            log_throughput(report.n_records, t0);
            last_report = Instant::now();
        }
    }
    log_throughput(report.n_records, t0);

    report.leftover_chunks = heap.len();
    if report.leftover_chunks > 0 {
        if !abort.is_raised() {
            return Err(Error::invariant(
                "collector",
                format!(
                    "{} chunks remained on the heap, next expected chunk was {}",
                    report.leftover_chunks, next_seq
                ),
            )
            .into());
        }
        warn!(
            "{} chunks remained on the heap due to missing data upon abort.",
            report.leftover_chunks
        );
    }
    Ok(report)
}

///////////////////////////////
/// Collector thread. Owns the output and closes it once the stream ends
pub fn spawn_collector(
    mut output: Output,
    result_rx: Receiver<Option<ResultBatch>>,
    timeout: Duration,
    report_interval: Duration,
    abort: &AbortFlag,
    err_tx: &Sender<ErrorReport>,
) -> anyhow::Result<JoinHandle<Option<CollectorReport>>> {
    let thread_abort = abort.clone();
    spawn_guarded("collector", abort, err_tx, move || {
        let report = collect_ordered(
            &result_rx,
            &mut output,
            &thread_abort,
            timeout,
            report_interval,
        )?;
        if report.max_pending > 1 {
            info!("reorder buffer held at most {} chunks", report.max_pending);
        }
        output.close()?;
        Ok(report)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ReadPair;
    use crossbeam::channel::unbounded;

    const SHORT: Duration = Duration::from_millis(20);
    const NEVER: Duration = Duration::from_secs(3600);

    fn batch(seq: u64, n: usize) -> ResultBatch {
        let records = (0..n)
            .map(|i| {
                let read =
                    ReadPair::single_end(format!("chunk{}_read{}", seq, i), b"ACGT".to_vec());
                OutputRecord::unresolved(read, "NA")
            })
            .collect();
        (seq, records)
    }

    #[test]
    fn test_out_of_order_arrival() {
        let (tx, rx) = unbounded();
        for seq in [2, 0, 3, 1] {
            tx.send(Some(batch(seq, 2))).unwrap();
        }
        tx.send(None).unwrap();

        let abort = AbortFlag::new();
        let mut sink: Vec<OutputRecord> = Vec::new();
        let report = collect_ordered(&rx, &mut sink, &abort, SHORT, NEVER).unwrap();

        let names: Vec<&str> = sink.iter().map(|r| r.read.qname.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "chunk0_read0",
                "chunk0_read1",
                "chunk1_read0",
                "chunk1_read1",
                "chunk2_read0",
                "chunk2_read1",
                "chunk3_read0",
                "chunk3_read1",
            ]
        );
        assert_eq!(report.n_records, 8);
        assert_eq!(report.max_pending, 3);
        assert_eq!(report.leftover_chunks, 0);
    }

    #[test]
    fn test_gap_without_abort_is_an_error() {
        let (tx, rx) = unbounded();
        tx.send(Some(batch(0, 1))).unwrap();
        tx.send(Some(batch(2, 1))).unwrap();
        tx.send(None).unwrap();

        let abort = AbortFlag::new();
        let mut sink: Vec<OutputRecord> = Vec::new();
        assert!(collect_ordered(&rx, &mut sink, &abort, SHORT, NEVER).is_err());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_abort_keeps_partial_output() {
        let (tx, rx) = unbounded();
        tx.send(Some(batch(0, 3))).unwrap();
        tx.send(Some(batch(2, 3))).unwrap();

        let abort = AbortFlag::new();
        let raiser = abort.clone();
        let h = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            raiser.raise();
        });

        let mut sink: Vec<OutputRecord> = Vec::new();
        let report = collect_ordered(&rx, &mut sink, &abort, SHORT, NEVER).unwrap();
        h.join().unwrap();

        assert_eq!(sink.len(), 3);
        assert_eq!(report.leftover_chunks, 1);
    }
}
