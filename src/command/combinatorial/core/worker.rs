use log::debug;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{Receiver, Sender};

use super::params;
use crate::barcode::{AnchorAligner, CacheSnapshot, Resolution, TieBreaker};
use crate::common::{Chunk, OutputRecord, ReadPair, Tally, ANCHOR_FLANK};
use crate::threading::{put_or_abort, spawn_guarded, AbortFlag, ErrorReport, QueueIter};

pub type ResultBatch = (u64, Vec<OutputRecord>);

///////////////////////////////
/// Everything a worker publishes when its input is exhausted
#[derive(Clone, Debug, Default)]
pub struct WorkerReport {
    pub tally: Tally,
    pub bc1: CacheSnapshot,
    pub bc2: CacheSnapshot,
}

impl WorkerReport {
    pub fn merge(&mut self, other: WorkerReport) {
        self.tally.merge(&other.tally);
        self.bc1.merge(other.bc1);
        self.bc2.merge(other.bc2);
    }
}

///////////////////////////////
/// Per-thread barcode resolver. Owns private tie-breakers, so no state is shared
pub struct Worker {
    anchor: AnchorAligner,
    bc1: TieBreaker,
    bc2: TieBreaker,
    tally: Tally,
    threshold: f64,
    na: String,
}

impl Worker {
    pub fn new(bc1: TieBreaker, bc2: TieBreaker, runtime: &params::Runtime) -> Worker {
        Worker {
            anchor: AnchorAligner::new(&runtime.opseq, runtime.min_opseq_score),
            bc1,
            bc2,
            tally: Tally::new(),
            threshold: runtime.threshold,
            na: runtime.na.clone(),
        }
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn process_read(&mut self, read: ReadPair) -> OutputRecord {
        self.tally.incr("total");
        let mut record = OutputRecord::unresolved(read, &self.na);

        let Some(aln) = self.anchor.locate(&record.read.r1) else {
            self.tally.incr("opseq_broken");
            return record;
        };

        let r1 = &record.read.r1;
        let qs = aln.query_start;
        let qe = aln.query_end;

        // deletion hypothesis first, then the primer overhang eating into BC1
        let mut bc1_windows: Vec<&[u8]> = vec![&r1[..qs]];
        if aln.start_gap_length > 0 {
            bc1_windows.push(&r1[..qs - aln.start_gap_length]);
        }
        let (bc1_res, i1) = self.bc1.resolve_choices(&bc1_windows);
        let bc1_raw = bc1_windows[i1].to_vec();

        let mut bc2_windows: Vec<&[u8]> = vec![&r1[qe..], &r1[qe - 1..]];
        let eg = aln.end_gap_length;
        if eg > 0 && qe + eg + ANCHOR_FLANK <= r1.len() {
            bc2_windows.push(&r1[qe + eg..]);
        }
        let (bc2_res, i2) = self.bc2.resolve_choices(&bc2_windows);
        let bc2_raw = bc2_windows[i2].to_vec();

        let bc1_name = self.classify("BC1", bc1_res);
        let bc2_name = self.classify("BC2", bc2_res);

        record.bc1 = bc1_raw;
        record.bc2 = bc2_raw;
        if let (Some(_), Some(_)) = (&bc1_name, &bc2_name) {
            record.assigned = true;
            self.tally.incr("called");
        }
        if let Some(name) = bc1_name {
            record.bc1_name = name;
        }
        if let Some(name) = bc2_name {
            record.bc2_name = name;
        }
        record
    }

    ///////////////////////////////
    /// Count the outcome for one barcode slot. Returns the name if the call stands
    fn classify(&mut self, slot: &str, resolution: Resolution) -> Option<String> {
        self.tally
            .incr(&format!("{}_score_{}", slot, resolution.score()));
        match resolution {
            Resolution::NoCall { .. } => {
                self.tally.incr(&format!("{}_ambig", slot));
                None
            }
            Resolution::Call {
                name,
                sequence,
                score,
            } => {
                let min_score = 2.0 * sequence.len() as f64 * self.threshold;
                if (score as f64) < min_score {
                    self.tally.incr(&format!("{}_low_score", slot));
                    None
                } else {
                    self.tally.incr(&format!("{}_assigned", slot));
                    Some(name)
                }
            }
        }
    }

    pub fn process_chunk(&mut self, records: Vec<ReadPair>) -> Vec<OutputRecord> {
        records.into_iter().map(|r| self.process_read(r)).collect()
    }

    pub fn into_report(self) -> WorkerReport {
        let mut tally = self.tally;
        tally.add("BC1_cache_hit", self.bc1.n_hit());
        tally.add("BC2_cache_hit", self.bc2.n_hit());
        WorkerReport {
            tally,
            bc1: self.bc1.into_snapshot(),
            bc2: self.bc2.into_snapshot(),
        }
    }
}

///////////////////////////////
/// Start the worker pool. Each worker gets its own copy of the prototype tie-breakers
#[allow(clippy::too_many_arguments)]
pub fn spawn_workers(
    bc1: &TieBreaker,
    bc2: &TieBreaker,
    runtime: Arc<params::Runtime>,
    threading: Arc<params::Threading>,
    chunk_rx: &Receiver<Option<Chunk>>,
    result_tx: &Sender<Option<ResultBatch>>,
    abort: &AbortFlag,
    err_tx: &Sender<ErrorReport>,
) -> anyhow::Result<Vec<JoinHandle<Option<WorkerReport>>>> {
    let mut handles = Vec::with_capacity(threading.threads_work);
    for i in 0..threading.threads_work {
        let bc1 = bc1.clone();
        let bc2 = bc2.clone();
        let runtime = Arc::clone(&runtime);
        let threading = Arc::clone(&threading);
        let chunk_rx = chunk_rx.clone();
        let result_tx = result_tx.clone();
        let thread_abort = abort.clone();

        let handle = spawn_guarded(&format!("worker_{}", i), abort, err_tx, move || {
            let mut worker = Worker::new(bc1, bc2, &runtime);
            let mut n_chunks = 0;
            for chunk in QueueIter::new(&chunk_rx, &thread_abort, threading.queue_timeout) {
                let records = worker.process_chunk(chunk.records);
                if !put_or_abort(
                    &result_tx,
                    Some((chunk.seq, records)),
                    &thread_abort,
                    threading.queue_timeout,
                ) {
                    break;
                }
                n_chunks += 1;
            }
            debug!("worker_{} processed {} chunks", i, n_chunks);
            Ok(worker.into_report())
        })?;
        handles.push(handle);
    }
    Ok(handles)
}
