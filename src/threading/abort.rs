use log::{error, info, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};

// How often a join re-checks whether the thread has finished
const JOIN_POLL: Duration = Duration::from_millis(10);

///////////////////////////////
/// Process-wide cancellation signal. Starts lowered and is raised at most once
#[derive(Clone, Debug, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> AbortFlag {
        AbortFlag::default()
    }

    #[inline(always)]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    ///////////////////////////////
    /// Raise the flag. Returns true only for the call that actually raised it
    pub fn raise(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

///////////////////////////////
/// Failure of one pipeline component, as sent on the error channel
#[derive(Clone, Debug)]
pub struct ErrorReport {
    pub component: String,
    pub lines: Vec<String>,
}

pub fn log_error_reports<I: IntoIterator<Item = ErrorReport>>(reports: I) {
    for report in reports {
        for line in &report.lines {
            error!("subprocess {} exception {}", report.component, line);
        }
    }
}

///////////////////////////////
/// Blocking put that cannot deadlock: retries every `timeout` and gives up once
/// the abort flag is raised. Returns true if the item was queued
pub fn put_or_abort<T>(tx: &Sender<T>, item: T, abort: &AbortFlag, timeout: Duration) -> bool {
    let mut item = item;
    loop {
        if abort.is_raised() {
            return false;
        }
        match tx.send_timeout(item, timeout) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(back)) => item = back,
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

///////////////////////////////
/// Iterates a queue of `Option<T>` until the `None` end marker, a disconnect, or an abort
pub struct QueueIter<'a, T> {
    rx: &'a Receiver<Option<T>>,
    abort: &'a AbortFlag,
    timeout: Duration,
}

impl<'a, T> QueueIter<'a, T> {
    pub fn new(rx: &'a Receiver<Option<T>>, abort: &'a AbortFlag, timeout: Duration) -> Self {
        QueueIter { rx, abort, timeout }
    }
}

impl<T> Iterator for QueueIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if self.abort.is_raised() {
                return None;
            }
            match self.rx.recv_timeout(self.timeout) {
                Ok(Some(item)) => return Some(item),
                Ok(None) => return None,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

///////////////////////////////
/// Join a thread that feeds `data_rx`. While the abort flag is up, both queues are
/// emptied so the thread can reach its exit. Returns the thread result and what was drained
pub fn join_draining<R, D>(
    handle: JoinHandle<Option<R>>,
    data_rx: &Receiver<D>,
    err_rx: &Receiver<ErrorReport>,
    abort: &AbortFlag,
) -> (Option<R>, Vec<D>, Vec<ErrorReport>) {
    let mut drained = Vec::new();
    let mut errors = Vec::new();
    loop {
        if abort.is_raised() {
            drained.extend(data_rx.try_iter());
            errors.extend(err_rx.try_iter());
        }
        if handle.is_finished() {
            break;
        }
        std::thread::sleep(JOIN_POLL);
    }
    if abort.is_raised() {
        drained.extend(data_rx.try_iter());
        errors.extend(err_rx.try_iter());
    }

    let result = match handle.join() {
        Ok(result) => result,
        Err(_) => {
            error!("thread panicked outside of its guard");
            abort.raise();
            None
        }
    };
    (result, drained, errors)
}

///////////////////////////////
/// Run one pipeline component on its own thread. Errors and panics are logged,
/// reported on `err_tx`, and raise the abort flag; the thread then returns None
pub fn spawn_guarded<R, F>(
    name: &str,
    abort: &AbortFlag,
    err_tx: &Sender<ErrorReport>,
    body: F,
) -> anyhow::Result<JoinHandle<Option<R>>>
where
    R: Send + 'static,
    F: FnOnce() -> anyhow::Result<R> + Send + 'static,
{
    let component = name.to_string();
    let abort = abort.clone();
    let err_tx = err_tx.clone();

    let handle = std::thread::Builder::new()
        .name(component.clone())
        .spawn(move || run_guarded(&component, &abort, &err_tx, body))?;
    Ok(handle)
}

pub fn run_guarded<R, F>(
    component: &str,
    abort: &AbortFlag,
    err_tx: &Sender<ErrorReport>,
    body: F,
) -> Option<R>
where
    F: FnOnce() -> anyhow::Result<R>,
{
    let t0 = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(body));
    info!(
        "{} finished after {:.3} seconds.",
        component,
        t0.elapsed().as_secs_f64()
    );

    let lines: Vec<String> = match outcome {
        Ok(Ok(result)) => return Some(result),
        Ok(Err(e)) => format!("{:?}", e).lines().map(str::to_string).collect(),
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            vec![format!("panic: {}", msg)]
        }
    };

    error!("{}: an unhandled error occurred", component);
    for line in &lines {
        error!("{}", line);
    }
    let _ = err_tx.send(ErrorReport {
        component: component.to_string(),
        lines,
    });
    if abort.raise() {
        warn!("{} raised the abort flag", component);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{bounded, unbounded};

    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn test_raise_once() {
        let flag = AbortFlag::new();
        let other = flag.clone();
        assert!(!flag.is_raised());
        assert!(other.raise());
        assert!(!flag.raise());
        assert!(flag.is_raised());
    }

    #[test]
    fn test_put_gives_up_on_abort() {
        let (tx, _rx) = bounded(1);
        let abort = AbortFlag::new();
        assert!(put_or_abort(&tx, 1, &abort, SHORT));

        let raiser = abort.clone();
        let h = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            raiser.raise();
        });
        // queue is full; only the abort ends this
        assert!(!put_or_abort(&tx, 2, &abort, SHORT));
        h.join().unwrap();
    }

    #[test]
    fn test_queue_iter_stops_at_marker() {
        let (tx, rx) = unbounded();
        for i in 0..3 {
            tx.send(Some(i)).unwrap();
        }
        tx.send(None).unwrap();
        tx.send(Some(99)).unwrap();

        let abort = AbortFlag::new();
        let got: Vec<i32> = QueueIter::new(&rx, &abort, SHORT).collect();
        assert_eq!(got, vec![0, 1, 2]);
    }

    #[test]
    fn test_queue_iter_stops_on_abort() {
        let (_tx, rx) = unbounded::<Option<i32>>();
        let abort = AbortFlag::new();
        abort.raise();
        assert_eq!(QueueIter::new(&rx, &abort, SHORT).count(), 0);
    }

    #[test]
    fn test_guard_reports_errors_and_panics() {
        let abort = AbortFlag::new();
        let (err_tx, err_rx) = unbounded();

        let ok = run_guarded("fine", &abort, &err_tx, || Ok(5));
        assert_eq!(ok, Some(5));
        assert!(!abort.is_raised());

        let failed: Option<()> =
            run_guarded("reader", &abort, &err_tx, || anyhow::bail!("broken input"));
        assert!(failed.is_none());
        assert!(abort.is_raised());

        let panicked: Option<()> = run_guarded("worker_0", &abort, &err_tx, || panic!("boom"));
        assert!(panicked.is_none());

        let reports: Vec<ErrorReport> = err_rx.try_iter().collect();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].component, "reader");
        assert!(reports[0].lines[0].contains("broken input"));
        assert!(reports[1].lines[0].contains("boom"));
    }

    #[test]
    fn test_join_draining_unblocks_producer() {
        let abort = AbortFlag::new();
        let (err_tx, err_rx) = unbounded();
        let (tx, rx) = bounded(1);

        let producer_abort = abort.clone();
        let handle = spawn_guarded("producer", &abort, &err_tx, move || {
            // uses a plain blocking send, so only draining lets it finish
            for i in 0..10 {
                tx.send(i)?;
            }
            Ok(producer_abort.is_raised())
        })
        .unwrap();

        abort.raise();
        let (result, drained, errors) = join_draining(handle, &rx, &err_rx, &abort);
        assert_eq!(result, Some(true));
        assert_eq!(drained.len(), 10);
        assert!(errors.is_empty());
    }
}
